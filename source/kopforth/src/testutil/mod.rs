//! # Test Utilities
//!
//! A scripted character device, and helpers for running "ui tests": forth
//! source paired with the output it is expected to print.
//!
//! ## UI Tests
//!
//! Each line of a ui-test is one of:
//!
//! * Configuration values for the engine, specified as "frontmatter comments".
//!   These must appear before any other non-comment lines. Currently accepted:
//!     * `( data_stack_elems USIZE )`
//!     * `( return_stack_elems USIZE )`
//!     * `( tib_size USIZE )`
//!     * `( dict_cells USIZE )`
//! * Comment lines. These are any lines just containing a `( ... )` style forth comment.
//! * Successful input lines, starting with `> ...`.
//! * Successful output lines, starting with `< ...`.
//!     * Any successful input line can have zero or more output lines
//!     * If *no* output lines are specified, ANY successful output is accepted/ignored.
//! * Unsuccessful input lines, starting with `x ...`.
//!     * This line is expected to fault, i.e. [`Forth::evaluate`] returns an `Err()`.
//!     * Unsuccessful input lines may not have any successful output
//!
//! Each input line is handed to [`Forth::evaluate`] on its own, so no ` ok`
//! prompt is printed. Unknown words are not faults: they print an error and
//! abort, which shows up as output.
//!
//! ### Example
//!
//! This is a forth ui-test doctest. It will be run with `cargo test --all-features`.
//!
//! ```rust
//! # use kopforth::testutil::blocking_runtest;
//! #
//! # blocking_runtest(r#"
//! ( specify engine settings with frontmatter )
//! ( data_stack_elems 16 )
//!
//! ( specify input with no output )
//! > : STAR 42 EMIT ;
//!
//! ( specify input and output )
//! > STAR STAR
//! < **
//!
//! ( specify lines that fault )
//! x DROP
//! # "#)
//! ```

use std::collections::VecDeque;

use crate::{
    bios::{Io, IoError, KEY_ENTER},
    Error, Forth, Params,
};

/// An [`Io`] fed from a script, recording everything written to it.
///
/// Echo is on, as on a real terminal, so a line read by `ACCEPT` shows up in
/// the output.
#[derive(Debug, Default)]
pub struct ScriptIo {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ScriptIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `line`, followed by the enter key.
    pub fn push_line(&mut self, line: &str) {
        self.push_bytes(line.as_bytes());
        self.input.push_back(KEY_ENTER);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    pub fn output_str(&self) -> &str {
        core::str::from_utf8(&self.output).unwrap()
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}

impl Io for ScriptIo {
    fn read_char(&mut self) -> Result<u8, IoError> {
        self.input.pop_front().ok_or(IoError::EndOfInput)
    }

    fn write_char(&mut self, c: u8) -> Result<(), IoError> {
        self.output.push(c);
        Ok(())
    }
}

/// Builds an engine and throws away its banner.
pub fn new_forth(params: Params, io: ScriptIo) -> Forth<ScriptIo> {
    let mut forth = Forth::new(params, io).unwrap();
    forth.io_mut().clear_output();
    forth
}

/// Run the given forth ui test against a fresh engine.
///
/// Does accept any/all/none of the configuration frontmatter (see above for
/// listing of frontmatter kinds).
pub fn blocking_runtest(contents: &str) {
    let tokd = tokenize(contents, true).unwrap();
    let mut forth = new_forth(tokd.settings, ScriptIo::new());
    blocking_steps_with(tokd.steps.as_slice(), &mut forth);
}

/// Run the given forth ui-test against the given engine.
///
/// Does not accept ui-tests with frontmatter configuration (will panic)
pub fn blocking_runtest_with(forth: &mut Forth<ScriptIo>, contents: &str) {
    let tokd = tokenize(contents, false).unwrap();
    blocking_steps_with(tokd.steps.as_slice(), forth);
}

fn check_output(res: Result<(), Error>, outcome: &Outcome, output: &str) {
    println!("< {output}");
    match (res, outcome) {
        (Ok(()), Outcome::OkAnyOutput) => {}
        (Ok(()), Outcome::OkWithOutput(exp)) => {
            let act_lines = output.lines().collect::<Vec<&str>>();
            assert_eq!(act_lines.len(), exp.len(), "output: {output:?}");
            act_lines.iter().zip(exp.iter()).for_each(|(a, e)| {
                assert_eq!(a.trim_end(), e.trim_end());
            })
        }
        (Err(_e), Outcome::FatalError) => {}
        (res, exp) => {
            eprintln!("Error!");
            eprintln!("Expected: {exp:?}");
            eprintln!("Got: {res:?}");
            if res.is_ok() {
                eprintln!("Output:\n{}", output);
            }
            panic!();
        }
    }
}

// Runs the given steps against the given engine.
//
// Panics on any mismatch
fn blocking_steps_with(steps: &[Step], forth: &mut Forth<ScriptIo>) {
    for Step { input, output: outcome } in steps {
        println!("> {input}");
        let res = forth.evaluate(input);
        check_output(res, outcome, forth.io().output_str());
        forth.io_mut().clear_output();
    }
}

#[derive(Debug)]
enum Outcome {
    OkAnyOutput,
    OkWithOutput(Vec<String>),
    FatalError,
}

#[derive(Debug)]
struct Step {
    input: String,
    output: Outcome,
}

#[derive(Default, Debug)]
struct Tokenized {
    settings: Params,
    steps: Vec<Step>,
}

fn tokenize(contents: &str, allow_frontmatter: bool) -> Result<Tokenized, ()> {
    let mut output = Tokenized::default();
    let mut frontmatter_done = !allow_frontmatter;

    for line in contents.lines() {
        let line = line.trim_start();
        // a bare `<` expects an empty output line
        let (tok, remain) = match line.split_once(' ') {
            Some(t) => t,
            None if line == "<" => ("<", ""),
            None => continue,
        };

        match tok {
            ">" => {
                frontmatter_done = true;
                output.steps.push(Step {
                    input: remain.to_string(),
                    output: Outcome::OkAnyOutput,
                });
            }
            "<" => {
                frontmatter_done = true;
                let cur_step = output.steps.last_mut().ok_or(())?;
                let expected_out = remain.to_string();
                match &mut cur_step.output {
                    Outcome::OkAnyOutput => {
                        cur_step.output = Outcome::OkWithOutput(vec![expected_out]);
                    }
                    Outcome::OkWithOutput(o) => o.push(expected_out),
                    Outcome::FatalError => panic!("Fatal error can't set output"),
                }
            }
            "x" => {
                frontmatter_done = true;
                output.steps.push(Step {
                    input: remain.to_string(),
                    output: Outcome::FatalError,
                });
            }
            "(" => {
                let mut split = remain.split_whitespace();
                let setting = match split.next() {
                    Some("data_stack_elems") => &mut output.settings.data_stack_elems,
                    Some("return_stack_elems") => &mut output.settings.return_stack_elems,
                    Some("tib_size") => &mut output.settings.tib_size,
                    Some("dict_cells") => &mut output.settings.dict_cells,
                    Some(_) => continue,
                    None => panic!(),
                };
                assert!(!frontmatter_done, "Unexpected frontmatter settings!");
                *setting = split.next().unwrap().parse::<usize>().unwrap();
                assert_eq!(Some(")"), split.next());
            }
            _ => {}
        }
    }

    Ok(output)
}
