use core::fmt::Write;

use tracing::{trace, warn};

use crate::{
    bios::{Console, Io},
    dictionary::Dictionary,
    stack::{Stack, StackKind},
    word::{Body, Xt},
    Addr, Cell, Error, Params, ReplaceErr, CELL,
};

pub mod build;
pub mod builtins;

/// Forth is the "context" of the VM/interpreter.
///
/// It owns both stacks, the flat memory holding the dictionary, and the
/// character device. Everything it runs is threaded code in that memory,
/// including the text interpreter itself.
pub struct Forth<I: 'static> {
    pub(crate) data_stack: Stack<Cell>,
    pub(crate) return_stack: Stack<Addr>,
    pub(crate) dict: Dictionary,
    pub(crate) io: I,
    pc: Addr,
    quit: Xt,
    interpret: Xt,
}

impl<I: Io + 'static> Forth<I> {
    /// Builds the dictionary and prints the banner.
    ///
    /// The engine starts out at `QUIT`, so [`Forth::run`] reads and interprets
    /// lines from `io` until the input ends or `BYE` is executed.
    pub fn new(params: Params, io: I) -> Result<Self, Error> {
        let mut dict = Dictionary::new(params.tib_size, params.dict_cells);
        let entry = build::populate(&mut dict, Self::NATIVES)?;
        let mut forth = Self {
            data_stack: Stack::new(StackKind::Data, params.data_stack_elems),
            return_stack: Stack::new(StackKind::Return, params.return_stack_elems),
            dict,
            io,
            pc: entry.quit.addr(),
            quit: entry.quit,
            interpret: entry.interpret,
        };
        forth.banner()?;
        Ok(forth)
    }

    fn banner(&mut self) -> Result<(), Error> {
        let (used, capacity) = (self.dict.used(), self.dict.capacity());
        let mut out = Console(&mut self.io);
        writeln!(out, "kopForth v{}, {} Bit", env!("CARGO_PKG_VERSION"), Cell::BITS)?;
        writeln!(out, "{used} bytes used of {capacity}")?;
        Ok(())
    }

    /// Runs one step of the inner interpreter.
    ///
    /// `pc` holds the execution token to run. A native word runs to completion
    /// and control resumes at the continuation on top of the return stack; a
    /// compiled word continues with the first cell of its body. Either way the
    /// next cell is fetched and its continuation pushed.
    ///
    /// Returns [`Error::Done`] once a native word finishes with nothing left to
    /// return to.
    pub fn tick(&mut self) -> Result<(), Error> {
        let cur = Xt(self.pc);
        trace!(
            word = self.name_of(cur),
            rdepth = self.return_stack.depth(),
            ddepth = self.data_stack.depth(),
        );

        match self.dict.body(cur)? {
            Body::Native(id) => {
                let entry = Self::NATIVES
                    .get(id)
                    .ok_or(Error::BadNative(id as Cell))?;
                (entry.func)(self)?;
                self.pc = self.return_stack.pop().ok_or(Error::Done)?;
            }
            Body::Compiled(body) => self.pc = body,
        }

        let next = self.dict.fetch(self.pc)?;
        self.return_stack.push(self.pc.wrapping_add(CELL))?;
        self.pc = Addr::try_from(next).replace_err(Error::BadAddress(next as Addr))?;
        Ok(())
    }

    /// Ticks until the engine is done or faults.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            match self.tick() {
                Ok(()) => {}
                Err(Error::Done) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Interprets a single line of source.
    ///
    /// Only `line` is interpreted: if the line aborts, the engine is left
    /// ready at `QUIT` rather than reading further input from `io`. A line
    /// longer than the input buffer is truncated.
    ///
    /// On failure both stacks are emptied and the engine leaves compile
    /// state, so the next line starts fresh.
    pub fn evaluate(&mut self, line: &str) -> Result<(), Error> {
        let kept = self.dict.fill_tib(line.as_bytes());
        if kept < line.len() {
            warn!(len = line.len(), kept, "input line truncated");
        }
        self.return_stack.clear();
        self.pc = self.interpret.addr();
        let res = self.run_line();
        if let Err(error) = res {
            warn!(%error, "evaluate failed");
            self.reset();
        }
        res
    }

    /// Like [`Forth::run`], but stops instead of entering `QUIT`.
    fn run_line(&mut self) -> Result<(), Error> {
        loop {
            if self.pc == self.quit.addr() {
                self.return_stack.clear();
                self.dict.set_compiling(false);
                return Ok(());
            }
            match self.tick() {
                Ok(()) => {}
                Err(Error::Done) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs the word `xt` until it returns.
    pub fn execute(&mut self, xt: Xt) -> Result<(), Error> {
        self.return_stack.clear();
        self.pc = xt.addr();
        self.run()
    }

    /// Looks up a searchable word, returning its token and whether it is
    /// immediate.
    pub fn find(&self, name: &str) -> Option<(Xt, bool)> {
        let xt = self.dict.find(name.as_bytes()).ok()??;
        let flags = self.dict.flags(xt).ok()?;
        Some((xt, flags.is_immediate()))
    }

    /// Warm reset: empties the stacks, drops any half-built definition, and
    /// restarts at `QUIT`.
    pub fn abort(&mut self) {
        self.reset();
        self.pc = self.quit.addr();
    }

    fn reset(&mut self) {
        self.data_stack.clear();
        self.return_stack.clear();
        self.dict.set_compiling(false);
        self.dict.abandon();
    }

    fn name_of(&self, xt: Xt) -> &str {
        self.dict
            .name(xt)
            .ok()
            .and_then(|name| core::str::from_utf8(name).ok())
            .unwrap_or("?")
    }

    pub fn data_stack(&self) -> &Stack<Cell> {
        &self.data_stack
    }

    pub fn return_stack(&self) -> &Stack<Addr> {
        &self.return_stack
    }

    /// The current contents of the terminal input buffer.
    pub fn tib(&self) -> &[u8] {
        self.dict.tib()
    }

    pub fn used(&self) -> usize {
        self.dict.used()
    }

    pub fn capacity(&self) -> usize {
        self.dict.capacity()
    }

    pub fn io(&self) -> &I {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut I {
        &mut self.io
    }

    pub fn release(mut self) -> I {
        self.io.teardown();
        self.io
    }
}

#[cfg(test)]
pub mod test {
    use crate::{
        bios::{Io, IoError},
        dictionary::BumpError,
        testutil::{new_forth, ScriptIo},
        word::Xt,
        Error, Forth, Params, CELL,
    };

    #[test]
    fn banner() {
        let forth = Forth::new(Params::default(), ScriptIo::new()).unwrap();
        let out = forth.io().output_str();
        let mut lines = out.lines();
        let first = lines.next().unwrap();
        assert!(first.starts_with("kopForth v"));
        assert!(first.ends_with(&format!(", {} Bit", isize::BITS)));
        assert_eq!(
            lines.next().unwrap(),
            format!("{} bytes used of {}", forth.used(), forth.capacity())
        );
        assert!(forth.used() > 0);
    }

    #[test]
    fn too_small() {
        let params = Params {
            dict_cells: 16,
            ..Params::default()
        };
        assert!(matches!(
            Forth::new(params, ScriptIo::new()),
            Err(Error::Bump(_))
        ));
    }

    #[test]
    fn session() {
        let mut io = ScriptIo::new();
        io.push_line("3 4 + .");
        io.push_line(": SQ DUP * ;");
        io.push_line("9 SQ .");
        let mut forth = new_forth(Params::default(), io);
        forth.run().unwrap();
        assert_eq!(
            forth.io().output_str(),
            "3 4 + . 7  ok\n: SQ DUP * ;  ok\n9 SQ . 81  ok\n"
        );
    }

    #[test]
    fn bye_ends_session() {
        let mut io = ScriptIo::new();
        io.push_line("1 . BYE 2 .");
        io.push_line("3 .");
        let mut forth = new_forth(Params::default(), io);
        forth.run().unwrap();
        assert_eq!(forth.io().output_str(), "1 . BYE 2 . 1 ");
    }

    #[test]
    fn unknown_word() {
        let mut io = ScriptIo::new();
        io.push_line("1 2 BOGUSWORD 3");
        io.push_line(".S");
        let mut forth = new_forth(Params::default(), io);
        forth.run().unwrap();
        assert_eq!(
            forth.io().output_str(),
            "1 2 BOGUSWORD 3 \nERROR: 'BOGUSWORD' word not found\n.S  ok\n"
        );
        assert!(forth.data_stack().is_empty());
    }

    #[test]
    fn fault_and_abort() {
        let mut io = ScriptIo::new();
        io.push_line(": BROKEN 1 2");
        io.push_line("[ DROP");
        io.push_line("5 .");
        let mut forth = new_forth(Params::default(), io);
        assert_eq!(
            forth.run(),
            Err(Error::Stack(crate::stack::StackError::Underflow(
                crate::stack::StackKind::Data
            )))
        );
        forth.abort();
        forth.io_mut().clear_output();
        forth.run().unwrap();
        assert_eq!(forth.io().output_str(), "5 . 5  ok\n");
        // the interrupted definition never became visible
        assert!(forth.find("BROKEN").is_none());
    }

    #[test]
    fn execute_and_find() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        forth.evaluate(": STAR 42 EMIT ;").unwrap();
        let (star, immediate) = forth.find("STAR").unwrap();
        assert!(!immediate);
        forth.execute(star).unwrap();
        let (dup, _) = forth.find("DUP").unwrap();
        forth.evaluate("7").unwrap();
        forth.execute(dup).unwrap();
        assert_eq!(forth.data_stack().depth(), 2);
        assert_eq!(forth.io().output_str(), "*");
        assert!(forth.find(";").unwrap().1);
        assert!(forth.find("NOPE").is_none());
        assert!(forth.find("").is_none());

        assert!(matches!(
            forth.execute(Xt(usize::MAX / 2)),
            Err(Error::BadAddress(_))
        ));
    }

    #[test]
    fn evaluate_stays_on_line() {
        let mut io = ScriptIo::new();
        io.push_line("5 .");
        let mut forth = new_forth(Params::default(), io);

        forth.evaluate("1 BOGUS 2").unwrap();
        assert_eq!(
            forth.io().output_str(),
            "\nERROR: 'BOGUS' word not found\n"
        );
        assert!(forth.data_stack().is_empty());
        forth.io_mut().clear_output();

        forth.evaluate(": HALF 1 BOGUS").unwrap();
        forth.evaluate("1 2 ABORT 3 .").unwrap();
        forth.evaluate("STATE @ .").unwrap();
        assert_eq!(
            forth.io().output_str(),
            "\nERROR: 'BOGUS' word not found\n0 "
        );
        assert!(forth.find("HALF").is_none());
        forth.io_mut().clear_output();

        // the queued line is still there for a real session
        forth.abort();
        forth.run().unwrap();
        assert_eq!(forth.io().output_str(), "5 . 5  ok\n");
    }

    #[test]
    fn long_lines_truncate() {
        let params = Params {
            tib_size: 8,
            ..Params::default()
        };
        let mut forth = new_forth(params, ScriptIo::new());
        forth.evaluate("1 2 + . 99 .").unwrap();
        assert_eq!(forth.io().output_str(), "3 ");
        assert_eq!(forth.tib(), b"1 2 + . ");
        assert!(forth.data_stack().is_empty());
    }

    #[test]
    fn arena_exhaustion() {
        let params = Params {
            dict_cells: 1500,
            ..Params::default()
        };
        let mut forth = new_forth(params, ScriptIo::new());

        assert_eq!(
            forth.evaluate("1000000 ALLOT"),
            Err(Error::Bump(BumpError::OutOfMemory))
        );
        forth.evaluate("HERE 5 , HERE SWAP - .").unwrap();
        assert_eq!(forth.io().output_str(), format!("{CELL} "));

        let mut failure = None;
        for i in 0..1500 {
            let line = format!(": W{i} 1 2 3 4 5 6 7 8 ;");
            if let Err(error) = forth.evaluate(&line) {
                failure = Some(error);
                break;
            }
        }
        let error = failure.unwrap();
        assert_eq!(error, Error::Bump(BumpError::OutOfMemory));
        assert!(!error.is_recoverable());
        assert_eq!(
            forth.evaluate(": X ;"),
            Err(Error::Bump(BumpError::OutOfMemory))
        );
    }

    struct Broken;

    impl Io for Broken {
        fn read_char(&mut self) -> Result<u8, IoError> {
            Err(IoError::Read)
        }

        fn write_char(&mut self, _c: u8) -> Result<(), IoError> {
            Ok(())
        }
    }

    #[test]
    fn read_fault() {
        let mut forth = Forth::new(Params::default(), Broken).unwrap();
        assert_eq!(forth.run(), Err(Error::Io(IoError::Read)));
    }
}
