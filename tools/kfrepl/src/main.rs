use std::{
    fs::File,
    io::{stdin, IsTerminal, Read},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, ValueEnum};
use kopforth::{bios::Io, Error, Forth, Params};
use miette::{miette, Context, IntoDiagnostic};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::prelude::*;

mod io;

use crate::io::StdIo;

/// Runs a kopForth session on the terminal, or on a script.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// A file to read input from instead of stdin.
    script: Option<PathBuf>,

    #[clap(flatten)]
    params: ParamArgs,

    /// Whether input accepted by the engine is echoed to stdout.
    ///
    /// `auto` echoes unless stdin is a terminal, which echoes by itself.
    #[arg(long, value_enum, default_value_t = Echo::Auto)]
    echo: Echo,

    /// Warm reset and carry on after a recoverable fault, instead of exiting.
    #[arg(short, long)]
    keep_going: bool,

    /// a comma-separated list of `tracing` targets and levels to enable.
    ///
    /// for example, `warn,kopforth::vm=trace` traces every word the inner
    /// interpreter runs. see
    /// <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/targets/struct.Targets.html#filtering-with-targets>
    /// for more details on this syntax.
    #[arg(
        short,
        long = "trace",
        env = "KOPFORTH_TRACE",
        default_value_t = tracing_subscriber::filter::Targets::new().with_default(LevelFilter::WARN),
    )]
    trace_filter: tracing_subscriber::filter::Targets,
}

#[derive(Debug, clap::Args)]
struct ParamArgs {
    /// Data stack depth, in cells.
    #[arg(long = "data-stack", default_value_t = Params::default().data_stack_elems)]
    data_stack_elems: usize,

    /// Return stack depth, in cells.
    #[arg(long = "return-stack", default_value_t = Params::default().return_stack_elems)]
    return_stack_elems: usize,

    /// Terminal input buffer size, in bytes.
    #[arg(long, default_value_t = Params::default().tib_size)]
    tib_size: usize,

    /// Dictionary size, in cells.
    #[arg(long, default_value_t = Params::default().dict_cells)]
    dict_cells: usize,
}

impl From<ParamArgs> for Params {
    fn from(args: ParamArgs) -> Self {
        Params {
            data_stack_elems: args.data_stack_elems,
            return_stack_elems: args.return_stack_elems,
            tib_size: args.tib_size,
            dict_cells: args.dict_cells,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Echo {
    Auto,
    Always,
    Never,
}

impl Echo {
    fn enabled(self, from_script: bool) -> bool {
        match self {
            Echo::Auto => from_script || !stdin().is_terminal(),
            Echo::Always => true,
            Echo::Never => false,
        }
    }
}

fn main() -> miette::Result<ExitCode> {
    let Args {
        script,
        params,
        echo,
        keep_going,
        trace_filter,
    } = Args::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(trace_filter)
        .init();

    let input: Box<dyn Read> = match &script {
        Some(path) => Box::new(
            File::open(path)
                .into_diagnostic()
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(stdin()),
    };
    let mut io = StdIo::new(input, echo.enabled(script.is_some()));
    io.setup();

    let params = Params::from(params);
    info!(?params, "starting");
    let mut forth =
        Forth::new(params, io).map_err(|error| miette!("failed to start kopForth: {error}"))?;

    let code = loop {
        match forth.run() {
            Ok(()) => break 0,
            Err(error) => {
                post_mortem(&forth, &error);
                if keep_going && error.is_recoverable() {
                    warn!(%error, "resetting");
                    forth.abort();
                    continue;
                }
                break error.exit_code();
            }
        }
    };
    forth.release();
    Ok(ExitCode::from(code))
}

fn post_mortem(forth: &Forth<StdIo>, error: &Error) {
    eprintln!();
    eprint!("stack: ");
    for n in forth.data_stack().iter_bottom_up() {
        eprint!("{n} ");
    }
    eprintln!();
    eprintln!("tib: {}", String::from_utf8_lossy(forth.tib()));
    eprintln!("#tib: {}", forth.tib().len());
    eprintln!("ERROR: {error}");
}
