#![cfg_attr(not(any(test, feature = "use-std")), no_std)]

extern crate alloc;

pub mod bios;
pub mod dictionary;
pub mod math;
pub mod stack;
pub mod vm;
pub mod word;

#[cfg(any(test, feature = "_force_test_utils"))]
pub mod testutil;

use core::fmt;

pub use crate::vm::Forth;
use crate::{bios::IoError, dictionary::BumpError, stack::StackError};

/// A single stack cell.
pub type Cell = isize;

/// An index into the engine's flat memory.
pub type Addr = usize;

/// Width of a cell (and of an address) in bytes.
pub const CELL: usize = core::mem::size_of::<Cell>();

// Threaded code stores addresses in cells and reads them back.
const _: () = assert!(core::mem::size_of::<Cell>() == core::mem::size_of::<Addr>());

/// Sizing of a [`Forth`] engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    pub data_stack_elems: usize,
    pub return_stack_elems: usize,
    /// Size of the terminal input buffer, in bytes.
    pub tib_size: usize,
    /// Size of the dictionary arena, in cells.
    pub dict_cells: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            data_stack_elems: 64,
            return_stack_elems: 32,
            tib_size: 80,
            dict_cells: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Stack(StackError),
    Bump(BumpError),
    Io(IoError),
    BadAddress(Addr),
    BadNative(Cell),
    NotImplemented(&'static str),
    CompileOnly(&'static str),
    NullWord,
    /// The engine has nothing left to run, either because `BYE` was executed
    /// or because the outermost word returned.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Ok,
    Stack,
    System,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Done => ErrorKind::Ok,
            Error::Stack(_) => ErrorKind::Stack,
            _ => ErrorKind::System,
        }
    }

    /// Process exit status for a session that ended with this error.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Ok => 0,
            ErrorKind::Stack => 1,
            ErrorKind::System => 2,
        }
    }

    /// Whether a warm reset (see [`Forth::abort`]) leaves the engine usable.
    ///
    /// Arena exhaustion and I/O failures are not recoverable this way.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Stack(_)
            | Error::BadAddress(_)
            | Error::BadNative(_)
            | Error::NotImplemented(_)
            | Error::CompileOnly(_) => true,
            Error::Bump(_) | Error::Io(_) | Error::NullWord | Error::Done => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Stack(se) => fmt::Display::fmt(se, f),
            Error::Bump(BumpError::OutOfMemory) => f.write_str("DICT FULL"),
            Error::Io(ie) => fmt::Display::fmt(ie, f),
            Error::BadAddress(addr) => write!(f, "BAD ADDRESS {addr}"),
            Error::BadNative(id) => write!(f, "BAD NATIVE {id}"),
            Error::NotImplemented(what) => write!(f, "{what} : not imp"),
            Error::CompileOnly(what) => write!(f, "{what} : not comp"),
            Error::NullWord => f.write_str("NULL WORD"),
            Error::Done => f.write_str("DONE"),
        }
    }
}

impl From<StackError> for Error {
    fn from(se: StackError) -> Self {
        Error::Stack(se)
    }
}

impl From<BumpError> for Error {
    fn from(be: BumpError) -> Self {
        Error::Bump(be)
    }
}

impl From<IoError> for Error {
    fn from(ie: IoError) -> Self {
        Error::Io(ie)
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Error::Io(IoError::Format)
    }
}

trait ReplaceErr {
    type OK;
    fn replace_err<NE>(self, t: NE) -> Result<Self::OK, NE>;
}

impl<T, OE> ReplaceErr for Result<T, OE> {
    type OK = T;
    #[inline]
    fn replace_err<NE>(self, e: NE) -> Result<Self::OK, NE> {
        match self {
            Ok(t) => Ok(t),
            Err(_e) => Err(e),
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::{
        stack::{StackError, StackKind},
        testutil::{new_forth, ScriptIo},
        Error, Params,
    };

    #[test]
    fn forth() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        let lines = &[
            ("3 4 + .", "7 "),
            (": SQUARE DUP * ;", ""),
            ("5 SQUARE .", "25 "),
            (": YAY 2 3 + . ;", ""),
            ("YAY YAY YAY", "5 5 5 "),
            (": BOOP YAY YAY ;", ""),
            ("BOOP", "5 5 "),
            ("42 EMIT", "*"),
            (": STAR 42 EMIT ;", ""),
            ("STAR STAR STAR", "***"),
            (": SIGN DUP 0 < IF DROP 45 EMIT ELSE 0 > IF 43 EMIT THEN THEN ;", ""),
            ("-3 SIGN 0 SIGN 7 SIGN", "-+"),
            (": COUNTDOWN BEGIN DUP . 1 - DUP 0= UNTIL DROP ;", ""),
            ("3 COUNTDOWN", "3 2 1 "),
            ("123 CONSTANT X", ""),
            ("X .", "123 "),
            ("4 X + .", "127 "),
            ("VARIABLE Y", ""),
            ("Y @ .", "0 "),
            ("10 Y !", ""),
            ("Y @ .", "10 "),
            (".\" hello, world!\"", "hello, world!"),
            ("1 2 3 .S", "1 2 3 "),
            ("2DROP DROP", ""),
        ];

        for (line, out) in lines {
            println!("{line}");
            forth.evaluate(line).unwrap();
            assert_eq!(forth.io().output_str(), *out);
            forth.io_mut().clear_output();
        }
        assert!(forth.data_stack().is_empty());
    }

    #[test]
    fn underflow_resets() {
        let mut forth = new_forth(Params::default(), ScriptIo::new());
        forth.evaluate("1 2").unwrap();
        assert_eq!(
            forth.evaluate("+ + +"),
            Err(Error::Stack(StackError::Underflow(StackKind::Data)))
        );
        assert!(forth.data_stack().is_empty());
        assert!(forth.return_stack().is_empty());
        forth.evaluate("6 7 * .").unwrap();
        assert_eq!(forth.io().output_str(), "42 ");
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Error::Done.exit_code(), 0);
        assert_eq!(
            Error::Stack(StackError::Overflow(StackKind::Return)).exit_code(),
            1
        );
        assert_eq!(Error::NotImplemented("M*/").exit_code(), 2);
        assert!(!Error::Done.is_recoverable());
        assert_eq!(
            alloc::format!("{}", Error::Stack(StackError::Underflow(StackKind::Data))),
            "DATA UNDERFLOW"
        );
    }
}
