//! The character device a [`Forth`](crate::Forth) engine talks to.

use core::fmt;

pub const BACKSPACE: u8 = 0x08;
pub const DELETE: u8 = 0x7f;

// The byte that ends an entered line depends on how the host console
// delivers input; the other line ending byte is dropped.
cfg_if::cfg_if! {
    if #[cfg(windows)] {
        pub const KEY_ENTER: u8 = b'\r';
        pub const KEY_IGNORE: u8 = b'\n';
    } else {
        pub const KEY_ENTER: u8 = b'\n';
        pub const KEY_IGNORE: u8 = b'\r';
    }
}

/// Output newline.
pub const NEWLINE: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// The input has no more characters and never will.
    EndOfInput,
    Read,
    Write,
    Format,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IoError::EndOfInput => "END OF INPUT",
            IoError::Read => "READ FAILED",
            IoError::Write => "WRITE FAILED",
            IoError::Format => "FORMAT FAILED",
        })
    }
}

/// Blocking, unbuffered, single character I/O.
pub trait Io {
    /// Blocks until the next input byte is available.
    ///
    /// Returns [`IoError::EndOfInput`] once the input is exhausted.
    fn read_char(&mut self) -> Result<u8, IoError>;

    fn write_char(&mut self, c: u8) -> Result<(), IoError>;

    /// Echoes a byte accepted by `ACCEPT`.
    ///
    /// Hosts whose terminal already echoes typed input can make this a no-op.
    fn echo(&mut self, c: u8) -> Result<(), IoError> {
        self.write_char(c)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        bytes.iter().try_for_each(|&c| self.write_char(c))
    }

    /// Called once before the engine is constructed.
    fn setup(&mut self) {}

    /// Called once after the engine stops.
    fn teardown(&mut self) {}
}

/// Adapts an [`Io`] to [`core::fmt::Write`], so numbers can be `write!`ten.
pub(crate) struct Console<'a, I: Io>(pub(crate) &'a mut I);

impl<I: Io> fmt::Write for Console<'_, I> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
