use std::io::{self, BufReader, Bytes, Read, Stdout, Write};

use kopforth::bios::{Io, IoError};
use tracing::{debug, trace};

/// Blocking character I/O over a byte source and stdout.
///
/// Output is flushed before every read, so a prompt is visible before the
/// engine waits for input.
pub struct StdIo {
    input: Bytes<BufReader<Box<dyn Read>>>,
    output: Stdout,
    echo: bool,
}

impl StdIo {
    pub fn new(input: Box<dyn Read>, echo: bool) -> Self {
        Self {
            input: BufReader::new(input).bytes(),
            output: io::stdout(),
            echo,
        }
    }
}

impl Io for StdIo {
    fn read_char(&mut self) -> Result<u8, IoError> {
        self.output.flush().map_err(|_| IoError::Write)?;
        match self.input.next() {
            Some(Ok(c)) => {
                trace!(c, "read");
                Ok(c)
            }
            Some(Err(error)) => {
                debug!(%error, "read failed");
                Err(IoError::Read)
            }
            None => Err(IoError::EndOfInput),
        }
    }

    fn write_char(&mut self, c: u8) -> Result<(), IoError> {
        self.write_bytes(&[c])
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.output.write_all(bytes).map_err(|error| {
            debug!(%error, "write failed");
            IoError::Write
        })
    }

    fn echo(&mut self, c: u8) -> Result<(), IoError> {
        if self.echo {
            self.write_char(c)?;
        }
        Ok(())
    }

    fn teardown(&mut self) {
        // nothing useful to do if this fails on the way out
        let _ = self.output.flush();
    }
}
