use core::fmt::Write;

use crate::{
    bios::{Console, Io, IoError, BACKSPACE, DELETE, KEY_ENTER, KEY_IGNORE},
    dictionary::{compare, BumpError, MAX_COUNT, TIB},
    math::{ByteCell, TwoCell},
    stack::{StackError, StackKind},
    Addr, Cell, Error, Forth, CELL,
};

/// A primitive implemented in Rust.
///
/// A native word's body holds its index into [`Forth::NATIVES`].
pub struct NativeEntry<I: 'static> {
    pub name: &'static str,
    pub func: fn(&mut Forth<I>) -> Result<(), Error>,
    pub immediate: bool,
}

// NOTE: This macro exists because we can't have const constructors that include
// "mut" items, which unfortunately covers things like `fn(&mut T)`. Use a macro
// until this is resolved.
macro_rules! native {
    ($name:literal, $func:expr) => {
        NativeEntry {
            name: $name,
            func: $func,
            immediate: false,
        }
    };
    ($name:literal, $func:expr, immediate) => {
        NativeEntry {
            name: $name,
            func: $func,
            immediate: true,
        }
    };
}

/// Reads a length operand; negative lengths are empty.
fn len(n: Cell) -> usize {
    usize::try_from(n).unwrap_or(0)
}

impl<I: Io + 'static> Forth<I> {
    /// The native primitives, in dictionary order.
    pub const NATIVES: &'static [NativeEntry<I>] = &[
        native!("EXIT", Self::exit),
        native!("(LIT)", Self::literal),
        native!("-", Self::sub),
        native!("*", Self::mul),
        native!(".", Self::pop_print),
        native!("@", Self::fetch),
        native!("!", Self::store),
        native!("C@", Self::cfetch),
        native!("C!", Self::cstore),
        native!(">R", Self::data_to_return_stack),
        native!("R>", Self::return_to_data_stack),
        native!("DROP", Self::drop),
        native!("DUP", Self::dup),
        native!("SWAP", Self::swap),
        native!("BRANCH", Self::jump),
        native!("0BRANCH", Self::jump_if_zero),
        native!("EMIT", Self::emit),
        native!("KEY", Self::key),
        native!("ACCEPT", Self::accept),
        native!("WORD", Self::word),
        native!("TYPE", Self::type_),
        native!("CREATE", Self::create),
        native!("IMMEDIATE", Self::immediate, immediate),
        native!("COMPARE", Self::compare),
        native!("FIND", Self::find_word),
        native!("M*/", Self::mul_scale),
        native!("D+", Self::double_add),
        native!("=", Self::equal),
        native!("<", Self::less),
        native!("NAND", Self::nand),
        native!("(S\")", Self::string_literal),
        native!("S\"", Self::squote, immediate),
        native!(".\"", Self::dotquote, immediate),
        native!("BYE", Self::bye),
        native!(".S", Self::print_stack),
        native!("(CLR-RET-STACK)", Self::clear_return_stack),
        native!("(CLR-DAT-STACK)", Self::clear_data_stack),
    ];

    pub fn exit(&mut self) -> Result<(), Error> {
        self.return_stack.try_pop()?;
        Ok(())
    }

    /// Pushes the cell after the current one and skips over it.
    pub fn literal(&mut self) -> Result<(), Error> {
        let at = self.return_stack.try_pop()?;
        let val = self.dict.fetch(at)?;
        self.data_stack.push(val)?;
        self.return_stack.push(at.wrapping_add(CELL))?;
        Ok(())
    }

    pub fn sub(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(a.wrapping_sub(b))?;
        Ok(())
    }

    pub fn mul(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(a.wrapping_mul(b))?;
        Ok(())
    }

    pub fn pop_print(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_pop()?;
        write!(Console(&mut self.io), "{a} ")?;
        Ok(())
    }

    pub fn fetch(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()? as Addr;
        let val = self.dict.fetch(addr)?;
        self.data_stack.push(val)?;
        Ok(())
    }

    pub fn store(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()? as Addr;
        let val = self.data_stack.try_pop()?;
        self.dict.store(addr, val)?;
        Ok(())
    }

    pub fn cfetch(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()? as Addr;
        let val = self.dict.fetch_byte(addr)?;
        self.data_stack.push(Cell::from(val))?;
        Ok(())
    }

    pub fn cstore(&mut self) -> Result<(), Error> {
        let addr = self.data_stack.try_pop()? as Addr;
        let val = self.data_stack.try_pop()?;
        self.dict.store_byte(addr, val as u8)?;
        Ok(())
    }

    // `>R` and `R>` run with the caller's continuation on top of the return
    // stack, so they reach underneath it.

    pub fn data_to_return_stack(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_pop()?;
        let cont = self.return_stack.try_pop()?;
        self.return_stack.push(a as Addr)?;
        self.return_stack.push(cont)?;
        Ok(())
    }

    pub fn return_to_data_stack(&mut self) -> Result<(), Error> {
        let cont = self.return_stack.try_pop()?;
        let a = self.return_stack.try_pop()?;
        self.data_stack.push(a as Cell)?;
        self.return_stack.push(cont)?;
        Ok(())
    }

    pub fn drop(&mut self) -> Result<(), Error> {
        self.data_stack.try_pop()?;
        Ok(())
    }

    pub fn dup(&mut self) -> Result<(), Error> {
        let a = self.data_stack.try_peek()?;
        self.data_stack.push(a)?;
        Ok(())
    }

    pub fn swap(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(b)?;
        self.data_stack.push(a)?;
        Ok(())
    }

    /// Continues at the absolute address held in the next cell.
    pub fn jump(&mut self) -> Result<(), Error> {
        let at = self.return_stack.try_pop()?;
        let target = self.dict.fetch(at)?;
        self.return_stack.push(target as Addr)?;
        Ok(())
    }

    pub fn jump_if_zero(&mut self) -> Result<(), Error> {
        let at = self.return_stack.try_pop()?;
        let flag = self.data_stack.try_pop()?;
        let next = if flag == 0 {
            self.dict.fetch(at)? as Addr
        } else {
            at.wrapping_add(CELL)
        };
        self.return_stack.push(next)?;
        Ok(())
    }

    pub fn emit(&mut self) -> Result<(), Error> {
        let c = self.data_stack.try_pop()?;
        self.io.write_char(c as u8)?;
        Ok(())
    }

    pub fn key(&mut self) -> Result<(), Error> {
        let c = match self.io.read_char() {
            Ok(c) => Cell::from(c),
            Err(IoError::EndOfInput) => -1,
            Err(e) => return Err(e.into()),
        };
        self.data_stack.push(c)?;
        Ok(())
    }

    /// ( a u1 -- u2 ) Reads a line of at most `u1` characters into `a`.
    ///
    /// Pushes -1 instead of a length when the input ends before anything was
    /// read.
    pub fn accept(&mut self) -> Result<(), Error> {
        let max = len(self.data_stack.try_pop()?);
        let addr = self.data_stack.try_pop()? as Addr;
        let mut count = 0usize;
        loop {
            let c = match self.io.read_char() {
                Ok(c) => c,
                Err(IoError::EndOfInput) if count == 0 => {
                    self.data_stack.push(-1)?;
                    return Ok(());
                }
                Err(IoError::EndOfInput) => break,
                Err(e) => return Err(e.into()),
            };
            match c {
                KEY_ENTER => break,
                KEY_IGNORE => {}
                BACKSPACE | DELETE => {
                    if count > 0 {
                        count -= 1;
                        for &e in b"\x08 \x08" {
                            self.io.echo(e)?;
                        }
                    }
                }
                _ if count >= max => {}
                c => {
                    self.dict.store_byte(addr.wrapping_add(count), c)?;
                    self.io.echo(c)?;
                    count += 1;
                }
            }
        }
        self.data_stack.push(count as Cell)?;
        Ok(())
    }

    /// ( c -- a ) Parses the next `c`-delimited token into a counted string
    /// at `here`.
    pub fn word(&mut self) -> Result<(), Error> {
        let delim = self.data_stack.try_pop()?;
        let here = self.dict.here();

        let is_delim = |c: &u8| Cell::from(*c) == delim;
        let tib = self.dict.tib();
        let from = self.dict.in_offset().min(tib.len());
        let start = tib[from..]
            .iter()
            .position(|c| !is_delim(c))
            .map_or(tib.len(), |p| from + p);
        let stop = tib[start..]
            .iter()
            .position(is_delim)
            .map_or(tib.len(), |p| start + p);
        // one trailing delimiter is consumed with the token
        let next = (stop + 1).min(tib.len());

        let count = (stop - start).min(MAX_COUNT);
        if !self.dict.fits(count + 1) {
            return Err(BumpError::OutOfMemory.into());
        }
        self.dict
            .copy_within(TIB + start, here + 1, count)?;
        self.dict.store_byte(here, count as u8)?;
        self.dict.set_in_offset(next);
        self.data_stack.push(here as Cell)?;
        Ok(())
    }

    pub fn type_(&mut self) -> Result<(), Error> {
        let u = len(self.data_stack.try_pop()?);
        let a = self.data_stack.try_pop()? as Addr;
        let bytes = self.dict.bytes(a, u)?;
        self.io.write_bytes(bytes)?;
        Ok(())
    }

    /// Parses a name and starts a new, not yet searchable, record for it.
    pub fn create(&mut self) -> Result<(), Error> {
        self.data_stack.push(Cell::from(b' '))?;
        self.word()?;
        self.drop()?;
        if let Err(e) = self.dict.create_record() {
            self.io.write_bytes(b"CREATE FAILED")?;
            return Err(e.into());
        }
        Ok(())
    }

    pub fn immediate(&mut self) -> Result<(), Error> {
        let xt = self.dict.pending().ok_or(Error::NullWord)?;
        self.dict.set_immediate(xt)?;
        Ok(())
    }

    pub fn compare(&mut self) -> Result<(), Error> {
        let u2 = len(self.data_stack.try_pop()?);
        let a2 = self.data_stack.try_pop()? as Addr;
        let u1 = len(self.data_stack.try_pop()?);
        let a1 = self.data_stack.try_pop()? as Addr;
        let ord = compare(self.dict.bytes(a1, u1)?, self.dict.bytes(a2, u2)?);
        self.data_stack.push(ord)?;
        Ok(())
    }

    /// ( c -- c 0 | xt 1 | xt -1 )
    pub fn find_word(&mut self) -> Result<(), Error> {
        let caddr = self.data_stack.try_pop()?;
        let name = self.dict.counted(caddr as Addr)?;
        match self.dict.find(name)? {
            Some(xt) => {
                let flag = if self.dict.flags(xt)?.is_immediate() { 1 } else { -1 };
                self.data_stack.push(xt.to_cell())?;
                self.data_stack.push(flag)?;
            }
            None => {
                self.data_stack.push(caddr)?;
                self.data_stack.push(0)?;
            }
        }
        Ok(())
    }

    /// ( d1 n1 +n2 -- d2 ) Scales a double by `n1`. Only a divisor of 1 is
    /// supported.
    pub fn mul_scale(&mut self) -> Result<(), Error> {
        if self.data_stack.depth() < 4 {
            return Err(StackError::Underflow(StackKind::Data).into());
        }
        if self.data_stack.try_peek()? != 1 {
            self.io.write_bytes(b"M*/ +n2 != 1")?;
            return Err(Error::NotImplemented("M*/"));
        }
        self.data_stack.try_pop()?;
        let mult = TwoCell::from_single(self.data_stack.try_pop()?);
        let high = self.data_stack.try_pop()?;
        let low = self.data_stack.try_pop()?;
        let prod = ByteCell::from(TwoCell::new(low, high)).mul(mult.into());
        let prod = TwoCell::from(prod);
        self.data_stack.push(prod.low)?;
        self.data_stack.push(prod.high)?;
        Ok(())
    }

    pub fn double_add(&mut self) -> Result<(), Error> {
        let h2 = self.data_stack.try_pop()?;
        let l2 = self.data_stack.try_pop()?;
        let h1 = self.data_stack.try_pop()?;
        let l1 = self.data_stack.try_pop()?;
        let sum = ByteCell::from(TwoCell::new(l1, h1)).add(TwoCell::new(l2, h2).into());
        let sum = TwoCell::from(sum);
        self.data_stack.push(sum.low)?;
        self.data_stack.push(sum.high)?;
        Ok(())
    }

    pub fn equal(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(if a == b { -1 } else { 0 })?;
        Ok(())
    }

    pub fn less(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(if a < b { -1 } else { 0 })?;
        Ok(())
    }

    pub fn nand(&mut self) -> Result<(), Error> {
        let b = self.data_stack.try_pop()?;
        let a = self.data_stack.try_pop()?;
        self.data_stack.push(!(a & b))?;
        Ok(())
    }

    /// Pushes the counted string inlined after the current cell and skips it.
    pub fn string_literal(&mut self) -> Result<(), Error> {
        let at = self.return_stack.try_pop()?;
        let count = self.dict.fetch_byte(at)?;
        let chars = at.wrapping_add(1);
        self.return_stack.push(chars.wrapping_add(usize::from(count)))?;
        self.data_stack.push(chars as Cell)?;
        self.data_stack.push(Cell::from(count))?;
        Ok(())
    }

    pub fn squote(&mut self) -> Result<(), Error> {
        if !self.dict.compiling() {
            self.io.write_bytes(b"S\" : not comp")?;
            return Err(Error::CompileOnly("S\""));
        }
        self.io.write_bytes(b"S\" : not imp")?;
        Err(Error::NotImplemented("S\""))
    }

    /// Prints the rest of the input line up to the closing quote.
    pub fn dotquote(&mut self) -> Result<(), Error> {
        if self.dict.compiling() {
            self.io.write_bytes(b".\" : not imp")?;
            return Err(Error::NotImplemented(".\""));
        }
        let tib = self.dict.tib();
        let from = self.dict.in_offset().min(tib.len());
        let rest = &tib[from..];
        let (text, used) = match rest.iter().position(|&c| c == b'"') {
            Some(p) => (&rest[..p], p + 1),
            None => (rest, rest.len()),
        };
        self.io.write_bytes(text)?;
        self.dict.set_in_offset(from + used);
        Ok(())
    }

    pub fn bye(&mut self) -> Result<(), Error> {
        Err(Error::Done)
    }

    pub fn print_stack(&mut self) -> Result<(), Error> {
        for n in self.data_stack.iter_bottom_up() {
            write!(Console(&mut self.io), "{n} ")?;
        }
        Ok(())
    }

    /// Empties the return stack, except for the caller's continuation.
    pub fn clear_return_stack(&mut self) -> Result<(), Error> {
        let cont = self.return_stack.try_pop()?;
        self.return_stack.clear();
        self.return_stack.push(cont)?;
        Ok(())
    }

    pub fn clear_data_stack(&mut self) -> Result<(), Error> {
        self.data_stack.clear();
        Ok(())
    }
}
