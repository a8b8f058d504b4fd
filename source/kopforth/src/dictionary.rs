use alloc::{boxed::Box, vec};
use core::cmp::Ordering;

use crate::{
    word::{field, Body, Flags, Xt, HEADER_SIZE, NAME_CAPACITY},
    Addr, Cell, Error, CELL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpError {
    OutOfMemory,
}

/// Addresses of the system variable cells at the bottom of memory.
///
/// These are ordinary cells, so forth code reaches them through `DP`, `LP`,
/// `PP`, `STATE`, `#TIB` and `>IN` with plain `@` and `!`.
pub mod var {
    use crate::{Addr, CELL};

    pub const DP: Addr = 0;
    pub const LP: Addr = CELL;
    pub const PP: Addr = 2 * CELL;
    pub const STATE: Addr = 3 * CELL;
    pub const TIB_LEN: Addr = 4 * CELL;
    pub const IN: Addr = 5 * CELL;

    pub(crate) const END: Addr = 6 * CELL;
}

/// Address of the terminal input buffer.
pub const TIB: Addr = var::END;

/// Largest count a counted string can carry.
pub const MAX_COUNT: usize = u8::MAX as usize;

/// The engine's memory: system variables, the terminal input buffer, and the
/// dictionary arena, in that order.
pub struct Dictionary {
    mem: Box<[u8]>,
    tib_size: usize,
}

impl Dictionary {
    pub fn new(tib_size: usize, dict_cells: usize) -> Self {
        let arena = dict_cells.saturating_mul(CELL);
        let mut dict = Self {
            mem: vec![0u8; TIB + tib_size + arena].into_boxed_slice(),
            tib_size,
        };
        dict.set_here(dict.arena_start());
        dict
    }

    #[inline]
    pub fn arena_start(&self) -> Addr {
        TIB + self.tib_size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.mem.len() - self.arena_start()
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.here().saturating_sub(self.arena_start())
    }

    #[inline]
    pub fn tib_size(&self) -> usize {
        self.tib_size
    }

    // -- system variables --

    fn var(&self, at: Addr) -> Cell {
        let mut bytes = [0u8; CELL];
        bytes.copy_from_slice(&self.mem[at..at + CELL]);
        Cell::from_le_bytes(bytes)
    }

    fn set_var(&mut self, at: Addr, val: Cell) {
        self.mem[at..at + CELL].copy_from_slice(&val.to_le_bytes());
    }

    pub fn here(&self) -> Addr {
        self.var(var::DP) as Addr
    }

    pub fn set_here(&mut self, here: Addr) {
        self.set_var(var::DP, here as Cell);
    }

    pub fn latest(&self) -> Option<Xt> {
        Xt::from_cell(self.var(var::LP))
    }

    pub fn pending(&self) -> Option<Xt> {
        Xt::from_cell(self.var(var::PP))
    }

    pub fn compiling(&self) -> bool {
        self.var(var::STATE) != 0
    }

    pub fn set_compiling(&mut self, compiling: bool) {
        self.set_var(var::STATE, if compiling { -1 } else { 0 });
    }

    pub fn tib_len(&self) -> usize {
        clamp_index(self.var(var::TIB_LEN), self.tib_size)
    }

    pub fn in_offset(&self) -> usize {
        clamp_index(self.var(var::IN), self.tib_size)
    }

    pub fn set_in_offset(&mut self, offset: usize) {
        self.set_var(var::IN, offset as Cell);
    }

    /// Replaces the input line, truncating it to the buffer size.
    pub fn fill_tib(&mut self, line: &[u8]) -> usize {
        let len = line.len().min(self.tib_size);
        self.mem[TIB..TIB + len].copy_from_slice(&line[..len]);
        self.set_var(var::TIB_LEN, len as Cell);
        self.set_in_offset(0);
        len
    }

    /// The current input line.
    pub fn tib(&self) -> &[u8] {
        &self.mem[TIB..TIB + self.tib_len()]
    }

    // -- raw memory --

    pub fn bytes(&self, addr: Addr, len: usize) -> Result<&[u8], Error> {
        let end = addr.checked_add(len).ok_or(Error::BadAddress(addr))?;
        self.mem.get(addr..end).ok_or(Error::BadAddress(addr))
    }

    pub fn bytes_mut(&mut self, addr: Addr, len: usize) -> Result<&mut [u8], Error> {
        let end = addr.checked_add(len).ok_or(Error::BadAddress(addr))?;
        self.mem.get_mut(addr..end).ok_or(Error::BadAddress(addr))
    }

    pub fn fetch(&self, addr: Addr) -> Result<Cell, Error> {
        let mut bytes = [0u8; CELL];
        bytes.copy_from_slice(self.bytes(addr, CELL)?);
        Ok(Cell::from_le_bytes(bytes))
    }

    /// Stores a cell. Writing `DP` can only move it within the arena.
    pub fn store(&mut self, addr: Addr, val: Cell) -> Result<(), Error> {
        if addr == var::DP {
            return self.store_here(val);
        }
        let fault = self.write_fault(addr);
        self.bytes_mut(addr, CELL)
            .map_err(|_| fault)?
            .copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    fn store_here(&mut self, val: Cell) -> Result<(), Error> {
        let here = Addr::try_from(val).map_err(|_| Error::BadAddress(val as Addr))?;
        if here > self.mem.len() {
            return Err(BumpError::OutOfMemory.into());
        }
        if here < self.arena_start() {
            return Err(Error::BadAddress(here));
        }
        self.set_here(here);
        Ok(())
    }

    /// A write that misses memory somewhere between `here` and the end of
    /// the arena ran out of dictionary space.
    fn write_fault(&self, addr: Addr) -> Error {
        if addr >= self.here() && addr <= self.mem.len() {
            Error::Bump(BumpError::OutOfMemory)
        } else {
            Error::BadAddress(addr)
        }
    }

    pub fn fetch_byte(&self, addr: Addr) -> Result<u8, Error> {
        self.mem.get(addr).copied().ok_or(Error::BadAddress(addr))
    }

    pub fn store_byte(&mut self, addr: Addr, val: u8) -> Result<(), Error> {
        let fault = self.write_fault(addr);
        let b = self.mem.get_mut(addr).ok_or(fault)?;
        *b = val;
        Ok(())
    }

    pub fn copy_within(&mut self, src: Addr, dst: Addr, len: usize) -> Result<(), Error> {
        self.bytes(src, len)?;
        self.bytes(dst, len)?;
        self.mem.copy_within(src..src + len, dst);
        Ok(())
    }

    /// The bytes of the counted string at `addr`.
    pub fn counted(&self, addr: Addr) -> Result<&[u8], Error> {
        let len = self.fetch_byte(addr)?;
        self.bytes(addr.wrapping_add(1), usize::from(len))
    }

    // -- word records --

    pub fn name(&self, xt: Xt) -> Result<&[u8], Error> {
        let len = self.fetch_byte(xt.addr().wrapping_add(field::NAME_LEN))?;
        let len = usize::from(len).min(NAME_CAPACITY);
        self.bytes(xt.addr().wrapping_add(field::NAME), len)
    }

    pub fn link(&self, xt: Xt) -> Result<Option<Xt>, Error> {
        Ok(Xt::from_cell(self.fetch(xt.addr().wrapping_add(field::LINK))?))
    }

    pub fn flags(&self, xt: Xt) -> Result<Flags, Error> {
        Ok(Flags::from_bits(
            self.fetch_byte(xt.addr().wrapping_add(field::FLAGS))?,
        ))
    }

    fn set_flags(&mut self, xt: Xt, flags: Flags) -> Result<(), Error> {
        self.store_byte(xt.addr().wrapping_add(field::FLAGS), flags.bits())
    }

    pub fn set_immediate(&mut self, xt: Xt) -> Result<(), Error> {
        let flags = self.flags(xt)?;
        self.set_flags(xt, flags.with_immediate())
    }

    pub fn body(&self, xt: Xt) -> Result<Body, Error> {
        if self.flags(xt)?.is_native() {
            let id = self.fetch(xt.body())?;
            let id = usize::try_from(id).map_err(|_| Error::BadNative(id))?;
            Ok(Body::Native(id))
        } else {
            Ok(Body::Compiled(xt.body()))
        }
    }

    // -- construction --

    pub(crate) fn fits(&self, len: usize) -> bool {
        match self.here().checked_add(len) {
            Some(end) => end <= self.mem.len(),
            None => false,
        }
    }

    /// Starts a new record at `here`.
    ///
    /// The record takes whatever counted string already sits at `here` as its
    /// name. The previous pending record joins the search chain, and the new
    /// one becomes pending.
    pub fn create_record(&mut self) -> Result<Xt, BumpError> {
        if !self.fits(HEADER_SIZE) {
            return Err(BumpError::OutOfMemory);
        }
        let xt = Xt(self.here());
        let len = &mut self.mem[xt.addr() + field::NAME_LEN];
        *len = (*len).min(NAME_CAPACITY as u8);

        self.set_here(xt.addr() + HEADER_SIZE);
        let latest = self.var(var::PP);
        self.set_var(var::LP, latest);
        self.mem[xt.addr() + field::LINK..xt.addr() + field::FLAGS]
            .copy_from_slice(&latest.to_le_bytes());
        self.set_var(var::PP, xt.to_cell());
        self.mem[xt.addr() + field::FLAGS] = Flags::default().bits();
        Ok(xt)
    }

    /// Lays down `name` at `here` and starts a record for it.
    pub fn add_word(&mut self, name: &[u8]) -> Result<Xt, BumpError> {
        if !self.fits(HEADER_SIZE) {
            return Err(BumpError::OutOfMemory);
        }
        let at = self.here();
        let name = &name[..name.len().min(NAME_CAPACITY)];
        self.mem[at + field::NAME_LEN] = name.len() as u8;
        self.mem[at + field::NAME..at + field::NAME + name.len()].copy_from_slice(name);
        self.create_record()
    }

    /// Adds a native word whose body is the index `id` of its function.
    pub fn add_native(&mut self, name: &[u8], id: usize, immediate: bool) -> Result<Xt, BumpError> {
        let xt = self.add_word(name)?;
        self.append_cell(id as Cell)?;
        let mut flags = Flags::default().with_native();
        if immediate {
            flags = flags.with_immediate();
        }
        self.mem[xt.addr() + field::FLAGS] = flags.bits();
        Ok(xt)
    }

    /// Appends a cell to the record under construction, returning its address.
    pub fn append_cell(&mut self, val: Cell) -> Result<Addr, BumpError> {
        if !self.fits(CELL) {
            return Err(BumpError::OutOfMemory);
        }
        let at = self.here();
        self.set_var(at, val);
        self.set_here(at + CELL);
        Ok(at)
    }

    pub fn append_byte(&mut self, val: u8) -> Result<Addr, BumpError> {
        if !self.fits(1) {
            return Err(BumpError::OutOfMemory);
        }
        let at = self.here();
        self.mem[at] = val;
        self.set_here(at + 1);
        Ok(at)
    }

    /// Appends a counted string, truncated to [`MAX_COUNT`] bytes.
    pub fn append_counted(&mut self, bytes: &[u8]) -> Result<Addr, BumpError> {
        let bytes = &bytes[..bytes.len().min(MAX_COUNT)];
        if !self.fits(1 + bytes.len()) {
            return Err(BumpError::OutOfMemory);
        }
        let at = self.append_byte(bytes.len() as u8)?;
        let here = self.here();
        self.mem[here..here + bytes.len()].copy_from_slice(bytes);
        self.set_here(here + bytes.len());
        Ok(at)
    }

    /// Splices the pending record onto the search chain.
    pub fn reveal(&mut self) {
        let pending = self.var(var::PP);
        self.set_var(var::LP, pending);
    }

    /// Forgets the pending record, so the next record links past it.
    pub fn abandon(&mut self) {
        let latest = self.var(var::LP);
        self.set_var(var::PP, latest);
    }

    /// Walks the search chain from `latest`.
    pub fn words(&self) -> Words<'_> {
        Words {
            dict: self,
            next: self.latest(),
            budget: self.mem.len() / HEADER_SIZE,
        }
    }

    /// Finds the newest searchable word called `name`.
    pub fn find(&self, name: &[u8]) -> Result<Option<Xt>, Error> {
        if name.is_empty() {
            return Ok(None);
        }
        for xt in self.words() {
            let xt = xt?;
            if compare(name, self.name(xt)?) == 0 {
                return Ok(Some(xt));
            }
        }
        Ok(None)
    }
}

/// Iterator over the search chain, newest first.
pub struct Words<'a> {
    dict: &'a Dictionary,
    next: Option<Xt>,
    // a corrupted chain may loop, but can never hold more records than fit
    budget: usize,
}

impl Iterator for Words<'_> {
    type Item = Result<Xt, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let xt = self.next.take()?;
        if self.budget == 0 {
            return None;
        }
        self.budget -= 1;
        match self.dict.link(xt) {
            Ok(link) => self.next = link,
            Err(e) => return Some(Err(e)),
        }
        Some(Ok(xt))
    }
}

/// Byte-wise ordering over the shorter length; on a tie the shorter string
/// sorts first.
pub fn compare(a: &[u8], b: &[u8]) -> Cell {
    match a.cmp(b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

fn clamp_index(val: Cell, max: usize) -> usize {
    usize::try_from(val).unwrap_or(0).min(max)
}

#[cfg(test)]
pub mod test {
    use super::{compare, var, BumpError, Dictionary, TIB};
    use crate::{
        word::{Body, HEADER_SIZE, NAME_CAPACITY},
        Error, CELL,
    };

    #[test]
    fn fresh() {
        let dict = Dictionary::new(80, 64);
        assert_eq!(dict.arena_start(), TIB + 80);
        assert_eq!(dict.here(), dict.arena_start());
        assert_eq!(dict.used(), 0);
        assert_eq!(dict.capacity(), 64 * CELL);
        assert_eq!(dict.latest(), None);
        assert_eq!(dict.pending(), None);
        assert!(!dict.compiling());
        assert_eq!(dict.fetch(var::DP).unwrap(), dict.here() as isize);
    }

    #[test]
    fn visibility() {
        let mut dict = Dictionary::new(80, 256);
        let a = dict.add_word(b"A").unwrap();
        // pending, not yet searchable
        assert_eq!(dict.pending(), Some(a));
        assert_eq!(dict.find(b"A").unwrap(), None);

        // creating the next record reveals the previous one
        let a2 = dict.add_word(b"A").unwrap();
        assert_eq!(dict.find(b"A").unwrap(), Some(a));
        assert_eq!(dict.link(a2).unwrap(), Some(a));

        dict.reveal();
        assert_eq!(dict.find(b"A").unwrap(), Some(a2));
        assert_eq!(dict.find(b"B").unwrap(), None);
        assert_eq!(dict.find(b"").unwrap(), None);
        assert_eq!(dict.words().count(), 2);

        // an abandoned record never joins the chain
        dict.add_word(b"C").unwrap();
        dict.abandon();
        let d = dict.add_word(b"D").unwrap();
        assert_eq!(dict.link(d).unwrap(), Some(a2));
        dict.reveal();
        assert_eq!(dict.find(b"C").unwrap(), None);
        assert_eq!(dict.find(b"D").unwrap(), Some(d));
    }

    #[test]
    fn bodies() {
        let mut dict = Dictionary::new(8, 256);
        let n = dict.add_native(b"N", 7, true).unwrap();
        let c = dict.add_word(b"C").unwrap();
        let cell = dict.append_cell(-5).unwrap();
        assert_eq!(dict.body(n).unwrap(), Body::Native(7));
        assert!(dict.flags(n).unwrap().is_immediate());
        assert_eq!(dict.body(c).unwrap(), Body::Compiled(cell));
        assert_eq!(cell, c.addr() + HEADER_SIZE);
        assert_eq!(dict.fetch(cell).unwrap(), -5);
        assert!(!dict.flags(c).unwrap().is_immediate());
        dict.set_immediate(c).unwrap();
        assert!(dict.flags(c).unwrap().is_immediate());

        let s = dict.append_counted(b"hey").unwrap();
        assert_eq!(dict.counted(s).unwrap(), b"hey");
        assert_eq!(dict.here(), s + 4);
    }

    #[test]
    fn long_names_truncate() {
        let mut dict = Dictionary::new(8, 256);
        let xt = dict.add_word(b"A-REALLY-QUITE-LONG-NAME").unwrap();
        assert_eq!(dict.name(xt).unwrap().len(), NAME_CAPACITY);
        assert_eq!(dict.name(xt).unwrap(), b"A-REALLY-QUITE-L");
    }

    #[test]
    fn exhaustion() {
        let mut dict = Dictionary::new(8, 4);
        assert_eq!(dict.add_word(b"BIG"), Err(BumpError::OutOfMemory));
        assert_eq!(dict.used(), 0);
        for _ in 0..4 {
            dict.append_cell(1).unwrap();
        }
        assert_eq!(dict.append_cell(1), Err(BumpError::OutOfMemory));
        assert_eq!(dict.append_byte(1), Err(BumpError::OutOfMemory));
        assert_eq!(dict.fetch(dict.here()), Err(Error::BadAddress(dict.here())));
        assert_eq!(dict.store_byte(usize::MAX, 0), Err(Error::BadAddress(usize::MAX)));
        assert_eq!(dict.fetch(usize::MAX - 1), Err(Error::BadAddress(usize::MAX - 1)));

        // writes that run off the end of the arena are exhaustion
        let full = Err(Error::Bump(BumpError::OutOfMemory));
        assert_eq!(dict.store(dict.here(), 1), full);
        assert_eq!(dict.store_byte(dict.here(), 1), full);
        assert_eq!(dict.store(var::DP, (dict.here() + 1) as isize), full);
        assert_eq!(dict.store(var::DP, -1), Err(Error::BadAddress(usize::MAX)));
        assert_eq!(dict.store(var::DP, 0), Err(Error::BadAddress(0)));
        let end = dict.here();
        dict.store(var::DP, (end - CELL) as isize).unwrap();
        assert_eq!(dict.here(), end - CELL);
        dict.store(dict.here(), 7).unwrap();
    }

    #[test]
    fn tib() {
        let mut dict = Dictionary::new(4, 16);
        assert_eq!(dict.fill_tib(b"abcdef"), 4);
        assert_eq!(dict.tib(), b"abcd");
        assert_eq!(dict.in_offset(), 0);
        dict.store(var::TIB_LEN, -3).unwrap();
        assert_eq!(dict.tib_len(), 0);
        dict.store(var::IN, 99).unwrap();
        assert_eq!(dict.in_offset(), 4);
    }

    #[test]
    fn ordering() {
        assert_eq!(compare(b"abc", b"abc"), 0);
        assert_eq!(compare(b"abc", b"abd"), -1);
        assert_eq!(compare(b"b", b"abc"), 1);
        assert_eq!(compare(b"ab", b"abc"), -1);
        assert_eq!(compare(b"abc", b"ab"), 1);
        assert_eq!(compare(b"", b""), 0);
    }
}
