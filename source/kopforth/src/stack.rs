use alloc::{boxed::Box, vec};
use core::fmt;

/// A fixed-capacity stack that grows toward index zero.
///
/// The stack is empty when `cur` sits at the high end of the buffer and full
/// when it reaches the low end.
pub struct Stack<T: Copy> {
    kind: StackKind,
    items: Box<[T]>,
    cur: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Data,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Overflow(StackKind),
    Underflow(StackKind),
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, what) = match self {
            StackError::Overflow(kind) => (kind, "OVERFLOW"),
            StackError::Underflow(kind) => (kind, "UNDERFLOW"),
        };
        let kind = match kind {
            StackKind::Data => "DATA",
            StackKind::Return => "RETN",
        };
        write!(f, "{kind} {what}")
    }
}

impl<T: Copy + Default> Stack<T> {
    pub fn new(kind: StackKind, items: usize) -> Self {
        Self {
            kind,
            items: vec![T::default(); items].into_boxed_slice(),
            cur: items,
        }
    }
}

impl<T: Copy> Stack<T> {
    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), StackError> {
        if self.cur == 0 {
            return Err(StackError::Overflow(self.kind));
        }
        self.cur -= 1;
        self.items[self.cur] = item;
        Ok(())
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.items.len() - self.cur
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn kind(&self) -> StackKind {
        self.kind
    }

    #[inline]
    pub fn try_pop(&mut self) -> Result<T, StackError> {
        match self.pop() {
            Some(v) => Ok(v),
            None => Err(StackError::Underflow(self.kind)),
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let val = self.peek()?;
        self.cur += 1;
        Some(val)
    }

    #[inline]
    pub fn try_peek(&self) -> Result<T, StackError> {
        self.peek().ok_or(StackError::Underflow(self.kind))
    }

    #[inline]
    pub fn peek(&self) -> Option<T> {
        self.items.get(self.cur).copied()
    }

    #[inline]
    pub fn peek_back_n(&self, n: usize) -> Option<T> {
        self.items.get(self.cur.checked_add(n)?).copied()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.cur = self.items.len();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cur == self.items.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.cur == 0
    }

    /// Iterates from the oldest item to the top of the stack.
    pub fn iter_bottom_up(&self) -> impl Iterator<Item = T> + '_ {
        self.items[self.cur..].iter().rev().copied()
    }
}

#[cfg(test)]
pub mod test {
    use super::{Stack, StackError, StackKind};
    use crate::Cell;

    #[test]
    fn stack() {
        const ITEMS: usize = 16;
        let mut stack = Stack::<Cell>::new(StackKind::Data, ITEMS);

        for _ in 0..3 {
            for i in 0..(ITEMS as Cell) {
                assert!(stack.push(i).is_ok());
            }
            assert!(stack.is_full());
            assert_eq!(
                stack.push(100),
                Err(StackError::Overflow(StackKind::Data))
            );
            assert_eq!(stack.depth(), ITEMS);
            assert_eq!(stack.try_peek(), Ok(ITEMS as Cell - 1));
            for i in (0..(ITEMS as Cell)).rev() {
                assert_eq!(stack.pop().unwrap(), i);
            }
            assert!(stack.pop().is_none());
            assert_eq!(
                stack.try_pop(),
                Err(StackError::Underflow(StackKind::Data))
            );
            assert!(stack.is_empty());
        }
    }

    #[test]
    fn peek_and_iter() {
        let mut stack = Stack::<usize>::new(StackKind::Return, 4);
        stack.push(10).unwrap();
        stack.push(20).unwrap();
        stack.push(30).unwrap();
        assert_eq!(stack.peek_back_n(0), Some(30));
        assert_eq!(stack.peek_back_n(2), Some(10));
        assert_eq!(stack.peek_back_n(3), None);
        assert_eq!(
            stack.iter_bottom_up().collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(
            stack.try_peek(),
            Err(StackError::Underflow(StackKind::Return))
        );
    }

    #[test]
    fn zero_capacity() {
        let mut stack = Stack::<Cell>::new(StackKind::Data, 0);
        assert!(stack.is_empty());
        assert!(stack.is_full());
        assert_eq!(stack.push(1), Err(StackError::Overflow(StackKind::Data)));
        assert_eq!(stack.depth(), 0);
    }
}
