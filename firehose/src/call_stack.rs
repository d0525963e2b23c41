/// Error returned when closing a call while no call is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CallStackError {
    #[error("call stack underflow, no call is currently open")]
    Underflow,
}

/// Stack of the indexes of currently open calls.
///
/// Indexes are allocated per transaction starting at 1, index 0 denotes "no active call"
/// (transaction or block level changes). Calls are strictly nested, the last opened call
/// is always the first one closed.
#[derive(Debug, Default)]
pub struct CallStack {
    indexes: Vec<u64>,
    next_index: u64,
}

impl CallStack {
    pub fn new() -> Self {
        Self {
            indexes: Vec::with_capacity(64),
            next_index: 0,
        }
    }

    /// Allocates the next call index and makes it the active one
    pub fn open(&mut self) -> u64 {
        self.next_index += 1;
        self.indexes.push(self.next_index);
        self.next_index
    }

    /// Closes the active call returning its index
    pub fn close(&mut self) -> Result<u64, CallStackError> {
        self.indexes.pop().ok_or(CallStackError::Underflow)
    }

    /// Index of the innermost open call, 0 when none is open
    pub fn active_index(&self) -> u64 {
        self.indexes.last().copied().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Forgets open calls and restarts index allocation, keeps the allocation
    pub fn reset(&mut self) {
        self.indexes.clear();
        self.next_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close_nesting() {
        let mut stack = CallStack::new();
        assert_eq!(stack.active_index(), 0);

        assert_eq!(stack.open(), 1);
        assert_eq!(stack.open(), 2);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.active_index(), 2);

        assert_eq!(stack.close(), Ok(2));
        assert_eq!(stack.active_index(), 1);

        // Sibling gets a fresh index, indexes are never reused within a transaction
        assert_eq!(stack.open(), 3);
        assert_eq!(stack.close(), Ok(3));
        assert_eq!(stack.close(), Ok(1));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_underflow() {
        let mut stack = CallStack::new();
        assert_eq!(stack.close(), Err(CallStackError::Underflow));

        stack.open();
        stack.close().unwrap();
        assert_eq!(stack.close(), Err(CallStackError::Underflow));
    }

    #[test]
    fn test_reset() {
        let mut stack = CallStack::new();
        stack.open();
        stack.open();
        stack.reset();

        assert!(stack.is_empty());
        assert_eq!(stack.open(), 1);
    }
}
