use std::collections::TryReserveError;

/// Which of the two windows is meant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    First,
    Second,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

/// A fixed-capacity working buffer.
///
/// While writing, `bytes[..pos]` is the prefix the block may reference and `bytes[pos..]` the
/// block collected so far. While reading, `bytes` is the decoded block and `pos` the read position.
pub(crate) struct Window {
    pub bytes: Vec<u8>,
    pub pos: usize,
}

impl Window {
    fn allocate(capacity: usize) -> Result<Self, TryReserveError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(capacity)?;
        Ok(Window { bytes, pos: 0 })
    }

    /// Bytes not yet read.
    pub fn unread(&self) -> &[u8] {
        &self.bytes[self.pos..]
    }

    fn reset(&mut self) {
        self.bytes.clear();
        self.pos = 0;
    }
}

/// Two windows, one of them active. The inactive one holds the previous block, which is the
/// history the codec may reference while the active one is being filled or drained.
pub(crate) struct DoubleBuffer {
    windows: [Window; 2],
    active: Slot,
}

impl DoubleBuffer {
    pub fn allocate(capacity: usize) -> Result<Self, TryReserveError> {
        Ok(DoubleBuffer { windows: [Window::allocate(capacity)?, Window::allocate(capacity)?], active: Slot::First })
    }

    #[cfg(test)]
    pub fn active_slot(&self) -> Slot {
        self.active
    }

    pub fn active(&self) -> &Window {
        match self.active {
            Slot::First => &self.windows[0],
            Slot::Second => &self.windows[1],
        }
    }

    pub fn active_mut(&mut self) -> &mut Window {
        match self.active {
            Slot::First => &mut self.windows[0],
            Slot::Second => &mut self.windows[1],
        }
    }

    /// The active window for writing and the inactive one as read-only history.
    pub fn split(&mut self) -> (&mut Window, &Window) {
        let (first, second) = self.windows.split_at_mut(1);
        match self.active {
            Slot::First => (&mut first[0], &second[0]),
            Slot::Second => (&mut second[0], &first[0]),
        }
    }

    /// Make the other window active and empty it. The window that was active stays untouched.
    pub fn swap(&mut self) {
        self.active = self.active.other();
        self.active_mut().reset();
    }
}
