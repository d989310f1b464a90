use parking_lot::Mutex;

/// Single-occupancy operation slot. At most one operation runs at a time;
/// the slot returns to `idle` when the guard drops, including when the
/// owning future is dropped mid-request.
#[derive(Debug)]
pub(crate) struct OpSlot<T: Copy + PartialEq> {
    state: Mutex<T>,
    idle: T,
}

impl<T: Copy + PartialEq> OpSlot<T> {
    pub(crate) fn new(idle: T) -> Self {
        Self {
            state: Mutex::new(idle),
            idle,
        }
    }

    pub(crate) fn current(&self) -> T {
        *self.state.lock()
    }

    /// Claim the slot for `op`, or return the operation already running.
    pub(crate) fn try_begin(&self, op: T) -> Result<OpGuard<'_, T>, T> {
        let mut state = self.state.lock();
        if *state != self.idle {
            return Err(*state);
        }
        *state = op;
        Ok(OpGuard { slot: self })
    }
}

#[derive(Debug)]
pub(crate) struct OpGuard<'a, T: Copy + PartialEq> {
    slot: &'a OpSlot<T>,
}

impl<T: Copy + PartialEq> Drop for OpGuard<'_, T> {
    fn drop(&mut self) {
        *self.slot.state.lock() = self.slot.idle;
    }
}
