//! Reconfigurable extension slots.
//!
//! ## Learning: Swapping Behavior in Place
//!
//! An engine is expensive to rebuild because it owns undo history and
//! selection state. Behavior that must change at runtime (which grammar
//! to use, how to render line numbers) lives in a slot that can be
//! replaced without touching anything else the engine owns.

/// A named facet of an engine whose contents can be replaced at any time.
#[derive(Debug, Clone)]
pub struct Slot<T> {
    value: T,
    revision: u64,
}

impl<T> Slot<T> {
    pub fn new(value: T) -> Self {
        Self { value, revision: 0 }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replaces the slot contents and bumps the revision.
    pub fn reconfigure(&mut self, value: T) {
        self.value = value;
        self.revision += 1;
    }

    /// How many times the slot has been reconfigured since creation.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconfigure_bumps_revision() {
        let mut slot = Slot::new(2usize);
        assert_eq!(slot.revision(), 0);

        slot.reconfigure(4);
        assert_eq!(*slot.get(), 4);
        assert_eq!(slot.revision(), 1);
    }
}
