//! Lock-free process mode switch.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;
use tr_common::Mode;

/// Current [`Mode`], readable without locking on every call.
///
/// Toggle it outside active traffic; in-flight calls observe whichever value
/// they read first.
#[derive(Debug, Default)]
pub struct ModeSwitch {
    mode: AtomicU8,
}

impl ModeSwitch {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: AtomicU8::new(mode.as_u8()),
        }
    }

    pub fn get(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Set the mode, returning the previous one.
    pub fn set(&self, mode: Mode) -> Mode {
        let previous = Mode::from_u8(self.mode.swap(mode.as_u8(), Ordering::AcqRel));
        if previous != mode {
            info!(from = %previous, to = %mode, "traffic mode changed");
        }
        previous
    }

    pub fn is_record(&self) -> bool {
        self.get() == Mode::Record
    }

    pub fn is_replay(&self) -> bool {
        self.get() == Mode::Replay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_off_and_swap() {
        let switch = ModeSwitch::default();
        assert_eq!(switch.get(), Mode::Off);
        assert_eq!(switch.set(Mode::Replay), Mode::Off);
        assert!(switch.is_replay());
        assert!(!switch.is_record());
        assert_eq!(switch.set(Mode::Record), Mode::Replay);
        assert!(switch.is_record());
        assert!(!switch.is_replay());
    }
}
