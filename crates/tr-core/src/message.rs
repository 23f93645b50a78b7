//! Lazily evaluated payload text.

use std::fmt;
use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

type Thunk = Box<dyn FnOnce() -> String + Send>;

/// Payload holder for one side of an exchange.
///
/// Building a payload's text (encoding a command line, serializing a body)
/// costs something, and in record mode it may never be needed if the capture
/// is skipped. A `Message` holds the compute function and runs it at most
/// once, on first read. Concurrent first reads block on the same cell, so the
/// function is never evaluated twice.
pub struct Message {
    text: OnceLock<String>,
    thunk: Mutex<Option<Thunk>>,
}

impl Message {
    /// Wrap a compute function. It must be pure; it runs on first [`Message::data`].
    pub fn new<F>(compute: F) -> Self
    where
        F: FnOnce() -> String + Send + 'static,
    {
        Self {
            text: OnceLock::new(),
            thunk: Mutex::new(Some(Box::new(compute))),
        }
    }

    /// An already-evaluated message.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: OnceLock::from(text.into()),
            thunk: Mutex::new(None),
        }
    }

    /// The payload text, evaluating the compute function on first call.
    ///
    /// # Panics
    ///
    /// If the compute function panics, that call and every later one panic.
    pub fn data(&self) -> &str {
        self.text.get_or_init(|| {
            let compute = self.thunk.lock().take();
            match compute {
                Some(compute) => compute(),
                None => panic!("message payload unavailable: compute function panicked"),
            }
        })
    }

    pub fn is_evaluated(&self) -> bool {
        self.text.get().is_some()
    }
}

/// Cloning forces evaluation; the clone shares no state with the original.
impl Clone for Message {
    fn clone(&self) -> Self {
        Message::from_text(self.data())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text.get() {
            Some(text) => f.debug_tuple("Message").field(text).finish(),
            None => f.write_str("Message(<pending>)"),
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data()
    }
}

impl Eq for Message {}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::from_text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::from_text(text)
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.data())
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Message::from_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_lazy_and_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let msg = Message::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "SET a 1".to_string()
        });
        assert!(!msg.is_evaluated());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(msg.data(), "SET a 1");
        assert_eq!(msg.data(), "SET a 1");
        assert!(msg.is_evaluated());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_reads_evaluate_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let msg = Message::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            "payload".to_string()
        });
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| assert_eq!(msg.data(), "payload"));
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_serde_as_plain_string() {
        let msg = Message::from_text("line\n\u{0}end");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.data(), "line\n\u{0}end");
    }

    #[test]
    fn test_panicking_compute_stays_visible() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let msg = Message::new(|| panic!("encoder blew up"));
        assert!(catch_unwind(AssertUnwindSafe(|| msg.data().len())).is_err());
        assert!(!msg.is_evaluated());
        assert!(catch_unwind(AssertUnwindSafe(|| msg.data().len())).is_err());
        assert!(!msg.is_evaluated());
    }

    #[test]
    fn test_debug_does_not_force_evaluation() {
        let msg = Message::new(|| "x".to_string());
        assert_eq!(format!("{msg:?}"), "Message(<pending>)");
        assert!(!msg.is_evaluated());
    }
}
