use serde::{Deserialize, Serialize};
use std::fmt;

/// Order id, unique and monotonically increasing within one broker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Monotonic order id generator owned by the broker.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> OrderId {
        let id = OrderId(self.next);
        self.next += 1;
        id
    }

    /// Id the next call to `next_id` will hand out.
    pub fn peek(&self) -> OrderId {
        OrderId(self.next)
    }
}

/// Content hash of the replayed bar data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetHash(pub String);

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic run id: the same configuration over the same data yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// First 12 hex chars, enough to tell runs apart in logs.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_from_zero() {
        let mut ids = IdGen::new();
        assert_eq!(ids.peek(), OrderId(0));
        assert_eq!(ids.next_id(), OrderId(0));
        assert_eq!(ids.next_id(), OrderId(1));
        assert_eq!(ids.next_id(), OrderId(2));
        assert_eq!(ids.peek(), OrderId(3));
    }

    #[test]
    fn run_id_short_form() {
        let id = RunId("0123456789abcdef".into());
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(RunId("abc".into()).short(), "abc");
    }
}
