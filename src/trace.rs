//! Trace identifiers for correlating log lines across the pipeline.
//!
//! A datagram is read on the reader thread, processed on a worker and its
//! response written from that worker. The trace id is the only value that
//! follows it through every stage, so every log line carries it.

use std::fmt;
use std::sync::Arc;

/// Opaque correlation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(Arc<str>);

impl TraceId {
    /// Create a trace id from a caller-supplied value.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Derive the id for one request: `<base>-<seq>`.
    pub fn child(&self, seq: u64) -> Self {
        Self(Arc::from(format!("{}-{seq}", self.0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TraceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_ids() {
        let base = TraceId::new("udp");
        assert_eq!(base.child(0).as_str(), "udp-0");
        assert_eq!(base.child(42).to_string(), "udp-42");
        assert_eq!(base.as_str(), "udp");
    }
}
