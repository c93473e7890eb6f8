use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag naming the kind of work a task performs.
///
/// The core never interprets it; it is only the key into the operation
/// registry. Construction rejects blank tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationType(String);

impl OperationType {
    pub fn new(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        if s.trim().is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty("")]
    #[case::spaces("   ")]
    #[case::tab("\t")]
    fn blank_tags_are_rejected(#[case] raw: &str) {
        assert!(OperationType::new(raw).is_none());
    }

    #[test]
    fn keeps_tag_verbatim() {
        let op = OperationType::new("echo").unwrap();
        assert_eq!(op.as_str(), "echo");
        assert_eq!(op.to_string(), "echo");
    }
}
