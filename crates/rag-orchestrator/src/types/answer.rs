//! Answer and critique types

use serde::{Deserialize, Serialize};

/// A generated answer. Refinement produces a new value instead of editing this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text
    pub text: String,
    /// 0 for the first answer, incremented by each successful refinement
    pub revision: u32,
    /// Provider that produced the text, `None` for canned answers
    pub served_by: Option<String>,
}

impl Answer {
    /// First answer produced by a provider
    pub fn generated(text: impl Into<String>, served_by: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            revision: 0,
            served_by: Some(served_by.into()),
        }
    }

    /// Canned answer used when no provider responded
    pub fn degraded(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            revision: 0,
            served_by: None,
        }
    }

    /// New answer replacing this one after a refinement
    pub fn refined(&self, text: impl Into<String>, served_by: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            revision: self.revision + 1,
            served_by: Some(served_by.into()),
        }
    }

    /// Whether this answer came from the degraded path
    pub fn is_degraded(&self) -> bool {
        self.served_by.is_none()
    }
}

/// Quality assessment of one answer revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    /// Why the score was given; fed to the refine prompt
    pub rationale: String,
    /// Quality score in [0, 10]
    pub score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refined_keeps_original() {
        let first = Answer::generated("draft", "gateway");
        let second = first.refined("better", "gemini");

        assert_eq!(first.text, "draft");
        assert_eq!(first.revision, 0);
        assert_eq!(second.revision, 1);
        assert_eq!(second.served_by.as_deref(), Some("gemini"));
        assert!(Answer::degraded("sorry").is_degraded());
    }
}
