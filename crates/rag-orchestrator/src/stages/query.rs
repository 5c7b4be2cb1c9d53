//! Query analysis: normalization and the retrieval decision

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::types::{Query, Trace, TraceDetail};

/// Words that mark a query as a question
pub const INTERROGATIVES: &[&str] = &["what", "how", "why", "when", "where", "who", "which"];

static INTERROGATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(what|how|why|when|where|who|which)\b").unwrap()
});

/// Trim and collapse internal whitespace
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased alphanumeric word tokens
pub fn word_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Whether the text contains a question mark or an interrogative word
pub fn is_question(text: &str) -> bool {
    text.contains('?') || INTERROGATIVE_RE.is_match(text)
}

/// Turns raw input into a [`Query`]
pub struct QueryStage {
    length_threshold: usize,
}

impl QueryStage {
    pub const COMPONENT: &'static str = "QueryStage";

    pub fn new(length_threshold: usize) -> Self {
        Self { length_threshold }
    }

    /// Analyze without tracing.
    ///
    /// Retrieval is needed when the normalized query is longer than the
    /// threshold or reads as a question.
    pub fn analyze(&self, raw: &str) -> Result<Query> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(Error::invalid_input("Query must not be empty"));
        }

        let needs_retrieval =
            normalized.chars().count() > self.length_threshold || is_question(&normalized);

        Ok(Query::new(raw.to_string(), normalized, needs_retrieval))
    }

    /// Analyze and record the step
    pub fn run(&self, raw: &str, trace: &mut Trace) -> Result<Query> {
        let span = trace.begin(Self::COMPONENT, "analyze", "Analyzing query");

        match self.analyze(raw) {
            Ok(query) => {
                let message = if query.needs_retrieval() {
                    "Query needs external retrieval"
                } else {
                    "Query can be answered without retrieval"
                };
                trace.complete(
                    span,
                    message,
                    Some(TraceDetail::Query {
                        normalized: query.normalized().to_string(),
                        needs_retrieval: query.needs_retrieval(),
                    }),
                );
                Ok(query)
            }
            Err(e) => {
                trace.fail(
                    span,
                    e.to_string(),
                    Some(TraceDetail::Failure {
                        error: e.to_string(),
                        failed_tiers: Vec::new(),
                    }),
                );
                Err(e)
            }
        }
    }
}
