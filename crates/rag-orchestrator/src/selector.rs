//! Pipeline selection
//!
//! A request either names a pipeline directly or asks for `auto` or `meta`
//! selection. Both strategies classify the query text with the same
//! heuristics; `meta` additionally reports a confidence figure.

use std::fmt;
use std::str::FromStr;

use crate::config::SelectorConfig;
use crate::error::Error;
use crate::pipeline::PipelineKind;
use crate::stages::query::{is_question, normalize, word_tokens};

/// Requested selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run the named pipeline
    Fixed(PipelineKind),
    /// Choose from query complexity
    Auto,
    /// Choose from query complexity and report confidence
    Meta,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Mode::Auto),
            "meta" => Ok(Mode::Meta),
            other => PipelineKind::from_mode(other).map(Mode::Fixed).ok_or_else(|| {
                Error::invalid_input(format!(
                    "Unknown mode '{}'; expected one of phase1, phase2, phase3, auto, meta",
                    s
                ))
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Fixed(kind) => f.write_str(kind.mode_name()),
            Mode::Auto => f.write_str("auto"),
            Mode::Meta => f.write_str("meta"),
        }
    }
}

/// Complexity class of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: PipelineKind,
    /// Complex keywords found in the query
    pub keywords: Vec<String>,
    pub words: usize,
    pub chars: usize,
}

/// Outcome of pipeline selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub kind: PipelineKind,
    /// "fixed", "auto" or "meta"
    pub strategy: &'static str,
    /// Reported as `pipelineInfo`
    pub pipeline_info: String,
    pub rationale: String,
    /// Only set by meta selection, in percent
    pub confidence: Option<u8>,
}

/// Chooses a pipeline for each request
pub struct PipelineSelector {
    config: SelectorConfig,
}

impl PipelineSelector {
    pub const COMPONENT: &'static str = "PipelineSelector";

    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    fn has_keyword(tokens: &[String], lowered: &str, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        if keyword.contains(|c: char| !c.is_alphanumeric()) {
            lowered.contains(&keyword)
        } else {
            tokens.iter().any(|t| *t == keyword)
        }
    }

    /// Classify a query by length, keywords and phrasing.
    ///
    /// - complex: a complex keyword, more than `complex_min_words` words,
    ///   or more than `complex_min_chars` characters
    /// - simple: at most `simple_max_words` words, not a question and
    ///   not asking for an explanation
    /// - moderate: everything else
    pub fn classify(&self, text: &str) -> Classification {
        let normalized = normalize(text);
        let lowered = normalized.to_lowercase();
        let tokens: Vec<String> = word_tokens(&lowered).collect();
        let words = normalized.split_whitespace().count();
        let chars = normalized.chars().count();

        let keywords: Vec<String> = self
            .config
            .complex_keywords
            .iter()
            .filter(|k| Self::has_keyword(&tokens, &lowered, k))
            .cloned()
            .collect();

        let asks_explanation = tokens.iter().any(|t| t == "explain" || t == "describe");

        let kind = if !keywords.is_empty()
            || words > self.config.complex_min_words
            || chars > self.config.complex_min_chars
        {
            PipelineKind::IterativeRefine
        } else if words <= self.config.simple_max_words
            && !is_question(&normalized)
            && !asks_explanation
        {
            PipelineKind::SinglePass
        } else {
            PipelineKind::EvaluateOnce
        };

        Classification {
            kind,
            keywords,
            words,
            chars,
        }
    }

    fn rationale(&self, c: &Classification) -> String {
        match c.kind {
            PipelineKind::IterativeRefine if !c.keywords.is_empty() => format!(
                "Complex query: analysis keywords ({})",
                c.keywords.join(", ")
            ),
            PipelineKind::IterativeRefine => format!(
                "Complex query: {} words, {} characters",
                c.words, c.chars
            ),
            PipelineKind::SinglePass => format!("Simple query: {} words, no question", c.words),
            PipelineKind::EvaluateOnce => format!("Moderate query: {} words", c.words),
        }
    }

    fn confidence(&self, c: &Classification) -> u8 {
        match c.kind {
            PipelineKind::IterativeRefine if !c.keywords.is_empty() => {
                (80 + 5 * c.keywords.len()).min(95) as u8
            }
            PipelineKind::IterativeRefine => 70,
            PipelineKind::SinglePass => 85,
            PipelineKind::EvaluateOnce => 80,
        }
    }

    /// Pick a pipeline for the query. Pure: the same mode and text always
    /// produce the same selection.
    pub fn select(&self, mode: Mode, text: &str) -> Selection {
        match mode {
            Mode::Fixed(kind) => Selection {
                kind,
                strategy: "fixed",
                pipeline_info: kind.display_name().to_string(),
                rationale: format!("Pipeline {} requested explicitly", kind.mode_name()),
                confidence: None,
            },
            Mode::Auto => {
                let c = self.classify(text);
                Selection {
                    kind: c.kind,
                    strategy: "auto",
                    pipeline_info: format!("AUTO → {}", c.kind.display_name()),
                    rationale: self.rationale(&c),
                    confidence: None,
                }
            }
            Mode::Meta => {
                let c = self.classify(text);
                let confidence = self.confidence(&c);
                Selection {
                    kind: c.kind,
                    strategy: "meta",
                    pipeline_info: format!(
                        "META → {} ({}% confidence)",
                        c.kind.display_name(),
                        confidence
                    ),
                    rationale: self.rationale(&c),
                    confidence: Some(confidence),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> PipelineSelector {
        PipelineSelector::new(SelectorConfig::default())
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("auto".parse::<Mode>().unwrap(), Mode::Auto);
        assert_eq!("".parse::<Mode>().unwrap(), Mode::Auto);
        assert_eq!("META".parse::<Mode>().unwrap(), Mode::Meta);
        assert_eq!(
            "phase2".parse::<Mode>().unwrap(),
            Mode::Fixed(PipelineKind::EvaluateOnce)
        );
        assert!(matches!("phase4".parse::<Mode>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_fixed_mode_reports_display_name() {
        let selection = selector().select(Mode::Fixed(PipelineKind::SinglePass), "What is AI?");
        assert_eq!(selection.kind, PipelineKind::SinglePass);
        assert_eq!(selection.pipeline_info, "Phase 1: Basic A2A");
    }

    #[test]
    fn test_comparison_query_under_meta_selects_refinement() {
        let selection = selector().select(
            Mode::Meta,
            "Compare the advantages and disadvantages of microservices versus monoliths \
             for a startup",
        );

        assert_eq!(selection.kind, PipelineKind::IterativeRefine);
        assert!(selection.pipeline_info.starts_with("META → Phase 3: Self-Refinement"));
        assert!(selection.pipeline_info.ends_with("% confidence)"));
        assert!(selection.confidence.unwrap() >= 80);
    }

    #[test]
    fn test_vector_database_comparison_is_complex() {
        let c = selector().classify(
            "Compare the advantages and disadvantages of different vector databases \
             for RAG systems",
        );
        assert_eq!(c.kind, PipelineKind::IterativeRefine);
        assert!(c.keywords.contains(&"compare".to_string()));
        assert!(c.words > SelectorConfig::default().complex_min_words);
    }

    #[test]
    fn test_auto_classes() {
        let s = selector();
        assert_eq!(s.select(Mode::Auto, "hello there").kind, PipelineKind::SinglePass);
        assert_eq!(s.select(Mode::Auto, "What is AI?").kind, PipelineKind::EvaluateOnce);
        assert_eq!(
            s.select(Mode::Auto, "explain transformers").kind,
            PipelineKind::EvaluateOnce
        );
        assert_eq!(
            s.select(Mode::Auto, "rust vs go").kind,
            PipelineKind::IterativeRefine
        );
        assert_eq!(
            s.select(Mode::Auto, "What is AI?").pipeline_info,
            "AUTO → Phase 2: Smart A2A"
        );
    }

    #[test]
    fn test_keyword_matching_respects_word_boundaries() {
        // "canvas" contains "vs" but is not the keyword
        let c = selector().classify("paint the canvas");
        assert!(c.keywords.is_empty());
        assert_eq!(c.kind, PipelineKind::SinglePass);

        let c = selector().classify("what is the difference between tcp and udp");
        assert_eq!(c.keywords, vec!["difference between".to_string()]);
    }

    #[test]
    fn test_long_query_without_keywords_is_complex() {
        let text =
            "walk me through setting up a home lab with proxmox and a couple of spare machines";
        let c = selector().classify(text);
        assert_eq!(c.kind, PipelineKind::IterativeRefine);
        assert!(c.keywords.is_empty());
        assert_eq!(selector().select(Mode::Meta, text).confidence, Some(70));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let s = selector();
        let text = "How do I evaluate retrieval quality?";
        assert_eq!(s.select(Mode::Meta, text), s.select(Mode::Meta, text));
    }
}
