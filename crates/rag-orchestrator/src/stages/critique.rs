//! Deterministic answer scoring
//!
//! Scores start at 5 and move with a few observable signals: answer length,
//! uncertainty phrasing, whether passages backed the answer, and how many of
//! the query's content words the answer covers. The result is clamped to
//! [0, 10]. No model call is involved, so identical inputs always score the
//! same.

use std::collections::HashSet;

use crate::config::CritiqueConfig;
use crate::types::{Answer, Critique, Query, RetrievedPassage, Trace, TraceDetail};

use super::query::{word_tokens, INTERROGATIVES};

const BASE_SCORE: i32 = 5;

const UNCERTAINTY_PHRASES: &[&str] = &[
    "i don't know",
    "i do not know",
    "i can't",
    "i cannot",
    "i'm not sure",
    "i am not sure",
    "i'm unable",
    "i am unable",
    "unable to answer",
    "no information",
];

const STOPWORDS: &[&str] = &[
    "about", "does", "from", "have", "into", "that", "their", "there", "these", "they", "this",
    "with", "your", "tell", "explain", "describe", "please",
];

/// Query words that carry meaning
fn content_terms(text: &str) -> HashSet<String> {
    word_tokens(text)
        .filter(|w| w.chars().count() > 3)
        .filter(|w| !STOPWORDS.contains(&w.as_str()) && !INTERROGATIVES.contains(&w.as_str()))
        .collect()
}

pub struct CritiqueStage {
    config: CritiqueConfig,
}

impl CritiqueStage {
    pub const COMPONENT: &'static str = "CritiqueStage";

    pub fn new(config: CritiqueConfig) -> Self {
        Self { config }
    }

    /// Score an answer without tracing
    pub fn evaluate(
        &self,
        query: &Query,
        answer: &Answer,
        passages: &[RetrievedPassage],
    ) -> Critique {
        let text = answer.text.trim();
        let lowered = text.to_lowercase().replace('\u{2019}', "'");
        let length = text.chars().count();

        let mut score = BASE_SCORE;
        let mut notes = Vec::new();

        if length < self.config.min_length {
            score -= 2;
            notes.push(format!(
                "Answer is too short ({} characters, expected at least {}); \
                 expand it with specifics",
                length, self.config.min_length
            ));
        } else if length >= self.config.good_length {
            score += 1;
        } else {
            notes.push("Answer could be more detailed".to_string());
        }

        if UNCERTAINTY_PHRASES.iter().any(|p| lowered.contains(p)) {
            score -= 3;
            notes.push(
                "Answer expresses uncertainty instead of addressing the question".to_string(),
            );
        }

        if passages.is_empty() {
            notes.push("No reference passages supported the answer".to_string());
        } else {
            score += 1;
        }

        let terms = content_terms(query.normalized());
        if !terms.is_empty() {
            let answer_words: HashSet<String> = word_tokens(&lowered).collect();
            let covered = terms.iter().filter(|t| answer_words.contains(*t)).count();
            let coverage = covered as f32 / terms.len() as f32;

            if coverage >= 0.5 {
                score += 2;
            } else if coverage >= 0.25 {
                score += 1;
                notes.push("Answer only partially addresses the terms of the question".to_string());
            } else {
                score -= 1;
                let mut missing: Vec<&str> = terms
                    .iter()
                    .filter(|t| !answer_words.contains(*t))
                    .map(String::as_str)
                    .collect();
                missing.sort_unstable();
                notes.push(format!(
                    "Answer does not address the question's key terms: {}",
                    missing.join(", ")
                ));
            }
        }

        let score = score.clamp(0, 10) as u8;
        let rationale = if notes.is_empty() {
            "Answer is complete, grounded and on topic".to_string()
        } else {
            notes.iter().map(|n| format!("- {}", n)).collect::<Vec<_>>().join("\n")
        };

        Critique { rationale, score }
    }

    /// Score an answer and record the step
    pub fn run(
        &self,
        query: &Query,
        answer: &Answer,
        passages: &[RetrievedPassage],
        trace: &mut Trace,
    ) -> Critique {
        let span = trace.begin(
            Self::COMPONENT,
            "evaluate",
            format!("Evaluating answer revision {}", answer.revision),
        );
        let critique = self.evaluate(query, answer, passages);
        trace.complete(
            span,
            format!("Answer scored {}/10", critique.score),
            Some(TraceDetail::Critique {
                score: critique.score,
                rationale: critique.rationale.clone(),
            }),
        );
        critique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::passages;
    use crate::stages::QueryStage;
    use proptest::prelude::*;

    fn query(text: &str) -> Query {
        QueryStage::new(50).analyze(text).unwrap()
    }

    fn stage() -> CritiqueStage {
        CritiqueStage::new(CritiqueConfig::default())
    }

    #[test]
    fn test_short_answer_scores_low() {
        let critique = stage().evaluate(
            &query("What is machine learning?"),
            &Answer::degraded("Not sure."),
            &[],
        );
        assert!(critique.score < 7);
        assert!(critique.rationale.contains("too short"));
    }

    #[test]
    fn test_grounded_detailed_answer_is_accepted() {
        let answer = Answer::generated(
            "Machine learning is a field of artificial intelligence where systems learn patterns \
             from data instead of following explicit rules, improving with experience.",
            "gateway",
        );
        let critique = stage().evaluate(&query("What is machine learning?"), &answer, &passages(3));
        assert!(critique.score >= 8, "score was {}", critique.score);
    }

    #[test]
    fn test_uncertainty_is_penalized() {
        let q = query("What is quantum entanglement in physics?");
        let confident = Answer::generated(
            "Quantum entanglement is a physics phenomenon where particles share a joint state so \
             measuring one instantly constrains the other.",
            "gateway",
        );
        let hedged = Answer::generated(
            "I don\u{2019}t know much about quantum entanglement in physics, but it might \
             relate to particles that share some kind of joint state.",
            "gateway",
        );
        let s = stage();
        assert!(s.evaluate(&q, &hedged, &[]).score + 3 <= s.evaluate(&q, &confident, &[]).score);
    }

    #[test]
    fn test_off_topic_answer_names_missing_terms() {
        let critique = stage().evaluate(
            &query("Explain photosynthesis chlorophyll"),
            &Answer::generated(
                "The weather is nice today and the sky is a pleasant blue colour overall.",
                "x",
            ),
            &[],
        );
        assert!(critique.rationale.contains("chlorophyll"));
        assert!(critique.rationale.contains("photosynthesis"));
    }

    #[test]
    fn test_run_records_score() {
        let mut trace = Trace::new();
        let critique =
            stage().run(&query("What is AI?"), &Answer::degraded("AI."), &[], &mut trace);
        assert_eq!(trace.count_invocations(CritiqueStage::COMPONENT), 1);
        assert_eq!(
            trace.last().unwrap().detail,
            Some(TraceDetail::Critique {
                score: critique.score,
                rationale: critique.rationale.clone(),
            })
        );
    }

    proptest! {
        #[test]
        fn score_stays_in_range(
            q in "[a-z]{1,12}( [a-z]{1,12}){0,8}",
            a in ".{0,300}",
            n in 0usize..4,
        ) {
            let critique = stage().evaluate(&query(&q), &Answer::generated(a, "x"), &passages(n));
            prop_assert!(critique.score <= 10);
            prop_assert!(!critique.rationale.is_empty());
        }

        #[test]
        fn scoring_is_deterministic(a in "[a-zA-Z .']{0,200}") {
            let q = query("How do vector databases index embeddings?");
            let answer = Answer::generated(a, "x");
            prop_assert_eq!(stage().evaluate(&q, &answer, &[]), stage().evaluate(&q, &answer, &[]));
        }
    }
}
