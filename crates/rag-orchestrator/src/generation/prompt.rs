//! Prompt templates for answer generation and refinement

use crate::types::{Critique, RetrievedPassage};

/// Prompt builder for grounded answers
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build a numbered context block from retrieved passages
    pub fn build_context(passages: &[RetrievedPassage]) -> String {
        let mut context = String::new();

        for (i, passage) in passages.iter().enumerate() {
            let source = passage.source_label().unwrap_or("unknown source");
            context.push_str(&format!(
                "[{}] {} (relevance {:.2})\n\n{}\n\n---\n\n",
                i + 1,
                source,
                passage.score,
                passage.content.trim()
            ));
        }

        context
    }

    /// Build the first-answer prompt.
    ///
    /// With passages the model is told to ground on them and to say so when
    /// they are insufficient. Without passages it answers from general
    /// knowledge.
    pub fn build_answer_prompt(question: &str, passages: &[RetrievedPassage]) -> String {
        if passages.is_empty() {
            return format!(
                r#"Answer the following question clearly and accurately.
If you are not certain, say what is known and what is uncertain.

QUESTION: {question}

ANSWER:"#,
                question = question
            );
        }

        format!(
            r#"Answer the question using the reference passages below.

RULES:
1. Prefer information stated in the passages and cite them as [1], [2], ...
2. If the passages do not contain enough information, say so explicitly before adding anything else
3. Do not invent sources

REFERENCE PASSAGES:
{context}
QUESTION: {question}

ANSWER:"#,
            context = Self::build_context(passages),
            question = question
        )
    }

    /// Build a refinement prompt that embeds the previous answer and its critique
    pub fn build_refine_prompt(
        question: &str,
        answer: &str,
        critique: &Critique,
        passages: &[RetrievedPassage],
    ) -> String {
        let context = if passages.is_empty() {
            "No reference passages are available.\n".to_string()
        } else {
            Self::build_context(passages)
        };

        format!(
            r#"Improve the previous answer to the question below.

QUESTION: {question}

PREVIOUS ANSWER:
{answer}

REVIEW (score {score}/10):
{rationale}

REFERENCE PASSAGES:
{context}
Write a complete, improved answer that addresses every point in the review.
Return only the improved answer.

IMPROVED ANSWER:"#,
            question = question,
            answer = answer.trim(),
            score = critique.score,
            rationale = critique.rationale,
            context = context
        )
    }
}
