use crate::error::CapabilityError;
use crate::models::RetrievedChunk;
use crate::traits::GenerativeAnswerer;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;

pub const UNKNOWN_ANSWER: &str = "I don't know.";

const STUFF_PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_new_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_new_tokens: 512,
        }
    }
}

/// Places every retrieved chunk into a single prompt.
pub fn stuff_prompt(context: &[RetrievedChunk], question: &str) -> String {
    let joined = context
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{STUFF_PROMPT_PREAMBLE}\n\n{joined}\n\nQuestion: {question}\nHelpful Answer:")
}

/// Answers with the context sentence sharing the most terms with the question.
#[derive(Debug, Clone)]
pub struct ExtractiveAnswerer {
    sentence_re: Regex,
    term_re: Regex,
}

impl ExtractiveAnswerer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            sentence_re: Regex::new(r"[^.!?\n]+[.!?]?")?,
            term_re: Regex::new(r"[\p{L}\p{N}]+")?,
        })
    }

    fn terms(&self, text: &str) -> HashSet<String> {
        self.term_re
            .find_iter(text)
            .map(|term| term.as_str().to_lowercase())
            .filter(|term| term.chars().count() > 2)
            .collect()
    }

    fn best_sentence(&self, context: &[RetrievedChunk], question: &str) -> Option<String> {
        let wanted = self.terms(question);
        let mut best: Option<(usize, &str)> = None;

        for chunk in context {
            for sentence in self.sentence_re.find_iter(&chunk.text) {
                let sentence = sentence.as_str().trim();
                let overlap = self.terms(sentence).intersection(&wanted).count();
                if overlap > 0 && best.map_or(true, |(score, _)| overlap > score) {
                    best = Some((overlap, sentence));
                }
            }
        }

        best.map(|(_, sentence)| sentence.to_string())
    }
}

#[async_trait]
impl GenerativeAnswerer for ExtractiveAnswerer {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn answer(
        &self,
        context: &[RetrievedChunk],
        question: &str,
    ) -> Result<String, CapabilityError> {
        Ok(self
            .best_sentence(context, question)
            .unwrap_or_else(|| UNKNOWN_ANSWER.to_string()))
    }
}
