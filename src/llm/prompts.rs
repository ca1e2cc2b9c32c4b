//! Prompt templates for answer generation.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Collection of prompts used for answer generation.
pub struct Prompts;

impl Prompts {
    /// Evaluation prompt: answer from the supplied context only, briefly.
    pub fn rag_strict() -> &'static str {
        r#"You are answering questions for an evaluation. Answer the question using ONLY the context below.

Context:
{context}

Question: {question}

Rules:
1) Use only facts stated in the context. Do not add outside knowledge.
2) Be concise: answer with a short phrase or a single sentence.
3) If the context does not contain the answer, reply exactly: "Information not found".

Answer:"#
    }

    /// Open-domain prompt used when no context is available outside evaluation.
    pub fn general() -> &'static str {
        r#"You are a helpful assistant.
Rules:
1) Answer clearly and concisely.
2) If the user explicitly requests a language, follow it.
3) If the question is ambiguous, ask one brief clarifying question before answering.

Question:
{question}

Answer:"#
    }
}

/// Which template a prompt is rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    Strict,
    General,
}

impl PromptMode {
    pub fn template(self) -> &'static str {
        match self {
            PromptMode::Strict => Prompts::rag_strict(),
            PromptMode::General => Prompts::general(),
        }
    }

    /// Substitute `{context}` and `{question}` in one pass. Placeholders that
    /// appear inside the substituted values are left as they are.
    pub fn render(self, context: &str, question: &str) -> String {
        let template = self.template();
        let mut out = String::with_capacity(template.len() + context.len() + question.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}
