//! Prompt templates for insight generation.
//!
//! Two-role prompts: a fixed system persona with an output-language
//! directive, and a per-call user message carrying one customer summary.

use crate::gateway::Message;

/// A prompt template with a `{question}` placeholder in the user message.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    /// Render the template into gateway messages for one question.
    pub fn render(&self, question: &str) -> Vec<Message> {
        vec![
            Message::system(self.system),
            Message::user(self.user.replace("{question}", question)),
        ]
    }
}

/// Analyst persona used for every per-customer insight.
pub const INSIGHT_PROMPT: PromptTemplate = PromptTemplate {
    slug: "customer_insight_v1",
    system: "Você é um analista de dados especializado. \
             Analise os dados sobre os padrões de compras dos clientes \
             e forneça feedback em português do Brasil.",
    user: "question: {question}",
};
