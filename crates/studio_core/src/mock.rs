//! In-process stand-ins for the catalog service and the model backend.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{Model, ModelId, Template, TemplateId};

use crate::{CatalogLoader, ResponseSimulator};

pub const MODEL_CATALOG_LATENCY: Duration = Duration::from_millis(800);
pub const TEMPLATE_CATALOG_LATENCY: Duration = Duration::from_millis(600);
pub const RESPONSE_LATENCY: Duration = Duration::from_millis(2000);

fn model(
    id: &str,
    name: &str,
    provider: &str,
    description: &str,
    max_tokens: u32,
    pricing: &str,
) -> Model {
    Model {
        id: ModelId::new(id),
        name: name.into(),
        provider: provider.into(),
        description: description.into(),
        max_tokens,
        pricing: Some(pricing.into()),
    }
}

fn template(id: &str, name: &str, category: &str, description: &str, content: &str) -> Template {
    Template {
        id: TemplateId::new(id),
        name: name.into(),
        category: category.into(),
        description: description.into(),
        content: content.into(),
    }
}

pub fn default_models() -> Vec<Model> {
    vec![
        model(
            "gpt-4",
            "GPT-4",
            "OpenAI",
            "Most capable model for complex reasoning tasks",
            8192,
            "$0.03/1K tokens",
        ),
        model(
            "gpt-3.5-turbo",
            "GPT-3.5 Turbo",
            "OpenAI",
            "Fast and efficient for most conversational tasks",
            4096,
            "$0.002/1K tokens",
        ),
        model(
            "claude-3-opus",
            "Claude 3 Opus",
            "Anthropic",
            "Highest level of intelligence and capability",
            4096,
            "$15/1M tokens",
        ),
        model(
            "claude-3-sonnet",
            "Claude 3 Sonnet",
            "Anthropic",
            "Balance of intelligence and speed",
            4096,
            "$3/1M tokens",
        ),
        model(
            "gemini-pro",
            "Gemini Pro",
            "Google",
            "Multimodal AI with strong reasoning",
            8192,
            "$0.5/1M tokens",
        ),
        model(
            "llama-2-70b",
            "Llama 2 70B",
            "Meta",
            "Open-source large language model",
            4096,
            "Free",
        ),
    ]
}

pub fn default_templates() -> Vec<Template> {
    vec![
        template(
            "creative-writing",
            "Creative Writing Assistant",
            "Creative",
            "Help with stories, poems, and creative content",
            "You are a creative writing assistant. Help me write engaging and imaginative content. Be creative, descriptive, and inspiring.",
        ),
        template(
            "code-reviewer",
            "Code Reviewer",
            "Development",
            "Review and improve code quality",
            "You are an expert code reviewer. Analyze the following code for best practices, potential bugs, performance issues, and suggest improvements.",
        ),
        template(
            "data-analyst",
            "Data Analyst",
            "Analytics",
            "Analyze and interpret data patterns",
            "You are a data analyst. Help me understand data patterns, create insights, and suggest actionable recommendations based on the data provided.",
        ),
        template(
            "business-consultant",
            "Business Consultant",
            "Business",
            "Strategic business advice and planning",
            "You are a business consultant with expertise in strategy, operations, and growth. Provide practical and actionable business advice.",
        ),
        template(
            "learning-tutor",
            "Learning Tutor",
            "Education",
            "Personalized learning and teaching assistant",
            "You are a patient and knowledgeable tutor. Break down complex topics into understandable parts and provide clear explanations with examples.",
        ),
        template(
            "research-assistant",
            "Research Assistant",
            "Research",
            "Help with research and fact-finding",
            "You are a research assistant. Help me gather information, summarize findings, and provide well-sourced insights on various topics.",
        ),
    ]
}

pub struct MockCatalog {
    models: Vec<Model>,
    templates: Vec<Template>,
    model_latency: Duration,
    template_latency: Duration,
    fail_with: Option<String>,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self {
            models: default_models(),
            templates: default_templates(),
            model_latency: MODEL_CATALOG_LATENCY,
            template_latency: TEMPLATE_CATALOG_LATENCY,
            fail_with: None,
        }
    }
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instant() -> Self {
        Self::default().with_latency(Duration::ZERO, Duration::ZERO)
    }

    pub fn failing(err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            ..Self::instant()
        }
    }

    pub fn with_latency(mut self, models: Duration, templates: Duration) -> Self {
        self.model_latency = models;
        self.template_latency = templates;
        self
    }

    pub fn with_catalog(mut self, models: Vec<Model>, templates: Vec<Template>) -> Self {
        self.models = models;
        self.templates = templates;
        self
    }
}

#[async_trait]
impl CatalogLoader for MockCatalog {
    async fn get_models(&self) -> Result<Vec<Model>> {
        pause(self.model_latency).await;
        if let Some(err) = &self.fail_with {
            return Err(anyhow!("model catalog fetch failed: {err}"));
        }
        Ok(self.models.clone())
    }

    async fn get_templates(&self) -> Result<Vec<Template>> {
        pause(self.template_latency).await;
        if let Some(err) = &self.fail_with {
            return Err(anyhow!("template catalog fetch failed: {err}"));
        }
        Ok(self.templates.clone())
    }
}

/// Echoes a slice of the prompt back in one of a few canned shapes, rotating per call.
pub struct MockResponder {
    latency: Duration,
    fail_with: Option<String>,
    cursor: AtomicUsize,
}

impl Default for MockResponder {
    fn default() -> Self {
        Self {
            latency: RESPONSE_LATENCY,
            fail_with: None,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl MockResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instant() -> Self {
        Self::default().with_latency(Duration::ZERO)
    }

    pub fn failing(err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            ..Self::instant()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ResponseSimulator for MockResponder {
    async fn generate(&self, prompt: &str, model_name: &str) -> Result<String> {
        pause(self.latency).await;
        if let Some(err) = &self.fail_with {
            return Err(anyhow!("response generation failed: {err}"));
        }

        let shape = self.cursor.fetch_add(1, Ordering::Relaxed) % 3;
        let reply = match shape {
            0 => format!(
                "This is a simulated response from {model_name}. Your prompt was: \"{}\"",
                excerpt(prompt, 50)
            ),
            1 => format!(
                "I understand you're asking about \"{}...\". Here's a detailed response that would come from {model_name}.",
                prompt.chars().take(30).collect::<String>()
            ),
            _ => format!(
                "Based on your prompt, here's what {model_name} would generate: This is a comprehensive answer that addresses your question about the topic you mentioned."
            ),
        };
        Ok(reply)
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

async fn pause(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
