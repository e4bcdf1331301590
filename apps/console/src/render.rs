use std::fmt::Write as _;

use chrono::Local;
use shared::{
    domain::{Message, Role},
    parameters::{ParameterField, Parameters},
};
use studio_core::{AppState, StudioEvent, ALL_CATEGORIES};

/// Assistant messages without a recorded model name fall back to this label.
const ASSISTANT_FALLBACK: &str = "AI";

pub fn format_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "You",
        Role::Assistant => message.model.as_deref().unwrap_or(ASSISTANT_FALLBACK),
    };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M:%S");
    format!("[{time}] {speaker}: {}", message.content)
}

/// Returns `None` for events that don't deserve a line of output.
pub fn format_event(event: &StudioEvent) -> Option<String> {
    match event {
        StudioEvent::ModelsChanged(models) => Some(format!("{} models available", models.len())),
        StudioEvent::TemplatesChanged(templates) => {
            Some(format!("{} templates available", templates.len()))
        }
        StudioEvent::ModelSelected(model) => {
            Some(format!("Model: {} ({})", model.name, model.provider))
        }
        StudioEvent::ParametersChanged(parameters) => Some(format_parameters(parameters)),
        StudioEvent::PromptChanged(_) => None,
        StudioEvent::MessageAppended(message) => Some(format_message(message)),
        StudioEvent::LoadingChanged(true) => Some("... thinking".into()),
        StudioEvent::LoadingChanged(false) => None,
        StudioEvent::ErrorChanged(Some(error)) => Some(format!("Error: {error}")),
        StudioEvent::ErrorChanged(None) => None,
        StudioEvent::TranscriptCleared => Some("Conversation cleared.".into()),
        StudioEvent::TranscriptRestored(messages) => {
            let mut out = format!("Restored {} messages", messages.len());
            for message in messages {
                let _ = write!(out, "\n{}", format_message(message));
            }
            Some(out)
        }
    }
}

pub fn format_parameters(parameters: &Parameters) -> String {
    ParameterField::ALL
        .iter()
        .map(|field| match field {
            ParameterField::MaxTokens => format!("{}: {}", field.label(), parameters.max_tokens()),
            _ => format!("{}: {:.2}", field.label(), parameters.get(*field)),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn format_models(state: &AppState) -> String {
    if state.models.is_empty() {
        return "No models loaded.".into();
    }
    let selected = state.selected_model.as_ref().map(|model| &model.id);
    state
        .models
        .iter()
        .map(|model| {
            let marker = if Some(&model.id) == selected { '*' } else { ' ' };
            let pricing = model.pricing.as_deref().unwrap_or("-");
            format!(
                "{marker} {:<16} {} [{}] max {} tokens, {pricing}\n    {}",
                model.id, model.name, model.provider, model.max_tokens, model.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_templates(state: &AppState, category: Option<&str>) -> String {
    let category = category.unwrap_or(ALL_CATEGORIES);
    let templates = state.templates_in_category(category);
    let mut out = format!("Categories: {}", state.template_categories().join(", "));
    if templates.is_empty() {
        out.push_str("\nNo templates in this category.");
        return out;
    }
    for template in templates {
        let _ = write!(
            out,
            "\n  {:<20} {} ({})\n      {}",
            template.id, template.name, template.category, template.description
        );
    }
    out
}

pub fn format_state(state: &AppState) -> String {
    let model = state
        .selected_model
        .as_ref()
        .map(|model| model.name.as_str())
        .unwrap_or("none");
    let mut out = format!(
        "Model: {model}\nMessages: {}\nDraft: {} characters\nLoading: {}",
        state.messages.len(),
        state.prompt_char_count(),
        if state.is_loading { "yes" } else { "no" },
    );
    if let Some(error) = &state.error {
        let _ = write!(out, "\nError: {error}");
    }
    if !state.can_send() && !state.is_loading {
        out.push_str("\n(select a model and type a prompt to send)");
    }
    out
}
