//! Application state, the closed command set, and the reducer that applies one to the other.

use serde::Serialize;
use shared::{
    domain::{Message, Model, ModelId, Template, TemplateId},
    parameters::{ParameterPatch, Parameters},
};

/// Category filter value that matches every template.
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub models: Vec<Model>,
    pub templates: Vec<Template>,
    pub selected_model: Option<Model>,
    pub parameters: Parameters,
    pub messages: Vec<Message>,
    pub prompt: String,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl AppState {
    /// Mirrors the editor's submit gate.
    pub fn can_send(&self) -> bool {
        !self.is_loading && self.selected_model.is_some() && !self.prompt.trim().is_empty()
    }

    pub fn prompt_char_count(&self) -> usize {
        self.prompt.chars().count()
    }

    pub fn find_model(&self, id: &ModelId) -> Option<&Model> {
        self.models.iter().find(|model| &model.id == id)
    }

    pub fn find_template(&self, id: &TemplateId) -> Option<&Template> {
        self.templates.iter().find(|template| &template.id == id)
    }

    /// `"all"` followed by each distinct template category in catalog order.
    pub fn template_categories(&self) -> Vec<&str> {
        let mut categories = vec![ALL_CATEGORIES];
        for template in &self.templates {
            if !categories.contains(&template.category.as_str()) {
                categories.push(template.category.as_str());
            }
        }
        categories
    }

    pub fn templates_in_category(&self, category: &str) -> Vec<&Template> {
        self.templates
            .iter()
            .filter(|template| category == ALL_CATEGORIES || template.category == category)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetModels(Vec<Model>),
    SetTemplates(Vec<Template>),
    SelectModel(Model),
    UpdateParameters(ParameterPatch),
    SetPrompt(String),
    AddMessage(Message),
    SetLoading(bool),
    SetError(Option<String>),
    ClearChat,
    /// Replaces the transcript with an imported one and clears the error.
    RestoreTranscript(Vec<Message>),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetModels(_) => "set_models",
            Command::SetTemplates(_) => "set_templates",
            Command::SelectModel(_) => "select_model",
            Command::UpdateParameters(_) => "update_parameters",
            Command::SetPrompt(_) => "set_prompt",
            Command::AddMessage(_) => "add_message",
            Command::SetLoading(_) => "set_loading",
            Command::SetError(_) => "set_error",
            Command::ClearChat => "clear_chat",
            Command::RestoreTranscript(_) => "restore_transcript",
        }
    }
}

/// One observable state change, in the order it was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StudioEvent {
    ModelsChanged(Vec<Model>),
    TemplatesChanged(Vec<Template>),
    ModelSelected(Model),
    ParametersChanged(Parameters),
    PromptChanged(String),
    MessageAppended(Message),
    LoadingChanged(bool),
    ErrorChanged(Option<String>),
    TranscriptCleared,
    TranscriptRestored(Vec<Message>),
}

pub fn reduce(state: &mut AppState, command: Command) -> Vec<StudioEvent> {
    match command {
        Command::SetModels(models) => {
            let mut events = Vec::with_capacity(2);
            let auto_select = match (&state.selected_model, models.first()) {
                (None, Some(first)) => Some(first.clone()),
                _ => None,
            };
            state.models = models.clone();
            events.push(StudioEvent::ModelsChanged(models));
            if let Some(model) = auto_select {
                state.selected_model = Some(model.clone());
                events.push(StudioEvent::ModelSelected(model));
            }
            events
        }
        Command::SetTemplates(templates) => {
            state.templates = templates.clone();
            vec![StudioEvent::TemplatesChanged(templates)]
        }
        Command::SelectModel(model) => {
            state.selected_model = Some(model.clone());
            vec![StudioEvent::ModelSelected(model)]
        }
        Command::UpdateParameters(patch) => {
            state.parameters.merge(&patch);
            vec![StudioEvent::ParametersChanged(state.parameters)]
        }
        Command::SetPrompt(prompt) => {
            state.prompt = prompt.clone();
            vec![StudioEvent::PromptChanged(prompt)]
        }
        Command::AddMessage(message) => {
            state.messages.push(message.clone());
            vec![StudioEvent::MessageAppended(message)]
        }
        Command::SetLoading(is_loading) => {
            state.is_loading = is_loading;
            vec![StudioEvent::LoadingChanged(is_loading)]
        }
        Command::SetError(error) => {
            state.error = error.clone();
            vec![StudioEvent::ErrorChanged(error)]
        }
        Command::ClearChat => {
            state.messages.clear();
            state.error = None;
            vec![StudioEvent::TranscriptCleared]
        }
        Command::RestoreTranscript(messages) => {
            state.messages = messages.clone();
            state.error = None;
            vec![StudioEvent::TranscriptRestored(messages)]
        }
    }
}
