use std::path::PathBuf;

use shared::{
    domain::{ModelId, TemplateId},
    error::UnknownParameter,
    parameters::ParameterField,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Plain text: becomes the draft and is submitted.
    Send(String),
    /// Submit whatever is currently in the draft (e.g. after `/template`).
    SubmitDraft,
    ListModels,
    SelectModel(ModelId),
    ShowParameters,
    SetParameter { field: ParameterField, value: f64 },
    ListTemplates { category: Option<String> },
    LoadTemplate(TemplateId),
    Clear,
    Export,
    Import(PathBuf),
    ShowState,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::Send(_) => "send",
            ConsoleCommand::SubmitDraft => "submit_draft",
            ConsoleCommand::ListModels => "list_models",
            ConsoleCommand::SelectModel(_) => "select_model",
            ConsoleCommand::ShowParameters => "show_parameters",
            ConsoleCommand::SetParameter { .. } => "set_parameter",
            ConsoleCommand::ListTemplates { .. } => "list_templates",
            ConsoleCommand::LoadTemplate(_) => "load_template",
            ConsoleCommand::Clear => "clear",
            ConsoleCommand::Export => "export",
            ConsoleCommand::Import(_) => "import",
            ConsoleCommand::ShowState => "show_state",
            ConsoleCommand::Help => "help",
            ConsoleCommand::Quit => "quit",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("unknown command '/{0}', try /help")]
    UnknownCommand(String),
    #[error("/{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("'{0}' is not a number")]
    InvalidNumber(String),
    #[error(transparent)]
    UnknownParameter(#[from] UnknownParameter),
}

/// Lines starting with `/` are commands; anything else is prompt text.
pub fn parse_line(line: &str) -> Result<ConsoleCommand, InputError> {
    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Ok(ConsoleCommand::Send(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next();

    let command = match verb.as_str() {
        "send" => ConsoleCommand::SubmitDraft,
        "models" => ConsoleCommand::ListModels,
        "model" => ConsoleCommand::SelectModel(ModelId::new(required(arg, "model", "a model id")?)),
        "params" | "parameters" => ConsoleCommand::ShowParameters,
        "set" => {
            let field: ParameterField = required(arg, "set", "a parameter name")?.parse()?;
            let raw = required(parts.next(), "set", "a value")?;
            let value = raw
                .parse::<f64>()
                .map_err(|_| InputError::InvalidNumber(raw.to_string()))?;
            // Same granularity the editor sliders offer.
            ConsoleCommand::SetParameter {
                field,
                value: field.range().snap(value),
            }
        }
        "templates" => ConsoleCommand::ListTemplates {
            category: arg.map(str::to_string),
        },
        "template" => {
            ConsoleCommand::LoadTemplate(TemplateId::new(required(arg, "template", "a template id")?))
        }
        "clear" => ConsoleCommand::Clear,
        "export" => ConsoleCommand::Export,
        "import" => ConsoleCommand::Import(PathBuf::from(required(arg, "import", "a file path")?)),
        "state" => ConsoleCommand::ShowState,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(command)
}

fn required<'a>(
    arg: Option<&'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, InputError> {
    arg.ok_or(InputError::MissingArgument { command, argument })
}

pub const HELP: &str = "\
Type a prompt and press enter to send it to the selected model.

  /models                  list available models
  /model <id>              select a model
  /params                  show generation parameters
  /set <field> <value>     change a parameter (temperature, max_tokens, top_p, ...)
  /templates [category]    list prompt templates
  /template <id>           load a template into the draft
  /send                    submit the current draft
  /clear                   clear the conversation
  /export                  write the conversation to a JSON file
  /import <path>           replace the conversation with an exported file
  /state                   show selection, draft and loading status
  /quit                    exit";
