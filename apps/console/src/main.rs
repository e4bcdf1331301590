use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use shared::{domain::ModelId, parameters::ParameterPatch};
use studio_core::{SendOutcome, StudioController, StudioEvent};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;
mod transcript_files;

use commands::{parse_line, ConsoleCommand, HELP};
use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "prompt-studio", about = "Compose prompts and chat with simulated models")]
struct Args {
    #[arg(long, default_value = "studio.toml")]
    config: PathBuf,
    /// Model to select once the catalog has loaded.
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    export_dir: Option<PathBuf>,
    /// Skip the simulated network latency.
    #[arg(long)]
    instant: bool,
}

impl Args {
    fn apply(self, mut settings: Settings) -> Settings {
        if let Some(model) = self.model {
            settings.default_model = Some(model);
        }
        if let Some(dir) = self.export_dir {
            settings.export_dir = dir;
        }
        if self.instant {
            settings = settings.without_latency();
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args.config)?;
    let settings = args.apply(settings);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let controller = StudioController::new_with_options(
        Arc::new(settings.catalog()),
        Arc::new(settings.responder()),
        settings.controller_options(),
    );
    let printer = spawn_event_printer(controller.subscribe_events());

    println!("Loading models and templates...");
    if controller.load_catalogs().await {
        apply_startup_choices(&controller, &settings).await;
    }
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        debug!(command = command.name(), "console input");
        if !handle_command(&controller, &settings, command).await {
            break;
        }
    }

    printer.abort();
    Ok(())
}

async fn apply_startup_choices(controller: &Arc<StudioController>, settings: &Settings) {
    if let Some(model) = settings.default_model.as_deref() {
        if !controller.select_model(&ModelId::new(model)).await {
            warn!(model, "configured default model is not in the catalog");
        }
    }
    if !settings.parameters.is_empty() {
        controller.update_parameters(settings.parameters).await;
    }
}

/// Returns `false` when the session should end.
async fn handle_command(
    controller: &Arc<StudioController>,
    settings: &Settings,
    command: ConsoleCommand,
) -> bool {
    match command {
        ConsoleCommand::Send(text) => {
            // The draft still belongs to the pending send until it settles.
            if settings.single_flight && controller.snapshot().await.is_loading {
                println!("Still waiting on the previous response.");
            } else {
                controller.set_prompt(text).await;
                spawn_submit(controller);
            }
        }
        ConsoleCommand::SubmitDraft => spawn_submit(controller),
        ConsoleCommand::ListModels => {
            println!("{}", render::format_models(&controller.snapshot().await));
        }
        ConsoleCommand::SelectModel(id) => {
            if !controller.select_model(&id).await {
                println!("No model with id '{id}', see /models");
            }
        }
        ConsoleCommand::ShowParameters => {
            println!(
                "{}",
                render::format_parameters(&controller.snapshot().await.parameters)
            );
        }
        ConsoleCommand::SetParameter { field, value } => {
            controller
                .update_parameters(ParameterPatch::field(field, value))
                .await;
        }
        ConsoleCommand::ListTemplates { category } => {
            let state = controller.snapshot().await;
            println!("{}", render::format_templates(&state, category.as_deref()));
        }
        ConsoleCommand::LoadTemplate(id) => {
            if controller.load_template(&id).await {
                let draft = controller.snapshot().await.prompt_char_count();
                println!("Template loaded into the draft ({draft} characters), /send to submit");
            } else {
                println!("No template with id '{id}', see /templates");
            }
        }
        ConsoleCommand::Clear => controller.clear_chat().await,
        ConsoleCommand::Export => {
            match transcript_files::write_export(controller, &settings.export_dir).await {
                Ok(Some(path)) => println!("Exported to {}", path.display()),
                Ok(None) => println!("Nothing to export yet."),
                Err(err) => println!("Export failed: {err:#}"),
            }
        }
        ConsoleCommand::Import(path) => {
            if let Err(err) = transcript_files::read_import(controller, &path).await {
                println!("Import failed: {err:#}");
            }
        }
        ConsoleCommand::ShowState => {
            println!("{}", render::format_state(&controller.snapshot().await));
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return false,
    }
    true
}

fn spawn_submit(controller: &Arc<StudioController>) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        match controller.submit_prompt().await {
            SendOutcome::Skipped => println!("Select a model and type a prompt first."),
            SendOutcome::Busy => println!("Still waiting on the previous response."),
            outcome => debug!(?outcome, "send settled"),
        }
    });
}

fn spawn_event_printer(mut events: broadcast::Receiver<StudioEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render::format_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
