use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join;
use shared::{
    domain::{Message, MessageId, Model, ModelId, Role, Template, TemplateId},
    error::{TranscriptError, LOAD_FAILURE_MESSAGE, RESPONSE_FAILURE_MESSAGE},
    parameters::ParameterPatch,
    protocol::TranscriptExport,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

mod clock;
pub mod mock;
pub mod state;

pub use clock::MessageClock;
pub use state::{reduce, AppState, Command, StudioEvent, ALL_CATEGORIES};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[async_trait]
pub trait CatalogLoader: Send + Sync {
    async fn get_models(&self) -> Result<Vec<Model>>;
    async fn get_templates(&self) -> Result<Vec<Template>>;
}

pub struct MissingCatalogLoader;

#[async_trait]
impl CatalogLoader for MissingCatalogLoader {
    async fn get_models(&self) -> Result<Vec<Model>> {
        Err(anyhow!("model catalog is unavailable"))
    }

    async fn get_templates(&self) -> Result<Vec<Template>> {
        Err(anyhow!("template catalog is unavailable"))
    }
}

#[async_trait]
pub trait ResponseSimulator: Send + Sync {
    async fn generate(&self, prompt: &str, model_name: &str) -> Result<String>;
}

pub struct MissingResponseSimulator;

#[async_trait]
impl ResponseSimulator for MissingResponseSimulator {
    async fn generate(&self, _prompt: &str, model_name: &str) -> Result<String> {
        Err(anyhow!("no response backend available for model {model_name}"))
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Reject a send while another one is still waiting for its response.
    pub single_flight: bool,
    /// Treat a response that takes longer than this as a failure. `None` waits forever.
    pub response_timeout: Option<Duration>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            single_flight: true,
            response_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// No model selected or blank prompt; nothing changed.
    Skipped,
    /// Another send is in flight and single-flight is enforced; nothing changed.
    Busy,
    Replied(MessageId),
    Failed,
    /// The controller was dropped or the transcript cleared before the response landed.
    Discarded,
}

struct PendingSend {
    prompt: String,
    model_name: String,
    transcript_epoch: u64,
}

struct StudioState {
    app: AppState,
    clock: MessageClock,
    in_flight: usize,
    transcript_epoch: u64,
}

impl StudioState {
    fn next_message(&mut self, role: Role, content: String, model: Option<String>) -> Message {
        let (id, timestamp) = self.clock.next();
        Message::new(id, role, content, timestamp, model)
    }
}

/// Owns the application state for one session and coordinates the collaborators.
pub struct StudioController {
    session_id: Uuid,
    catalog: Arc<dyn CatalogLoader>,
    simulator: Arc<dyn ResponseSimulator>,
    options: ControllerOptions,
    inner: Mutex<StudioState>,
    events: broadcast::Sender<StudioEvent>,
}

impl StudioController {
    pub fn new(
        catalog: Arc<dyn CatalogLoader>,
        simulator: Arc<dyn ResponseSimulator>,
    ) -> Arc<Self> {
        Self::new_with_options(catalog, simulator, ControllerOptions::default())
    }

    pub fn new_with_options(
        catalog: Arc<dyn CatalogLoader>,
        simulator: Arc<dyn ResponseSimulator>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            session_id: Uuid::new_v4(),
            catalog,
            simulator,
            options,
            inner: Mutex::new(StudioState {
                app: AppState::default(),
                clock: MessageClock::new(),
                in_flight: 0,
                transcript_epoch: 0,
            }),
            events,
        })
    }

    /// Builds a controller and runs the startup catalog load before returning it.
    pub async fn initialize(
        catalog: Arc<dyn CatalogLoader>,
        simulator: Arc<dyn ResponseSimulator>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let controller = Self::new_with_options(catalog, simulator, options);
        controller.load_catalogs().await;
        controller
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> AppState {
        self.inner.lock().await.app.clone()
    }

    pub async fn dispatch(&self, command: Command) {
        let mut guard = self.inner.lock().await;
        self.apply_locked(&mut guard, command);
    }

    fn apply_locked(&self, state: &mut StudioState, command: Command) {
        debug!(session = %self.session_id, command = command.name(), "applying command");
        match &command {
            Command::AddMessage(message) => state.clock.observe(message.id),
            Command::RestoreTranscript(messages) => {
                for message in messages {
                    state.clock.observe(message.id);
                }
                state.transcript_epoch += 1;
            }
            Command::ClearChat => state.transcript_epoch += 1,
            _ => {}
        }

        for event in reduce(&mut state.app, command) {
            // No subscribers is fine; presentation may not be attached yet.
            let _ = self.events.send(event);
        }
    }

    /// Requests both catalogs concurrently. On any failure both catalogs are
    /// emptied and the load error is surfaced. Returns whether the load succeeded.
    pub async fn load_catalogs(&self) -> bool {
        let fetched = try_join(self.catalog.get_models(), self.catalog.get_templates()).await;

        let mut guard = self.inner.lock().await;
        match fetched {
            Ok((models, templates)) => {
                info!(
                    session = %self.session_id,
                    models = models.len(),
                    templates = templates.len(),
                    "catalogs loaded"
                );
                self.apply_locked(&mut guard, Command::SetModels(models));
                self.apply_locked(&mut guard, Command::SetTemplates(templates));
                true
            }
            Err(err) => {
                warn!(session = %self.session_id, error = %err, "catalog load failed");
                self.apply_locked(&mut guard, Command::SetModels(Vec::new()));
                self.apply_locked(&mut guard, Command::SetTemplates(Vec::new()));
                self.apply_locked(
                    &mut guard,
                    Command::SetError(Some(LOAD_FAILURE_MESSAGE.to_string())),
                );
                false
            }
        }
    }

    pub async fn select_model(&self, model_id: &ModelId) -> bool {
        let mut guard = self.inner.lock().await;
        let Some(model) = guard.app.find_model(model_id).cloned() else {
            return false;
        };
        self.apply_locked(&mut guard, Command::SelectModel(model));
        true
    }

    /// Replaces the draft prompt with the template body.
    pub async fn load_template(&self, template_id: &TemplateId) -> bool {
        let mut guard = self.inner.lock().await;
        let Some(content) = guard
            .app
            .find_template(template_id)
            .map(|template| template.content.clone())
        else {
            return false;
        };
        self.apply_locked(&mut guard, Command::SetPrompt(content));
        true
    }

    pub async fn update_parameters(&self, patch: ParameterPatch) {
        self.dispatch(Command::UpdateParameters(patch)).await;
    }

    pub async fn set_prompt(&self, prompt: impl Into<String>) {
        self.dispatch(Command::SetPrompt(prompt.into())).await;
    }

    pub async fn clear_chat(&self) {
        self.dispatch(Command::ClearChat).await;
    }

    /// Sends `prompt` verbatim and waits for the response to be applied.
    pub async fn send_message(self: &Arc<Self>, prompt: &str) -> SendOutcome {
        Self::run_send(Arc::downgrade(self), prompt.to_string()).await
    }

    /// Like [`send_message`](Self::send_message) but detached. The task only
    /// holds a weak reference while waiting, so dropping the last controller
    /// handle turns the completion into a no-op.
    pub fn spawn_send(self: &Arc<Self>, prompt: impl Into<String>) -> JoinHandle<SendOutcome> {
        tokio::spawn(Self::run_send(Arc::downgrade(self), prompt.into()))
    }

    /// Sends the trimmed draft, then clears the draft once the send settles.
    ///
    /// The draft is cleared for every send that was actually issued, including
    /// `Failed` and `Discarded` ones, but only if it still holds the submitted
    /// text; edits made while the response was pending are kept.
    pub async fn submit_prompt(self: &Arc<Self>) -> SendOutcome {
        let submitted = self.inner.lock().await.app.prompt.clone();
        let outcome = self.send_message(submitted.trim()).await;
        if !matches!(outcome, SendOutcome::Skipped | SendOutcome::Busy) {
            let mut guard = self.inner.lock().await;
            if guard.app.prompt == submitted {
                self.apply_locked(&mut guard, Command::SetPrompt(String::new()));
            }
        }
        outcome
    }

    async fn run_send(controller: Weak<Self>, prompt: String) -> SendOutcome {
        let (simulator, response_timeout, pending) = {
            let Some(this) = controller.upgrade() else {
                return SendOutcome::Discarded;
            };
            let pending = match this.begin_send(prompt).await {
                Ok(pending) => pending,
                Err(outcome) => return outcome,
            };
            (
                Arc::clone(&this.simulator),
                this.options.response_timeout,
                pending,
            )
        };

        let generated = simulator.generate(&pending.prompt, &pending.model_name);
        let result = match response_timeout {
            Some(limit) => match tokio::time::timeout(limit, generated).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!(
                    "response from {} timed out after {}ms",
                    pending.model_name,
                    limit.as_millis()
                )),
            },
            None => generated.await,
        };

        let Some(this) = controller.upgrade() else {
            debug!(
                model = %pending.model_name,
                "controller dropped while awaiting response; discarding"
            );
            return SendOutcome::Discarded;
        };
        this.finish_send(pending, result).await
    }

    async fn begin_send(&self, prompt: String) -> std::result::Result<PendingSend, SendOutcome> {
        let mut guard = self.inner.lock().await;
        let Some(model_name) = guard.app.selected_model.as_ref().map(|m| m.name.clone()) else {
            return Err(SendOutcome::Skipped);
        };
        if prompt.trim().is_empty() {
            return Err(SendOutcome::Skipped);
        }
        if self.options.single_flight && guard.in_flight > 0 {
            debug!(session = %self.session_id, "send rejected while another is in flight");
            return Err(SendOutcome::Busy);
        }

        let message = guard.next_message(Role::User, prompt.clone(), Some(model_name.clone()));
        guard.in_flight += 1;
        self.apply_locked(&mut guard, Command::AddMessage(message));
        self.apply_locked(&mut guard, Command::SetLoading(true));
        self.apply_locked(&mut guard, Command::SetError(None));

        Ok(PendingSend {
            prompt,
            model_name,
            transcript_epoch: guard.transcript_epoch,
        })
    }

    async fn finish_send(&self, pending: PendingSend, result: Result<String>) -> SendOutcome {
        let mut guard = self.inner.lock().await;
        guard.in_flight = guard.in_flight.saturating_sub(1);
        let stale = guard.transcript_epoch != pending.transcript_epoch;

        let outcome = match result {
            _ if stale => {
                debug!(
                    session = %self.session_id,
                    model = %pending.model_name,
                    "transcript changed while awaiting response; discarding"
                );
                SendOutcome::Discarded
            }
            Ok(content) => {
                let message =
                    guard.next_message(Role::Assistant, content, Some(pending.model_name));
                let id = message.id;
                self.apply_locked(&mut guard, Command::AddMessage(message));
                SendOutcome::Replied(id)
            }
            Err(err) => {
                warn!(
                    session = %self.session_id,
                    model = %pending.model_name,
                    error = %err,
                    "response generation failed"
                );
                self.apply_locked(
                    &mut guard,
                    Command::SetError(Some(RESPONSE_FAILURE_MESSAGE.to_string())),
                );
                SendOutcome::Failed
            }
        };

        let still_loading = guard.in_flight > 0;
        self.apply_locked(&mut guard, Command::SetLoading(still_loading));
        outcome
    }

    pub async fn export_transcript(&self) -> TranscriptExport {
        let messages = self.inner.lock().await.app.messages.clone();
        TranscriptExport::new(messages, Utc::now())
    }

    /// Replaces the transcript with the messages of an exported document.
    pub async fn import_transcript(&self, raw: &str) -> std::result::Result<usize, TranscriptError> {
        let export = TranscriptExport::from_json(raw)?;
        let count = export.messages.len();
        self.dispatch(Command::RestoreTranscript(export.messages))
            .await;
        info!(session = %self.session_id, messages = count, "transcript imported");
        Ok(count)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
