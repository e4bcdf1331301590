use super::*;
use crate::mock::{default_models, default_templates, MockCatalog, MockResponder};
use shared::parameters::{ParameterField, Parameters};
use tokio::sync::Notify;

/// Holds every response until the test releases it.
struct GatedSimulator {
    gate: Arc<Notify>,
    reply: std::result::Result<String, String>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl GatedSimulator {
    fn replying(reply: impl Into<String>) -> Self {
        Self {
            gate: Arc::new(Notify::new()),
            reply: Ok(reply.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ResponseSimulator for GatedSimulator {
    async fn generate(&self, prompt: &str, model_name: &str) -> Result<String> {
        self.calls
            .lock()
            .await
            .push((prompt.to_string(), model_name.to_string()));
        self.gate.notified().await;
        self.reply.clone().map_err(|err| anyhow!(err))
    }
}

struct TemplatesDownCatalog;

#[async_trait]
impl CatalogLoader for TemplatesDownCatalog {
    async fn get_models(&self) -> Result<Vec<Model>> {
        Ok(default_models())
    }

    async fn get_templates(&self) -> Result<Vec<Template>> {
        Err(anyhow!("templates endpoint down"))
    }
}

async fn controller_with(
    simulator: impl ResponseSimulator + 'static,
    options: ControllerOptions,
) -> Arc<StudioController> {
    StudioController::initialize(
        Arc::new(MockCatalog::instant()),
        Arc::new(simulator),
        options,
    )
    .await
}

async fn wait_for_loading(events: &mut broadcast::Receiver<StudioEvent>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let StudioEvent::LoadingChanged(true) = events.recv().await.expect("event stream") {
                return;
            }
        }
    })
    .await
    .expect("send should start");
}

#[tokio::test]
async fn initialize_loads_catalogs_and_selects_first_model() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    let state = controller.snapshot().await;

    assert_eq!(state.models, default_models());
    assert_eq!(state.templates, default_templates());
    assert_eq!(state.selected_model, Some(default_models()[0].clone()));
    assert!(state.error.is_none());
    assert!(!state.is_loading);
}

#[tokio::test]
async fn catalog_failure_surfaces_load_error_with_empty_catalogs() {
    let controller = StudioController::initialize(
        Arc::new(MockCatalog::failing("offline")),
        Arc::new(MockResponder::instant()),
        ControllerOptions::default(),
    )
    .await;
    let state = controller.snapshot().await;

    assert!(state.models.is_empty());
    assert!(state.templates.is_empty());
    assert!(state.selected_model.is_none());
    assert_eq!(state.error.as_deref(), Some(LOAD_FAILURE_MESSAGE));
}

#[tokio::test]
async fn one_failed_catalog_discards_both() {
    let controller = StudioController::initialize(
        Arc::new(TemplatesDownCatalog),
        Arc::new(MissingResponseSimulator),
        ControllerOptions::default(),
    )
    .await;
    let state = controller.snapshot().await;

    assert!(state.models.is_empty());
    assert!(state.templates.is_empty());
    assert_eq!(state.error.as_deref(), Some(LOAD_FAILURE_MESSAGE));
}

#[tokio::test]
async fn reload_keeps_existing_selection() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    let target = default_models()[3].clone();
    assert!(controller.select_model(&target.id).await);

    assert!(controller.load_catalogs().await);
    assert_eq!(controller.snapshot().await.selected_model, Some(target));
}

#[tokio::test]
async fn selecting_unknown_model_changes_nothing() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    let before = controller.snapshot().await;
    assert!(!controller.select_model(&ModelId::new("no-such-model")).await);
    assert_eq!(controller.snapshot().await, before);
}

#[tokio::test]
async fn blank_prompt_send_is_a_no_op() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    let before = controller.snapshot().await;

    assert_eq!(controller.send_message("").await, SendOutcome::Skipped);
    assert_eq!(controller.send_message("  \n\t").await, SendOutcome::Skipped);
    assert_eq!(controller.snapshot().await, before);
}

#[tokio::test]
async fn send_without_selected_model_is_a_no_op() {
    let controller = StudioController::initialize(
        Arc::new(MissingCatalogLoader),
        Arc::new(MockResponder::instant()),
        ControllerOptions::default(),
    )
    .await;
    let before = controller.snapshot().await;

    assert_eq!(controller.send_message("hello").await, SendOutcome::Skipped);
    assert_eq!(controller.snapshot().await, before);
}

#[tokio::test]
async fn send_appends_user_message_then_assistant_reply() {
    let simulator = GatedSimulator::replying("simulated reply");
    let gate = Arc::clone(&simulator.gate);
    let calls = Arc::clone(&simulator.calls);
    let controller = controller_with(simulator, ControllerOptions::default()).await;
    let mut events = controller.subscribe_events();

    let handle = controller.spawn_send("What is ownership?");
    wait_for_loading(&mut events).await;

    let during = controller.snapshot().await;
    assert_eq!(during.messages.len(), 1);
    assert_eq!(during.messages[0].role, Role::User);
    assert_eq!(during.messages[0].content, "What is ownership?");
    assert_eq!(during.messages[0].model.as_deref(), Some("GPT-4"));
    assert!(during.is_loading);
    assert!(during.error.is_none());

    gate.notify_one();
    let outcome = handle.await.expect("join");

    let after = controller.snapshot().await;
    assert_eq!(after.messages.len(), 2);
    let reply = &after.messages[1];
    assert_eq!(outcome, SendOutcome::Replied(reply.id));
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "simulated reply");
    assert_eq!(reply.model.as_deref(), Some("GPT-4"));
    assert!(reply.id > after.messages[0].id);
    assert!(!after.is_loading);

    let calls = calls.lock().await;
    assert_eq!(
        calls.as_slice(),
        &[("What is ownership?".to_string(), "GPT-4".to_string())]
    );
}

#[tokio::test]
async fn failed_response_sets_error_without_assistant_message() {
    let controller = controller_with(
        MockResponder::failing("backend exploded"),
        ControllerOptions::default(),
    )
    .await;

    assert_eq!(controller.send_message("hello").await, SendOutcome::Failed);

    let state = controller.snapshot().await;
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].role, Role::User);
    assert_eq!(state.error.as_deref(), Some(RESPONSE_FAILURE_MESSAGE));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn new_send_clears_previous_error() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    controller
        .dispatch(Command::SetError(Some("stale".into())))
        .await;

    let outcome = controller.send_message("hello").await;
    assert!(matches!(outcome, SendOutcome::Replied(_)));
    assert!(controller.snapshot().await.error.is_none());
}

#[tokio::test]
async fn second_send_is_rejected_while_first_is_in_flight() {
    let simulator = GatedSimulator::replying("first reply");
    let gate = Arc::clone(&simulator.gate);
    let controller = controller_with(simulator, ControllerOptions::default()).await;
    let mut events = controller.subscribe_events();

    let first = controller.spawn_send("first");
    wait_for_loading(&mut events).await;

    assert_eq!(controller.send_message("second").await, SendOutcome::Busy);
    assert_eq!(controller.snapshot().await.messages.len(), 1);

    gate.notify_one();
    assert!(matches!(first.await.expect("join"), SendOutcome::Replied(_)));
    assert_eq!(controller.snapshot().await.messages.len(), 2);
}

#[tokio::test]
async fn overlapping_sends_keep_loading_until_the_last_one_settles() {
    let simulator = GatedSimulator::replying("reply");
    let gate = Arc::clone(&simulator.gate);
    let calls = Arc::clone(&simulator.calls);
    let controller = controller_with(
        simulator,
        ControllerOptions {
            single_flight: false,
            response_timeout: None,
        },
    )
    .await;

    let first = controller.spawn_send("first");
    let second = controller.spawn_send("second");
    tokio::time::timeout(Duration::from_secs(5), async {
        while calls.lock().await.len() < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("both sends should reach the simulator");
    assert_eq!(controller.snapshot().await.messages.len(), 2);

    gate.notify_one();
    let settled_first = tokio::select! {
        outcome = first => outcome.expect("join"),
        outcome = second => outcome.expect("join"),
    };
    assert!(matches!(settled_first, SendOutcome::Replied(_)));
    assert!(controller.snapshot().await.is_loading);

    gate.notify_one();
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.snapshot().await.is_loading {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("second send should settle");

    let state = controller.snapshot().await;
    assert_eq!(state.messages.len(), 4);
    assert!(state
        .messages
        .windows(2)
        .all(|pair| pair[0].id < pair[1].id));
}

#[tokio::test]
async fn response_after_controller_drop_is_discarded() {
    let simulator = GatedSimulator::replying("too late");
    let gate = Arc::clone(&simulator.gate);
    let controller = controller_with(simulator, ControllerOptions::default()).await;
    let mut events = controller.subscribe_events();

    let handle = controller.spawn_send("hello");
    wait_for_loading(&mut events).await;
    drop(controller);

    gate.notify_one();
    assert_eq!(handle.await.expect("join"), SendOutcome::Discarded);
}

#[tokio::test]
async fn response_after_clear_chat_is_discarded() {
    let simulator = GatedSimulator::replying("orphaned");
    let gate = Arc::clone(&simulator.gate);
    let controller = controller_with(simulator, ControllerOptions::default()).await;
    let mut events = controller.subscribe_events();

    let handle = controller.spawn_send("hello");
    wait_for_loading(&mut events).await;
    controller.clear_chat().await;

    gate.notify_one();
    assert_eq!(handle.await.expect("join"), SendOutcome::Discarded);

    let state = controller.snapshot().await;
    assert!(state.messages.is_empty());
    assert!(state.error.is_none());
    assert!(!state.is_loading);
}

#[tokio::test]
async fn stalled_response_fails_after_timeout() {
    let controller = controller_with(
        GatedSimulator::replying("never"),
        ControllerOptions {
            single_flight: true,
            response_timeout: Some(Duration::from_millis(20)),
        },
    )
    .await;

    assert_eq!(controller.send_message("hello").await, SendOutcome::Failed);
    let state = controller.snapshot().await;
    assert_eq!(state.error.as_deref(), Some(RESPONSE_FAILURE_MESSAGE));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn submit_prompt_sends_trimmed_draft_and_clears_it() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    controller.set_prompt("  explain traits  ").await;

    let outcome = controller.submit_prompt().await;
    assert!(matches!(outcome, SendOutcome::Replied(_)));

    let state = controller.snapshot().await;
    assert_eq!(state.messages[0].content, "explain traits");
    assert_eq!(state.prompt, "");
}

#[tokio::test]
async fn draft_edited_during_send_survives_completion() {
    let simulator = GatedSimulator::replying("reply");
    let gate = Arc::clone(&simulator.gate);
    let controller = controller_with(simulator, ControllerOptions::default()).await;
    let mut events = controller.subscribe_events();
    controller.set_prompt("first question").await;

    let submitting = Arc::clone(&controller);
    let handle = tokio::spawn(async move { submitting.submit_prompt().await });
    wait_for_loading(&mut events).await;
    controller.set_prompt("follow-up being typed").await;

    gate.notify_one();
    assert!(matches!(handle.await.expect("join"), SendOutcome::Replied(_)));

    let state = controller.snapshot().await;
    assert_eq!(state.messages[0].content, "first question");
    assert_eq!(state.prompt, "follow-up being typed");
}

#[tokio::test]
async fn busy_submit_leaves_the_pending_draft_alone() {
    let simulator = GatedSimulator::replying("reply");
    let gate = Arc::clone(&simulator.gate);
    let controller = controller_with(simulator, ControllerOptions::default()).await;
    let mut events = controller.subscribe_events();

    let first = controller.spawn_send("first");
    wait_for_loading(&mut events).await;
    controller.set_prompt("second").await;
    assert_eq!(controller.submit_prompt().await, SendOutcome::Busy);
    assert_eq!(controller.snapshot().await.prompt, "second");

    gate.notify_one();
    assert!(matches!(first.await.expect("join"), SendOutcome::Replied(_)));
    assert_eq!(controller.snapshot().await.prompt, "second");
}

#[tokio::test]
async fn discarded_submit_still_consumes_the_draft() {
    let simulator = GatedSimulator::replying("orphaned");
    let gate = Arc::clone(&simulator.gate);
    let controller = controller_with(
        simulator,
        ControllerOptions {
            single_flight: false,
            response_timeout: None,
        },
    )
    .await;
    let mut events = controller.subscribe_events();
    controller.set_prompt("question").await;

    let submitting = Arc::clone(&controller);
    let handle = tokio::spawn(async move { submitting.submit_prompt().await });
    wait_for_loading(&mut events).await;
    controller.clear_chat().await;

    gate.notify_one();
    assert_eq!(handle.await.expect("join"), SendOutcome::Discarded);
    let state = controller.snapshot().await;
    assert!(state.messages.is_empty());
    assert_eq!(state.prompt, "");
}

#[tokio::test]
async fn submit_prompt_with_blank_draft_keeps_draft() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    controller.set_prompt("   ").await;

    assert_eq!(controller.submit_prompt().await, SendOutcome::Skipped);
    assert_eq!(controller.snapshot().await.prompt, "   ");
}

#[tokio::test]
async fn load_template_replaces_draft_with_template_body() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    let template = default_templates()[1].clone();
    controller.set_prompt("old draft").await;

    assert!(controller.load_template(&template.id).await);
    assert_eq!(controller.snapshot().await.prompt, template.content);

    assert!(!controller.load_template(&TemplateId::new("missing")).await);
    assert_eq!(controller.snapshot().await.prompt, template.content);
}

#[tokio::test]
async fn parameter_updates_merge_and_clamp() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    controller
        .update_parameters(ParameterPatch::field(ParameterField::Temperature, 1.1))
        .await;
    controller
        .update_parameters(ParameterPatch::field(ParameterField::MaxTokens, 10_000.0))
        .await;

    let params = controller.snapshot().await.parameters;
    let expected = Parameters::default()
        .merged(&ParameterPatch::field(ParameterField::Temperature, 1.1))
        .merged(&ParameterPatch::field(ParameterField::MaxTokens, 4096.0));
    assert_eq!(params, expected);
    assert!(params.is_within_domain());
}

#[tokio::test]
async fn clear_chat_preserves_model_parameters_and_draft() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    controller.send_message("hello").await;
    controller
        .update_parameters(ParameterPatch::field(ParameterField::TopP, 0.4))
        .await;
    controller.set_prompt("next question").await;
    let before = controller.snapshot().await;

    controller.clear_chat().await;
    let after = controller.snapshot().await;
    assert!(after.messages.is_empty());
    assert_eq!(after.selected_model, before.selected_model);
    assert_eq!(after.parameters, before.parameters);
    assert_eq!(after.prompt, before.prompt);
}

#[tokio::test]
async fn export_counts_messages_and_reimports_field_for_field() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    for prompt in ["one", "two", "three"] {
        controller.send_message(prompt).await;
    }

    let export = controller.export_transcript().await;
    let live = controller.snapshot().await.messages;
    assert_eq!(export.message_count, live.len());
    assert_eq!(export.messages, live);

    let json = export.to_json_pretty().expect("json");
    let restored = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    assert_eq!(restored.import_transcript(&json).await.expect("import"), 6);
    assert_eq!(restored.snapshot().await.messages, live);

    restored.send_message("after import").await;
    let messages = restored.snapshot().await.messages;
    assert!(messages[6].id > live[5].id);
}

#[tokio::test]
async fn malformed_import_leaves_transcript_untouched() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    controller.send_message("keep me").await;
    let before = controller.snapshot().await;

    let err = controller
        .import_transcript("{\"messages\": 3}")
        .await
        .expect_err("should fail");
    assert!(matches!(err, TranscriptError::Malformed(_)));
    assert_eq!(controller.snapshot().await, before);
}

#[tokio::test]
async fn import_with_unfollowable_id_is_rejected_and_sends_keep_working() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    let raw = r#"{
        "messages": [
            {"id": "9223372036854775807", "role": "user", "content": "hi", "timestamp": "2024-05-01T10:00:00.000Z"}
        ],
        "timestamp": "2024-05-01T10:00:30.000Z",
        "messageCount": 1
    }"#;

    let err = controller.import_transcript(raw).await.expect_err("should fail");
    assert!(matches!(err, TranscriptError::IdOutOfRange { index: 0, .. }));
    assert!(controller.snapshot().await.messages.is_empty());

    assert!(matches!(
        controller.send_message("after").await,
        SendOutcome::Replied(_)
    ));
    let messages = controller.snapshot().await.messages;
    assert_eq!(messages.len(), 2);
    assert!(messages[0].id < messages[1].id);
}

#[tokio::test]
async fn events_follow_send_protocol_order() {
    let controller = controller_with(MockResponder::instant(), ControllerOptions::default()).await;
    let mut events = controller.subscribe_events();

    controller.send_message("trace me").await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen[0], StudioEvent::MessageAppended(ref m) if m.role == Role::User));
    assert_eq!(seen[1], StudioEvent::LoadingChanged(true));
    assert_eq!(seen[2], StudioEvent::ErrorChanged(None));
    assert!(matches!(seen[3], StudioEvent::MessageAppended(ref m) if m.role == Role::Assistant));
    assert_eq!(seen[4], StudioEvent::LoadingChanged(false));
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn each_controller_gets_its_own_session_id() {
    let first = StudioController::new(
        Arc::new(MissingCatalogLoader),
        Arc::new(MissingResponseSimulator),
    );
    let second = StudioController::new(
        Arc::new(MissingCatalogLoader),
        Arc::new(MissingResponseSimulator),
    );
    assert_ne!(first.session_id(), second.session_id());
    assert!(first.snapshot().await.models.is_empty());
}
