use std::{sync::Arc, time::Duration};

use shared::{
    domain::{ModelId, Role, TemplateId},
    parameters::{ParameterField, ParameterPatch},
    protocol::TranscriptExport,
};
use studio_core::{
    mock::{MockCatalog, MockResponder},
    ControllerOptions, SendOutcome, StudioController, StudioEvent, ALL_CATEGORIES,
};

#[tokio::test]
async fn compose_send_export_and_clear_with_mock_collaborators() {
    let catalog = MockCatalog::new().with_latency(Duration::from_millis(5), Duration::from_millis(3));
    let responder = MockResponder::new().with_latency(Duration::from_millis(5));
    let controller =
        StudioController::initialize(Arc::new(catalog), Arc::new(responder), ControllerOptions::default())
            .await;
    let mut events = controller.subscribe_events();

    let state = controller.snapshot().await;
    assert_eq!(state.template_categories()[0], ALL_CATEGORIES);
    assert_eq!(state.templates_in_category("Development").len(), 1);

    assert!(controller.select_model(&ModelId::new("claude-3-sonnet")).await);
    controller
        .update_parameters(
            ParameterPatch::field(ParameterField::Temperature, 0.2)
                .with(ParameterField::MaxTokens, 1024.0),
        )
        .await;
    assert!(controller.load_template(&TemplateId::new("code-reviewer")).await);
    assert!(controller.snapshot().await.can_send());

    let outcome = controller.submit_prompt().await;
    assert!(matches!(outcome, SendOutcome::Replied(_)));

    let state = controller.snapshot().await;
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].role, Role::User);
    assert!(state.messages[0].content.starts_with("You are an expert code reviewer."));
    assert_eq!(state.messages[1].model.as_deref(), Some("Claude 3 Sonnet"));
    assert!(state.messages[1].content.contains("Claude 3 Sonnet"));
    assert_eq!(state.parameters.max_tokens(), 1024);
    assert!(state.prompt.is_empty());

    let mut saw_reply = false;
    while let Ok(event) = events.try_recv() {
        if let StudioEvent::MessageAppended(message) = event {
            saw_reply |= message.role == Role::Assistant;
        }
    }
    assert!(saw_reply);

    let export = controller.export_transcript().await;
    let json = export.to_json_pretty().expect("json");
    let parsed = TranscriptExport::from_json(&json).expect("parse export");
    assert_eq!(parsed.message_count, 2);
    assert_eq!(parsed.messages, state.messages);
    assert!(export.file_name().starts_with("chat-export-"));

    controller.clear_chat().await;
    let cleared = controller.snapshot().await;
    assert!(cleared.messages.is_empty());
    assert_eq!(
        cleared.selected_model.map(|model| model.id),
        Some(ModelId::new("claude-3-sonnet"))
    );
    assert_eq!(controller.export_transcript().await.message_count, 0);
}
