// ABOUTME: Tests for conversation summaries: when they run, what the model sees, and where they land
// ABOUTME: Drives the engine directly so the background compaction task can be awaited
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{text_reply, user, ScriptedBackend, TestApp, ASESOR_ID, OTHER_ASESOR_ID};
use syntia_chat::{
    chat::{EventSink, SendMessage, TurnResult},
    constants::messages::{PREVIOUS_SUMMARIES_HEADER, SUMMARY_ACK},
    llm::{Content, ContentRole, GenerateRequest},
    models::{HistoryMessage, UserRole},
};
use uuid::Uuid;

fn history(count: usize) -> Vec<HistoryMessage> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                HistoryMessage::user(format!("pregunta {i}"))
            } else {
                HistoryMessage::assistant(format!("respuesta {i}"))
            }
        })
        .collect()
}

fn text_of(content: &Content) -> &str {
    content.parts[0].text.as_deref().unwrap_or_default()
}

fn system_text(request: &GenerateRequest) -> &str {
    request
        .system_instruction
        .as_ref()
        .and_then(|instruction| instruction.parts.first())
        .and_then(|part| part.text.as_deref())
        .unwrap_or_default()
}

async fn turn(app: &TestApp, conversation_id: Option<Uuid>, message: &str) -> TurnResult {
    let prepared = app
        .engine
        .prepare(
            user(ASESOR_ID, UserRole::Asesor),
            SendMessage {
                message: message.to_owned(),
                conversation_id: conversation_id.map(|id| id.to_string()),
                context_client_id: None,
            },
        )
        .await
        .unwrap();
    app.engine
        .complete(prepared, &EventSink::disabled())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_first_summary_written_at_threshold() {
    let app = TestApp::new(
        ScriptedBackend::new(vec![Ok(text_reply("Claro, aqui esta."))])
            .with_summary("El asesor revisa inventario de MED-1."),
    );
    let conversation_id = app.store.seed_conversation(ASESOR_ID, None, &history(6));

    let result = turn(&app, Some(conversation_id), "Y el inventario?").await;
    result.compaction.expect("compaction scheduled").await.unwrap();

    assert_eq!(
        app.store.conversation(conversation_id).unwrap().summary.as_deref(),
        Some("El asesor revisa inventario de MED-1.")
    );

    let compaction = &app.backend.compaction_requests()[0];
    assert_eq!(compaction.contents.len(), 8);
    assert_eq!(text_of(&compaction.contents[0]), "pregunta 0");
    assert_eq!(text_of(&compaction.contents[6]), "Y el inventario?");
    assert_eq!(compaction.contents[7].role, ContentRole::Model);
    assert_eq!(text_of(&compaction.contents[7]), "Claro, aqui esta.");
    // summaries are plain text requests
    assert!(compaction.tools.is_empty());
}

#[tokio::test]
async fn test_short_conversation_is_not_summarized() {
    let app = TestApp::new(ScriptedBackend::new(vec![Ok(text_reply("Hola"))]));
    let conversation_id = app.store.seed_conversation(ASESOR_ID, None, &history(2));

    let result = turn(&app, Some(conversation_id), "Otra pregunta").await;

    assert!(result.compaction.is_none());
    assert!(app.backend.compaction_requests().is_empty());
    assert_eq!(app.store.message_count(conversation_id), 4);
}

#[tokio::test]
async fn test_refresh_builds_on_previous_summary() {
    let app = TestApp::new(
        ScriptedBackend::new(vec![Ok(text_reply("Siguiente paso."))]).with_summary("Resumen nuevo"),
    );
    let conversation_id = app
        .store
        .seed_conversation(ASESOR_ID, Some("Resumen viejo"), &history(14));

    let result = turn(&app, Some(conversation_id), "Que sigue?").await;

    // the chat transcript already uses the stored summary
    let chat = &app.backend.requests()[0];
    assert_eq!(chat.contents.len(), 7);
    assert_eq!(text_of(&chat.contents[0]), "[Resumen previo: Resumen viejo]");
    assert_eq!(text_of(&chat.contents[1]), SUMMARY_ACK);
    assert_eq!(text_of(&chat.contents[2]), "pregunta 10");

    result.compaction.expect("refresh scheduled").await.unwrap();
    let compaction = &app.backend.compaction_requests()[0];
    assert_eq!(text_of(&compaction.contents[0]), "[Resumen previo: Resumen viejo]");
    assert_eq!(text_of(&compaction.contents[1]), SUMMARY_ACK);
    assert_eq!(compaction.contents.len(), 18);
    assert_eq!(
        app.store.conversation(conversation_id).unwrap().summary.as_deref(),
        Some("Resumen nuevo")
    );
}

#[tokio::test]
async fn test_summarized_conversation_waits_for_next_interval() {
    let app = TestApp::new(ScriptedBackend::new(vec![Ok(text_reply("Ok"))]));
    let conversation_id = app
        .store
        .seed_conversation(ASESOR_ID, Some("Resumen"), &history(10));

    let result = turn(&app, Some(conversation_id), "Algo mas").await;

    assert!(result.compaction.is_none());
}

#[tokio::test]
async fn test_failed_compaction_leaves_turn_intact() {
    // no summary scripted, so the compaction call fails
    let app = TestApp::new(ScriptedBackend::new(vec![Ok(text_reply("Respuesta"))]));
    let conversation_id = app.store.seed_conversation(ASESOR_ID, None, &history(6));

    let result = turn(&app, Some(conversation_id), "Pregunta").await;
    assert!(result.message_id.is_some());
    result.compaction.expect("compaction scheduled").await.unwrap();

    assert_eq!(app.store.conversation(conversation_id).unwrap().summary, None);
    assert_eq!(app.store.message_count(conversation_id), 8);
}

#[tokio::test]
async fn test_blank_summary_is_not_stored() {
    let app = TestApp::new(ScriptedBackend::new(vec![Ok(text_reply("Respuesta"))]).with_summary("  "));
    let conversation_id = app.store.seed_conversation(ASESOR_ID, None, &history(6));

    let result = turn(&app, Some(conversation_id), "Pregunta").await;
    result.compaction.expect("compaction scheduled").await.unwrap();

    assert_eq!(app.store.conversation(conversation_id).unwrap().summary, None);
}

#[tokio::test]
async fn test_new_conversation_sees_own_previous_summaries() {
    let app = TestApp::new(ScriptedBackend::new(vec![Ok(text_reply("Hola de nuevo"))]));
    app.store
        .seed_conversation(ASESOR_ID, Some("Hablamos de acne"), &history(2));
    app.store
        .seed_conversation(OTHER_ASESOR_ID, Some("Tema ajeno"), &history(2));

    let result = turn(&app, None, "Retomemos").await;
    assert!(result.compaction.is_none());

    let system = system_text(&app.backend.requests()[0]).to_owned();
    assert!(system.contains(&format!("{PREVIOUS_SUMMARIES_HEADER}\n- Hablamos de acne")));
    assert!(system.contains("USUARIO: id_usuario=asesor-1, rol=ASESOR"));
    assert!(!system.contains("Tema ajeno"));
}
