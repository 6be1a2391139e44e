// ABOUTME: Builds the model transcript from stored history, the rolling summary and the new message
// ABOUTME: Guarantees a user-first transcript with no two adjacent turns of the same role
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use syntia_core::constants::messages::{SUMMARY_ACK, SUMMARY_TURN_PREFIX, SUMMARY_TURN_SUFFIX};
use syntia_core::models::{ConversationHistory, HistoryMessage, MessageRole};

use crate::llm::{Content, ContentRole};

/// How much raw history goes into a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Raw messages used when there is no summary
    pub max_messages: usize,
    /// Raw messages kept after the summary turns
    pub recent_with_summary: usize,
}

const fn content_role(role: MessageRole) -> ContentRole {
    match role {
        MessageRole::User => ContentRole::User,
        MessageRole::Assistant => ContentRole::Model,
    }
}

fn tail(messages: &[HistoryMessage], count: usize) -> &[HistoryMessage] {
    &messages[messages.len().saturating_sub(count)..]
}

/// Transcript for the next model call
///
/// With a summary and more than `recent_with_summary` messages the transcript
/// starts with a synthetic summary turn and its acknowledgement followed by the
/// most recent messages; otherwise the last `max_messages` are used verbatim.
#[must_use]
pub fn build_transcript(
    history: &ConversationHistory,
    new_message: &str,
    window: HistoryWindow,
) -> Vec<Content> {
    let mut turns: Vec<(ContentRole, String)> = Vec::new();

    match history.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(summary) if history.messages.len() > window.recent_with_summary => {
            turns.push((
                ContentRole::User,
                format!("{SUMMARY_TURN_PREFIX}{summary}{SUMMARY_TURN_SUFFIX}"),
            ));
            turns.push((ContentRole::Model, SUMMARY_ACK.to_owned()));
            turns.extend(
                tail(&history.messages, window.recent_with_summary)
                    .iter()
                    .map(|m| (content_role(m.role), m.content.clone())),
            );
        }
        _ => turns.extend(
            tail(&history.messages, window.max_messages)
                .iter()
                .map(|m| (content_role(m.role), m.content.clone())),
        ),
    }

    turns.push((ContentRole::User, new_message.to_owned()));
    merge_turns(turns)
}

/// Drop a leading model turn and join adjacent same-role turns with a newline
#[must_use]
pub fn merge_turns(turns: Vec<(ContentRole, String)>) -> Vec<Content> {
    let mut merged: Vec<(ContentRole, String)> = Vec::with_capacity(turns.len());

    for (role, text) in turns {
        if merged.is_empty() && role == ContentRole::Model {
            continue;
        }
        match merged.last_mut() {
            Some((last_role, last_text)) if *last_role == role => {
                last_text.push('\n');
                last_text.push_str(&text);
            }
            _ => merged.push((role, text)),
        }
    }

    merged
        .into_iter()
        .map(|(role, text)| match role {
            ContentRole::User => Content::user_text(text),
            ContentRole::Model => Content::model_text(text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: HistoryWindow = HistoryWindow {
        max_messages: 8,
        recent_with_summary: 4,
    };

    fn text_of(content: &Content) -> &str {
        content.parts[0].text.as_deref().unwrap_or_default()
    }

    #[test]
    fn test_summary_replaces_older_messages() {
        let history = ConversationHistory {
            summary: Some("Hablamos de rosacea".to_owned()),
            messages: (0..6)
                .map(|i| {
                    if i % 2 == 0 {
                        HistoryMessage::user(format!("u{i}"))
                    } else {
                        HistoryMessage::assistant(format!("a{i}"))
                    }
                })
                .collect(),
        };

        let transcript = build_transcript(&history, "nueva", WINDOW);
        assert_eq!(transcript.len(), 7);
        assert_eq!(text_of(&transcript[0]), "[Resumen previo: Hablamos de rosacea]");
        assert_eq!(text_of(&transcript[1]), "Entendido, tengo el contexto.");
        assert_eq!(text_of(&transcript[2]), "u2");
        assert_eq!(text_of(&transcript[6]), "nueva");
    }

    #[test]
    fn test_leading_model_turn_dropped_and_roles_merged() {
        let history = ConversationHistory {
            summary: None,
            messages: vec![
                HistoryMessage::assistant("hola"),
                HistoryMessage::user("uno"),
                HistoryMessage::user("dos"),
            ],
        };

        let transcript = build_transcript(&history, "tres", WINDOW);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, ContentRole::User);
        assert_eq!(text_of(&transcript[0]), "uno\ndos\ntres");
    }

    #[test]
    fn test_short_history_with_summary_is_verbatim() {
        let history = ConversationHistory {
            summary: Some("resumen".to_owned()),
            messages: vec![HistoryMessage::user("a"), HistoryMessage::assistant("b")],
        };
        let transcript = build_transcript(&history, "c", WINDOW);
        assert_eq!(transcript.len(), 3);
        assert_eq!(text_of(&transcript[0]), "a");
    }
}
