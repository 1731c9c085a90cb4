use thiserror::Error;

use crate::llm_client::ChatMessage;

const KNOWN_ROLES: [&str; 3] = ["system", "user", "assistant"];

#[derive(Debug, PartialEq, Error)]
pub enum HistoryError {
    #[error("At least one message is required")]
    Empty,

    #[error("Message {index} has unknown role '{role}'")]
    UnknownRole { index: usize, role: String },

    #[error("Message {index} has empty content")]
    EmptyContent { index: usize },
}

/// Validates a client-supplied conversation and trims it to the leading system
/// message (if any) plus the `max_messages` most recent others.
pub fn prepare_history(
    messages: Vec<ChatMessage>,
    max_messages: usize,
) -> Result<Vec<ChatMessage>, HistoryError> {
    if messages.is_empty() {
        return Err(HistoryError::Empty);
    }

    let mut normalized = Vec::with_capacity(messages.len());
    for (index, message) in messages.into_iter().enumerate() {
        let role = message.role.trim().to_ascii_lowercase();
        if !KNOWN_ROLES.contains(&role.as_str()) {
            return Err(HistoryError::UnknownRole {
                index,
                role: message.role,
            });
        }
        if message.content.trim().is_empty() {
            return Err(HistoryError::EmptyContent { index });
        }
        normalized.push(ChatMessage {
            role,
            content: message.content,
        });
    }

    let system = match normalized.first() {
        Some(first) if first.role == "system" => Some(normalized.remove(0)),
        _ => None,
    };
    if normalized.is_empty() {
        return Err(HistoryError::Empty);
    }

    let keep_from = normalized.len().saturating_sub(max_messages.max(1));
    let mut history: Vec<ChatMessage> = system.into_iter().collect();
    history.extend(normalized.drain(keep_from..));
    Ok(history)
}
