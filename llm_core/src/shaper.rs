use crate::message::{ChatMessage, Part, Role, UpstreamMessage};

/// Build the message list for one generation call: the persona instruction
/// as a leading user turn, then the history in its original order.
pub fn shape(history: &[ChatMessage], instruction: &str) -> Vec<UpstreamMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(UpstreamMessage {
        role: Role::User,
        parts: vec![Part::text(instruction)],
    });

    messages.extend(history.iter().map(|msg| UpstreamMessage {
        role: match msg.role {
            Role::Model => Role::Model,
            _ => Role::User,
        },
        parts: msg.parts.clone(),
    }));

    messages
}
