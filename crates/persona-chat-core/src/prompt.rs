//! Persona prompt assembly.

use crate::message::{ChatMessage, Mode};

/// Build the sequence sent to the provider: the persona's system instruction
/// followed by the caller's (already validated) messages.
///
/// The input slice is left untouched.
pub fn assemble(mode: Mode, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut full = Vec::with_capacity(messages.len() + 1);
    full.push(ChatMessage::system(mode.system_prompt()));
    full.extend_from_slice(messages);
    full
}
