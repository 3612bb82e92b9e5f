use drekee_protocol::{ChatFile, PromptMessage, ScoredTurn};

use crate::persona::{MEMORY_CONTEXT_FOOTER, MEMORY_CONTEXT_HEADER};

/// Numbered `ROLE: "content" (Contexto: tag)` lines for the persona, or an
/// empty string when nothing is relevant.
pub fn render_memory_context(memory: &[ScoredTurn]) -> String {
    if memory.is_empty() {
        return String::new();
    }

    let mut rendered = format!("\n\n{MEMORY_CONTEXT_HEADER}\n");
    for (index, scored) in memory.iter().enumerate() {
        let turn = &scored.turn;
        rendered.push_str(&format!(
            "{}. {}: \"{}\" (Contexto: {})\n",
            index + 1,
            turn.role.as_str().to_uppercase(),
            turn.content,
            turn.context
        ));
    }
    rendered.push('\n');
    rendered.push_str(MEMORY_CONTEXT_FOOTER);
    rendered
}

/// Every file as a `---FILE: name---` block, blocks separated by a blank line.
pub fn render_file_block(files: &[ChatFile]) -> Option<String> {
    if files.is_empty() {
        return None;
    }
    let blocks: Vec<String> = files
        .iter()
        .map(|file| format!("---FILE: {}---\n{}\n---END FILE---", file.name, file.content))
        .collect();
    Some(blocks.join("\n\n"))
}

/// Builds the ordered message list for one model call:
/// `[persona + memory, file block?, ...history, user]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptComposer;

impl PromptComposer {
    pub fn compose(
        persona: &str,
        memory: &[ScoredTurn],
        files: &[ChatFile],
        history: &[PromptMessage],
        user_message: &str,
    ) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(PromptMessage::system(format!(
            "{persona}{}",
            render_memory_context(memory)
        )));
        if let Some(block) = render_file_block(files) {
            messages.push(PromptMessage::system(block));
        }
        messages.extend(history.iter().cloned());
        messages.push(PromptMessage::user(user_message));
        messages
    }
}
