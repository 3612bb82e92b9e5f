use drekee_protocol::ContextTag;

/// Trigger substrings per tag, in classification priority order.
pub const CONTEXT_TRIGGERS: &[(ContextTag, &[&str])] = &[
    (
        ContextTag::Code,
        &[
            "function", "class", "const", "let", "var", "import", "export", "def", "return",
        ],
    ),
    (
        ContextTag::Debug,
        &["error", "bug", "erro", "problema", "não funciona", "falha"],
    ),
    (
        ContextTag::Help,
        &["ajuda", "como", "explica", "mostra", "ensina"],
    ),
    (
        ContextTag::Create,
        &["criar", "novo", "gerar", "build", "make"],
    ),
    (
        ContextTag::Fix,
        &["consertar", "arrumar", "corrigir", "fix", "repair"],
    ),
];

/// Classify `text` by the first tag whose trigger appears as a substring of
/// the lowercased text; [`ContextTag::General`] when none match.
pub fn detect_context(text: &str) -> ContextTag {
    let lowered = text.to_lowercase();
    CONTEXT_TRIGGERS
        .iter()
        .find(|(_, triggers)| triggers.iter().any(|trigger| lowered.contains(trigger)))
        .map(|(tag, _)| *tag)
        .unwrap_or(ContextTag::General)
}
