use indexmap::IndexSet;

/// Upper bound on keywords kept per text.
pub const MAX_KEYWORDS: usize = 10;

/// Tokens must be longer than this many characters to count.
const MIN_TOKEN_CHARS: usize = 3;

/// Portuguese and English filler words never treated as keywords.
pub const STOP_WORDS: &[&str] = &[
    "que", "para", "com", "uma", "este", "esta", "esse", "essa", "the", "and", "for", "with",
    "this", "that", "from", "they", "como", "mais", "muito", "pode", "ser", "tem", "temos",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Extract up to [`MAX_KEYWORDS`] unique lowercase keywords in scan order.
///
/// Word characters are ASCII letters, digits and `_`; everything else splits
/// tokens, so accented letters break a word apart.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let unique: IndexSet<&str> = normalized
        .split_whitespace()
        .filter(|token| token.chars().count() > MIN_TOKEN_CHARS)
        .filter(|token| !is_stop_word(token))
        .collect();

    unique
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(str::to_owned)
        .collect()
}
