//! Prompts and tolerant parsers for the two auxiliary helper calls:
//! thinking-step labels shown before an answer and follow-up suggestions
//! shown after it.

use drekee_protocol::PromptMessage;
use serde_json::Value;

pub const MAX_THINKING_STEPS: usize = 10;
pub const MAX_FOLLOW_UPS: usize = 3;

pub const DEFAULT_THINKING_STEPS: &[&str] = &[
    "Analisando a pergunta",
    "Consultando modelo Llama 3",
    "Processando dados",
    "Estruturando resposta",
];

const THINKING_SYSTEM: &str = "Você é um gerador de checklist de pensamento. Baseado na pergunta/tarefa do usuário, gere de 3 a 10 etapas de pensamento que uma IA deveria fazer para responder bem. Retorne APENAS um JSON array com objetos {step: \"texto da etapa\"}. Exemplo: [{\"step\": \"Analisando a pergunta\"}, {\"step\": \"Consultando dados\"}]";

const FOLLOW_UP_SYSTEM: &str = "Você é um especialista em gerar sugestões de acompanhamento relevantes e naturais para conversas. Sempre retorne exatamente 3 sugestões em formato JSON array.";

fn prefix_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

pub fn thinking_checks_prompt(user_message: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(THINKING_SYSTEM),
        PromptMessage::user(format!(
            "Gere os passos de pensamento para esta tarefa: \"{}\"",
            prefix_chars(user_message, 200)
        )),
    ]
}

pub fn follow_ups_prompt(user_message: &str, response: &str) -> Vec<PromptMessage> {
    let prompt = format!(
        "Você é um assistente de IA. Baseado na conversa abaixo, gere EXATAMENTE 3 sugestões de próximas perguntas que o USUÁRIO poderia fazer para você. As sugestões devem ser:

- Na perspectiva do USUÁRIO falando com a IA
- Perguntas naturais e relevantes
- Baseadas no contexto da conversa
- Escritas como se o usuário estivesse perguntando

Conversa:
Usuário perguntou: \"{user_message}\"
Você respondeu: \"{}...\"

Exemplos de como devem ser:
- \"Como funciona [tópico mencionado]?\"
- \"Pode me explicar mais sobre [assunto]?\"
- \"O que você acha de [ideia relacionada]?\"

Responda APENAS com um JSON array contendo 3 strings, sem texto adicional:
[\"pergunta do usuário 1\", \"pergunta do usuário 2\", \"pergunta do usuário 3\"]",
        prefix_chars(response, 500)
    );
    vec![
        PromptMessage::system(FOLLOW_UP_SYSTEM),
        PromptMessage::user(prompt),
    ]
}

pub fn default_thinking_steps() -> Vec<String> {
    DEFAULT_THINKING_STEPS
        .iter()
        .map(|step| (*step).to_owned())
        .collect()
}

fn step_label(value: &Value) -> Option<String> {
    let label = match value {
        Value::String(text) => text.as_str(),
        Value::Object(map) => map.get("step")?.as_str()?,
        _ => return None,
    };
    let label = label.trim();
    (!label.is_empty()).then(|| label.to_owned())
}

fn first_bracketed(text: &str) -> Option<&str> {
    let open = text.find('[')?;
    let close = text[open..].find(']')? + open;
    Some(&text[open..=close])
}

fn fenced_body(text: &str) -> Option<&str> {
    let lowered = text.to_ascii_lowercase();
    let (start, marker_len) = match lowered.find("```json") {
        Some(at) => (at, "```json".len()),
        None => (lowered.find("```")?, "```".len()),
    };
    let body_start = start + marker_len;
    let body_end = text[body_start..].find("```")? + body_start;
    Some(text[body_start..body_end].trim())
}

fn list_item(line: &str) -> Option<&str> {
    let rest = if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('*')) {
        rest
    } else {
        let digits = line.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        line[digits..].strip_prefix('.')?
    };
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let item = rest.trim();
    (!item.is_empty()).then_some(item)
}

/// Step labels from a helper reply.
///
/// Tries the first bracketed JSON array, then a fenced JSON body, then
/// `-`, `*` or `1.` list lines. Anything unusable yields the default steps.
pub fn parse_thinking_steps(reply: &str) -> Vec<String> {
    let json_text = first_bracketed(reply).or_else(|| fenced_body(reply));

    let steps: Vec<String> = match json_text {
        Some(json_text) => match serde_json::from_str::<Vec<Value>>(json_text) {
            Ok(values) => values.iter().filter_map(step_label).collect(),
            Err(_) => Vec::new(),
        },
        None => reply
            .lines()
            .map(str::trim)
            .filter_map(list_item)
            .map(str::to_owned)
            .collect(),
    };

    if steps.is_empty() {
        return default_thinking_steps();
    }
    steps.into_iter().take(MAX_THINKING_STEPS).collect()
}

/// Up to three trimmed, non-blank suggestions from a helper reply; empty when
/// the reply holds no JSON array.
pub fn parse_follow_ups(reply: &str) -> Vec<String> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    let (Some(open), Some(close)) = (cleaned.find('['), cleaned.rfind(']')) else {
        return Vec::new();
    };
    if close < open {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Value>>(&cleaned[open..=close]) {
        Ok(values) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|suggestion| !suggestion.is_empty())
            .map(str::to_owned)
            .take(MAX_FOLLOW_UPS)
            .collect(),
        Err(_) => Vec::new(),
    }
}
