use drekee_protocol::GatewayError;
use serde_json::Value;

/// Pull the response text out of a completion payload.
///
/// Accepted shapes, in order: `{"content": "..."}`,
/// `{"choices": [{"message": {"content": "..."}}]}`,
/// `{"choices": [{"text": "..."}]}` and a bare JSON string.
pub fn extract_content(payload: &Value) -> Result<String, GatewayError> {
    if let Some(content) = payload.get("content").and_then(Value::as_str) {
        return Ok(content.to_owned());
    }

    if let Some(choice) = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    {
        if let Some(content) = choice
            .get("message")
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
        {
            return Ok(content.to_owned());
        }
        if let Some(text) = choice.get("text").and_then(Value::as_str) {
            return Ok(text.to_owned());
        }
    }

    if let Some(text) = payload.as_str() {
        return Ok(text.to_owned());
    }

    let mut preview = payload.to_string();
    if let Some((cut, _)) = preview.char_indices().nth(200) {
        preview.truncate(cut);
    }
    Err(GatewayError::UnexpectedPayload(preview))
}
