use serde_json::{json, Map, Value};

/// Message body, passed to the platform untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    /// Interactive card JSON, as built by the caller.
    Card(Value),
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text(text.into())
    }

    pub(crate) fn write_into(&self, body: &mut Map<String, Value>) {
        match self {
            MessageContent::Text(text) => {
                body.insert("msg_type".into(), json!("text"));
                body.insert("content".into(), json!({ "text": text }));
            }
            MessageContent::Card(card) => {
                body.insert("msg_type".into(), json!("interactive"));
                body.insert("card".into(), card.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_shape() {
        let mut body = Map::new();
        MessageContent::text("deploy approved").write_into(&mut body);
        assert_eq!(Value::Object(body), json!({"msg_type": "text", "content": {"text": "deploy approved"}}));
    }

    #[test]
    fn test_card_message_shape() {
        let card = json!({"header": {"title": {"tag": "plain_text", "content": "Release"}}});
        let mut body = Map::new();
        MessageContent::Card(card.clone()).write_into(&mut body);
        assert_eq!(body["msg_type"], "interactive");
        assert_eq!(body["card"], card);
        assert!(!body.contains_key("content"));
    }
}
