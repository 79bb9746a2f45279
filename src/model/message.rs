//! Server Messages
//!
//! Human-readable messages reported by the server, either for the whole
//! response or attached to a single field.

/// Message severity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageSeverity {
    Error,
    Warning,
    Info,
    Unknown(String),
}

impl MessageSeverity {
    /// Parse the wire `class` value.
    pub fn from_class(class: &str) -> Self {
        match class.to_ascii_uppercase().as_str() {
            "ERROR" => Self::Error,
            "WARNING" => Self::Warning,
            "INFO" => Self::Info,
            _ => Self::Unknown(class.to_string()),
        }
    }
}

/// A single server message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Localized message text.
    pub text: String,
    /// Localization key (`i18n.key`).
    pub localization_key: Option<String>,
    /// Severity.
    pub severity: MessageSeverity,
}

impl Message {
    pub fn is_error(&self) -> bool {
        self.severity == MessageSeverity::Error
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Ordered message list. The first message is the primary one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageCollection {
    messages: Vec<Message>,
}

impl MessageCollection {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Primary message.
    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// First message with error severity.
    pub fn first_error(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Find a message by localization key.
    pub fn by_key(&self, key: &str) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.localization_key.as_deref() == Some(key))
    }
}

impl<'a> IntoIterator for &'a MessageCollection {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str, class: &str) -> Message {
        Message {
            text: text.to_string(),
            localization_key: Some(format!("key.{}", text)),
            severity: MessageSeverity::from_class(class),
        }
    }

    #[test]
    fn test_first_message_is_primary() {
        let messages = MessageCollection::new(vec![
            message("notice", "INFO"),
            message("locked", "ERROR"),
        ]);

        assert_eq!(messages.first().map(|m| m.text.as_str()), Some("notice"));
        assert_eq!(messages.first_error().map(|m| m.text.as_str()), Some("locked"));
        assert_eq!(messages.len(), 2);
        assert!(messages.by_key("key.locked").is_some());
    }

    #[test]
    fn test_unknown_severity() {
        assert_eq!(
            MessageSeverity::from_class("debug"),
            MessageSeverity::Unknown("debug".to_string())
        );
    }
}
