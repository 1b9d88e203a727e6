//! Topic validation for reading publication
//!
//! Readings are published to one fixed topic per deployment, so the topic
//! must be a concrete name that a subscriber can also match literally.

use thiserror::Error;

/// Maximum topic length in bytes allowed by MQTT
pub const MAX_TOPIC_LEN: usize = 65_535;

pub fn validate_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }

    if topic.len() > MAX_TOPIC_LEN {
        return Err(TopicError::TooLong(topic.len()));
    }

    for ch in topic.chars() {
        match ch {
            '+' | '#' => return Err(TopicError::Wildcard(ch)),
            '\0' => return Err(TopicError::NullCharacter),
            _ => {}
        }
    }

    Ok(())
}

/// Whether an inbound topic is the one a session subscribed to
pub fn topic_matches(subscribed: &str, received: &str) -> bool {
    subscribed == received
}

/// Topic validation errors
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("Topic cannot be empty")]
    Empty,
    #[error("Topic is {0} bytes long")]
    TooLong(usize),
    #[error("Topic contains wildcard '{0}'")]
    Wildcard(char),
    #[error("Topic contains a NUL character")]
    NullCharacter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn topics_without_reserved_chars_are_valid(topic in "[a-zA-Z0-9/_.-]{1,64}") {
            prop_assert!(validate_topic(&topic).is_ok());
        }

        #[test]
        fn topics_with_wildcards_are_rejected(prefix in "[a-z/]{0,16}", wildcard in "[+#]") {
            let topic = format!("{prefix}{wildcard}");
            prop_assert!(matches!(validate_topic(&topic), Err(TopicError::Wildcard(_))));
        }
    }

    #[test]
    fn test_deployment_topics() {
        assert!(validate_topic("sensors/bedroom").is_ok());
        assert!(validate_topic("sensors/workingroom").is_ok());
        assert!(validate_topic("/leading/slash").is_ok());
    }

    #[test]
    fn test_edge_cases() {
        assert_eq!(validate_topic(""), Err(TopicError::Empty));
        assert_eq!(validate_topic("a\0b"), Err(TopicError::NullCharacter));
        assert_eq!(
            validate_topic("sensors/+/air"),
            Err(TopicError::Wildcard('+'))
        );
        let long = "a".repeat(MAX_TOPIC_LEN + 1);
        assert_eq!(
            validate_topic(&long),
            Err(TopicError::TooLong(MAX_TOPIC_LEN + 1))
        );
    }

    #[test]
    fn test_topic_matches_is_literal() {
        assert!(topic_matches("sensors/bedroom", "sensors/bedroom"));
        assert!(!topic_matches("sensors/bedroom", "sensors/workingroom"));
        assert!(!topic_matches("sensors/bedroom", "sensors/bedroom/"));
    }
}
