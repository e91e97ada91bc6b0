//! Identifier types for conversations, messages and notifications.
//!
//! Ids arrive from two sources: the server assigns its own, and the client
//! mints optimistic ones (`user_msg_<timestamp>_<random>`) before a send is
//! confirmed. Both are plain strings on the wire, so the newtypes here are
//! thin and `serde(transparent)`.

use core::borrow::Borrow;
use core::fmt;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Length of the random suffix appended to generated ids.
const RANDOM_SUFFIX_LEN: usize = 9;

/// Declare a string newtype with a consistent API.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow as `&str`.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (or whitespace only).
            #[inline]
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Consume into `String`.
            #[inline]
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            #[inline]
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Identifier of a conversation (chat thread).
    ConversationId
);

define_string_id!(
    /// Identifier of a message, server-assigned or client-optimistic.
    MessageId
);

define_string_id!(
    /// Identifier of an out-of-band agent notification.
    NotificationId
);

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an id of the form `<prefix>_<epoch-ms>_<random>`.
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("{prefix}_{}_{suffix}", now_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id("user_msg");
        let parts: Vec<&str> = id.rsplitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), RANDOM_SUFFIX_LEN);
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2], "user_msg");
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_id("x"), generate_id("x"));
    }

    #[test]
    fn test_borrow_allows_str_lookup() {
        let mut map = HashMap::new();
        map.insert(ConversationId::from("c1"), 3);
        assert_eq!(map.get("c1"), Some(&3));
    }

    #[test]
    fn test_whitespace_id_is_empty() {
        assert!(MessageId::new("  ").is_empty());
        assert!(!MessageId::new("m1").is_empty());
    }

    #[test]
    fn test_serde_transparent() {
        let id = MessageId::from("srv1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"srv1\"");
    }
}
