//! Identifier types and identifier generation.
//!
//! IDs are opaque String wrappers (serde-transparent). Fresh IDs are 32-char
//! lowercase hex (UUID v4, simple form). Anything that puts IDs on the wire
//! draws them from an [`IdGenerator`] so tests can substitute a
//! deterministic source.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Returns a globally unique identifier.
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new random ID.
            pub fn generate() -> Self {
                Self(unique_id())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::generate()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Identity of a chunk. Local to the process; not carried on the wire.
    ChunkId
);
typed_id!(
    /// Identity of a content value; becomes the root fragment id on the wire.
    ContentId
);
typed_id!(
    /// Wire-level handle binding an action parameter to its payload.
    ParameterId
);

impl From<ParameterId> for ContentId {
    fn from(id: ParameterId) -> Self {
        Self(id.0)
    }
}

/// Source of fresh wire identifiers.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    fn unique_id(&self) -> String;
}

/// Random UUID v4 identifiers. The default everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn unique_id(&self) -> String {
        unique_id()
    }
}

/// Deterministic `<prefix><n>` identifiers, counting from zero.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn unique_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{n}", self.prefix)
    }
}

/// Shared handle to the generator used by default.
pub fn default_ids() -> Arc<dyn IdGenerator> {
    Arc::new(UuidIds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_id_is_hex_and_unique() {
        let a = unique_id();
        let b = unique_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("id-");
        assert_eq!(ids.unique_id(), "id-0");
        assert_eq!(ids.unique_id(), "id-1");
        assert_eq!(ids.unique_id(), "id-2");
    }

    #[test]
    fn content_id_from_string() {
        let id = ContentId::from_string("prompt");
        assert_eq!(id.as_str(), "prompt");
        assert_eq!(id.to_string(), "prompt");
    }

    #[test]
    fn parameter_id_becomes_content_id() {
        let content_id: ContentId = ParameterId::from("p-7").into();
        assert_eq!(content_id.as_str(), "p-7");
    }

    #[test]
    fn typed_id_serde_roundtrip() {
        let id = ChunkId::from_string("CHUNK001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"CHUNK001\"");
        let back: ChunkId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
