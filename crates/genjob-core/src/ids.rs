//! Newtype wrappers for identifiers to ensure type safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an id from an existing string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the inner string reference.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Locally generated identifier of a generation job.
    JobId
);

string_id!(
    /// Identifier of a persisted (or about to be persisted) artifact.
    ArtifactId
);

string_id!(
    /// Opaque identifier the remote API assigns to a submitted task.
    RemoteTaskId
);

impl JobId {
    /// Generate a new random JobId.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl ArtifactId {
    /// Generate a new random ArtifactId.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// First six characters, used for human-facing file names.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(6).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}
