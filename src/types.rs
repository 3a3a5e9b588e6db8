//! NewType wrappers for the identities that flow through the coordinator.
//!
//! Promise identities and worker identities are deliberately distinct types:
//! a promise names *what* is being waited on, a worker names *who* computes it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
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

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_string!(
    /// Name of a top-level caller talking to the coordinator (e.g. "main").
    CallerName
);

newtype_string!(
    /// Human-readable label of a computation, carried in event records.
    ComputationName
);

/// Opaque handle of a promise.
///
/// Allocated by the promise table from a monotonically increasing counter,
/// so an identity is never handed out twice by the same coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromiseId(u64);

impl PromiseId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw counter value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a single one-shot worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        let simple = self.0.simple().to_string();
        write!(f, "worker-{}", &simple[..8])
    }
}

/// One end of a directional interaction, used in logs and event records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    Coordinator,
    Caller(CallerName),
    Worker(WorkerId),
}

impl Participant {
    pub fn caller(name: impl Into<CallerName>) -> Self {
        Self::Caller(name.into())
    }

    pub fn is_worker(&self) -> bool {
        matches!(self, Self::Worker(_))
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinator => write!(f, "coordinator"),
            Self::Caller(name) => write!(f, "{}", name),
            Self::Worker(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promise_id_display() {
        assert_eq!(PromiseId::new(7).to_string(), "#7");
        assert_eq!(PromiseId::new(7).get(), 7);
    }

    #[test]
    fn worker_ids_are_distinct() {
        let a = WorkerId::new();
        let b = WorkerId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("worker-"));
        assert_eq!(a.to_string().len(), "worker-".len() + 8);
    }

    #[test]
    fn participant_display_and_serde() {
        let caller = Participant::caller("main");
        assert_eq!(caller.to_string(), "main");
        assert_eq!(Participant::Coordinator.to_string(), "coordinator");
        assert!(!caller.is_worker());

        let json = serde_json::to_value(&caller).unwrap();
        assert_eq!(json, serde_json::json!({ "caller": "main" }));
        assert_eq!(
            serde_json::to_value(Participant::Coordinator).unwrap(),
            serde_json::json!("coordinator")
        );
    }

    #[test]
    fn newtype_conversions() {
        let name = ComputationName::from("answer");
        assert_eq!(name.as_str(), "answer");
        assert_eq!(name.clone().into_inner(), "answer".to_string());
        assert_eq!(CallerName::new(String::from("a")), CallerName::from("a"));
    }
}
