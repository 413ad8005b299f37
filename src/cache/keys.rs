//! Type-safe cache key builders

use std::fmt;

pub const VERSION: &str = "v1";

pub mod attempt {
    use super::*;

    pub const NAMESPACE: &str = "attempt";

    /// A fully rendered attempt key, optionally scoped to one session
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StoredKey {
        pub scope: Option<String>,
        pub name: String,
    }

    impl StoredKey {
        pub fn new(scope: Option<String>, name: impl Into<String>) -> Self {
            Self {
                scope,
                name: name.into(),
            }
        }
    }

    impl fmt::Display for StoredKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match &self.scope {
                Some(scope) => write!(f, "{}:{}:{}:{}", VERSION, NAMESPACE, scope, self.name),
                None => write!(f, "{}:{}:{}", VERSION, NAMESPACE, self.name),
            }
        }
    }
}
