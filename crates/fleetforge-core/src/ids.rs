use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::CellError;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> std::result::Result<Self, CellError> {
                let raw = raw.into();
                if raw.is_empty() {
                    return Err(CellError::InvalidInput(concat!(
                        stringify!($name),
                        " must not be empty"
                    ).to_string()));
                }
                Ok(Self(raw))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

opaque_id!(CellId);
opaque_id!(PlayerId);

impl CellId {
    /// Builds a child cell id. Split always produces two children, numbered
    /// `0` and `1`; the pattern is a contract the controller and tests both
    /// inspect.
    #[must_use]
    pub fn child(parent: &Self, n: u32) -> Self {
        Self(format!("{parent}-child-{n}"))
    }

    /// Builds a merged cell id from the first parent and a monotonic
    /// counter the manager maintains.
    #[must_use]
    pub fn merged(first_parent: &Self, counter: u64) -> Self {
        Self(format!("{first_parent}-merged-{counter}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(CellId::new("").is_err());
        assert!(PlayerId::new(String::new()).is_err());
    }

    #[test]
    fn child_pattern() {
        let parent = CellId::new("world-a").unwrap();
        assert_eq!(CellId::child(&parent, 0).as_str(), "world-a-child-0");
        assert_eq!(CellId::child(&parent, 1).as_str(), "world-a-child-1");
    }

    #[test]
    fn merged_pattern() {
        let parent = CellId::new("world-a-child-0").unwrap();
        assert_eq!(CellId::merged(&parent, 3).as_str(), "world-a-child-0-merged-3");
    }
}
