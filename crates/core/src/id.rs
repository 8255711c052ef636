// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes for tracker-issued and agent-issued ids.
//!
//! Issue ids are minted by the issue tracker (`orc-37`, `bd-123.4`), session
//! ids by the agent runner. Both are opaque strings; the newtypes exist so
//! the two cannot be confused at call sites. Backed by [`SmolStr`] for cheap
//! clones in state maps.

use smol_str::SmolStr;

/// Define a newtype ID wrapper around [`SmolStr`].
///
/// Generates `from_string()`, `as_str()`, `is_empty()`, `Display`,
/// `From<&str>/<String>`, `PartialEq<str>`, `Borrow<str>`, and `Deref`.
/// There is no random generation: every id originates outside this process.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(SmolStr);

        impl $name {
            /// Wrap an externally issued id string.
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self(SmolStr::new(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl From<&String> for $name {
            fn from(s: &String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0.as_str() == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

define_id! {
    /// Identifier of an issue (bead) in a tracker.
    ///
    /// Scoped by the tracker prefix; child ids are dot-suffixed
    /// (`orc-37.4` is a child of `orc-37`).
    pub struct IssueId;
}

define_id! {
    /// Opaque session identifier issued by the agent runner.
    ///
    /// Empty until the first agent reply for a step; reused for every
    /// resume of the same step and for question answers.
    pub struct SessionId;
}

impl IssueId {
    /// The root (non-dotted) portion of the id: `orc-37.4` → `orc-37`.
    pub fn root(&self) -> &str {
        self.as_str().split('.').next().unwrap_or(self.as_str())
    }

    /// True if `self` is a direct or transitive child of `other`.
    pub fn is_child_of(&self, other: &IssueId) -> bool {
        self.as_str().len() > other.as_str().len()
            && self.as_str().starts_with(other.as_str())
            && self.as_str().as_bytes()[other.as_str().len()] == b'.'
    }
}

impl SessionId {
    /// Placeholder for a step that has not yet had an agent reply.
    pub fn empty() -> Self {
        Self(SmolStr::default())
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
