//! Attribute name module.
//!
//! Provides the `AttrName` type, an interned label for attributes.
//! Uses `Arc<str>` so that cloning a name into errors, events and
//! snapshots is cheap.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Interned, free-form label for an attribute.
///
/// Names are for people and for lookup convenience only. Two attributes
/// may share the same name; identity is always the [`NodeId`](crate::NodeId).
///
/// # Examples
///
/// ```rust
/// use statsheet::AttrName;
///
/// let str_mod = AttrName::new("STR modifier");
/// let again: AttrName = "STR modifier".into();
/// let owned: AttrName = String::from("STR modifier").into();
///
/// assert_eq!(str_mod, again);
/// assert_eq!(str_mod, owned);
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttrName(Arc<str>);

impl Serialize for AttrName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttrName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(AttrName::from(s))
    }
}

impl AttrName {
    /// Create a new `AttrName` from a string slice.
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the string representation of this name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statsheet::AttrName;
    ///
    /// assert_eq!(AttrName::new("Max HP").as_str(), "Max HP");
    /// ```
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the name of a satellite attribute, e.g. `"AC base"`.
    pub(crate) fn suffixed(&self, suffix: &str) -> Self {
        Self(Arc::from(format!("{} {}", self.0, suffix)))
    }
}

impl From<&str> for AttrName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AttrName {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&AttrName> for AttrName {
    fn from(name: &AttrName) -> Self {
        name.clone()
    }
}

impl std::fmt::Display for AttrName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
