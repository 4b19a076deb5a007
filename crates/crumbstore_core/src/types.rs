//! Core type definitions for CrumbStore.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a breadcrumb.
///
/// Breadcrumb IDs are monotonically increasing and never reused, not even
/// after rollover evicts the records that carried them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreadcrumbId(pub u64);

impl BreadcrumbId {
    /// Creates a new breadcrumb ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next breadcrumb ID, saturating at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for BreadcrumbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crumb:{}", self.0)
    }
}

/// Category of a breadcrumb.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbType {
    /// Added explicitly by application code.
    #[default]
    Manual,
    /// Mirrors a log line.
    Log,
    /// Screen or route change.
    Navigation,
    /// Outgoing HTTP request.
    Http,
    /// OS or runtime event.
    System,
    /// User interaction.
    User,
    /// Store bookkeeping record describing the breadcrumb configuration.
    Configuration,
}

impl BreadcrumbType {
    /// Every breadcrumb type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Manual,
        Self::Log,
        Self::Navigation,
        Self::Http,
        Self::System,
        Self::User,
        Self::Configuration,
    ];

    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Log => "log",
            Self::Navigation => "navigation",
            Self::Http => "http",
            Self::System => "system",
            Self::User => "user",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for BreadcrumbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for BreadcrumbType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::decode(format!("unknown breadcrumb type: {s}")))
    }
}

/// Severity of a breadcrumb.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbLevel {
    /// Debug-level detail.
    Debug,
    /// Informational.
    #[default]
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
    /// Fatal error.
    Fatal,
}

impl BreadcrumbLevel {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for BreadcrumbLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for BreadcrumbLevel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            _ => Err(StoreError::decode(format!("unknown breadcrumb level: {s}"))),
        }
    }
}

/// A stored breadcrumb.
///
/// Instances are produced by the store when a [`NewBreadcrumb`] is accepted,
/// and by [`crate::RecordCodec::decode`] when reading records back. Text
/// fields never contain a newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Store-assigned identifier.
    pub id: BreadcrumbId,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Free-form message.
    pub message: String,
    /// Attributes in insertion order.
    #[serde(with = "crate::codec::attribute_map")]
    pub attributes: Vec<(String, String)>,
    /// Breadcrumb category.
    #[serde(rename = "type")]
    pub kind: BreadcrumbType,
    /// Breadcrumb severity.
    pub level: BreadcrumbLevel,
}

impl Breadcrumb {
    /// Looks up an attribute value by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A breadcrumb submitted to the store, before it is assigned an id.
///
/// # Example
///
/// ```rust
/// use crumbstore_core::{BreadcrumbLevel, BreadcrumbType, NewBreadcrumb};
///
/// let crumb = NewBreadcrumb::new("GET /users")
///     .attribute("status", "200")
///     .kind(BreadcrumbType::Http)
///     .level(BreadcrumbLevel::Debug);
/// assert_eq!(crumb.attributes.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBreadcrumb {
    /// Free-form message.
    pub message: String,
    /// Attributes in insertion order.
    pub attributes: Vec<(String, String)>,
    /// Breadcrumb category.
    pub kind: BreadcrumbType,
    /// Breadcrumb severity.
    pub level: BreadcrumbLevel,
}

impl NewBreadcrumb {
    /// Creates a manual, info-level breadcrumb with no attributes.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Appends several attributes, keeping their iteration order.
    #[must_use]
    pub fn attributes<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes
            .extend(attributes.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the breadcrumb type.
    #[must_use]
    pub fn kind(mut self, kind: BreadcrumbType) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the breadcrumb level.
    #[must_use]
    pub fn level(mut self, level: BreadcrumbLevel) -> Self {
        self.level = level;
        self
    }
}

impl From<&str> for NewBreadcrumb {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for NewBreadcrumb {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breadcrumb_id_ordering() {
        let a = BreadcrumbId::new(1);
        assert!(a < a.next());
        assert_eq!(a.next().as_u64(), 2);
        assert_eq!(format!("{a}"), "crumb:1");
        assert_eq!(BreadcrumbId::new(u64::MAX).next().as_u64(), u64::MAX);
    }

    #[test]
    fn type_names_roundtrip() {
        for t in BreadcrumbType::ALL {
            assert_eq!(t.to_string().parse::<BreadcrumbType>().unwrap(), t);
        }
        assert!("bogus".parse::<BreadcrumbType>().is_err());
    }

    #[test]
    fn level_parse_is_case_insensitive() {
        assert_eq!("WARNING".parse::<BreadcrumbLevel>().unwrap(), BreadcrumbLevel::Warning);
        assert!(matches!(
            "loud".parse::<BreadcrumbLevel>(),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn new_breadcrumb_defaults() {
        let crumb = NewBreadcrumb::from("hello");
        assert_eq!(crumb.kind, BreadcrumbType::Manual);
        assert_eq!(crumb.level, BreadcrumbLevel::Info);
        assert!(crumb.attributes.is_empty());
    }

    #[test]
    fn attributes_keep_insertion_order() {
        let crumb = NewBreadcrumb::new("m")
            .attribute("z", "1")
            .attributes([("a", "2"), ("m", "3")]);
        let keys: Vec<_> = crumb.attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
