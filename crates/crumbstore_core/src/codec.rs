//! Breadcrumb record encoding and decoding.
//!
//! A record is one compact JSON object:
//!
//! ```text
//! {"id":7,"timestamp":1700000000000,"message":"...","attributes":{"k":"v"},"type":"manual","level":"info"}
//! ```
//!
//! Records never contain a raw newline. Readers that render the log one
//! record per line depend on this, so newlines are removed from every text
//! field before anything else happens to it.

use crate::error::{StoreError, StoreResult};
use crate::types::{Breadcrumb, BreadcrumbId, NewBreadcrumb};
use tracing::warn;

/// Character removed from every text field.
pub const RECORD_SEPARATOR: char = '\n';

/// Default message length cap, in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 1024;

/// Default attribute section budget, in bytes of keys plus values.
pub const DEFAULT_MAX_ATTRIBUTES_BYTES: usize = 1024;

/// Bounds and serializes breadcrumb records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    max_message_chars: usize,
    max_attributes_bytes: usize,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_CHARS, DEFAULT_MAX_ATTRIBUTES_BYTES)
    }
}

impl RecordCodec {
    /// Creates a codec with the given limits.
    #[must_use]
    pub const fn new(max_message_chars: usize, max_attributes_bytes: usize) -> Self {
        Self {
            max_message_chars,
            max_attributes_bytes,
        }
    }

    /// Message length cap in characters.
    #[must_use]
    pub const fn max_message_chars(&self) -> usize {
        self.max_message_chars
    }

    /// Attribute section budget in bytes.
    #[must_use]
    pub const fn max_attributes_bytes(&self) -> usize {
        self.max_attributes_bytes
    }

    /// Applies sanitation and size limits to a submitted breadcrumb.
    ///
    /// Newlines are stripped from the message and from every attribute key
    /// and value, then the message is cut to the character cap. Attributes
    /// are admitted first-fit in insertion order: an attribute that would
    /// push the section past its budget is dropped whole and the next one
    /// is still considered. A repeated key, including one that only
    /// collides once newlines are stripped, replaces the earlier value in
    /// place and is charged for the difference.
    #[must_use]
    pub fn bound(&self, id: BreadcrumbId, timestamp: i64, draft: &NewBreadcrumb) -> Breadcrumb {
        let message = truncate_chars(strip_separators(&draft.message), self.max_message_chars);

        let mut attributes: Vec<(String, String)> = Vec::with_capacity(draft.attributes.len());
        let mut section_bytes = 0usize;
        let mut dropped = 0usize;
        for (key, value) in &draft.attributes {
            let key = strip_separators(key);
            let value = strip_separators(value);
            if let Some(slot) = attributes.iter_mut().find(|(k, _)| *k == key) {
                let replaced = section_bytes - slot.1.len() + value.len();
                if replaced > self.max_attributes_bytes {
                    dropped += 1;
                    continue;
                }
                section_bytes = replaced;
                slot.1 = value;
                continue;
            }
            let cost = key.len() + value.len();
            if section_bytes + cost > self.max_attributes_bytes {
                dropped += 1;
                continue;
            }
            section_bytes += cost;
            attributes.push((key, value));
        }
        if dropped > 0 {
            warn!(%id, dropped, "breadcrumb attributes truncated");
        }

        Breadcrumb {
            id,
            timestamp,
            message,
            attributes,
            kind: draft.kind,
            level: draft.level,
        }
    }

    /// Serializes a breadcrumb into record bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Encode`] if the serializer fails.
    pub fn encode(breadcrumb: &Breadcrumb) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(breadcrumb).map_err(|e| StoreError::encode(e.to_string()))
    }

    /// Parses record bytes back into a breadcrumb.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Decode`] if the bytes are not a complete record.
    pub fn decode(bytes: &[u8]) -> StoreResult<Breadcrumb> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::decode(e.to_string()))
    }
}

/// Removes every record separator from `text`.
#[must_use]
pub fn strip_separators(text: &str) -> String {
    text.replace(RECORD_SEPARATOR, "")
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
    }
    text
}

/// Serde adapter that renders ordered attribute pairs as a JSON object.
pub(crate) mod attribute_map {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(attributes: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(attributes.len()))?;
        for (key, value) in attributes {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of string attributes")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(pair) = access.next_entry::<String, String>()? {
                    pairs.push(pair);
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}
