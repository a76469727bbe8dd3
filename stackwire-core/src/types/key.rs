//! Registry key and entry types.

use crate::error::{Result, StackwireError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Hierarchical registry key, `/<owner>/<category>/<name...>`.
///
/// Keys are validated on construction so a malformed key never reaches a
/// registry backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegistryKey(String);

impl RegistryKey {
    /// Parse and validate a key.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| StackwireError::InvalidKey {
            key: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;
        let segments: Vec<&str> = rest.split('/').collect();

        if segments.len() < 2 {
            return Err(invalid("must have at least an owner and a name segment"));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if !segment.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(invalid("segments may only contain [A-Za-z0-9._-]"));
            }
        }

        Ok(Self(raw.to_string()))
    }

    /// Key from a literal that is known to be well formed.
    pub(crate) fn from_static(raw: &'static str) -> Self {
        debug_assert!(Self::parse(raw).is_ok(), "malformed static key {}", raw);
        Self(raw.to_string())
    }

    /// Build a key from its owner, category and name segments.
    pub fn new(owner: &str, category: &str, name: &str) -> Result<Self> {
        Self::parse(&format!("/{}/{}/{}", owner, category, name))
    }

    /// Append a single child segment (e.g. a subnet group name).
    pub fn child(&self, segment: &str) -> Result<Self> {
        if segment.contains('/') {
            return Err(StackwireError::InvalidKey {
                key: format!("{}/{}", self.0, segment),
                reason: "child must be a single path segment".to_string(),
            });
        }
        Self::parse(&format!("{}/{}", self.0, segment))
    }

    /// The owning domain (first segment).
    pub fn owner(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.trim_start_matches('/').split('/')
    }

    /// Whether this key lives under the given prefix.
    ///
    /// Matching is segment-aligned: `/appshell/vpc` covers `/appshell/vpc/id`
    /// but not `/appshell/vpcs/id`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        self.0 == prefix
            || (self.0.starts_with(prefix) && self.0.as_bytes().get(prefix.len()) == Some(&b'/'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegistryKey {
    type Err = StackwireError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RegistryKey {
    type Error = StackwireError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RegistryKey> for String {
    fn from(key: RegistryKey) -> Self {
        key.0
    }
}

/// Shape of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// Plain string.
    Scalar,
    /// JSON-encoded array of strings.
    JsonList,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Scalar => "scalar",
            ValueKind::JsonList => "json-list",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = StackwireError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scalar" => Ok(ValueKind::Scalar),
            "json-list" => Ok(ValueKind::JsonList),
            other => Err(StackwireError::Internal(format!("unknown value kind: {}", other))),
        }
    }
}

/// A stored registry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: RegistryKey,
    pub value: String,
    pub kind: ValueKind,
    /// Stack that published the entry, when known.
    pub owner: Option<String>,
    /// Last time the entry was written. Entries never expire on their own.
    pub updated_at: SystemTime,
}

impl RegistryEntry {
    /// Scalar entry.
    pub fn scalar(key: RegistryKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
            kind: ValueKind::Scalar,
            owner: None,
            updated_at: SystemTime::now(),
        }
    }

    /// JSON list entry.
    pub fn list<S: AsRef<str>>(key: RegistryKey, items: &[S]) -> Result<Self> {
        let items: Vec<&str> = items.iter().map(|s| s.as_ref()).collect();
        let value = serde_json::to_string(&items).map_err(|e| StackwireError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { key, value, kind: ValueKind::JsonList, owner: None, updated_at: SystemTime::now() })
    }

    /// Record which stack published this entry.
    pub fn owned_by(mut self, stack: impl Into<String>) -> Self {
        self.owner = Some(stack.into());
        self
    }

    /// Decode a JSON list value.
    pub fn decode_list(&self) -> Result<Vec<String>> {
        decode_list(&self.key, &self.value)
    }

    /// Whether two entries hold the same content, ignoring write timestamps.
    pub fn same_content(&self, other: &RegistryEntry) -> bool {
        self.key == other.key
            && self.value == other.value
            && self.kind == other.kind
            && self.owner == other.owner
    }
}

/// Decode a JSON-encoded list of strings stored under `key`.
pub fn decode_list(key: &RegistryKey, value: &str) -> Result<Vec<String>> {
    serde_json::from_str(value).map_err(|e| StackwireError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected a JSON array of strings: {}", e),
    })
}
