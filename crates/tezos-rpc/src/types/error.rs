//! Error records emitted by the node.
//!
//! The node reports failures as `{"kind": ..., "id": ..., ...}` objects, either
//! in the body of a 5xx response or embedded in operation results.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error class reported by the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Will fail again on retry.
    Permanent,
    /// May succeed later.
    Temporary,
    /// Specific to the branch the operation was built on.
    Branch,
    /// Any other protocol-defined kind, kept verbatim.
    Other(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::Permanent => "permanent",
            ErrorKind::Temporary => "temporary",
            ErrorKind::Branch => "branch",
            ErrorKind::Other(s) => s,
        }
    }
}

impl From<String> for ErrorKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "permanent" => ErrorKind::Permanent,
            "temporary" => ErrorKind::Temporary,
            "branch" => ErrorKind::Branch,
            _ => ErrorKind::Other(s),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(ErrorKind::from)
    }
}

/// One structured error record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeError {
    pub kind: ErrorKind,
    pub id: String,
    /// Any additional, error specific fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NodeError {
    pub fn new(kind: ErrorKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind = {:?}, id = {:?}", self.kind.as_str(), self.id)
    }
}

/// A list of error records.
///
/// Decodes from either a single record object or an array of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NodeErrors(Vec<NodeError>);

impl NodeErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<NodeError> {
        self.0
    }
}

impl Deref for NodeErrors {
    type Target = [NodeError];

    fn deref(&self) -> &[NodeError] {
        &self.0
    }
}

impl From<Vec<NodeError>> for NodeErrors {
    fn from(v: Vec<NodeError>) -> Self {
        Self(v)
    }
}

impl<'a> IntoIterator for &'a NodeErrors {
    type Item = &'a NodeError;
    type IntoIter = std::slice::Iter<'a, NodeError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for NodeErrors {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            Many(Vec<NodeError>),
            One(NodeError),
        }

        Ok(match OneOrMany::deserialize(d)? {
            OneOrMany::Many(v) => NodeErrors(v),
            OneOrMany::One(e) => NodeErrors(vec![e]),
        })
    }
}
