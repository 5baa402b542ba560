//! Documents and the operations that create and remove them.

use crate::timestamp::{ReplicaId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A titled document as materialized by a replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub content: String,
    /// The replica that created this version.
    pub author: ReplicaId,
    /// Creation timestamp; identifies this version of the title.
    pub timestamp: Timestamp,
}

impl Document {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Document {
            title: title.into(),
            content: content.into(),
            author: timestamp.origin().to_string(),
            timestamp,
        }
    }
}

/// The kind of an [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Add,
    Remove,
}

/// A logged mutation of the shared collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Creation of a new version of a document.
    Add { document: Document },
    /// Removal of the version created at `created`.
    Remove {
        title: String,
        created: Timestamp,
        removed: Timestamp,
    },
}

impl Operation {
    pub fn add(document: Document) -> Self {
        Operation::Add { document }
    }

    pub fn remove(title: impl Into<String>, created: Timestamp, removed: Timestamp) -> Self {
        Operation::Remove {
            title: title.into(),
            created,
            removed,
        }
    }

    /// The timestamp under which this operation is logged.
    pub fn timestamp(&self) -> &Timestamp {
        match self {
            Operation::Add { document } => &document.timestamp,
            Operation::Remove { removed, .. } => removed,
        }
    }

    /// The replica that issued this operation.
    pub fn origin(&self) -> &str {
        self.timestamp().origin()
    }

    /// Title of the affected document.
    pub fn title(&self) -> &str {
        match self {
            Operation::Add { document } => &document.title,
            Operation::Remove { title, .. } => title,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Add { .. } => OperationKind::Add,
            Operation::Remove { .. } => OperationKind::Remove,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add { document } => {
                write!(f, "add({}, '{}')", document.timestamp, document.title)
            }
            Operation::Remove {
                title,
                created,
                removed,
            } => write!(f, "remove({}, '{}', created {})", removed, title, created),
        }
    }
}
