use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

pub type Result<T, E = KnowledgeMapError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum KnowledgeMapError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// A programmer-level contract violation, such as a renderer without a key function.
    #[error("Contract violation: {0}")]
    Contract(String),
    #[error("Edge key '{key}' already connects {existing_source} -> {existing_target}, not {source_id} -> {target_id}")]
    EdgeConflict {
        key: String,
        existing_source: String,
        existing_target: String,
        source_id: String,
        target_id: String,
    },
    #[error("Event handler error: {0}")]
    Handler(String),
    #[error("Node '{id}' still has incident edges: {}", edges.join(", "))]
    HasIncidentEdges { id: String, edges: Vec<String> },
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl KnowledgeMapError {
    /// True for errors that indicate a caller bug rather than bad data.
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            KnowledgeMapError::Contract(_) | KnowledgeMapError::EdgeConflict { .. }
        )
    }
}

impl From<toml::de::Error> for KnowledgeMapError {
    fn from(src: toml::de::Error) -> KnowledgeMapError {
        KnowledgeMapError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<JsonError> for KnowledgeMapError {
    fn from(src: JsonError) -> KnowledgeMapError {
        KnowledgeMapError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<uuid::Error> for KnowledgeMapError {
    fn from(src: uuid::Error) -> KnowledgeMapError {
        KnowledgeMapError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for KnowledgeMapError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => KnowledgeMapError::NotFound(format!("{x}")),
            _ => KnowledgeMapError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err: KnowledgeMapError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, KnowledgeMapError::NotFound(_)));
        let err: KnowledgeMapError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, KnowledgeMapError::Io(_)));
    }

    #[test]
    fn incident_edges_message_lists_edges() {
        let err = KnowledgeMapError::HasIncidentEdges {
            id: "a".to_string(),
            edges: vec!["a-b".to_string(), "c-a".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Node 'a' still has incident edges: a-b, c-a"
        );
        assert!(!err.is_contract());
        assert!(KnowledgeMapError::Contract("x".into()).is_contract());
    }
}
