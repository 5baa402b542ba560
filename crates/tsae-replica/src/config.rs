//! Replica configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Replica`](crate::Replica).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Track acknowledgments and purge causally stable history.
    ///
    /// When disabled the replica keeps no ack matrix, never purges its log
    /// and hands out no ack snapshot.
    pub garbage_collection: bool,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        ReplicaConfig {
            garbage_collection: true,
        }
    }
}

impl ReplicaConfig {
    /// Configuration with garbage collection turned off.
    pub fn without_gc() -> Self {
        ReplicaConfig {
            garbage_collection: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_gc() {
        assert!(ReplicaConfig::default().garbage_collection);
        assert!(!ReplicaConfig::without_gc().garbage_collection);
    }

    #[test]
    fn test_config_from_json() {
        let config: ReplicaConfig = serde_json::from_str(r#"{ "garbage_collection": false }"#).unwrap();
        assert_eq!(config, ReplicaConfig::without_gc());
    }
}
