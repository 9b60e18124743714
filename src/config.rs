//! Node configuration. Every section has working defaults so a config file
//! only needs to name the local node.

use crate::identity::NodeId;
use crate::util::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub node_id: NodeId,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default = "CoreConfig::default_metrics_namespace")]
    pub metrics_namespace: String,
}

impl CoreConfig {
    pub const DEFAULT_METRICS_NAMESPACE: &'static str = "switchyard";

    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            topology: TopologyConfig::default(),
            replication: ReplicationConfig::default(),
            broadcast: BroadcastConfig::default(),
            metrics_namespace: Self::default_metrics_namespace(),
        }
    }

    fn default_metrics_namespace() -> String {
        Self::DEFAULT_METRICS_NAMESPACE.to_string()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "node_id",
                reason: "must not be empty".into(),
            });
        }
        if self.metrics_namespace.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "metrics_namespace",
                reason: "must not be empty".into(),
            });
        }
        self.topology.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Run the per-source multi-path search for every vertex while building
    /// a snapshot instead of on first query.
    pub precompute_paths: bool,
    /// Upper bound on paths returned by default-weight queries; `None`
    /// returns every minimum-cost path.
    pub max_paths: Option<usize>,
    /// Primary candidates examined when a risk profile constrains the
    /// disjoint path search.
    pub srlg_candidate_limit: usize,
}

impl TopologyConfig {
    pub const DEFAULT_SRLG_CANDIDATE_LIMIT: usize = 16;

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_paths == Some(0) {
            return Err(ConfigError::Invalid {
                field: "topology.max_paths",
                reason: "must be positive when set".into(),
            });
        }
        if self.srlg_candidate_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "topology.srlg_candidate_limit",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            precompute_paths: true,
            max_paths: None,
            srlg_candidate_limit: Self::DEFAULT_SRLG_CANDIDATE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Updates fan out to peers before `put` returns.
    Immediate,
    /// Updates wait in the fabric until `deliver_pending` runs.
    Queued,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub delivery: DeliveryMode,
    /// Seed for anti-entropy peer selection.
    pub anti_entropy_seed: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::Immediate,
            anti_entropy_seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruningKind {
    FullCluster,
    SpanningTree,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub pruning: PruningKind,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            pruning: PruningKind::FullCluster,
        }
    }
}
