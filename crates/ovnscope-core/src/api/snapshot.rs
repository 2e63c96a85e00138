//! Canonical snapshot model: the JSON payload handed to the serving layer.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the snapshot JSON layout.
pub const SCHEMA_VERSION: &str = "v1alpha1";

/// Top-level snapshot: one complete topology graph for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct Snapshot {
    pub metadata: Metadata,
    /// Sorted ascending by `id`.
    pub nodes: Vec<Node>,
    /// Sorted ascending by `id`.
    pub edges: Vec<Edge>,
    /// Reserved for future grouping. Always empty.
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Non-fatal problems encountered while collecting.
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub schema_version: String,
    /// Collection time (UTC, RFC 3339).
    pub generated_at: DateTime<Utc>,
    pub source_health: SourceHealth,
    pub node_name: String,
}

/// Coarse classification of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SourceHealth {
    /// Every probe ran and parsed cleanly.
    Healthy,
    /// At least one warning was recorded.
    Degraded,
}

impl SourceHealth {
    /// `Degraded` if any warning was recorded.
    pub fn from_warnings(warnings: &[Warning]) -> Self {
        if warnings.is_empty() {
            SourceHealth::Healthy
        } else {
            SourceHealth::Degraded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceHealth::Healthy => "healthy",
            SourceHealth::Degraded => "degraded",
        }
    }
}

impl fmt::Display for SourceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    LogicalRouter,
    LogicalSwitch,
    LogicalSwitchPort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    /// Kind-specific attributes, opaque to the graph model.
    #[cfg_attr(feature = "api", schema(value_type = Object))]
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    RouterToSwitch,
    SwitchToPort,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::RouterToSwitch => "router_to_switch",
            EdgeKind::SwitchToPort => "switch_to_port",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct Edge {
    /// `"<kind>:<source>:<target>"`.
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[cfg_attr(feature = "api", schema(value_type = Object))]
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl Edge {
    /// Builds an edge with the canonical id and empty data.
    pub fn new(kind: EdgeKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}:{}:{}", kind.as_str(), source, target),
            source,
            target,
            kind,
            data: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub label: String,
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    /// A probe command could not be executed.
    CommandFailed,
    /// A probe ran but its output could not be decoded or parsed.
    ParserFailed,
    /// Probe output parsed only after single-quote normalization.
    ParserNormalized,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::CommandFailed => "COMMAND_FAILED",
            WarningCode::ParserFailed => "PARSER_FAILED",
            WarningCode::ParserNormalized => "PARSER_NORMALIZED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
}

impl Warning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
