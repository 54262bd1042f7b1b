//! Per-token deployment outcomes and the run summary.

use serde::{Deserialize, Serialize};

use crate::core::ResourceType;
use crate::tokens::TemplateDictionary;

/// Why a token was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SkipReason {
    /// A dependency failed or was itself skipped
    #[serde(rename_all = "camelCase")]
    BlockedBy {
        /// The dependency that did not succeed
        token: String,
    },
    /// No type handler is registered
    #[serde(rename_all = "camelCase")]
    UnimplementedType {
        /// The type without a handler
        resource_type: String,
    },
    /// The run was cancelled before the token started
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockedBy { token } => write!(f, "blocked by {token}"),
            Self::UnimplementedType { resource_type } => {
                write!(f, "type '{resource_type}' is not implemented")
            }
            Self::Cancelled => f.write_str("run cancelled"),
        }
    }
}

/// Terminal state of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeploymentStatus {
    /// Created; the dictionary holds its record
    Succeeded,
    /// Attempted and failed
    Failed {
        /// Error detail
        error: String,
    },
    /// Not attempted
    Skipped {
        /// Why
        reason: SkipReason,
    },
}

/// Outcome for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Template token
    pub token: String,
    /// Resource type
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Id of the created resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_id: Option<String>,
    /// Terminal state
    #[serde(flatten)]
    pub status: DeploymentStatus,
}

impl DeploymentRecord {
    /// Whether the token was created.
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self.status, DeploymentStatus::Succeeded)
    }

    /// Whether the token was attempted and failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, DeploymentStatus::Failed { .. })
    }

    /// Whether the token was not attempted.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.status, DeploymentStatus::Skipped { .. })
    }
}

/// Outcome of one group share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    /// Token of the shared template
    pub token: String,
    /// Group token shared into
    pub group_token: String,
    /// Concrete destination group id
    pub group_id: Option<String>,
    /// Identity the share was made as; the acting user when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acting_identity: Option<String>,
    /// Error detail when the share failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one deployment run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    /// One record per token, in build order
    pub records: Vec<DeploymentRecord>,
    /// Group shares from post-processing
    #[serde(default)]
    pub shares: Vec<ShareRecord>,
    /// Token resolutions recorded during the run
    pub dictionary: TemplateDictionary,
    /// Human-readable transitions, in the order they happened
    #[serde(default)]
    pub log: Vec<String>,
    /// Whether the run was cancelled
    #[serde(default)]
    pub cancelled: bool,
}

impl DeploymentSummary {
    /// Records of created tokens.
    #[must_use]
    pub fn succeeded(&self) -> Vec<&DeploymentRecord> {
        self.records.iter().filter(|r| r.is_succeeded()).collect()
    }

    /// Records of failed tokens.
    #[must_use]
    pub fn failed(&self) -> Vec<&DeploymentRecord> {
        self.records.iter().filter(|r| r.is_failed()).collect()
    }

    /// Records of skipped tokens.
    #[must_use]
    pub fn skipped(&self) -> Vec<&DeploymentRecord> {
        self.records.iter().filter(|r| r.is_skipped()).collect()
    }

    /// The record for `token`.
    #[must_use]
    pub fn record(&self, token: &str) -> Option<&DeploymentRecord> {
        self.records.iter().find(|r| r.token == token)
    }

    /// Whether every token was created and every share went through.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        !self.cancelled
            && self.records.iter().all(DeploymentRecord::is_succeeded)
            && self.shares.iter().all(|s| s.error.is_none())
    }
}
