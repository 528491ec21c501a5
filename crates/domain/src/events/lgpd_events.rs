use super::{queues, QueueMessage};
use crate::aggregates::order::ClientId;
use serde::{Deserialize, Serialize};

/// Data-deletion request consumed from `lgpd_execution`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgpdExecutionRequest {
    pub id: ClientId,
    #[serde(default)]
    pub exclude: bool,
}

impl QueueMessage for LgpdExecutionRequest {
    fn queue() -> &'static str {
        queues::LGPD_EXECUTION
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LgpdExecutionStatus {
    Success,
    Failed,
}

/// Reply published on `lgpd_conclusion`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgpdConclusion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClientId>,
    pub status: LgpdExecutionStatus,
}

impl LgpdConclusion {
    pub fn success(client_id: ClientId) -> Self {
        Self {
            id: Some(client_id),
            status: LgpdExecutionStatus::Success,
        }
    }

    /// The failure reply carries no client id
    pub fn failed() -> Self {
        Self {
            id: None,
            status: LgpdExecutionStatus::Failed,
        }
    }
}

impl QueueMessage for LgpdConclusion {
    fn queue() -> &'static str {
        queues::LGPD_CONCLUSION
    }
}
