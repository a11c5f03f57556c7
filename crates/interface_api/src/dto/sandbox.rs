//! Sandbox gateway DTOs

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxOutcome {
    Completed,
    Failed,
}

/// Final state to give a pending sandbox payment
#[derive(Debug, Deserialize)]
pub struct SandboxOutcomeRequest {
    pub outcome: SandboxOutcome,
}
