//! # User Status
//!
//! Status types for tracking reconciliation state and conditions.

use serde::{Deserialize, Serialize};

/// Status of the User resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    /// Conditions represent the latest available observations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last time the condition was written with a different value
    #[serde(default)]
    pub last_update_time: Option<String>,
    /// Last time the status flipped
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

impl UserStatus {
    /// Look up a condition by type
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// Whether the `Ready` condition is present and true
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.condition(crate::constants::READY_CONDITION)
            .is_some_and(Condition::is_true)
    }
}

/// Set a boolean condition on a status value.
///
/// Timestamps only move when the written value differs from the stored one,
/// so writing the same condition twice yields an identical status and the
/// caller can skip the API call.
#[must_use]
pub fn set_condition(
    mut status: UserStatus,
    condition_type: &str,
    value: bool,
    reason: Option<&str>,
    message: Option<&str>,
) -> UserStatus {
    let status_str = if value { "True" } else { "False" };
    let now = chrono::Utc::now().to_rfc3339();
    let reason = reason.map(str::to_string);
    let message = message.map(str::to_string);

    match status
        .conditions
        .iter_mut()
        .find(|c| c.r#type == condition_type)
    {
        Some(existing) => {
            if existing.status != status_str {
                existing.status = status_str.to_string();
                existing.last_transition_time = Some(now.clone());
                existing.last_update_time = Some(now);
            } else if existing.reason != reason || existing.message != message {
                existing.last_update_time = Some(now);
            }
            existing.reason = reason;
            existing.message = message;
        }
        None => status.conditions.push(Condition {
            r#type: condition_type.to_string(),
            status: status_str.to_string(),
            last_update_time: Some(now.clone()),
            last_transition_time: Some(now),
            reason,
            message,
        }),
    }

    status
}

/// Drop a condition entirely
#[must_use]
pub fn remove_condition(mut status: UserStatus, condition_type: &str) -> UserStatus {
    status.conditions.retain(|c| c.r#type != condition_type);
    status
}
