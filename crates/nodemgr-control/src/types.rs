//! Request and response types for control operations.
//!
//! These types define the API contracts for group orchestration and the
//! statistics views.

use std::time::Duration;

use chrono::NaiveDate;
use nodemgr_core::GroupId;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Longest accepted node id (hex characters).
pub const MAX_NODE_ID_LEN: usize = 128;

/// Longest accepted group description.
pub const MAX_DESCRIPTION_LEN: usize = 1024;

/// Request to generate a new group on a front.
///
/// Field names follow the front's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateGroupRequest {
    /// Id the new group is created with.
    pub generate_group_id: u32,
    /// Genesis timestamp (milliseconds).
    pub timestamp: u64,
    /// Node ids (hex public keys) that form the group.
    pub node_list: Vec<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl GenerateGroupRequest {
    /// Create a request with no description.
    #[must_use]
    pub fn new(group_id: GroupId, timestamp: u64, node_list: Vec<String>) -> Self {
        Self {
            generate_group_id: group_id.get(),
            timestamp,
            node_list,
            description: None,
        }
    }

    /// Check the request and return the group id it targets.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidRequest` describing the first violation.
    pub fn validate(&self) -> Result<GroupId> {
        let group_id = GroupId::new(self.generate_group_id)
            .map_err(|_| invalid("generateGroupId must be positive"))?;

        if self.timestamp == 0 {
            return Err(invalid("timestamp must be positive"));
        }
        if self.node_list.is_empty() {
            return Err(invalid("nodeList must not be empty"));
        }
        for node_id in &self.node_list {
            if node_id.is_empty() || node_id.len() > MAX_NODE_ID_LEN {
                return Err(invalid(format!(
                    "node id must be 1..={MAX_NODE_ID_LEN} characters"
                )));
            }
            if !node_id.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid(format!("node id is not hex: {node_id}")));
            }
        }
        if self
            .description
            .as_ref()
            .is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN)
        {
            return Err(invalid(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        Ok(group_id)
    }
}

fn invalid(reason: impl Into<String>) -> ControlError {
    ControlError::InvalidRequest(reason.into())
}

/// Consistency view of one group, recomputed per query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupGeneral {
    /// The group.
    pub group_id: GroupId,
    /// Number of fronts mapped to the group.
    pub node_count: u32,
    /// Latest chain height.
    pub latest_block: u64,
    /// Aggregated transaction count.
    pub transaction_count: u64,
    /// True when the transaction count still lags the latest block.
    pub stale: bool,
}

/// Transactions of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTrans {
    /// Calendar day (UTC).
    pub day: NaiveDate,
    /// Transactions attributed to the day.
    pub trans_count: u64,
}

/// Trailing seven days of transactions for a group, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SevenDaysTrans {
    /// The group.
    pub group_id: GroupId,
    /// Exactly seven entries, oldest first.
    pub days: Vec<DayTrans>,
}

/// Configuration for the control layer.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Total timeout for one front request (seconds).
    pub front_timeout_seconds: u64,
    /// Connect timeout for front requests (seconds).
    pub front_connect_timeout_seconds: u64,
    /// Path prefix of the front API.
    pub front_base_path: String,
    /// Number of reset sweeps that may be queued.
    pub reset_queue_capacity: usize,
    /// Interval between periodic aggregation refreshes (seconds).
    pub aggregation_interval_seconds: u64,
    /// Interval between periodic reset sweeps (seconds).
    pub reset_interval_seconds: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            front_timeout_seconds: 10,
            front_connect_timeout_seconds: 5,
            front_base_path: "WeBASE-Front".to_string(),
            reset_queue_capacity: 1,
            aggregation_interval_seconds: 60,
            reset_interval_seconds: 300, // 5 minutes
        }
    }
}

impl ControlConfig {
    /// Load configuration from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FRONT_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.front_timeout_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("FRONT_BASE_PATH") {
            config.front_base_path = val;
        }
        if let Ok(val) = std::env::var("RESET_QUEUE_CAPACITY") {
            if let Ok(n) = val.parse::<usize>() {
                config.reset_queue_capacity = n.max(1);
            }
        }
        if let Ok(val) = std::env::var("AGGREGATION_INTERVAL_SECONDS") {
            if let Ok(n) = val.parse() {
                config.aggregation_interval_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("RESET_INTERVAL_SECONDS") {
            if let Ok(n) = val.parse() {
                config.reset_interval_seconds = n;
            }
        }

        config
    }

    /// Total timeout for one front request.
    #[must_use]
    pub const fn front_timeout(&self) -> Duration {
        Duration::from_secs(self.front_timeout_seconds)
    }

    /// Connect timeout for front requests.
    #[must_use]
    pub const fn front_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.front_connect_timeout_seconds)
    }

    /// Interval between periodic aggregation refreshes.
    #[must_use]
    pub const fn aggregation_interval(&self) -> Duration {
        Duration::from_secs(self.aggregation_interval_seconds)
    }

    /// Interval between periodic reset sweeps.
    #[must_use]
    pub const fn reset_interval(&self) -> Duration {
        Duration::from_secs(self.reset_interval_seconds)
    }
}
