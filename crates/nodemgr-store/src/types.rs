//! Domain types stored in the database.
//!
//! These types represent the persisted state of groups, fronts, their
//! associations and the daily transaction aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use nodemgr_core::{FrontAddr, FrontId, GroupId};
use serde::{Deserialize, Serialize};

/// A consensus group record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Chain-assigned group identifier.
    pub group_id: GroupId,
    /// Current status.
    pub status: GroupStatus,
    /// Last observed chain height.
    pub latest_block: u64,
    /// Last observed aggregated transaction count.
    pub trans_count: u64,
    /// Free-form description given at generation time.
    #[serde(default)]
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// A fresh `Normal` group with zeroed counters.
    #[must_use]
    pub fn new(group_id: GroupId, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            group_id,
            status: GroupStatus::Normal,
            latest_block: 0,
            trans_count: 0,
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GroupStatus {
    /// Served by at least one front and visible in listings.
    Normal = 1,
    /// No longer served; its mappings are swept.
    Invalid = 2,
    /// Temporarily withdrawn for maintenance; mappings are kept.
    Maintaining = 3,
}

impl GroupStatus {
    /// Convert the status to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert a numeric value to a `GroupStatus`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::Invalid),
            3 => Some(Self::Maintaining),
            _ => None,
        }
    }

    /// Whether mappings referencing a group in this status are valid.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

/// A registered front agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Front {
    /// Store-assigned identifier.
    pub front_id: FrontId,
    /// Host the front listens on.
    pub host: String,
    /// Port the front listens on.
    pub port: u16,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

impl Front {
    /// The address this front is reached at.
    #[must_use]
    pub fn addr(&self) -> FrontAddr {
        FrontAddr {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// One (front, group) association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontGroupMap {
    /// Monotonic row id; gives insertion order.
    pub map_id: u64,
    /// Front side.
    pub front_id: FrontId,
    /// Group side.
    pub group_id: GroupId,
    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,
}

/// A mapping joined with the front address and group status.
///
/// Front and group columns are `None` when the referenced row is gone,
/// which is exactly what the invalid-map sweep looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontGroup {
    /// Mapping row id.
    pub map_id: u64,
    /// Front side.
    pub front_id: FrontId,
    /// Group side.
    pub group_id: GroupId,
    /// Front host, if the front still exists.
    pub front_host: Option<String>,
    /// Front port, if the front still exists.
    pub front_port: Option<u16>,
    /// Group status, if the group still exists.
    pub group_status: Option<GroupStatus>,
    /// When the mapping was inserted.
    pub created_at: DateTime<Utc>,
}

impl FrontGroup {
    /// Whether both sides exist and the group is not invalid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.front_host.is_some() && self.group_status.is_some_and(GroupStatus::is_live)
    }
}

/// Filter for counting and listing mappings. Empty matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapFilter {
    /// Only mappings of this front.
    pub front_id: Option<FrontId>,
    /// Only mappings of this group.
    pub group_id: Option<GroupId>,
    /// Only mappings whose group currently has this status.
    pub group_status: Option<GroupStatus>,
}

impl MapFilter {
    /// Match all mappings of one front.
    #[must_use]
    pub const fn by_front(front_id: FrontId) -> Self {
        Self {
            front_id: Some(front_id),
            group_id: None,
            group_status: None,
        }
    }

    /// Match all mappings of one group.
    #[must_use]
    pub const fn by_group(group_id: GroupId) -> Self {
        Self {
            front_id: None,
            group_id: Some(group_id),
            group_status: None,
        }
    }

    /// Restrict to groups in the given status.
    #[must_use]
    pub const fn with_status(mut self, status: GroupStatus) -> Self {
        self.group_status = Some(status);
        self
    }

    /// Whether a joined row passes the filter.
    #[must_use]
    pub fn matches(&self, row: &FrontGroup) -> bool {
        self.front_id.map_or(true, |id| id == row.front_id)
            && self.group_id.map_or(true, |id| id == row.group_id)
            && self
                .group_status
                .map_or(true, |status| row.group_status == Some(status))
    }
}

/// Transactions attributed to one group on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransDaily {
    /// Group the transactions belong to.
    pub group_id: GroupId,
    /// Calendar day (UTC).
    pub trans_day: NaiveDate,
    /// Transactions attributed to the day.
    pub trans_count: u64,
    /// Chain height observed when the row was last updated.
    pub block_number: u64,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}
