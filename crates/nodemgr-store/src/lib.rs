//! `RocksDB` storage layer for the node manager.
//!
//! This crate provides persistent storage for groups, fronts, the many-to-many
//! association between them and the daily transaction aggregates, using
//! `RocksDB` with column families for indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `groups`: Group records, keyed by `group_id`
//! - `groups_by_status`: Index for listing groups by status
//! - `fronts`: Front records, keyed by `front_id`
//! - `fronts_by_addr`: Unique `host:port` index
//! - `front_group_maps`: Mapping records, keyed by insertion-ordered `map_id`
//! - `map_pairs` / `maps_by_group`: Pair indexes for both sides
//! - `trans_daily`: Per-group, per-day transaction counts
//! - `meta`: Persistent id counters
//!
//! # Consistency
//!
//! Group, front and mapping rows have independent lifecycles. Removing a
//! group or invalidating it does not cascade to its mappings; the
//! [`Store::remove_invalid_maps`] sweep restores the invariant that every
//! mapping references an existing front and a live group. Between sweeps a
//! stale mapping may be observed.
//!
//! # Example
//!
//! ```no_run
//! use nodemgr_store::{GroupStatus, RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/nodemgr-db").unwrap();
//!
//! let normal = store.list_groups_by_status(GroupStatus::Normal).unwrap();
//! println!("{} normal groups", normal.len());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{Front, FrontGroup, FrontGroupMap, Group, GroupStatus, MapFilter, TransDaily};

use chrono::NaiveDate;
use nodemgr_core::{FrontAddr, FrontId, GroupId};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Group Registry
    // =========================================================================

    /// Insert or replace a group record, maintaining the status index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_group(&self, group: &Group) -> Result<()>;

    /// Insert a group unless one with the same id exists.
    ///
    /// Returns `true` if the group was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_group_if_absent(&self, group: &Group) -> Result<bool>;

    /// Get a group by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_group(&self, group_id: GroupId) -> Result<Option<Group>>;

    /// Hard-delete a group record.
    ///
    /// Mappings referencing the group are left for the invalid-map sweep.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the group doesn't exist.
    fn delete_group(&self, group_id: GroupId) -> Result<()>;

    /// Update a group's status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the group doesn't exist.
    fn update_group_status(&self, group_id: GroupId, status: GroupStatus) -> Result<()>;

    /// Record the latest observed chain height and transaction count.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the group doesn't exist.
    fn update_group_counters(
        &self,
        group_id: GroupId,
        latest_block: u64,
        trans_count: u64,
    ) -> Result<()>;

    /// List groups with the given status, ordered by group id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_groups_by_status(&self, status: GroupStatus) -> Result<Vec<Group>>;

    /// Count groups with the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_groups_by_status(&self, status: GroupStatus) -> Result<u32>;

    // =========================================================================
    // Front Registry
    // =========================================================================

    /// Register a front, assigning the next front id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateFront` if the address is already registered.
    fn add_front(&self, addr: &FrontAddr) -> Result<Front>;

    /// Get a front by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_front(&self, front_id: FrontId) -> Result<Option<Front>>;

    /// Look a front up by its address.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_front_by_addr(&self, addr: &FrontAddr) -> Result<Option<Front>>;

    /// List all registered fronts, ordered by front id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_fronts(&self) -> Result<Vec<Front>>;

    /// Unregister a front and drop its mappings.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the front doesn't exist.
    fn delete_front(&self, front_id: FrontId) -> Result<()>;

    // =========================================================================
    // FrontGroupMap Store
    // =========================================================================

    /// Add one (front, group) association.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateMapping` if the pair already exists.
    fn add_map(&self, front_id: FrontId, group_id: GroupId) -> Result<FrontGroupMap>;

    /// Remove one association. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn remove_map(&self, front_id: FrontId, group_id: GroupId) -> Result<bool>;

    /// Count associations matching the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_maps(&self, filter: &MapFilter) -> Result<u32>;

    /// List associations matching the filter, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_maps(&self, filter: &MapFilter) -> Result<Vec<FrontGroup>>;

    /// Remove every association of a group. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn remove_maps_by_group(&self, group_id: GroupId) -> Result<usize>;

    /// Remove every association of a front. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn remove_maps_by_front(&self, front_id: FrontId) -> Result<usize>;

    /// Remove associations whose front is gone or whose group is gone or
    /// invalid. Returns the number of rows removed.
    ///
    /// A mapping that is valid when the delete is applied is never removed,
    /// nor is a mapping inserted after the sweep began.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn remove_invalid_maps(&self) -> Result<usize>;

    // =========================================================================
    // Trans Daily
    // =========================================================================

    /// Insert or replace a daily aggregate row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_trans_daily(&self, row: &TransDaily) -> Result<()>;

    /// Get the aggregate row for one group and day.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_trans_daily(&self, group_id: GroupId, day: NaiveDate) -> Result<Option<TransDaily>>;

    /// List a group's rows for days in `from..=to`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_trans_daily(
        &self,
        group_id: GroupId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TransDaily>>;

    /// Sum of all daily counts for a group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn total_trans(&self, group_id: GroupId) -> Result<u64>;
}
