//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary group records, keyed by `group_id`.
    pub const GROUPS: &str = "groups";

    /// Index: groups by status, keyed by `status || group_id`.
    pub const GROUPS_BY_STATUS: &str = "groups_by_status";

    /// Primary front records, keyed by `front_id`.
    pub const FRONTS: &str = "fronts";

    /// Unique index: `host:port` to `front_id`.
    pub const FRONTS_BY_ADDR: &str = "fronts_by_addr";

    /// Primary mapping records, keyed by `map_id`.
    pub const FRONT_GROUP_MAPS: &str = "front_group_maps";

    /// Unique index: `front_id || group_id` to `map_id`.
    pub const MAP_PAIRS: &str = "map_pairs";

    /// Index: `group_id || front_id` to `map_id`.
    pub const MAPS_BY_GROUP: &str = "maps_by_group";

    /// Daily transaction aggregates, keyed by `group_id || day`.
    pub const TRANS_DAILY: &str = "trans_daily";

    /// Persistent id counters.
    pub const META: &str = "meta";
}

/// Keys in the `meta` column family.
pub mod meta {
    /// Last front id handed out.
    pub const LAST_FRONT_ID: &[u8] = b"last_front_id";

    /// Last mapping id handed out.
    pub const LAST_MAP_ID: &[u8] = b"last_map_id";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::GROUPS,
        cf::GROUPS_BY_STATUS,
        cf::FRONTS,
        cf::FRONTS_BY_ADDR,
        cf::FRONT_GROUP_MAPS,
        cf::MAP_PAIRS,
        cf::MAPS_BY_GROUP,
        cf::TRANS_DAILY,
        cf::META,
    ]
}
