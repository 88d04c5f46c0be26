//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//!
//! Mapping writes (add, bulk removal and the delete phase of the invalid-map
//! sweep) are serialised by one mutex so that the pair-uniqueness check and
//! the insert are atomic. Group read-modify-write updates and front
//! registration each have their own mutex. Reads never take a lock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use nodemgr_core::{FrontAddr, FrontId, GroupId};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, meta};
use crate::types::{Front, FrontGroup, FrontGroupMap, Group, GroupStatus, MapFilter, TransDaily};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    group_lock: Mutex<()>,
    front_lock: Mutex<()>,
    map_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            group_lock: Mutex::new(()),
            front_lock: Mutex::new(()),
            map_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Point read and decode.
    fn read<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect all entries whose key starts with `prefix`.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;

            // Stop if we're past the prefix
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Bump a persistent counter inside `batch` and return the new value.
    ///
    /// Callers must hold the lock that guards the counter.
    fn next_counter(&self, batch: &mut WriteBatch, key: &[u8]) -> Result<u64> {
        let cf_meta = self.cf(cf::META)?;
        let last = match self.db.get_cf(&cf_meta, key)? {
            Some(bytes) => keys::decode_map_id(&bytes)?,
            None => 0,
        };
        let next = last
            .checked_add(1)
            .ok_or_else(|| StoreError::Database("id counter overflow".to_string()))?;
        batch.put_cf(&cf_meta, key, next.to_be_bytes());
        Ok(next)
    }

    /// Stage a group write, fixing up the status index.
    fn stage_group(&self, batch: &mut WriteBatch, group: &Group, old: Option<&Group>) -> Result<()> {
        let cf_groups = self.cf(cf::GROUPS)?;
        let cf_by_status = self.cf(cf::GROUPS_BY_STATUS)?;

        if let Some(old) = old {
            if old.status != group.status {
                batch.delete_cf(
                    &cf_by_status,
                    keys::status_group_key(old.status.as_u8(), group.group_id),
                );
            }
        }
        batch.put_cf(
            &cf_groups,
            keys::group_key(group.group_id),
            Self::serialize(group)?,
        );
        batch.put_cf(
            &cf_by_status,
            keys::status_group_key(group.status.as_u8(), group.group_id),
            b"",
        );
        Ok(())
    }

    /// Read-modify-write of one group under the group lock.
    fn modify_group(&self, group_id: GroupId, f: impl FnOnce(&mut Group)) -> Result<()> {
        let _guard = self.group_lock.lock();
        let old: Group = self
            .read(cf::GROUPS, &keys::group_key(group_id))?
            .ok_or(StoreError::NotFound)?;
        let mut group = old.clone();
        f(&mut group);
        group.updated_at = Utc::now();

        let mut batch = WriteBatch::default();
        self.stage_group(&mut batch, &group, Some(&old))?;
        self.db.write(batch)?;
        Ok(())
    }

    /// Stage removal of a mapping row and both pair indexes.
    fn stage_map_delete(&self, batch: &mut WriteBatch, map: &FrontGroupMap) -> Result<()> {
        let cf_maps = self.cf(cf::FRONT_GROUP_MAPS)?;
        let cf_pairs = self.cf(cf::MAP_PAIRS)?;
        let cf_by_group = self.cf(cf::MAPS_BY_GROUP)?;

        batch.delete_cf(&cf_maps, keys::map_key(map.map_id));
        batch.delete_cf(&cf_pairs, keys::pair_key(map.front_id, map.group_id));
        batch.delete_cf(&cf_by_group, keys::group_front_key(map.group_id, map.front_id));
        Ok(())
    }

    /// Mapping id currently stored for a pair.
    fn pair_map_id(&self, front_id: FrontId, group_id: GroupId) -> Result<Option<u64>> {
        let cf_pairs = self.cf(cf::MAP_PAIRS)?;
        self.db
            .get_cf(&cf_pairs, keys::pair_key(front_id, group_id))?
            .map(|bytes| keys::decode_map_id(&bytes))
            .transpose()
    }

    fn get_map(&self, map_id: u64) -> Result<Option<FrontGroupMap>> {
        self.read(cf::FRONT_GROUP_MAPS, &keys::map_key(map_id))
    }

    /// Load mapping rows referenced by index entries whose value is a map id.
    fn maps_from_index(&self, entries: Vec<(Box<[u8]>, Box<[u8]>)>) -> Result<Vec<FrontGroupMap>> {
        let mut maps = Vec::with_capacity(entries.len());
        for (_, value) in entries {
            let map_id = keys::decode_map_id(&value)?;
            if let Some(map) = self.get_map(map_id)? {
                maps.push(map);
            }
        }
        Ok(maps)
    }

    /// Candidate mapping rows for a filter, before the join.
    fn candidate_maps(&self, filter: &MapFilter) -> Result<Vec<FrontGroupMap>> {
        match (filter.front_id, filter.group_id) {
            (Some(front_id), Some(group_id)) => Ok(self
                .pair_map_id(front_id, group_id)?
                .map(|id| self.get_map(id))
                .transpose()?
                .flatten()
                .into_iter()
                .collect()),
            (Some(front_id), None) => {
                let entries = self.scan_prefix(cf::MAP_PAIRS, &keys::front_prefix(front_id))?;
                self.maps_from_index(entries)
            }
            (None, Some(group_id)) => {
                let entries = self.scan_prefix(cf::MAPS_BY_GROUP, &keys::group_prefix(group_id))?;
                self.maps_from_index(entries)
            }
            (None, None) => {
                let cf_maps = self.cf(cf::FRONT_GROUP_MAPS)?;
                let mut maps = Vec::new();
                for item in self.db.iterator_cf(&cf_maps, IteratorMode::Start) {
                    let (_, value) = item?;
                    maps.push(Self::deserialize(&value)?);
                }
                Ok(maps)
            }
        }
    }

    /// Join mapping rows with their front and group, memoising lookups.
    fn join(&self, maps: Vec<FrontGroupMap>) -> Result<Vec<FrontGroup>> {
        let mut fronts: HashMap<FrontId, Option<Front>> = HashMap::new();
        let mut groups: HashMap<GroupId, Option<GroupStatus>> = HashMap::new();
        let mut rows = Vec::with_capacity(maps.len());

        for map in maps {
            if !fronts.contains_key(&map.front_id) {
                fronts.insert(map.front_id, self.get_front(map.front_id)?);
            }
            if !groups.contains_key(&map.group_id) {
                let status = self.get_group(map.group_id)?.map(|g| g.status);
                groups.insert(map.group_id, status);
            }
            let front = fronts.get(&map.front_id).and_then(Option::as_ref);
            rows.push(FrontGroup {
                map_id: map.map_id,
                front_id: map.front_id,
                group_id: map.group_id,
                front_host: front.map(|f| f.host.clone()),
                front_port: front.map(|f| f.port),
                group_status: groups.get(&map.group_id).copied().flatten(),
                created_at: map.created_at,
            });
        }
        Ok(rows)
    }

    /// Whether a mapping currently references an existing front and a live group.
    fn map_is_valid(&self, map: &FrontGroupMap) -> Result<bool> {
        if self.get_front(map.front_id)?.is_none() {
            return Ok(false);
        }
        Ok(self
            .get_group(map.group_id)?
            .is_some_and(|g| g.status.is_live()))
    }

    /// Remove every mapping found through an index prefix.
    fn remove_maps_by_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<usize> {
        let _guard = self.map_lock.lock();
        let maps = self.maps_from_index(self.scan_prefix(cf_name, prefix)?)?;
        if maps.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::default();
        for map in &maps {
            self.stage_map_delete(&mut batch, map)?;
        }
        self.db.write(batch)?;
        Ok(maps.len())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Group Registry
    // =========================================================================

    fn put_group(&self, group: &Group) -> Result<()> {
        let _guard = self.group_lock.lock();
        let old: Option<Group> = self.read(cf::GROUPS, &keys::group_key(group.group_id))?;

        let mut batch = WriteBatch::default();
        self.stage_group(&mut batch, group, old.as_ref())?;
        self.db.write(batch)?;
        Ok(())
    }

    fn insert_group_if_absent(&self, group: &Group) -> Result<bool> {
        let _guard = self.group_lock.lock();
        if self.get_group(group.group_id)?.is_some() {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        self.stage_group(&mut batch, group, None)?;
        self.db.write(batch)?;
        Ok(true)
    }

    fn get_group(&self, group_id: GroupId) -> Result<Option<Group>> {
        self.read(cf::GROUPS, &keys::group_key(group_id))
    }

    fn delete_group(&self, group_id: GroupId) -> Result<()> {
        let _guard = self.group_lock.lock();
        let group = self.get_group(group_id)?.ok_or(StoreError::NotFound)?;

        let cf_groups = self.cf(cf::GROUPS)?;
        let cf_by_status = self.cf(cf::GROUPS_BY_STATUS)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_groups, keys::group_key(group_id));
        batch.delete_cf(
            &cf_by_status,
            keys::status_group_key(group.status.as_u8(), group_id),
        );
        self.db.write(batch)?;
        Ok(())
    }

    fn update_group_status(&self, group_id: GroupId, status: GroupStatus) -> Result<()> {
        self.modify_group(group_id, |group| group.status = status)
    }

    fn update_group_counters(
        &self,
        group_id: GroupId,
        latest_block: u64,
        trans_count: u64,
    ) -> Result<()> {
        self.modify_group(group_id, |group| {
            group.latest_block = latest_block;
            group.trans_count = trans_count;
        })
    }

    fn list_groups_by_status(&self, status: GroupStatus) -> Result<Vec<Group>> {
        let entries = self.scan_prefix(cf::GROUPS_BY_STATUS, &keys::status_prefix(status.as_u8()))?;

        let mut groups = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let group_id = keys::extract_group_from_status_key(&key)?;
            if let Some(group) = self.get_group(group_id)? {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    fn count_groups_by_status(&self, status: GroupStatus) -> Result<u32> {
        let entries = self.scan_prefix(cf::GROUPS_BY_STATUS, &keys::status_prefix(status.as_u8()))?;
        Ok(u32::try_from(entries.len()).unwrap_or(u32::MAX))
    }

    // =========================================================================
    // Front Registry
    // =========================================================================

    fn add_front(&self, addr: &FrontAddr) -> Result<Front> {
        let _guard = self.front_lock.lock();
        let cf_fronts = self.cf(cf::FRONTS)?;
        let cf_by_addr = self.cf(cf::FRONTS_BY_ADDR)?;

        let addr_key = keys::front_addr_key(addr);
        if self.db.get_cf(&cf_by_addr, &addr_key)?.is_some() {
            return Err(StoreError::DuplicateFront(addr.clone()));
        }

        let mut batch = WriteBatch::default();
        let next = self.next_counter(&mut batch, meta::LAST_FRONT_ID)?;
        let front_id = u32::try_from(next)
            .ok()
            .and_then(|n| FrontId::new(n).ok())
            .ok_or_else(|| StoreError::Database("front id space exhausted".to_string()))?;

        let front = Front {
            front_id,
            host: addr.host.clone(),
            port: addr.port,
            created_at: Utc::now(),
        };

        batch.put_cf(&cf_fronts, keys::front_key(front_id), Self::serialize(&front)?);
        batch.put_cf(&cf_by_addr, &addr_key, front_id.to_be_bytes());
        self.db.write(batch)?;

        tracing::debug!(front_id = %front_id, addr = %addr, "Registered front");
        Ok(front)
    }

    fn get_front(&self, front_id: FrontId) -> Result<Option<Front>> {
        self.read(cf::FRONTS, &keys::front_key(front_id))
    }

    fn get_front_by_addr(&self, addr: &FrontAddr) -> Result<Option<Front>> {
        let cf_by_addr = self.cf(cf::FRONTS_BY_ADDR)?;
        let Some(bytes) = self.db.get_cf(&cf_by_addr, keys::front_addr_key(addr))? else {
            return Ok(None);
        };
        let arr: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::CorruptKey("fronts_by_addr"))?;
        let front_id =
            FrontId::from_be_bytes(arr).map_err(|_| StoreError::CorruptKey("fronts_by_addr"))?;
        self.get_front(front_id)
    }

    fn list_fronts(&self) -> Result<Vec<Front>> {
        let cf = self.cf(cf::FRONTS)?;

        let mut fronts = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            fronts.push(Self::deserialize(&value)?);
        }
        Ok(fronts)
    }

    fn delete_front(&self, front_id: FrontId) -> Result<()> {
        {
            let _guard = self.front_lock.lock();
            let front = self.get_front(front_id)?.ok_or(StoreError::NotFound)?;

            let cf_fronts = self.cf(cf::FRONTS)?;
            let cf_by_addr = self.cf(cf::FRONTS_BY_ADDR)?;

            let mut batch = WriteBatch::default();
            batch.delete_cf(&cf_fronts, keys::front_key(front_id));
            batch.delete_cf(&cf_by_addr, keys::front_addr_key(&front.addr()));
            self.db.write(batch)?;
        }

        let removed = self.remove_maps_by_front(front_id)?;
        tracing::debug!(front_id = %front_id, removed, "Deleted front");
        Ok(())
    }

    // =========================================================================
    // FrontGroupMap Store
    // =========================================================================

    fn add_map(&self, front_id: FrontId, group_id: GroupId) -> Result<FrontGroupMap> {
        let _guard = self.map_lock.lock();
        if self.pair_map_id(front_id, group_id)?.is_some() {
            return Err(StoreError::DuplicateMapping { front_id, group_id });
        }

        let cf_maps = self.cf(cf::FRONT_GROUP_MAPS)?;
        let cf_pairs = self.cf(cf::MAP_PAIRS)?;
        let cf_by_group = self.cf(cf::MAPS_BY_GROUP)?;

        let mut batch = WriteBatch::default();
        let map_id = self.next_counter(&mut batch, meta::LAST_MAP_ID)?;
        let map = FrontGroupMap {
            map_id,
            front_id,
            group_id,
            created_at: Utc::now(),
        };

        batch.put_cf(&cf_maps, keys::map_key(map_id), Self::serialize(&map)?);
        batch.put_cf(&cf_pairs, keys::pair_key(front_id, group_id), keys::map_key(map_id));
        batch.put_cf(
            &cf_by_group,
            keys::group_front_key(group_id, front_id),
            keys::map_key(map_id),
        );
        self.db.write(batch)?;

        Ok(map)
    }

    fn remove_map(&self, front_id: FrontId, group_id: GroupId) -> Result<bool> {
        let _guard = self.map_lock.lock();
        let Some(map_id) = self.pair_map_id(front_id, group_id)? else {
            return Ok(false);
        };

        let map = FrontGroupMap {
            map_id,
            front_id,
            group_id,
            created_at: Utc::now(),
        };
        let mut batch = WriteBatch::default();
        self.stage_map_delete(&mut batch, &map)?;
        self.db.write(batch)?;
        Ok(true)
    }

    fn count_maps(&self, filter: &MapFilter) -> Result<u32> {
        let count = self.list_maps(filter)?.len();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn list_maps(&self, filter: &MapFilter) -> Result<Vec<FrontGroup>> {
        let maps = self.candidate_maps(filter)?;
        let mut rows: Vec<FrontGroup> = self
            .join(maps)?
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect();
        rows.sort_by_key(|row| row.map_id);
        Ok(rows)
    }

    fn remove_maps_by_group(&self, group_id: GroupId) -> Result<usize> {
        self.remove_maps_by_prefix(cf::MAPS_BY_GROUP, &keys::group_prefix(group_id))
    }

    fn remove_maps_by_front(&self, front_id: FrontId) -> Result<usize> {
        self.remove_maps_by_prefix(cf::MAP_PAIRS, &keys::front_prefix(front_id))
    }

    fn remove_invalid_maps(&self) -> Result<usize> {
        // Phase one: find candidates against a point-in-time snapshot, no lock held.
        let candidates = {
            let cf_maps = self.cf(cf::FRONT_GROUP_MAPS)?;
            let snapshot = self.db.snapshot();

            let mut candidates = Vec::new();
            for item in snapshot.iterator_cf(&cf_maps, IteratorMode::Start) {
                let (_, value) = item?;
                let map: FrontGroupMap = Self::deserialize(&value)?;
                if !self.map_is_valid(&map)? {
                    candidates.push(map);
                }
            }
            candidates
        };

        if candidates.is_empty() {
            return Ok(0);
        }

        // Phase two: under the map lock, delete only rows that are still the
        // same row and still invalid.
        let _guard = self.map_lock.lock();
        let mut batch = WriteBatch::default();
        let mut removed = 0;
        for map in &candidates {
            if self.pair_map_id(map.front_id, map.group_id)? != Some(map.map_id) {
                continue;
            }
            if self.map_is_valid(map)? {
                continue;
            }
            self.stage_map_delete(&mut batch, map)?;
            removed += 1;
        }
        self.db.write(batch)?;

        tracing::debug!(
            candidates = candidates.len(),
            removed,
            "Removed invalid front-group mappings"
        );
        Ok(removed)
    }

    // =========================================================================
    // Trans Daily
    // =========================================================================

    fn put_trans_daily(&self, row: &TransDaily) -> Result<()> {
        let cf = self.cf(cf::TRANS_DAILY)?;
        self.db.put_cf(
            &cf,
            keys::trans_daily_key(row.group_id, row.trans_day),
            Self::serialize(row)?,
        )?;
        Ok(())
    }

    fn get_trans_daily(&self, group_id: GroupId, day: NaiveDate) -> Result<Option<TransDaily>> {
        self.read(cf::TRANS_DAILY, &keys::trans_daily_key(group_id, day))
    }

    fn list_trans_daily(
        &self,
        group_id: GroupId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TransDaily>> {
        let cf = self.cf(cf::TRANS_DAILY)?;
        let start = keys::trans_daily_key(group_id, from);
        let end = keys::trans_daily_key(group_id, to);

        let mut rows = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start, Direction::Forward))
        {
            let (key, value) = item?;
            if key.as_ref() > end.as_slice() {
                break;
            }
            rows.push(Self::deserialize(&value)?);
        }
        Ok(rows)
    }

    fn total_trans(&self, group_id: GroupId) -> Result<u64> {
        let entries = self.scan_prefix(cf::TRANS_DAILY, &keys::group_prefix(group_id))?;

        let mut total = 0u64;
        for (_, value) in entries {
            let row: TransDaily = Self::deserialize(&value)?;
            total = total.saturating_add(row.trans_count);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn gid(n: u32) -> GroupId {
        GroupId::new(n).unwrap()
    }

    fn addr(host: &str, port: u16) -> FrontAddr {
        FrontAddr::new(host, port).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn group_crud() {
        let (store, _dir) = create_test_store();
        let group = Group::new(gid(1), "first");

        // Create
        assert!(store.insert_group_if_absent(&group).unwrap());
        assert!(!store.insert_group_if_absent(&group).unwrap());

        // Read
        let retrieved = store.get_group(gid(1)).unwrap().unwrap();
        assert_eq!(retrieved.description, "first");
        assert_eq!(retrieved.status, GroupStatus::Normal);

        // Update
        store
            .update_group_counters(gid(1), 100, 80)
            .unwrap();
        let updated = store.get_group(gid(1)).unwrap().unwrap();
        assert_eq!(updated.latest_block, 100);
        assert_eq!(updated.trans_count, 80);

        // Delete
        store.delete_group(gid(1)).unwrap();
        assert!(store.get_group(gid(1)).unwrap().is_none());
        assert!(matches!(
            store.delete_group(gid(1)),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn status_index_updated_on_change() {
        let (store, _dir) = create_test_store();
        store.put_group(&Group::new(gid(1), "")).unwrap();
        store.put_group(&Group::new(gid(2), "")).unwrap();

        assert_eq!(store.count_groups_by_status(GroupStatus::Normal).unwrap(), 2);

        store
            .update_group_status(gid(2), GroupStatus::Invalid)
            .unwrap();

        let normal = store.list_groups_by_status(GroupStatus::Normal).unwrap();
        assert_eq!(normal.len(), 1);
        assert_eq!(normal[0].group_id, gid(1));
        assert_eq!(store.count_groups_by_status(GroupStatus::Invalid).unwrap(), 1);
        assert_eq!(store.get_group(gid(2)).unwrap().unwrap().status, GroupStatus::Invalid);
    }

    #[test]
    fn list_groups_ordered_by_id() {
        let (store, _dir) = create_test_store();
        for n in [300, 2, 17] {
            store.put_group(&Group::new(gid(n), "")).unwrap();
        }
        let ids: Vec<u32> = store
            .list_groups_by_status(GroupStatus::Normal)
            .unwrap()
            .iter()
            .map(|g| g.group_id.get())
            .collect();
        assert_eq!(ids, vec![2, 17, 300]);
    }

    #[test]
    fn front_registration() {
        let (store, _dir) = create_test_store();
        let a = store.add_front(&addr("10.0.0.1", 8081)).unwrap();
        let b = store.add_front(&addr("10.0.0.2", 8081)).unwrap();
        assert_ne!(a.front_id, b.front_id);

        assert!(matches!(
            store.add_front(&addr("10.0.0.1", 8081)),
            Err(StoreError::DuplicateFront(_))
        ));

        let found = store
            .get_front_by_addr(&addr("10.0.0.2", 8081))
            .unwrap()
            .unwrap();
        assert_eq!(found.front_id, b.front_id);
        assert!(store
            .get_front_by_addr(&addr("10.0.0.3", 8081))
            .unwrap()
            .is_none());
        assert_eq!(store.list_fronts().unwrap().len(), 2);
    }

    #[test]
    fn front_ids_not_reused_after_delete() {
        let (store, _dir) = create_test_store();
        let a = store.add_front(&addr("10.0.0.1", 8081)).unwrap();
        store.delete_front(a.front_id).unwrap();
        let b = store.add_front(&addr("10.0.0.1", 8081)).unwrap();
        assert!(b.front_id > a.front_id);
    }

    #[test]
    fn add_map_rejects_duplicates() {
        let (store, _dir) = create_test_store();
        let front = store.add_front(&addr("10.0.0.1", 8081)).unwrap();
        store.put_group(&Group::new(gid(1), "")).unwrap();

        store.add_map(front.front_id, gid(1)).unwrap();
        let result = store.add_map(front.front_id, gid(1));
        assert!(matches!(result, Err(StoreError::DuplicateMapping { .. })));
        assert_eq!(store.count_maps(&MapFilter::default()).unwrap(), 1);
    }

    #[test]
    fn list_maps_in_insertion_order_with_filters() {
        let (store, _dir) = create_test_store();
        let a = store.add_front(&addr("10.0.0.1", 8081)).unwrap().front_id;
        let b = store.add_front(&addr("10.0.0.2", 8081)).unwrap().front_id;
        for n in [1, 2, 3] {
            store.put_group(&Group::new(gid(n), "")).unwrap();
        }
        store
            .update_group_status(gid(3), GroupStatus::Maintaining)
            .unwrap();

        store.add_map(a, gid(3)).unwrap();
        store.add_map(a, gid(1)).unwrap();
        store.add_map(b, gid(1)).unwrap();
        store.add_map(a, gid(2)).unwrap();

        let groups_of_a: Vec<u32> = store
            .list_maps(&MapFilter::by_front(a))
            .unwrap()
            .iter()
            .map(|r| r.group_id.get())
            .collect();
        assert_eq!(groups_of_a, vec![3, 1, 2]);

        let fronts_of_1 = store.list_maps(&MapFilter::by_group(gid(1))).unwrap();
        assert_eq!(fronts_of_1.len(), 2);
        assert_eq!(fronts_of_1[0].front_id, a);
        assert_eq!(fronts_of_1[0].front_host.as_deref(), Some("10.0.0.1"));

        let normal_on_a = MapFilter::by_front(a).with_status(GroupStatus::Normal);
        assert_eq!(store.count_maps(&normal_on_a).unwrap(), 2);

        let pair = MapFilter {
            front_id: Some(b),
            group_id: Some(gid(1)),
            group_status: None,
        };
        assert_eq!(store.count_maps(&pair).unwrap(), 1);
        assert_eq!(store.count_maps(&MapFilter::default()).unwrap(), 4);
    }

    #[test]
    fn bulk_removal_is_idempotent() {
        let (store, _dir) = create_test_store();
        let a = store.add_front(&addr("10.0.0.1", 8081)).unwrap().front_id;
        let b = store.add_front(&addr("10.0.0.2", 8081)).unwrap().front_id;
        store.put_group(&Group::new(gid(1), "")).unwrap();
        store.put_group(&Group::new(gid(2), "")).unwrap();
        store.add_map(a, gid(1)).unwrap();
        store.add_map(b, gid(1)).unwrap();
        store.add_map(a, gid(2)).unwrap();

        assert_eq!(store.remove_maps_by_group(gid(1)).unwrap(), 2);
        assert_eq!(store.remove_maps_by_group(gid(1)).unwrap(), 0);
        assert_eq!(store.remove_maps_by_front(a).unwrap(), 1);
        assert_eq!(store.remove_maps_by_front(a).unwrap(), 0);
        assert_eq!(store.count_maps(&MapFilter::default()).unwrap(), 0);

        store.add_map(a, gid(2)).unwrap();
        assert!(store.remove_map(a, gid(2)).unwrap());
        assert!(!store.remove_map(a, gid(2)).unwrap());
    }

    #[test]
    fn delete_front_drops_its_mappings() {
        let (store, _dir) = create_test_store();
        let a = store.add_front(&addr("10.0.0.1", 8081)).unwrap().front_id;
        let b = store.add_front(&addr("10.0.0.2", 8081)).unwrap().front_id;
        store.put_group(&Group::new(gid(1), "")).unwrap();
        store.add_map(a, gid(1)).unwrap();
        store.add_map(b, gid(1)).unwrap();

        store.delete_front(a).unwrap();

        let rows = store.list_maps(&MapFilter::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].front_id, b);
    }

    #[test]
    fn remove_invalid_maps_keeps_valid_rows() {
        let (store, _dir) = create_test_store();
        let a = store.add_front(&addr("10.0.0.1", 8081)).unwrap().front_id;
        for n in [1, 2, 3, 4, 5] {
            store.put_group(&Group::new(gid(n), "")).unwrap();
        }
        store
            .update_group_status(gid(4), GroupStatus::Maintaining)
            .unwrap();
        for n in [1, 2, 3, 4, 5] {
            store.add_map(a, gid(n)).unwrap();
        }

        // group 3 deleted, group 5 invalidated
        store.delete_group(gid(3)).unwrap();
        store
            .update_group_status(gid(5), GroupStatus::Invalid)
            .unwrap();

        assert_eq!(store.remove_invalid_maps().unwrap(), 2);

        let remaining: Vec<u32> = store
            .list_maps(&MapFilter::by_front(a))
            .unwrap()
            .iter()
            .map(|r| r.group_id.get())
            .collect();
        assert_eq!(remaining, vec![1, 2, 4]);

        // nothing left to do
        assert_eq!(store.remove_invalid_maps().unwrap(), 0);
    }

    #[test]
    fn remove_invalid_maps_drops_rows_of_missing_fronts() {
        let (store, _dir) = create_test_store();
        store.put_group(&Group::new(gid(1), "")).unwrap();
        let ghost = FrontId::new(99).unwrap();
        store.add_map(ghost, gid(1)).unwrap();

        let rows = store.list_maps(&MapFilter::default()).unwrap();
        assert!(!rows[0].is_valid());

        assert_eq!(store.remove_invalid_maps().unwrap(), 1);
        assert_eq!(store.count_maps(&MapFilter::default()).unwrap(), 0);
    }

    #[test]
    fn readded_mapping_gets_fresh_id() {
        let (store, _dir) = create_test_store();
        let a = store.add_front(&addr("10.0.0.1", 8081)).unwrap().front_id;
        store.put_group(&Group::new(gid(1), "")).unwrap();

        let first = store.add_map(a, gid(1)).unwrap();
        store.remove_map(a, gid(1)).unwrap();
        let second = store.add_map(a, gid(1)).unwrap();
        assert!(second.map_id > first.map_id);
    }

    #[test]
    fn concurrent_add_and_sweep_never_prune_valid_rows() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let a = store.add_front(&addr("10.0.0.1", 8081)).unwrap().front_id;
        for n in 1..=50 {
            store.put_group(&Group::new(gid(n), "")).unwrap();
        }

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for n in 1..=50 {
                    store.add_map(a, gid(n)).unwrap();
                }
            })
        };
        let sweeper = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..20 {
                    assert_eq!(store.remove_invalid_maps().unwrap(), 0);
                }
            })
        };
        writer.join().unwrap();
        sweeper.join().unwrap();

        assert_eq!(store.count_maps(&MapFilter::by_front(a)).unwrap(), 50);
    }

    #[test]
    fn trans_daily_rows() {
        let (store, _dir) = create_test_store();
        let group = gid(1);
        for (d, count) in [(1, 10), (2, 20), (3, 30)] {
            store
                .put_trans_daily(&TransDaily {
                    group_id: group,
                    trans_day: day(2025, 3, d),
                    trans_count: count,
                    block_number: 0,
                    updated_at: Utc::now(),
                })
                .unwrap();
        }
        // another group's row must not leak into the scans
        store
            .put_trans_daily(&TransDaily {
                group_id: gid(2),
                trans_day: day(2025, 3, 2),
                trans_count: 1000,
                block_number: 0,
                updated_at: Utc::now(),
            })
            .unwrap();

        let rows = store
            .list_trans_daily(group, day(2025, 3, 2), day(2025, 3, 9))
            .unwrap();
        let counts: Vec<u64> = rows.iter().map(|r| r.trans_count).collect();
        assert_eq!(counts, vec![20, 30]);

        assert_eq!(store.total_trans(group).unwrap(), 60);
        assert_eq!(
            store
                .get_trans_daily(group, day(2025, 3, 1))
                .unwrap()
                .unwrap()
                .trans_count,
            10
        );
        assert!(store
            .get_trans_daily(group, day(2025, 3, 4))
            .unwrap()
            .is_none());
    }
}
