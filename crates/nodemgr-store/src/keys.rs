//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions to encode and decode keys for the primary
//! tables and their indexes. All integers are big-endian so that keys sort
//! numerically and prefix scans stay contiguous.

use chrono::{Datelike, NaiveDate};
use nodemgr_core::{FrontAddr, FrontId, GroupId};

use crate::error::{Result, StoreError};

/// Encode a group key.
#[must_use]
pub fn group_key(group_id: GroupId) -> Vec<u8> {
    group_id.to_be_bytes().to_vec()
}

/// Encode a status-group index key: `status || group_id`.
#[must_use]
pub fn status_group_key(status: u8, group_id: GroupId) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(status);
    key.extend_from_slice(&group_id.to_be_bytes());
    key
}

/// Encode a status prefix for scanning all groups by status.
#[must_use]
pub fn status_prefix(status: u8) -> Vec<u8> {
    vec![status]
}

/// Extract the group ID from a status-group key.
///
/// # Errors
///
/// Returns `StoreError::CorruptKey` if the key is malformed.
pub fn extract_group_from_status_key(key: &[u8]) -> Result<GroupId> {
    decode_group(key.get(1..5), "groups_by_status")
}

/// Encode a front key.
#[must_use]
pub fn front_key(front_id: FrontId) -> Vec<u8> {
    front_id.to_be_bytes().to_vec()
}

/// Encode a front address index key.
#[must_use]
pub fn front_addr_key(addr: &FrontAddr) -> Vec<u8> {
    addr.to_string().into_bytes()
}

/// Encode a mapping key.
#[must_use]
pub fn map_key(map_id: u64) -> Vec<u8> {
    map_id.to_be_bytes().to_vec()
}

/// Decode a mapping id stored as a key or an index value.
///
/// # Errors
///
/// Returns `StoreError::CorruptKey` if the bytes are not 8 long.
pub fn decode_map_id(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::CorruptKey("front_group_maps"))?;
    Ok(u64::from_be_bytes(arr))
}

/// Encode a pair index key: `front_id || group_id`.
#[must_use]
pub fn pair_key(front_id: FrontId, group_id: GroupId) -> Vec<u8> {
    let mut key = Vec::with_capacity(8);
    key.extend_from_slice(&front_id.to_be_bytes());
    key.extend_from_slice(&group_id.to_be_bytes());
    key
}

/// Encode a front prefix for scanning all mappings of a front.
#[must_use]
pub fn front_prefix(front_id: FrontId) -> Vec<u8> {
    front_id.to_be_bytes().to_vec()
}

/// Encode a group-front index key: `group_id || front_id`.
#[must_use]
pub fn group_front_key(group_id: GroupId, front_id: FrontId) -> Vec<u8> {
    let mut key = Vec::with_capacity(8);
    key.extend_from_slice(&group_id.to_be_bytes());
    key.extend_from_slice(&front_id.to_be_bytes());
    key
}

/// Encode a group prefix for scanning all mappings or trans rows of a group.
#[must_use]
pub fn group_prefix(group_id: GroupId) -> Vec<u8> {
    group_id.to_be_bytes().to_vec()
}

/// Day number used in trans-daily keys.
#[must_use]
pub fn day_number(day: NaiveDate) -> u32 {
    u32::try_from(day.num_days_from_ce()).unwrap_or(0)
}

/// Encode a trans-daily key: `group_id || day`.
#[must_use]
pub fn trans_daily_key(group_id: GroupId, day: NaiveDate) -> Vec<u8> {
    let mut key = Vec::with_capacity(8);
    key.extend_from_slice(&group_id.to_be_bytes());
    key.extend_from_slice(&day_number(day).to_be_bytes());
    key
}

fn decode_group(bytes: Option<&[u8]>, table: &'static str) -> Result<GroupId> {
    let arr: [u8; 4] = bytes
        .and_then(|b| b.try_into().ok())
        .ok_or(StoreError::CorruptKey(table))?;
    GroupId::from_be_bytes(arr).map_err(|_| StoreError::CorruptKey(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_key_roundtrip() {
        let group_id = GroupId::new(300).unwrap();
        let key = status_group_key(1, group_id);
        assert_eq!(key.len(), 5);
        assert!(key.starts_with(&status_prefix(1)));
        assert_eq!(extract_group_from_status_key(&key).unwrap(), group_id);
    }

    #[test]
    fn corrupt_status_key() {
        assert!(matches!(
            extract_group_from_status_key(&[1, 0, 0]),
            Err(StoreError::CorruptKey(_))
        ));
        assert!(extract_group_from_status_key(&[1, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn pair_keys_share_front_prefix() {
        let front = FrontId::new(2).unwrap();
        let a = pair_key(front, GroupId::new(1).unwrap());
        let b = pair_key(front, GroupId::new(9).unwrap());
        let other = pair_key(FrontId::new(3).unwrap(), GroupId::new(1).unwrap());
        let prefix = front_prefix(front);
        assert!(a.starts_with(&prefix));
        assert!(b.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
        assert!(a < b);
    }

    #[test]
    fn trans_daily_keys_sort_by_day() {
        let group = GroupId::new(1).unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(trans_daily_key(group, d1) < trans_daily_key(group, d2));
        assert!(trans_daily_key(group, d1).starts_with(&group_prefix(group)));
    }

    #[test]
    fn map_id_roundtrip() {
        assert_eq!(decode_map_id(&map_key(77)).unwrap(), 77);
        assert!(decode_map_id(&[1, 2]).is_err());
    }
}
