//! Deterministic chunk identifiers.
//!
//! A chunk id is a UUIDv5 over `(source_name, chunk_index, owner_id)`
//! inside a fixed namespace. Re-ingesting the same file for the same owner
//! reproduces the same ids in the same order, which makes a retried write
//! overwrite instead of duplicate.
//!
//! The name is length-prefixed (`"{len}:{source}|{index}|{len}:{owner}"`), so
//! no choice of characters inside a file name or owner id can make two
//! different tuples encode to the same bytes.

use uuid::Uuid;

/// Namespace for all chunk ids.
pub const CHUNK_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b9e_84d3_5a07_9e41_d2c8_b35f_a610);

/// Stable id for the `chunk_index`-th chunk of `source_name` owned by `owner_id`.
pub fn chunk_id(source_name: &str, chunk_index: usize, owner_id: &str) -> String {
    let name = format!(
        "{}:{}|{}|{}:{}",
        source_name.len(),
        source_name,
        chunk_index,
        owner_id.len(),
        owner_id
    );
    Uuid::new_v5(&CHUNK_NAMESPACE, name.as_bytes()).to_string()
}

/// Ids for a whole document, in chunk order.
pub fn chunk_ids(source_name: &str, count: usize, owner_id: &str) -> Vec<String> {
    (0..count)
        .map(|i| chunk_id(source_name, i, owner_id))
        .collect()
}
