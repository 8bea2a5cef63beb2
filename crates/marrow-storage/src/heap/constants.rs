//! Heap page layout constants.

/// Size of the page header in bytes.
///
/// Layout: free-space pointer (4, i32), slot count (2, i16), reserved (2).
pub const HEAP_HEADER_SIZE: usize = 8;

/// Size of a slot directory entry in bytes: record offset (i16) and record
/// length (i16).
pub const SLOT_ENTRY_SIZE: usize = 4;

/// Sentinel offset marking a tombstoned slot.
pub const TOMBSTONE: i16 = -1;
