//! Page cache for MarrowDB.
//!
//! This crate provides a fixed-capacity read cache of heap-file pages keyed
//! by `(file path, page id)` with LRU replacement. The cache performs no
//! writeback: writers flush mutated pages to the file directly and then
//! invalidate the corresponding entry, keeping the file the source of truth.

mod cache;
mod replacer;

pub use cache::{CacheStats, PageCache, PageKey};
pub use replacer::{FrameId, LruReplacer, Replacer};
