//! Fixed-capacity page cache with LRU replacement.

use crate::replacer::{FrameId, LruReplacer, Replacer};
use log::trace;
use marrow_common::page::{page_offset, PAGE_SIZE};
use marrow_common::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Cache key: a page within a specific heap file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    /// Path of the heap file.
    pub file: PathBuf,
    /// Page number within the file (0-indexed).
    pub page_id: u32,
}

impl PageKey {
    /// Creates a new page key.
    pub fn new(file: impl Into<PathBuf>, page_id: u32) -> Self {
        Self {
            file: file.into(),
            page_id,
        }
    }
}

impl std::fmt::Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.page_id)
    }
}

/// A frame holding one cached page.
struct Frame {
    /// Key of the resident page, None while the frame is free.
    key: Option<PageKey>,
    /// Page data buffer.
    data: Box<[u8; PAGE_SIZE]>,
}

impl Frame {
    fn new() -> Self {
        Self {
            key: None,
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }
}

/// Interior cache state, guarded by one mutex.
///
/// A single lock is enough here: the engine is single-threaded cooperative,
/// and the spec only requires get/invalidate to be mutually exclusive.
struct CacheInner {
    frames: Vec<Frame>,
    page_table: HashMap<PageKey, FrameId>,
    free_list: Vec<FrameId>,
    replacer: LruReplacer,
    hits: u64,
    misses: u64,
}

/// Counters and occupancy snapshot of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub resident: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Fixed-capacity cache of heap-file pages.
///
/// `get_page` returns a copy of the cached buffer; mutating the copy does
/// not affect the cache. After writing a page back to its file, callers
/// must invalidate the entry so the next read observes the file.
///
/// The cache performs no writeback: evicted frames are simply dropped,
/// which is safe because the file is always the source of truth.
pub struct PageCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl PageCache {
    /// Creates a new page cache with the given capacity in pages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "page cache capacity must be at least 1");

        let frames = (0..capacity).map(|_| Frame::new()).collect();
        let free_list = (0..capacity).map(|i| FrameId(i as u32)).collect();

        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                frames,
                page_table: HashMap::with_capacity(capacity),
                free_list,
                replacer: LruReplacer::with_capacity(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Returns the cache capacity in pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of resident pages.
    pub fn len(&self) -> usize {
        self.inner.lock().page_table.len()
    }

    /// Returns true if no pages are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks whether a page is resident without touching recency state.
    pub fn contains(&self, file: &Path, page_id: u32) -> bool {
        let key = PageKey::new(file, page_id);
        self.inner.lock().page_table.contains_key(&key)
    }

    /// Returns the page for `(file, page_id)`, loading it on a miss.
    ///
    /// An offset at or past end-of-file yields a zeroed buffer (the page
    /// has not been persisted yet); a partial page at end-of-file keeps the
    /// bytes read and leaves the remainder zeroed.
    pub fn get_page(&self, file: &Path, page_id: u32) -> Result<Box<[u8; PAGE_SIZE]>> {
        let key = PageKey::new(file, page_id);
        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&key) {
            inner.hits += 1;
            inner.replacer.record_access(frame_id);
            let data = inner.frames[frame_id.0 as usize].data.clone();
            return Ok(data);
        }

        // Miss: load from disk, then install in a frame.
        let data = Self::read_from_file(file, page_id)?;
        inner.misses += 1;

        let frame_id = Self::allocate_frame(&mut inner);
        let frame = &mut inner.frames[frame_id.0 as usize];
        frame.key = Some(key.clone());
        *frame.data = *data;

        inner.page_table.insert(key, frame_id);
        inner.replacer.record_access(frame_id);

        Ok(data)
    }

    /// Invalidates a page entry (e.g. after the caller wrote it through to
    /// the file). A miss is a no-op.
    pub fn invalidate(&self, file: &Path, page_id: u32) {
        let key = PageKey::new(file, page_id);
        let mut inner = self.inner.lock();
        Self::drop_entry(&mut inner, &key);
    }

    /// Invalidates a range of pages, inclusive on both ends.
    pub fn invalidate_range(&self, file: &Path, start_page_id: u32, end_page_id: u32) {
        let mut inner = self.inner.lock();
        for page_id in start_page_id..=end_page_id {
            let key = PageKey::new(file, page_id);
            Self::drop_entry(&mut inner, &key);
        }
    }

    /// Returns hit/miss counters and occupancy.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            capacity: self.capacity,
            resident: inner.page_table.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    /// Removes one entry, returning its frame to the free list.
    fn drop_entry(inner: &mut CacheInner, key: &PageKey) {
        if let Some(frame_id) = inner.page_table.remove(key) {
            inner.replacer.remove(frame_id);
            inner.frames[frame_id.0 as usize].key = None;
            inner.free_list.push(frame_id);
        }
    }

    /// Finds a frame for a new page: free list first, LRU victim otherwise.
    ///
    /// Eviction drops the resident page without writing anything; the cache
    /// never holds the only copy of a mutated page.
    fn allocate_frame(inner: &mut CacheInner) -> FrameId {
        if let Some(frame_id) = inner.free_list.pop() {
            return frame_id;
        }

        // Capacity is >= 1 and the free list is empty, so a victim exists.
        let victim = inner
            .replacer
            .evict()
            .expect("replacer must track all resident frames");
        if let Some(old_key) = inner.frames[victim.0 as usize].key.take() {
            trace!("evicting page {} from {}", old_key, victim);
            inner.page_table.remove(&old_key);
        }
        victim
    }

    /// Reads one page-sized buffer from the file, zero-filling at EOF.
    fn read_from_file(file: &Path, page_id: u32) -> Result<Box<[u8; PAGE_SIZE]>> {
        let mut buf = Box::new([0u8; PAGE_SIZE]);

        let mut f = File::open(file)?;
        let file_len = f.metadata()?.len();
        let offset = page_offset(page_id);
        if offset >= file_len {
            return Ok(buf);
        }

        f.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = f.read(&mut buf[filled..])?;
            if n == 0 {
                break; // partial page at EOF; remainder stays zeroed
            }
            filled += n;
        }

        Ok(buf)
    }
}
