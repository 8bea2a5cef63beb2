//! Page constants for MarrowDB storage.

/// Fixed page size in bytes (4 KB).
pub const PAGE_SIZE: usize = 4096;

/// Maximum serialized record length.
///
/// Slot directory entries store the record length as an unsigned short
/// quantity, so no record may exceed this regardless of page size.
pub const MAX_RECORD_LEN: usize = 65_535;

/// Byte offset of a page within its heap file.
pub const fn page_offset(page_id: u32) -> u64 {
    page_id as u64 * PAGE_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_constant() {
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(0), 0);
        assert_eq!(page_offset(1), 4096);
        assert_eq!(page_offset(100), 409_600);
        // No overflow near the top of the id space.
        assert_eq!(page_offset(u32::MAX), u32::MAX as u64 * 4096);
    }

    #[test]
    fn test_max_record_len() {
        assert_eq!(MAX_RECORD_LEN, 0xFFFF);
    }
}
