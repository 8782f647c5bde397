//! Part math for multipart uploads.
//!
//! Everything here is pure: slicing a file into fixed-size parts, choosing
//! between the single-shot and multipart strategies, and validating the
//! part list before it is submitted to the finalize call.

use crate::error::UploadError;
use crate::rest_types::CompletedPart;

const MEGABYTE: u64 = 1024 * 1024;

/// Size of each multipart upload part (5 MiB).
pub const PART_SIZE: u64 = 5 * MEGABYTE;

/// Files larger than this are uploaded in parts (100 MiB).
pub const MULTIPART_THRESHOLD: u64 = 100 * MEGABYTE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    SingleShot,
    Multipart,
}

pub fn select_strategy(file_size: u64) -> UploadStrategy {
    if file_size > MULTIPART_THRESHOLD {
        UploadStrategy::Multipart
    } else {
        UploadStrategy::SingleShot
    }
}

/// One contiguous byte range of the file, transferred as a single part.
///
/// Part numbers are 1-based and contiguous; slices partition the file
/// exactly, with only the last slice allowed to be shorter than
/// [`PART_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSlice {
    pub part_number: u64,
    pub offset: u64,
    pub len: u64,
}

pub fn part_count(file_size: u64) -> u64 {
    file_size.div_ceil(PART_SIZE)
}

pub fn part_slices(file_size: u64) -> Vec<PartSlice> {
    let count = part_count(file_size);
    (1..=count)
        .map(|part_number| {
            let offset = (part_number - 1) * PART_SIZE;
            let end = (offset + PART_SIZE).min(file_size);
            PartSlice {
                part_number,
                offset,
                len: end - offset,
            }
        })
        .collect()
}

/// Strip the quote characters storage services wrap ETag values in.
pub fn normalize_etag(raw: &str) -> String {
    raw.trim_matches('"').to_string()
}

/// Check that a part list is a valid finalize input: 1-based, contiguous,
/// ascending and duplicate-free. A list that passes necessarily has exactly
/// as many entries as its highest part number.
pub fn validate_parts(parts: &[CompletedPart]) -> Result<(), UploadError> {
    if parts.is_empty() {
        return Err(UploadError::Finalize(
            "part list is empty".to_string(),
        ));
    }
    for (index, part) in parts.iter().enumerate() {
        let expected = index as u64 + 1;
        if part.part_number != expected {
            return Err(UploadError::Finalize(format!(
                "part list must be contiguous and ascending: expected part {} at position {}, found part {}",
                expected, index, part.part_number
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(part_numbers: &[u64]) -> Vec<CompletedPart> {
        part_numbers
            .iter()
            .map(|&part_number| CompletedPart {
                part_number,
                etag: format!("etag-{part_number}"),
            })
            .collect()
    }

    #[test]
    fn part_count_rounds_up() {
        assert_eq!(part_count(1), 1);
        assert_eq!(part_count(PART_SIZE), 1);
        assert_eq!(part_count(PART_SIZE + 1), 2);
        assert_eq!(part_count(12 * MEGABYTE), 3);
    }

    #[test]
    fn twelve_mebibytes_splits_into_three_parts() {
        let slices = part_slices(12 * MEGABYTE);
        let sizes: Vec<u64> = slices.iter().map(|s| s.len).collect();
        assert_eq!(sizes, vec![5 * MEGABYTE, 5 * MEGABYTE, 2 * MEGABYTE]);
    }

    #[test]
    fn slices_partition_the_file_exactly() {
        for file_size in [
            1,
            PART_SIZE - 1,
            PART_SIZE,
            PART_SIZE + 1,
            3 * PART_SIZE,
            150 * MEGABYTE + 17,
        ] {
            let slices = part_slices(file_size);
            assert_eq!(slices.len() as u64, part_count(file_size));
            assert!(!slices.is_empty());

            let mut next_offset = 0;
            for (index, slice) in slices.iter().enumerate() {
                assert_eq!(slice.part_number, index as u64 + 1);
                assert_eq!(slice.offset, next_offset);
                assert!(slice.len > 0);
                next_offset += slice.len;
            }
            assert_eq!(next_offset, file_size);
        }
    }

    #[test]
    fn strategy_follows_the_size_threshold() {
        assert_eq!(
            select_strategy(50 * MEGABYTE),
            UploadStrategy::SingleShot
        );
        assert_eq!(
            select_strategy(150 * MEGABYTE),
            UploadStrategy::Multipart
        );
        // the threshold itself still goes single-shot
        assert_eq!(
            select_strategy(MULTIPART_THRESHOLD),
            UploadStrategy::SingleShot
        );
        assert_eq!(
            select_strategy(MULTIPART_THRESHOLD + 1),
            UploadStrategy::Multipart
        );
    }

    #[test]
    fn progress_over_slices_is_monotone_and_complete() {
        let file_size = 23 * MEGABYTE;
        let mut uploaded = 0u64;
        let mut last_percent = 0.0f64;
        for slice in part_slices(file_size) {
            uploaded += slice.len;
            let percent = uploaded as f64 / file_size as f64 * 100.0;
            assert!(percent >= last_percent);
            last_percent = percent;
        }
        assert_eq!(uploaded, file_size);
        assert_eq!(last_percent, 100.0);
    }

    #[test]
    fn etag_quotes_are_stripped() {
        assert_eq!(normalize_etag("\"abc123\""), "abc123");
        assert_eq!(normalize_etag("abc123"), "abc123");
        assert_eq!(normalize_etag("\"\""), "");
    }

    #[test]
    fn valid_part_lists_pass() {
        assert!(validate_parts(&completed(&[1, 2, 3])).is_ok());
        assert!(validate_parts(&completed(&[1])).is_ok());
    }

    #[test]
    fn invalid_part_lists_are_rejected() {
        assert!(validate_parts(&completed(&[])).is_err());
        // duplicate
        assert!(validate_parts(&completed(&[1, 2, 2])).is_err());
        // gap
        assert!(validate_parts(&completed(&[1, 3])).is_err());
        // out of order
        assert!(validate_parts(&completed(&[2, 1, 3])).is_err());
        // not 1-based
        assert!(validate_parts(&completed(&[2, 3, 4])).is_err());
    }
}
