// src/partition.rs

//! Range partitioning used to fan a complex target out into subtargets.
//!
//! Given ids in ascending visiting order and a maximum chunk size `k`, emit
//! contiguous `[min, max]` ranges whose bounds are ids taken from the input.
//! Full chunks hold exactly `k` ids; a trailing partial chunk is emitted as
//! its own range.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{GeocompileError, Result};

/// Closed interval `[min, max]` over an ordered id domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range<T = i64> {
    min: T,
    max: T,
}

impl<T: Ord + Copy + fmt::Debug> Range<T> {
    /// Build a range, rejecting `min > max`.
    pub fn new(min: T, max: T) -> Result<Self> {
        if min > max {
            return Err(GeocompileError::PartitionInvariant(format!(
                "range min {min:?} is greater than max {max:?}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    pub fn contains(&self, id: T) -> bool {
        self.min <= id && id <= self.max
    }
}

impl<T: fmt::Display> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Split `ids` into chunks of at most `chunk_size` ids.
///
/// Fails with [`GeocompileError::PartitionInvariant`] when `chunk_size` is
/// zero or when the ids are not strictly ascending. An empty input yields an
/// empty list.
pub fn partition<T, I>(ids: I, chunk_size: usize) -> Result<Vec<Range<T>>>
where
    T: Ord + Copy + fmt::Debug,
    I: IntoIterator<Item = T>,
{
    if chunk_size == 0 {
        return Err(GeocompileError::PartitionInvariant(
            "chunk size must be >= 1".to_string(),
        ));
    }

    let mut ranges = Vec::new();
    let mut chunk_start: Option<T> = None;
    let mut last: Option<T> = None;
    let mut in_chunk = 0usize;

    for id in ids {
        if let Some(prev) = last {
            if id <= prev {
                return Err(GeocompileError::PartitionInvariant(format!(
                    "ids must be strictly ascending: {id:?} follows {prev:?}"
                )));
            }
        }
        last = Some(id);

        let start = *chunk_start.get_or_insert(id);
        in_chunk += 1;

        if in_chunk == chunk_size {
            ranges.push(Range { min: start, max: id });
            chunk_start = None;
            in_chunk = 0;
        }
    }

    // Trailing partial chunk.
    if let (Some(start), Some(end)) = (chunk_start, last) {
        ranges.push(Range { min: start, max: end });
    }

    Ok(ranges)
}

/// Partition the contiguous integer domain `[min, max]`.
///
/// Same result as `partition(min..=max, chunk_size)` without visiting every id.
pub fn partition_span(min: i64, max: i64, chunk_size: usize) -> Result<Vec<Range<i64>>> {
    if chunk_size == 0 {
        return Err(GeocompileError::PartitionInvariant(
            "chunk size must be >= 1".to_string(),
        ));
    }
    if min > max {
        return Err(GeocompileError::PartitionInvariant(format!(
            "id span min {min} is greater than max {max}"
        )));
    }

    let step = i64::try_from(chunk_size - 1).unwrap_or(i64::MAX);
    let mut ranges = Vec::new();
    let mut start = min;

    loop {
        let end = start.saturating_add(step).min(max);
        ranges.push(Range { min: start, max: end });
        if end == max {
            break;
        }
        start = end + 1;
    }

    Ok(ranges)
}
