use tracing::trace;

use crate::corpus::SENTINEL;
use crate::kernel::LANES;

/// Tracks the next record boundary ahead of the batch offset.
///
/// A window `[o, o + len)` is valid only if it ends at or before the boundary, which is
/// the next sentinel at or after `o`, or the end of the readable range. Once a batch
/// contains an invalid lane, every remaining start offset before the boundary is
/// invalid too, so the cursor jumps straight past it.
#[derive(Debug)]
pub struct RecordCursor<'a> {
    data: &'a [u8],
    limit: usize,
    len: usize,
    record_start: usize,
    boundary: usize,
    records_skipped: u64,
}

impl<'a> RecordCursor<'a> {
    /// `limit` is the end of the bytes this cursor may read
    pub fn new(data: &'a [u8], offset: usize, limit: usize, len: usize) -> Self {
        let limit = limit.min(data.len());
        let mut cursor = Self {
            data,
            limit,
            len,
            record_start: offset,
            boundary: limit,
            records_skipped: 0,
        };
        cursor.boundary = cursor.find_boundary(offset);
        cursor
    }

    fn find_boundary(&self, from: usize) -> usize {
        if from >= self.limit {
            return self.limit;
        }
        self.data[from..self.limit]
            .iter()
            .position(|&b| b == SENTINEL)
            .map_or(self.limit, |pos| from + pos)
    }

    pub fn boundary(&self) -> usize {
        self.boundary
    }

    /// Records shorter than the substring length jumped over so far
    pub fn records_skipped(&self) -> u64 {
        self.records_skipped
    }

    /// Lane mask of the batch at `offset` whose windows start before `end` and stay
    /// inside the current record
    #[inline]
    pub fn valid_lanes(&self, offset: usize, end: usize) -> u8 {
        let mut mask = 0u8;
        for lane in 0..LANES {
            let start = offset + lane;
            if start >= end || start + self.len > self.boundary {
                break;
            }
            mask |= 1 << lane;
        }
        mask
    }

    /// Offset of the next batch after the one at `offset`
    #[inline]
    pub fn advance(&mut self, offset: usize) -> usize {
        if offset + LANES - 1 + self.len <= self.boundary {
            return offset + LANES;
        }

        if self.boundary.saturating_sub(self.record_start) < self.len {
            self.records_skipped += 1;
            trace!(
                "Skipping short record at {}..{}",
                self.record_start,
                self.boundary
            );
        }
        let next = self.boundary + 1;
        self.record_start = next;
        self.boundary = self.find_boundary(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const L: usize = 19;

    /// Every start offset the cursor hands out as a valid lane
    fn visited(data: &[u8], start: usize, end: usize) -> Vec<usize> {
        let limit = (end + L).min(data.len());
        let mut cursor = RecordCursor::new(data, start, limit, L);
        let mut offsets = Vec::new();
        let mut offset = start;
        while offset < end {
            let mask = cursor.valid_lanes(offset, end);
            for lane in 0..LANES {
                if mask & (1 << lane) != 0 {
                    offsets.push(offset + lane);
                }
            }
            offset = cursor.advance(offset);
        }
        offsets
    }

    /// Start offsets whose window holds no sentinel and ends inside the data
    fn expected(data: &[u8], start: usize, end: usize) -> Vec<usize> {
        (start..end)
            .filter(|&o| o + L <= data.len() && !data[o..o + L].contains(&SENTINEL))
            .collect()
    }

    fn corpus(records: &[usize]) -> Vec<u8> {
        let mut data = Vec::new();
        for (i, &len) in records.iter().enumerate() {
            data.extend((0..len).map(|j| b'a' + ((i + j) % 26) as u8));
            data.push(SENTINEL);
        }
        data.pop();
        data
    }

    #[test]
    fn test_visits_exactly_the_valid_windows() {
        let data = corpus(&[40, 5, 19, 0, 18, 27, 19, 64, 3]);
        assert_eq!(visited(&data, 0, data.len()), expected(&data, 0, data.len()));
    }

    #[test]
    fn test_partial_ranges() {
        let data = corpus(&[33, 20, 2, 50, 21]);
        for start in [0, 7, 33, 34, 40, 60] {
            for end in [start + 1, start + 9, data.len()] {
                let end = end.min(data.len());
                assert_eq!(
                    visited(&data, start, end),
                    expected(&data, start, end),
                    "range {}..{}",
                    start,
                    end
                );
            }
        }
    }

    #[test]
    fn test_counts_short_records() {
        let data = corpus(&[25, 4, 10, 30]);
        let mut cursor = RecordCursor::new(&data, 0, data.len(), L);
        let mut offset = 0;
        while offset < data.len() {
            offset = cursor.advance(offset);
        }
        assert_eq!(cursor.records_skipped(), 2);
    }

    #[test]
    fn test_window_reaching_sentinel_is_masked() {
        let mut data = vec![b'x'; L + 1];
        data[L] = SENTINEL;
        data.extend(vec![b'y'; L]);
        let cursor = RecordCursor::new(&data, 0, data.len(), L);
        assert_eq!(cursor.boundary(), L);
        assert_eq!(cursor.valid_lanes(0, data.len()), 0b1);
    }
}
