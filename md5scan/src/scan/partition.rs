/// A worker's share of the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub index: usize,
    /// First start offset owned by this partition
    pub start: usize,
    /// One past the last start offset owned by this partition
    pub end: usize,
    /// End of the readable bytes: `end` plus the substring overlap, clamped to the data
    pub read_end: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits `data_len` start offsets into `workers` contiguous partitions.
///
/// Every partition but the last owns `data_len / workers` offsets; the last one also
/// takes the remainder, so the partitions tile `0..data_len` exactly.
pub fn partition(data_len: usize, workers: usize, substring_len: usize) -> Vec<Partition> {
    let workers = workers.max(1);
    let chunk = data_len / workers;
    (0..workers)
        .map(|index| {
            let start = index * chunk;
            let end = if index == workers - 1 {
                data_len
            } else {
                start + chunk
            };
            Partition {
                index,
                start,
                end,
                read_end: (end + substring_len).min(data_len),
            }
        })
        .collect()
}
