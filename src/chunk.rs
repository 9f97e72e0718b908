use std::ops::Range;

/// One positional write of the pattern buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the plan, `0..chunk_count`
    pub index: u64,
    /// First byte written
    pub offset: u64,
    /// Bytes written
    pub len: u64,
}

impl Chunk {
    /// Byte range covered in the file
    pub fn range(&self) -> Range<u64> {
        self.offset..self.offset + self.len
    }
}

/// Layout of `chunk_count` back-to-back chunks of `chunk_len` bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    chunk_len: u64,
    chunk_count: u64,
}

impl ChunkPlan {
    /// Plan; `chunk_len * chunk_count` must fit in `u64`, which
    /// [`CheckConfig::validate`] guarantees
    ///
    /// [`CheckConfig::validate`]: struct.CheckConfig.html#method.validate
    pub fn new(chunk_len: u64, chunk_count: u64) -> ChunkPlan {
        ChunkPlan {
            chunk_len,
            chunk_count,
        }
    }

    /// Final file size
    pub fn total_len(&self) -> u64 {
        self.chunk_len * self.chunk_count
    }

    /// Chunk at `index`, if in range
    pub fn chunk(&self, index: u64) -> Option<Chunk> {
        if index < self.chunk_count {
            Some(Chunk {
                index,
                offset: index * self.chunk_len,
                len: self.chunk_len,
            })
        } else {
            None
        }
    }

    /// All chunks in index order. The iterator owns a copy of the plan.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> {
        let plan = *self;
        (0..plan.chunk_count).filter_map(move |index| plan.chunk(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_and_covering() {
        for &(len, count) in &[(1u64, 1u64), (1, 17), (300, 5), (4096, 8), (1 << 20, 8)] {
            let plan = ChunkPlan::new(len, count);
            let chunks: Vec<_> = plan.chunks().collect();

            assert_eq!(count as usize, chunks.len());
            assert_eq!(0, chunks[0].offset);
            assert_eq!(plan.total_len(), chunks.last().unwrap().range().end);

            for pair in chunks.windows(2) {
                assert_eq!(pair[0].range().end, pair[1].range().start);
            }

            for a in &chunks {
                for b in &chunks {
                    if a.index != b.index {
                        let (ra, rb) = (a.range(), b.range());
                        assert!(ra.end <= rb.start || rb.end <= ra.start);
                    }
                }
            }
        }
    }

    #[test]
    fn chunks_outlive_plan() {
        let chunks = ChunkPlan::new(512, 3).chunks();
        let offsets: Vec<_> = chunks.map(|c| c.offset).collect();

        assert_eq!(vec![0, 512, 1024], offsets);
    }

    #[test]
    fn out_of_range() {
        let plan = ChunkPlan::new(16, 3);
        assert_eq!(None, plan.chunk(3));
        assert_eq!(Some(32), plan.chunk(2).map(|c| c.offset));
    }
}
