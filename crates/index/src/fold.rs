//! Folding of key characters into bucket segments

/// First character of the folding table
const TABLE_START: u32 = 31;
/// Symbols in the folding table, ASCII 31..=127
pub const TABLE_SIZE: u64 = 97;

pub const DEFAULT_GROUPING: usize = 2;
pub const DEFAULT_PRECISION: u64 = 64;
pub const DEFAULT_DEPTH: usize = 4;

/// One step of a trie path
///
/// `Overflow` is taken by chunks that are shorter than the grouping or that
/// contain characters outside the folding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Bucket(u64),
    Overflow,
}

/// Shape parameters of a [`FoldedTrieIndex`](crate::FoldedTrieIndex)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieConfig {
    grouping: usize,
    precision: u64,
    depth: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            grouping: DEFAULT_GROUPING,
            precision: DEFAULT_PRECISION,
            depth: DEFAULT_DEPTH,
        }
    }
}

impl TrieConfig {
    /// Zero values are raised to one
    pub fn new(grouping: usize, precision: u64, depth: usize) -> Self {
        Self {
            grouping: grouping.max(1),
            precision: precision.max(1),
            depth: depth.max(1),
        }
    }

    #[inline]
    pub fn grouping(&self) -> usize {
        self.grouping
    }

    #[inline]
    pub fn precision(&self) -> u64 {
        self.precision
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Full trie path of `key`, always `depth` segments long
    pub fn path(&self, key: &str) -> Vec<Segment> {
        let chars: Vec<char> = key.chars().collect();
        (0..self.depth)
            .map(|level| {
                let start = level * self.grouping;
                let end = start + self.grouping;
                chars
                    .get(start..end)
                    .map_or(Segment::Overflow, |chunk| self.fold(chunk))
            })
            .collect()
    }

    /// Segments fully determined by a literal key prefix
    ///
    /// Only complete chunks are folded; a trailing partial chunk could still
    /// land in any bucket.
    pub fn prefix_path(&self, prefix: &str) -> Vec<Segment> {
        let chars: Vec<char> = prefix.chars().collect();
        chars
            .chunks_exact(self.grouping)
            .take(self.depth)
            .map(|chunk| self.fold(chunk))
            .collect()
    }

    fn fold(&self, chunk: &[char]) -> Segment {
        let mut sum: u64 = 0;
        let mut weight: u64 = 1;
        for &c in chunk {
            let Some(symbol) = symbol_index(c) else {
                return Segment::Overflow;
            };
            sum = sum.saturating_add(symbol.saturating_mul(weight));
            weight = weight.saturating_mul(TABLE_SIZE);
        }
        Segment::Bucket(sum / self.precision)
    }
}

#[inline]
fn symbol_index(c: char) -> Option<u64> {
    let code = c as u32;
    (TABLE_START..TABLE_START + TABLE_SIZE as u32)
        .contains(&code)
        .then(|| u64::from(code - TABLE_START))
}
