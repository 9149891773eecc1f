use thiserror::Error;

/// Published clear counts of a finalized poll, option-ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyResult {
    votes: Box<[u32]>,
}

impl TallyResult {
    pub fn new(votes: Vec<u32>) -> Self {
        Self {
            votes: votes.into_boxed_slice(),
        }
    }

    /// Count per option, index-aligned with the poll's options.
    pub fn votes(&self) -> &[u32] {
        &self.votes
    }

    /// Total number of counted ballots.
    pub fn total(&self) -> u64 {
        self.votes.iter().map(|count| u64::from(*count)).sum()
    }

    /// Share of option `index` in percent; `None` for an unknown index.
    ///
    /// A poll without any counted ballot reports 0% everywhere.
    pub fn percentage(&self, index: u8) -> Option<f64> {
        let count = *self.votes.get(usize::from(index))?;
        let total = self.total();
        if total == 0 {
            return Some(0.0);
        }
        Some(f64::from(count) * 100.0 / total as f64)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("oracle cleartexts too short: expected {expected} bytes, got {actual}")]
pub struct MalformedCleartext {
    pub expected: usize,
    pub actual: usize,
}

/// Decode `expected` little-endian 32-bit counters from an oracle blob.
///
/// Trailing bytes are tolerated; a blob shorter than `expected * 4` bytes is
/// malformed.
pub(crate) fn decode_counts(blob: &[u8], expected: usize) -> Result<Vec<u32>, MalformedCleartext> {
    let needed = expected * 4;
    if blob.len() < needed {
        return Err(MalformedCleartext {
            expected: needed,
            actual: blob.len(),
        });
    }
    let counts = blob[..needed]
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
        .collect();
    Ok(counts)
}
