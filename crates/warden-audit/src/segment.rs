//! Segment file naming and the companion index format. The index is
//! rewritten atomically after every flush, the same write-to-temp +
//! `fsync` + rename durability idiom used for the segment log itself.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub fn segment_path(dir: &Path, segment_number: u64) -> PathBuf {
    dir.join(format!("segment-{:010}.log", segment_number))
}

pub fn index_path(dir: &Path, segment_number: u64) -> PathBuf {
    dir.join(format!("segment-{:010}.idx", segment_number))
}

/// Lists segment numbers present in `dir`, ascending. Missing directory is
/// treated as empty (a fresh chain).
pub fn list_segments(dir: &Path) -> std::io::Result<Vec<u64>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut numbers = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name.strip_prefix("segment-") {
            if let Some(digits) = rest.strip_suffix(".log") {
                if let Ok(n) = digits.parse::<u64>() {
                    numbers.push(n);
                }
            }
        }
    }
    numbers.sort_unstable();
    Ok(numbers)
}

/// Companion index recording a segment's record count and final hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentIndex {
    pub segment_number: u64,
    pub record_count: u64,
    pub final_hash: String,
}

impl SegmentIndex {
    /// Atomically (write-to-temp + `fsync` + rename) rewrites the index file
    /// for this segment.
    pub fn write(&self, dir: &Path) -> std::io::Result<()> {
        let final_path = index_path(dir, self.segment_number);
        let tmp_path = final_path.with_extension("idx.tmp");
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp_path, body.as_bytes())?;
        let file = std::fs::File::open(&tmp_path)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}
