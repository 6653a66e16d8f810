//! The append-only, hash-chained local audit log.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use warden_types::record::genesis_hash;
use warden_types::{ActionType, AuditRecord, EventType};

use crate::error::AuditError;
use crate::segment::{self, SegmentIndex};

/// Default segment rotation threshold: 8 MiB.
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 8 * 1024 * 1024;

struct LogState {
    file: File,
    segment_number: u64,
    segment_bytes: u64,
    record_count: u64,
    sequence: u64,
    last_hash: String,
    seen_command_ids: HashSet<Uuid>,
}

/// Single-writer, many-reader append-only audit chain. Owned exclusively by
/// the audit writer task; other tasks reach it only through message passing
/// in `warden-agentd`.
pub struct AuditLog {
    dir: PathBuf,
    max_segment_bytes: u64,
    state: Mutex<LogState>,
}

impl AuditLog {
    /// Opens (or creates) the audit chain rooted at `dir`, replaying every
    /// existing segment to rebuild the in-memory idempotency set and resume
    /// the hash chain: no two records share a `command_id`, and every
    /// record's `prior_hash` links to the previous record's `hash`.
    pub fn open(dir: &Path, max_segment_bytes: u64) -> Result<Self, AuditError> {
        std::fs::create_dir_all(dir)?;
        let segments = segment::list_segments(dir)?;

        let mut sequence = 0u64;
        let mut last_hash = genesis_hash();
        let mut seen_command_ids = HashSet::new();

        for &segment_number in &segments {
            let path = segment::segment_path(dir, segment_number);
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let mut record: AuditRecord = serde_json::from_str(&line)?;
                if record.prior_hash != last_hash {
                    return Err(AuditError::ChainBroken {
                        segment: segment_number,
                        sequence: record.sequence,
                        detail: format!(
                            "expected prior_hash {}, record carries {}",
                            last_hash, record.prior_hash
                        ),
                    });
                }
                let stored_hash = record.hash.clone().ok_or_else(|| AuditError::ChainBroken {
                    segment: segment_number,
                    sequence: record.sequence,
                    detail: "record on disk is missing its finalized hash".into(),
                })?;
                record.hash = None;
                let recomputed = recompute_hash(&record)?;
                if recomputed != stored_hash {
                    return Err(AuditError::ChainBroken {
                        segment: segment_number,
                        sequence: record.sequence,
                        detail: "stored hash does not match recomputed record content".into(),
                    });
                }
                last_hash = stored_hash;
                sequence = record.sequence + 1;
                if let Some(id) = record.command_id {
                    seen_command_ids.insert(id);
                }
            }
        }

        let segment_number = segments.last().copied().unwrap_or(1);
        let path = segment::segment_path(dir, segment_number);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .write(true)
            .open(&path)?;
        let segment_bytes = file.metadata()?.len();
        let record_count = if segments.is_empty() {
            0
        } else {
            count_lines(&path)?
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            max_segment_bytes,
            state: Mutex::new(LogState {
                file,
                segment_number,
                segment_bytes,
                record_count,
                sequence,
                last_hash,
                seen_command_ids,
            }),
        })
    }

    /// Idempotency check against the full persisted chain, not merely the
    /// in-memory nonce cache: the audit chain, not the LRU, is
    /// authoritative.
    pub fn contains_command_id(&self, command_id: Uuid) -> bool {
        self.state.lock().seen_command_ids.contains(&command_id)
    }

    pub fn next_sequence(&self) -> u64 {
        self.state.lock().sequence
    }

    /// Appends and hash-chains one record, rotating the segment first if the
    /// new record would exceed `max_segment_bytes`. `fsync`s before
    /// returning.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        event_type: EventType,
        agent_id: Uuid,
        command_id: Option<Uuid>,
        action_type: Option<ActionType>,
        outcome: impl Into<String>,
        reason: Option<String>,
    ) -> Result<AuditRecord, AuditError> {
        let mut state = self.state.lock();

        let mut record = AuditRecord {
            event_type,
            agent_id,
            command_id,
            action_type,
            outcome: outcome.into(),
            reason,
            instant: Utc::now(),
            sequence: state.sequence,
            prior_hash: state.last_hash.clone(),
            hash: None,
        };

        let hash = recompute_hash(&record)?;
        record.hash = Some(hash.clone());

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let line_len = line.len() as u64;

        if state.segment_bytes > 0 && state.segment_bytes + line_len > self.max_segment_bytes {
            self.rotate(&mut state)?;
        }

        state.file.write_all(line.as_bytes())?;
        state.file.flush()?;
        state.file.sync_data()?;

        state.segment_bytes += line_len;
        state.record_count += 1;
        state.sequence += 1;
        state.last_hash = hash;
        if let Some(id) = command_id {
            state.seen_command_ids.insert(id);
        }

        SegmentIndex {
            segment_number: state.segment_number,
            record_count: state.record_count,
            final_hash: state.last_hash.clone(),
        }
        .write(&self.dir)?;

        tracing::debug!(
            target: "warden_audit",
            sequence = record.sequence,
            event = ?record.event_type,
            "audit record appended"
        );

        Ok(record)
    }

    fn rotate(&self, state: &mut LogState) -> Result<(), AuditError> {
        let next_number = state.segment_number + 1;
        let path = segment::segment_path(&self.dir, next_number);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .write(true)
            .open(&path)?;
        state.file = file;
        state.segment_number = next_number;
        state.segment_bytes = 0;
        state.record_count = 0;
        tracing::info!(target: "warden_audit", segment = next_number, "audit log segment rotated");
        Ok(())
    }

    /// Reads every record across every segment, in order. Used by tests and
    /// by the controller-facing forwarder: a forwarder drains records to
    /// the controller when reachable, and forwarded records are never
    /// removed locally.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>, AuditError> {
        let mut out = Vec::new();
        for segment_number in segment::list_segments(&self.dir)? {
            let path = segment::segment_path(&self.dir, segment_number);
            let file = File::open(&path)?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                out.push(serde_json::from_str(&line)?);
            }
        }
        Ok(out)
    }
}

/// `H(prior_hash || canonical(record - hash field))`. `record.hash` must be
/// `None` on entry; it is never part of its own preimage.
fn recompute_hash(record: &AuditRecord) -> Result<String, AuditError> {
    debug_assert!(record.hash.is_none());
    let hashable = warden_types::canonical::canonical_bytes(record)?;
    let mut preimage = Vec::with_capacity(record.prior_hash.len() + hashable.len());
    preimage.extend_from_slice(record.prior_hash.as_bytes());
    preimage.extend_from_slice(&hashable);
    Ok(warden_crypto::hash::sha256_hex(&preimage))
}

fn count_lines(path: &Path) -> std::io::Result<u64> {
    let file = File::open(path)?;
    let mut count = 0u64;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
