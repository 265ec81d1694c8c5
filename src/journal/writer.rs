//! Append-only journal writer (spec.md §4.4 "Write path").
//!
//! One writer per journal file; concurrent callers serialize on an internal
//! mutex held only for the append itself (spec.md §5 "Journal lock"), never
//! across a book or position operation. Grounded in the teacher's
//! single-writer `Sentinel` (`nexus_core::persistence::mod.rs`), using a
//! plain `BufWriter<File>` instead of its `MmapMut` since the spec's
//! fixed-frame byte-stream format is simplest to express as sequential
//! writes.

use super::body::EventBody;
use super::checksum;
use super::header::{EventHeader, FileHeader, EVENT_HEADER_SIZE, FILE_HEADER_SIZE};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

struct WriterState {
    file: BufWriter<File>,
    sequence: u64,
    pending_since_flush: usize,
    last_flush: Instant,
}

const FLUSH_EVERY_RECORDS: usize = 100;
const FLUSH_EVERY: Duration = Duration::from_millis(50);

pub struct JournalWriter {
    path: PathBuf,
    inner: Mutex<WriterState>,
}

impl JournalWriter {
    /// Opens `path` for append, creating a new file (and writing the
    /// 64-byte header) if it does not exist; otherwise reads the existing
    /// header to resume `sequence` from `last_seq`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let is_new = !path.exists();

        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
        let sequence = if is_new {
            let header = FileHeader::new(crate::primitives::now_ns());
            file.write_all(&header.encode())?;
            file.sync_all()?;
            0
        } else {
            let mut buf = [0u8; FILE_HEADER_SIZE];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut buf)?;
            let header = FileHeader::decode(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            file.seek(SeekFrom::End(0))?;
            header.last_seq
        };

        Ok(Self {
            path,
            inner: Mutex::new(WriterState {
                file: BufWriter::new(file),
                sequence,
                pending_since_flush: 0,
                last_flush: Instant::now(),
            }),
        })
    }

    pub fn last_sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    /// Appends one record, returning its assigned sequence number.
    /// Durability-critical event types (spec.md §4.4) flush and fsync
    /// before returning; others are buffered and flushed on the
    /// record-count/time batching policy.
    pub fn append(&self, timestamp_ns: u64, body: &EventBody) -> io::Result<u64> {
        let encoded_body = body.encode();
        let event_type = body.event_type();
        let mut state = self.inner.lock();
        state.sequence += 1;
        let sequence = state.sequence;

        let header = EventHeader { timestamp_ns, sequence, event_type, data_size: encoded_body.len() as u16 };
        let header_bytes = header.encode();

        let mut checksummed = Vec::with_capacity(EVENT_HEADER_SIZE + encoded_body.len());
        checksummed.extend_from_slice(&header_bytes);
        checksummed.extend_from_slice(&encoded_body);
        let crc = checksum::compute(&checksummed);

        state.file.write_all(&checksummed)?;
        state.file.write_all(&crc.to_le_bytes())?;
        state.pending_since_flush += 1;

        let critical = event_type.is_durability_critical();
        let batch_due = state.pending_since_flush >= FLUSH_EVERY_RECORDS || state.last_flush.elapsed() >= FLUSH_EVERY;
        if critical || batch_due {
            state.file.flush()?;
            state.file.get_ref().sync_data()?;
            self.write_last_seq(sequence)?;
            state.pending_since_flush = 0;
            state.last_flush = Instant::now();
        }

        Ok(sequence)
    }

    pub fn flush(&self) -> io::Result<()> {
        let mut state = self.inner.lock();
        state.file.flush()?;
        state.file.get_ref().sync_data()?;
        let sequence = state.sequence;
        drop(state);
        self.write_last_seq(sequence)
    }

    fn write_last_seq(&self, sequence: u64) -> io::Result<()> {
        let mut header_file = OpenOptions::new().write(true).open(&self.path)?;
        header_file.seek(SeekFrom::Start(16))?;
        header_file.write_all(&sequence.to_le_bytes())?;
        header_file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_assigns_strictly_increasing_sequences() {
        let dir = tempdir().unwrap();
        let writer = JournalWriter::open(dir.path().join("events.journal")).unwrap();
        let s1 = writer.append(1, &EventBody::SystemStart).unwrap();
        let s2 = writer.append(2, &EventBody::SystemStop).unwrap();
        assert_eq!(s1, 1);
        assert_eq!(s2, 2);
    }

    #[test]
    fn reopening_existing_journal_resumes_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.journal");
        {
            let writer = JournalWriter::open(&path).unwrap();
            writer.append(1, &EventBody::Trade {
                trade_id: 1,
                symbol: "SYM".into(),
                maker_order_id: 1,
                taker_order_id: 2,
                maker_user: "bob".into(),
                taker_user: "alice".into(),
                taker_side: 0,
                price: 100,
                qty: 1.0,
                maker_fee: 0.0,
                taker_fee: 0.0,
            }).unwrap();
        }
        let writer = JournalWriter::open(&path).unwrap();
        assert_eq!(writer.last_sequence(), 1);
        let next = writer.append(2, &EventBody::SystemStart).unwrap();
        assert_eq!(next, 2);
    }
}
