//! Journal reader / replay stream (spec.md §4.4 "Read path").
//!
//! Opens a journal file, verifies the magic, then streams
//! `(EventHeader, EventBody)` pairs until EOF. A CRC mismatch or a
//! truncated tail record stops the stream at the last valid sequence and
//! reports the truncation boundary, rather than erroring the whole replay
//! (spec.md: "report the truncation boundary to the recovery driver").

use super::body::EventBody;
use super::checksum;
use super::header::{EventHeader, FileHeader, CRC_SIZE, EVENT_HEADER_SIZE, FILE_HEADER_SIZE};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub struct JournalReader {
    file: File,
    pub header: FileHeader,
    /// Set once a CRC mismatch or truncated record is hit; the sequence of
    /// the last record successfully read.
    pub truncated_at: Option<u64>,
}

impl JournalReader {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut buf = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut buf)?;
        let header = FileHeader::decode(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self { file, header, truncated_at: None })
    }

    /// Reads every valid record in order. Returns early (without error) at
    /// the first corrupt or truncated record, recording the boundary in
    /// `self.truncated_at`.
    pub fn read_all(&mut self) -> io::Result<Vec<(EventHeader, EventBody)>> {
        let mut records = Vec::new();
        let mut last_good = 0u64;
        loop {
            let mut header_buf = [0u8; EVENT_HEADER_SIZE];
            match self.file.read_exact(&mut header_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let Ok(event_header) = EventHeader::decode(&header_buf) else {
                self.truncated_at = Some(last_good);
                break;
            };

            let mut body_buf = vec![0u8; event_header.data_size as usize];
            if self.file.read_exact(&mut body_buf).is_err() {
                self.truncated_at = Some(last_good);
                break;
            }

            let mut crc_buf = [0u8; CRC_SIZE];
            if self.file.read_exact(&mut crc_buf).is_err() {
                self.truncated_at = Some(last_good);
                break;
            }
            let crc = u32::from_le_bytes(crc_buf);

            let mut checked = Vec::with_capacity(EVENT_HEADER_SIZE + body_buf.len());
            checked.extend_from_slice(&header_buf);
            checked.extend_from_slice(&body_buf);
            if !checksum::verify(&checked, crc) {
                self.truncated_at = Some(last_good);
                break;
            }

            let Ok(body) = EventBody::decode(event_header.event_type, &body_buf) else {
                self.truncated_at = Some(last_good);
                break;
            };

            last_good = event_header.sequence;
            records.push((event_header, body));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::super::writer::JournalWriter;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_back_every_record_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.journal");
        let writer = JournalWriter::open(&path).unwrap();
        writer.append(1, &EventBody::SystemStart).unwrap();
        writer.append(2, &EventBody::Funding { symbol: "SYM".into(), rate: 0.0001 }).unwrap();
        writer.flush().unwrap();

        let mut reader = JournalReader::open(&path).unwrap();
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0.sequence, 1);
        assert_eq!(records[1].0.sequence, 2);
        assert!(reader.truncated_at.is_none());
    }

    #[test]
    fn stops_at_truncated_tail_record() {
        use std::io::Write as _;
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.journal");
        let writer = JournalWriter::open(&path).unwrap();
        writer.append(1, &EventBody::SystemStart).unwrap();
        writer.flush().unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[1, 2, 3]).unwrap(); // partial header for a never-completed record

        let mut reader = JournalReader::open(&path).unwrap();
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(reader.truncated_at, Some(1));
    }
}
