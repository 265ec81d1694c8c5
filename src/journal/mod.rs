//! Event Journal (spec.md §4.4): append-only binary log for durability and
//! crash recovery.

pub mod body;
pub mod checksum;
pub mod header;
pub mod reader;
pub mod snapshot;
pub mod writer;

pub use body::EventBody;
pub use header::{EventHeader, EventType, FileHeader};
pub use reader::JournalReader;
pub use writer::JournalWriter;
