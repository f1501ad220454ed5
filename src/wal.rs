use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// A length prefix past this is treated as corruption, not an allocation request.
const MAX_RECORD_BYTES: usize = 64 * 1024 * 1024;

/// Encode one calendar event as `[len][bincode][crc32]`.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Fill `buf`, or report a clean/torn end of log as `Ok(false)`.
fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Next intact record and its encoded size, `None` at the end of the valid prefix.
fn read_record(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_or_eof(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_RECORD_BYTES {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !read_or_eof(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_or_eof(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize::<Event>(&payload)
        .ok()
        .map(|event| (event, (len + 8) as u64)))
}

/// Intact events in order plus the byte length they occupy.
fn read_valid_prefix(path: &Path) -> io::Result<(Vec<Event>, u64)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut valid_len = 0u64;
    while let Some((event, size)) = read_record(&mut reader)? {
        events.push(event);
        valid_len += size;
    }
    Ok((events, valid_len))
}

/// Append-only event log for one villa calendar.
///
/// Every committed request, booking, KYC and block change is one record.
/// Replaying the records in order rebuilds the calendar exactly; a torn or
/// corrupt tail (crash mid-write) ends the replay at the last good record.
///
/// Appends are staged in memory until `flush_sync`. The file never keeps
/// bytes from a batch that failed: a failed write is cut back to the last
/// synced length.
pub struct Wal {
    file: File,
    pending: Vec<u8>,
    pending_records: u64,
    synced_len: u64,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let synced_len = file.metadata()?.len();
        Ok(Self {
            file,
            pending: Vec::new(),
            pending_records: 0,
            synced_len,
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Stage without writing. The group-commit writer calls `flush_sync`
    /// once per batch, or `discard` when the batch is abandoned.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        let mark = self.pending.len();
        if let Err(e) = encode_event(&mut self.pending, event) {
            self.pending.truncate(mark);
            return Err(e);
        }
        self.pending_records += 1;
        Ok(())
    }

    /// Drop every staged record.
    pub fn discard(&mut self) {
        self.pending.clear();
        self.pending_records = 0;
    }

    /// Write and fsync the staged records as one unit.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        let written = self
            .file
            .write_all(&self.pending)
            .and_then(|()| self.file.sync_all());
        if let Err(e) = written {
            // Best effort: a failed cut is found as a torn tail on the next open.
            let _ = self.file.set_len(self.synced_len);
            self.discard();
            return Err(e);
        }
        self.synced_len += self.pending.len() as u64;
        self.appends_since_compact += self.pending_records;
        self.discard();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a snapshot next to the log and fsync it. Nothing is replaced yet.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Rename the snapshot over the log and reopen for appending.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.discard();
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.synced_len = file.metadata()?.len();
        self.file = file;
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// All intact events in order. A missing file is an empty calendar.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        read_valid_prefix(path).map(|(events, _)| events)
    }

    /// Replay, then cut a torn or corrupt tail off the file so the next
    /// append lands right after the last intact record. Returns the events
    /// and the number of bytes cut.
    pub fn recover(path: &Path) -> io::Result<(Vec<Event>, u64)> {
        let (events, valid_len) = read_valid_prefix(path)?;
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((events, 0)),
            Err(e) => return Err(e),
        };
        let total = file.metadata()?.len();
        if total > valid_len {
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok((events, total.saturating_sub(valid_len)))
    }
}
