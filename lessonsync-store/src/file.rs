//! Append-only file backing for the change log.
//!
//! File layout:
//!
//! ```text
//! [magic "LSCL"][format version u8]
//! [u32 crc32 of length][u32 length][postcard LogEntry { record, changes }][u32 crc32 of payload]
//! [u32 crc32 of length][u32 length][postcard LogEntry { record, changes }][u32 crc32 of payload]
//! ...
//! ```
//!
//! All integers are little-endian. Every update appends one frame. The arena
//! of frame offsets, indexed by record handle, is rebuilt by scanning the file
//! on open; the last frame written for a record wins. Records are allocated
//! densely from zero.
//!
//! The length checksum makes the length of every frame trustworthy before its
//! payload is looked at. A frame whose verified length reaches past the end of
//! the file can only be an interrupted final append and is cut off; any other
//! damage is reported as [`StoreError::Corrupt`] and the file is left as is.

use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use lessonsync_proto::codec::{self, CodecError, FRAME_PREFIX_LEN};
use lessonsync_proto::{Record, UserChanges};

use crate::{ChangeLog, StoreError};

/// Current on-disk format version.
const FORMAT_VERSION: u8 = 1;

/// Magic bytes followed by the format version.
const HEADER: [u8; 5] = [b'L', b'S', b'C', b'L', FORMAT_VERSION];

/// Length of the magic plus version header.
const HEADER_LEN: u64 = HEADER.len() as u64;

/// Length of each of the two checksums framing a record.
const CHECKSUM_LEN: usize = 4;

/// Bytes in front of a frame's payload: length checksum and length.
const FRAME_HEAD_LEN: usize = CHECKSUM_LEN + FRAME_PREFIX_LEN;

/// One frame of the log as read back from disk.
#[derive(Debug, Deserialize)]
struct LogEntry {
    record: Record,
    changes: UserChanges,
}

/// Borrowed form of [`LogEntry`] used when appending; encodes identically.
#[derive(Serialize)]
struct LogEntryRef<'a> {
    record: Record,
    changes: &'a UserChanges,
}

/// Outcome of [`FileChangeLog::compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactStats {
    /// Number of records carried over.
    pub records: usize,
    /// File size before compaction, in bytes.
    pub bytes_before: u64,
    /// File size after compaction, in bytes.
    pub bytes_after: u64,
}

/// Change log persisted in a single append-only file.
///
/// All access goes through one mutex, so there is a single writer and an
/// update plus flush never interleaves with a read.
pub struct FileChangeLog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    /// Record handle -> offset of its latest frame.
    offsets: Vec<u64>,
    /// Offset one past the last complete frame.
    end: u64,
}

/// State of the arena before an append, used to undo it.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    end: u64,
    records: usize,
    /// Handle index and previous frame offset of a rebound record.
    rebound: Option<(usize, u64)>,
}

impl FileChangeLog {
    /// Opens the log at `path`, creating it (and its parent directories) if missing.
    ///
    /// An incomplete trailing frame, left behind by an interrupted append, is
    /// cut off with a warning. So is an incomplete header left behind by an
    /// interrupted creation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file cannot be opened or created,
    /// or [`StoreError::Corrupt`] if its contents are not a valid change log.
    /// A corrupt file is never modified.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| open_error(&path, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| open_error(&path, e))?;

        let mut bytes = Vec::new();
        file
            .read_to_end(&mut bytes)
            .map_err(|e| open_error(&path, e))?;

        let (offsets, end) = if bytes.len() < HEADER.len() && HEADER.starts_with(&bytes) {
            if !bytes.is_empty() {
                tracing::warn!(
                    path = %path.display(),
                    file_len = bytes.len(),
                    "rewriting incomplete header"
                );
            }
            write_header(&mut file).map_err(|e| open_error(&path, e))?;
            file.sync_data().map_err(|e| open_error(&path, e))?;
            (Vec::new(), HEADER_LEN)
        } else {
            let (offsets, end) = scan(&path, &bytes)?;
            if end < bytes.len() as u64 {
                tracing::warn!(
                    path = %path.display(),
                    valid_len = end,
                    file_len = bytes.len(),
                    "dropping incomplete trailing frame"
                );
                file.set_len(end).map_err(|e| open_error(&path, e))?;
                file.sync_data().map_err(|e| open_error(&path, e))?;
            }
            (offsets, end)
        };

        tracing::debug!(path = %path.display(), records = offsets.len(), "opened change log");

        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, offsets, end }),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the latest changes of every record, in handle order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if any frame cannot be read back.
    pub fn entries(&self) -> Result<Vec<(Record, UserChanges)>, StoreError> {
        let mut inner = self.inner.lock();
        inner.read_all()
    }

    /// Rewrites the file so it holds only the latest frame of each record.
    ///
    /// Record handles are preserved. The new file is written next to the log
    /// and renamed over it, so an interrupted compaction leaves the log intact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if a frame cannot be read back, or
    /// [`StoreError::Write`] if the compacted file cannot be written.
    pub fn compact(&self) -> Result<CompactStats, StoreError> {
        let mut inner = self.inner.lock();
        let bytes_before = inner.end;
        let entries = inner.read_all()?;

        let write_error = |e: std::io::Error| {
            StoreError::Write(format!("compaction of {} failed: {e}", self.path.display()))
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;

        let out = tmp.as_file_mut();
        write_header(out).map_err(write_error)?;
        let mut offsets = Vec::with_capacity(entries.len());
        let mut end = HEADER_LEN;
        for (record, changes) in &entries {
            let frame = encode_frame(&LogEntryRef {
                record: *record,
                changes,
            })
            .map_err(|e| StoreError::Write(e.to_string()))?;
            out.write_all(&frame).map_err(write_error)?;
            offsets.push(end);
            end += frame.len() as u64;
        }
        out.sync_all().map_err(write_error)?;

        inner.file = tmp.persist(&self.path).map_err(|e| write_error(e.error))?;
        inner.offsets = offsets;
        inner.end = end;
        drop(inner);

        tracing::info!(
            path = %self.path.display(),
            records = entries.len(),
            bytes_before,
            bytes_after = end,
            "compacted change log"
        );

        Ok(CompactStats {
            records: entries.len(),
            bytes_before,
            bytes_after: end,
        })
    }
}

impl std::fmt::Debug for FileChangeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChangeLog")
            .field("path", &self.path)
            .field("records", &self.inner.lock().offsets.len())
            .finish()
    }
}

impl ChangeLog for FileChangeLog {
    fn get_user_changes(&self, record: Option<Record>) -> Result<UserChanges, StoreError> {
        let Some(record) = record else {
            return Ok(UserChanges::empty());
        };
        self.inner.lock().read_changes(record)
    }

    fn update_user_changes(
        &self,
        record: Option<Record>,
        changes: &UserChanges,
    ) -> Result<Record, StoreError> {
        self.inner.lock().append(record, changes)
    }

    fn force(&self) -> Result<(), StoreError> {
        self.inner.lock().sync()
    }

    fn update_and_force(
        &self,
        record: Option<Record>,
        changes: &UserChanges,
    ) -> Result<Record, StoreError> {
        let mut inner = self.inner.lock();
        let checkpoint = inner.checkpoint(record);
        let record = inner.append(record, changes)?;
        if let Err(e) = inner.sync() {
            if let Err(rollback) = inner.restore(checkpoint) {
                tracing::warn!(error = %rollback, "failed to roll back unflushed frame");
            }
            return Err(e);
        }
        Ok(record)
    }

    fn record_count(&self) -> usize {
        self.inner.lock().offsets.len()
    }
}

impl Inner {
    fn read_changes(&mut self, record: Record) -> Result<UserChanges, StoreError> {
        let offset = *self
            .offsets
            .get(record.as_usize())
            .ok_or(StoreError::UnknownRecord(record))?;
        let read_error = |reason: String| StoreError::Read { record, reason };

        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| read_error(e.to_string()))?;
        let mut head = [0u8; FRAME_HEAD_LEN];
        self.file
            .read_exact(&mut head)
            .map_err(|e| read_error(e.to_string()))?;
        let len = codec::frame_payload_len(&head[CHECKSUM_LEN..])
            .map_err(|e| read_error(e.to_string()))?;
        let mut rest = vec![0u8; len + CHECKSUM_LEN];
        self.file
            .read_exact(&mut rest)
            .map_err(|e| read_error(e.to_string()))?;

        let (payload, checksum) = rest.split_at(len);
        if read_u32(checksum) != crc32fast::hash(payload) {
            return Err(read_error(format!(
                "frame at offset {offset} fails its checksum"
            )));
        }
        let entry: LogEntry = codec::decode(payload).map_err(|e| read_error(e.to_string()))?;
        if entry.record != record {
            return Err(read_error(format!(
                "frame at offset {offset} belongs to record {}",
                entry.record
            )));
        }
        Ok(entry.changes)
    }

    fn read_all(&mut self) -> Result<Vec<(Record, UserChanges)>, StoreError> {
        let count =
            u32::try_from(self.offsets.len()).map_err(|_| StoreError::RecordSpaceExhausted)?;
        let mut entries = Vec::with_capacity(self.offsets.len());
        for record in (0..count).map(Record::from_index) {
            let changes = self.read_changes(record)?;
            entries.push((record, changes));
        }
        Ok(entries)
    }

    fn append(
        &mut self,
        record: Option<Record>,
        changes: &UserChanges,
    ) -> Result<Record, StoreError> {
        let record = match record {
            Some(r) if r.as_usize() < self.offsets.len() => r,
            Some(r) => return Err(StoreError::UnknownRecord(r)),
            None => {
                let index = u32::try_from(self.offsets.len())
                    .map_err(|_| StoreError::RecordSpaceExhausted)?;
                Record::from_index(index)
            }
        };

        let frame = encode_frame(&LogEntryRef { record, changes })
            .map_err(|e| StoreError::Write(e.to_string()))?;

        let offset = self.end;
        if let Err(e) = self.write_at_end(&frame) {
            // A partial frame must not stay behind: the next append starts at `end`.
            if let Err(rollback) = self.file.set_len(offset) {
                tracing::warn!(error = %rollback, offset, "failed to roll back partial frame");
            }
            return Err(StoreError::Write(e.to_string()));
        }
        self.end = offset + frame.len() as u64;

        if record.as_usize() == self.offsets.len() {
            self.offsets.push(offset);
        } else {
            self.offsets[record.as_usize()] = offset;
        }

        tracing::trace!(record = %record, offset, changes = changes.len(), "appended frame");
        Ok(record)
    }

    fn checkpoint(&self, record: Option<Record>) -> Checkpoint {
        Checkpoint {
            end: self.end,
            records: self.offsets.len(),
            rebound: record.and_then(|r| {
                let index = r.as_usize();
                self.offsets.get(index).map(|&offset| (index, offset))
            }),
        }
    }

    /// Forgets every frame appended since `checkpoint` and cuts it off the file.
    fn restore(&mut self, checkpoint: Checkpoint) -> std::io::Result<()> {
        self.offsets.truncate(checkpoint.records);
        if let Some((index, offset)) = checkpoint.rebound
            && let Some(slot) = self.offsets.get_mut(index)
        {
            *slot = offset;
        }
        self.end = checkpoint.end;
        self.file.set_len(checkpoint.end)
    }

    fn write_at_end(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(frame)
    }

    fn sync(&self) -> Result<(), StoreError> {
        self.file
            .sync_data()
            .map_err(|e| StoreError::Write(format!("flush failed: {e}")))
    }
}

fn open_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Open {
        path: path.to_path_buf(),
        source,
    }
}

fn corrupt(path: &Path, offset: usize, reason: String) -> StoreError {
    StoreError::Corrupt {
        path: path.to_path_buf(),
        offset: offset as u64,
        reason,
    }
}

fn write_header(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&HEADER)
}

/// Encodes one frame: length checksum, length-prefixed payload, payload checksum.
fn encode_frame(entry: &LogEntryRef<'_>) -> Result<Vec<u8>, CodecError> {
    let framed = codec::encode_framed(entry)?;
    let (prefix, payload) = framed.split_at(FRAME_PREFIX_LEN);

    let mut frame = Vec::with_capacity(CHECKSUM_LEN + framed.len() + CHECKSUM_LEN);
    frame.extend_from_slice(&crc32fast::hash(prefix).to_le_bytes());
    frame.extend_from_slice(&framed);
    frame.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    Ok(frame)
}

/// Reads a little-endian `u32` from the first four bytes of `bytes`.
fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

/// Rebuilds the record arena from raw file bytes.
///
/// Returns the offsets and the end of the last complete frame. Scanning
/// stops at the interrupted final append, if any; anything else that does
/// not check out is corruption.
fn scan(path: &Path, bytes: &[u8]) -> Result<(Vec<u64>, u64), StoreError> {
    let magic_len = HEADER.len() - 1;
    if bytes.len() < magic_len || bytes[..magic_len] != HEADER[..magic_len] {
        return Err(corrupt(path, 0, "missing change log header".to_string()));
    }
    match bytes.get(magic_len) {
        Some(&FORMAT_VERSION) => {}
        Some(other) => {
            return Err(corrupt(
                path,
                magic_len,
                format!("unsupported format version {other}"),
            ));
        }
        None => {
            return Err(corrupt(
                path,
                magic_len,
                "missing format version".to_string(),
            ));
        }
    }

    let mut offsets: Vec<u64> = Vec::new();
    let mut pos = HEADER.len();
    while pos < bytes.len() {
        let rest = &bytes[pos..];
        if rest.len() < FRAME_HEAD_LEN {
            break;
        }

        let (length_checksum, framed) = rest.split_at(CHECKSUM_LEN);
        if read_u32(length_checksum) != crc32fast::hash(&framed[..FRAME_PREFIX_LEN]) {
            return Err(corrupt(
                path,
                pos,
                "frame length fails its checksum".to_string(),
            ));
        }
        let payload_len =
            codec::frame_payload_len(framed).map_err(|e| corrupt(path, pos, e.to_string()))?;
        let framed_len = FRAME_PREFIX_LEN + payload_len;
        if framed.len() < framed_len + CHECKSUM_LEN {
            break;
        }

        let payload = &framed[FRAME_PREFIX_LEN..framed_len];
        if read_u32(&framed[framed_len..]) != crc32fast::hash(payload) {
            return Err(corrupt(
                path,
                pos,
                "frame payload fails its checksum".to_string(),
            ));
        }
        let (entry, _): (LogEntry, usize) = codec::decode_framed(&framed[..framed_len])
            .map_err(|e| corrupt(path, pos, e.to_string()))?;

        let index = entry.record.as_usize();
        match index.cmp(&offsets.len()) {
            Ordering::Less => offsets[index] = pos as u64,
            Ordering::Equal => offsets.push(pos as u64),
            Ordering::Greater => {
                return Err(corrupt(
                    path,
                    pos,
                    format!("record {} out of sequence", entry.record),
                ));
            }
        }
        pos += CHECKSUM_LEN + framed_len + CHECKSUM_LEN;
    }

    Ok((offsets, pos as u64))
}
