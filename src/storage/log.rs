use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use crate::core::config::SyncMode;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::file_lock::FileLock;

/// Leading bytes of every store file.
pub const MAGIC: &[u8; 8] = b"QUOTEDB\0";

/// Frame header: payload length + CRC32 of the payload.
const FRAME_HEADER: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    CreateBucket(String),
    Put { bucket: String, key: Vec<u8>, value: Vec<u8> },
    ClearBucket(String),
    SetSequence { bucket: String, value: u64 },
}

/// One committed write transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBatch {
    pub txid: u64,
    pub timestamp: DateTime<Utc>,
    pub ops: Vec<LogOp>,
}

/// Append-only commit log backing the store. The whole store lives in
/// this one file.
///
/// ```text
/// [ MAGIC (8 bytes) ]
/// [ len u32 LE | crc32 u32 LE | bincode(CommitBatch) ]
/// [ len u32 LE | crc32 u32 LE | bincode(CommitBatch) ]
/// ...
/// ```
pub struct StoreLog {
    pub path: PathBuf,
    pub file: File,
    pub position: u64,
    pub sync_mode: SyncMode,
    _lock: FileLock,
}

impl StoreLog {
    /// Opens (or creates) the store file, locks it and replays every intact
    /// batch. A torn or corrupt tail is cut off.
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<(Self, Vec<CommitBatch>)> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::store_unavailable(format!("cannot open {}: {}", path.display(), e)))?;

        let lock = FileLock::acquire(&file)?;

        let file_len = file.metadata()?.len();
        if file_len == 0 {
            file.write_all(MAGIC)?;
            file.sync_all()?;
        } else {
            let mut magic = [0u8; 8];
            if file_len < MAGIC.len() as u64 || file.read_exact(&mut magic).is_err() || &magic != MAGIC {
                return Err(Error::store_unavailable(format!(
                    "{} is not a quote store", path.display()
                )));
            }
        }

        let (batches, good_len) = Self::replay(&file, file_len.max(MAGIC.len() as u64))?;
        let file_len = file.metadata()?.len();
        if good_len < file_len {
            warn!(
                path = %path.display(),
                kept = good_len,
                dropped = file_len - good_len,
                "truncating torn tail of store file"
            );
            file.set_len(good_len)?;
            file.sync_all()?;
        }
        let position = file.seek(SeekFrom::End(0))?;

        debug!(path = %path.display(), batches = batches.len(), bytes = position, "store log replayed");

        Ok((
            StoreLog {
                path: path.to_path_buf(),
                file,
                position,
                sync_mode,
                _lock: lock,
            },
            batches,
        ))
    }

    /// Reads batches until the end of the file or the first damaged frame.
    /// Returns the batches and the length of the intact prefix.
    fn replay(file: &File, file_len: u64) -> Result<(Vec<CommitBatch>, u64)> {
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(MAGIC.len() as u64))?;

        let mut batches = Vec::new();
        let mut offset = MAGIC.len() as u64;

        while offset < file_len {
            if file_len - offset < FRAME_HEADER {
                break;
            }

            let mut header = [0u8; FRAME_HEADER as usize];
            reader.read_exact(&mut header)?;
            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if file_len - offset - FRAME_HEADER < len {
                break;
            }

            let mut payload = vec![0u8; len as usize];
            reader.read_exact(&mut payload)?;

            let mut hasher = Hasher::new();
            hasher.update(&payload);
            if hasher.finalize() != crc {
                warn!(offset, "checksum mismatch in store file");
                break;
            }

            match bincode::deserialize::<CommitBatch>(&payload) {
                Ok(batch) => batches.push(batch),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable batch in store file");
                    break;
                }
            }

            offset += FRAME_HEADER + len;
        }

        Ok((batches, offset))
    }

    fn encode_frame(batch: &CommitBatch) -> Result<Vec<u8>> {
        let payload = bincode::serialize(batch)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            Error::new(ErrorKind::InvalidInput, format!("commit of {} bytes is too large", payload.len()))
        })?;

        let mut hasher = Hasher::new();
        hasher.update(&payload);

        let mut frame = Vec::with_capacity(FRAME_HEADER as usize + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&hasher.finalize().to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Appends one batch. On failure the file is cut back to its previous
    /// length so later commits never land behind a torn frame.
    pub fn append(&mut self, batch: &CommitBatch) -> Result<()> {
        let frame = Self::encode_frame(batch)?;

        let written = self.file.write_all(&frame).and_then(|_| match self.sync_mode {
            SyncMode::Immediate => self.file.sync_data(),
            SyncMode::None => Ok(()),
        });

        if let Err(e) = written {
            let _ = self.file.set_len(self.position);
            let _ = self.file.seek(SeekFrom::Start(self.position));
            return Err(e.into());
        }

        self.position += frame.len() as u64;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Replaces the file with one holding only `batch`. The new file is
    /// written next to the old one and renamed over it.
    pub fn rewrite(&mut self, batch: &CommitBatch) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(MAGIC)?;
        tmp.write_all(&Self::encode_frame(batch)?)?;
        tmp.as_file().sync_all()?;

        let lock = FileLock::acquire(tmp.as_file())?;
        let mut file = tmp.persist(&self.path).map_err(|e| Error::from(e.error))?;
        let position = file.seek(SeekFrom::End(0))?;

        self.file = file;
        self._lock = lock;
        self.position = position;
        Ok(())
    }
}
