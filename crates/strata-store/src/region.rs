use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::StoreError;

const FRAME_MAGIC: u32 = 0x5354_5231; // "STR1"
const FRAME_HEADER_LEN: u64 = 16;

/// Append-only key-value log with atomic batch frames.
///
/// Each flush cycle appends one frame: a header carrying the record count,
/// payload length and payload CRC, followed by the records. A frame whose
/// checksum does not verify (a torn write) is discarded together with
/// everything after it when the log is reopened, so a batch is either fully
/// visible after restart or not at all.
///
/// The in-memory index maps each key to its newest value offset; later
/// frames win over earlier ones.
pub struct RegionLog {
    path: PathBuf,
    file: File,
    index: HashMap<Vec<u8>, (u64, u32)>,
    write_end: u64,
}

impl RegionLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let mut log = Self {
            path,
            file,
            index: HashMap::new(),
            write_end: 0,
        };
        log.rebuild_index()?;
        Ok(log)
    }

    fn rebuild_index(&mut self) -> Result<(), StoreError> {
        let file_len = self.file.metadata()?.len();
        let mut at: u64 = 0;
        self.file.seek(SeekFrom::Start(0))?;
        loop {
            if at + FRAME_HEADER_LEN > file_len {
                break;
            }
            let mut header = [0u8; FRAME_HEADER_LEN as usize];
            self.file.read_exact(&mut header)?;
            let magic = u32::from_be_bytes(header[0..4].try_into().unwrap());
            let count = u32::from_be_bytes(header[4..8].try_into().unwrap());
            let payload_len = u32::from_be_bytes(header[8..12].try_into().unwrap()) as u64;
            let crc = u32::from_be_bytes(header[12..16].try_into().unwrap());
            if magic != FRAME_MAGIC || at + FRAME_HEADER_LEN + payload_len > file_len {
                break;
            }
            let mut payload = vec![0u8; payload_len as usize];
            self.file.read_exact(&mut payload)?;
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&payload);
            if hasher.finalize() != crc {
                break;
            }
            if self.index_frame(&payload, at + FRAME_HEADER_LEN, count).is_none() {
                break;
            }
            at += FRAME_HEADER_LEN + payload_len;
        }
        if at < file_len {
            log::warn!(
                "{}: dropping torn tail ({} of {} bytes valid)",
                self.path.display(),
                at,
                file_len
            );
            self.file.set_len(at)?;
        }
        self.write_end = at;
        Ok(())
    }

    /// Walk one frame payload, recording value locations. Returns `None` on
    /// a malformed payload (treated like a bad checksum by the caller);
    /// nothing from a malformed frame reaches the index.
    fn index_frame(&mut self, payload: &[u8], base: u64, count: u32) -> Option<()> {
        let mut entries = Vec::with_capacity(count as usize);
        let mut pos = 0usize;
        for _ in 0..count {
            let key_len = *payload.get(pos)? as usize;
            pos += 1;
            let key = payload.get(pos..pos + key_len)?.to_vec();
            pos += key_len;
            let val_len =
                u32::from_be_bytes(payload.get(pos..pos + 4)?.try_into().ok()?) as usize;
            pos += 4;
            payload.get(pos..pos + val_len)?;
            entries.push((key, (base + pos as u64, val_len as u32)));
            pos += val_len;
        }
        if pos != payload.len() {
            return None;
        }
        for (key, loc) in entries {
            self.index.insert(key, loc);
        }
        Some(())
    }

    /// Append one batch; all records become durable together. Empty batches
    /// are a no-op.
    pub fn write_batch(&mut self, records: &[(Vec<u8>, Vec<u8>)]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut payload = Vec::new();
        for (key, value) in records {
            debug_assert!(key.len() <= u8::MAX as usize);
            payload.push(key.len() as u8);
            payload.extend_from_slice(key);
            payload.extend_from_slice(&(value.len() as u32).to_be_bytes());
            payload.extend_from_slice(value);
        }
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN as usize + payload.len());
        frame.extend_from_slice(&FRAME_MAGIC.to_be_bytes());
        frame.extend_from_slice(&(records.len() as u32).to_be_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&crc.to_be_bytes());
        frame.extend_from_slice(&payload);

        self.file.seek(SeekFrom::Start(self.write_end))?;
        self.file.write_all(&frame)?;
        self.file.sync_data()?;

        // Only index after the frame is durable.
        let payload_base = self.write_end + FRAME_HEADER_LEN;
        let mut pos = 0u64;
        for (key, value) in records {
            pos += 1 + key.len() as u64 + 4;
            self.index
                .insert(key.clone(), (payload_base + pos, value.len() as u32));
            pos += value.len() as u64;
        }
        self.write_end += frame.len() as u64;
        Ok(())
    }

    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(&(offset, len)) = self.index.get(key) else {
            return Ok(None);
        };
        self.file.seek(SeekFrom::Start(offset))?;
        let mut value = vec![0u8; len as usize];
        self.file.read_exact(&mut value)?;
        Ok(Some(value))
    }

    #[inline]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn sync(&mut self) -> Result<(), StoreError> {
        self.file.sync_all()?;
        Ok(())
    }
}
