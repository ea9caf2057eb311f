//! Container — a single append-only store file plus its in-memory index.
//!
//! Writes are serialized by one mutex per container. Reads use positional
//! I/O (`pread`/`pwrite`-style, via `std::os::unix::fs::FileExt` with a
//! `std::os::windows::fs::FileExt` counterpart) rather than a shared seek
//! cursor, so a reader thread never races the writer's append offset.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use crate::delegate::NodeDelegate;
use crate::error::{Result, StoreError};
use crate::header::{self, Header, HEADER_SIZE};
use crate::index::{self, Index};
use crate::needle::{self, align8};
use crate::recovery;

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut total = 0usize;
    while total < buf.len() {
        let n = file.seek_read(&mut buf[total..], offset + total as u64)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "seek_read hit EOF"));
        }
        total += n;
    }
    Ok(())
}

#[cfg(unix)]
pub(crate) fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
pub(crate) fn pwrite(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut total = 0usize;
    while total < buf.len() {
        let n = file.seek_write(&buf[total..], offset + total as u64)?;
        total += n;
    }
    Ok(())
}

pub(crate) use pread as positional_read;

/// An owned, decoded needle — unlike [`crate::needle::Needle`] this does not
/// borrow from a caller-supplied buffer, since [`Container::read_at`] has to
/// allocate its own read buffer anyway.
#[derive(Debug, Clone)]
pub struct OwnedNeedle {
    pub id: u64,
    pub flags: u32,
    pub data: Vec<u8>,
}

impl OwnedNeedle {
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.flags & needle::FLAG_TOMBSTONE != 0
    }
}

struct Inner {
    header: Header,
    poisoned: bool,
    closed: bool,
    sidecar_loaded: bool,
}

/// A single append-only store file and the index that makes random access
/// into it possible.
pub struct Container {
    file: File,
    data_path: PathBuf,
    idx_path: PathBuf,
    inner: Mutex<Inner>,
    index: RwLock<Index>,
    delegate: Option<Arc<NodeDelegate>>,
    on_read_only: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Container {
    /// Open (or create) the store file `<store_id>.dat` under `directory`.
    pub fn open(
        store_id: &str,
        directory: &Path,
        max_size: u64,
        create_if_missing: bool,
        delegate: Option<Arc<NodeDelegate>>,
    ) -> Result<Self> {
        std::fs::create_dir_all(directory)?;
        let data_path = directory.join(format!("{store_id}.dat"));
        let idx_path = directory.join(format!("{store_id}.idx"));

        let exists = data_path.exists();
        if !exists && !create_if_missing {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("store file {} does not exist", data_path.display()),
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create_if_missing)
            .open(&data_path)?;

        let header = if exists {
            let mut buf = [0u8; HEADER_SIZE];
            positional_read(&file, &mut buf, 0)?;
            let header = header::decode_header(&buf)?;
            if header.store_id != store_id {
                return Err(StoreError::StoreIdMismatch {
                    on_disk: header.store_id,
                    requested: store_id.to_owned(),
                });
            }
            header
        } else {
            let header = Header::new(store_id, max_size)?;
            let buf = header::encode_header(&header);
            pwrite(&file, &buf, 0)?;
            file.sync_all()?;
            info!(store_id, "created new store");
            header
        };

        let (index, sidecar_loaded) = match Index::load(&idx_path) {
            Ok(idx) => (idx, true),
            Err(e) => {
                if !index::sidecar_missing(&e) {
                    warn!(store_id, error = %e, "index sidecar unreadable, rebuilding from log");
                }
                (recovery::scan_log(&file)?, false)
            }
        };

        Ok(Self {
            file,
            data_path,
            idx_path,
            inner: Mutex::new(Inner {
                header,
                poisoned: false,
                closed: false,
                sidecar_loaded,
            }),
            index: RwLock::new(index),
            delegate,
            on_read_only: None,
        })
    }

    /// Register a callback invoked after every successful promotion to
    /// read-only, whether triggered by capacity or by an explicit call to
    /// [`Container::set_read_only`]. Used by [`crate::store::Store`] to
    /// rebroadcast the new state cluster-wide.
    pub fn set_on_read_only(&mut self, cb: Box<dyn Fn() + Send + Sync>) {
        self.on_read_only = Some(cb);
    }

    pub fn path(&self) -> &Path {
        &self.data_path
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.lock().unwrap().header.is_read_only()
    }

    pub fn index_len(&self) -> usize {
        self.index.read().unwrap().len()
    }

    pub fn header_snapshot(&self) -> Header {
        self.inner.lock().unwrap().header.clone()
    }

    /// Read a needle by its caller-supplied id. Returns `Ok(None)` both when
    /// the id is absent from the index and when the most recent needle for
    /// it is a tombstone.
    pub fn read_id(&self, id: u64) -> Result<Option<Vec<u8>>> {
        let entry = {
            let index = self.index.read().unwrap();
            index.get(id)
        };
        let entry = match entry {
            Some(e) => e,
            None => return Ok(None),
        };
        let needle = self.read_at(entry.offset as u64)?;
        if needle.is_tombstone() {
            return Ok(None);
        }
        Ok(Some(needle.data))
    }

    /// Read and decode the needle whose `id` field starts at `offset`. Used
    /// for index lookups and for sequential log scans.
    pub fn read_at(&self, offset: u64) -> Result<OwnedNeedle> {
        let mut head = [0u8; needle::NEEDLE_HEADER_SIZE];
        positional_read(&self.file, &mut head, offset)?;
        let data_size = u32::from_le_bytes(head[12..16].try_into().unwrap());

        let total_len = needle::NEEDLE_HEADER_SIZE
            .checked_add(data_size as usize)
            .and_then(|n| n.checked_add(needle::NEEDLE_TRAILER_SIZE))
            .ok_or(StoreError::InvalidFraming {
                declared: data_size,
                available: needle::NEEDLE_HEADER_SIZE,
            })?;

        let mut buf = vec![0u8; total_len];
        positional_read(&self.file, &mut buf, offset)?;
        let decoded = needle::decode_needle(&buf)?;
        Ok(OwnedNeedle {
            id: decoded.id,
            flags: decoded.flags,
            data: decoded.data.to_vec(),
        })
    }

    /// Append a needle. Returns `(offset, encoded_size)` on success.
    pub fn write(&self, id: u64, flags: u32, data: &[u8], sync: bool) -> Result<(u64, u32)> {
        let mut inner = self.inner.lock().unwrap();

        if inner.closed {
            return Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "container is closed")));
        }
        if inner.poisoned {
            return Err(StoreError::Poisoned);
        }
        if inner.header.is_read_only() {
            return Err(StoreError::ReadOnly);
        }

        let result = (|| -> Result<(u64, u32)> {
            let current_len = self.file.metadata()?.len();
            let offset = align8(current_len);
            if offset > current_len {
                let padding = vec![0u8; (offset - current_len) as usize];
                pwrite(&self.file, &padding, current_len)?;
            }

            let encoded = needle::encode_needle(id, flags, data);
            pwrite(&self.file, &encoded, offset)?;
            if sync {
                self.file.sync_all()?;
            }

            let size = encoded.len() as u32;
            self.index.write().unwrap().put(id, offset as i64, size);
            debug!(id, offset, size, "wrote needle");
            Ok((offset, size))
        })();

        match result {
            Ok((offset, size)) => {
                let end = offset + size as u64;
                if end > inner.header.max_size && !inner.header.is_read_only() {
                    self.promote_read_only_locked(&mut inner)?;
                }
                Ok((offset, size))
            }
            Err(e) => {
                if matches!(e, StoreError::Io(_)) {
                    inner.poisoned = true;
                }
                Err(e)
            }
        }
    }

    /// Logically delete `id` by appending a fresh tombstone needle with the
    /// same id. The previous bytes are left in place.
    pub fn delete(&self, id: u64, sync: bool) -> Result<()> {
        self.write(id, needle::FLAG_TOMBSTONE, &[], sync)?;
        Ok(())
    }

    /// Promote the store to read-only. Idempotent.
    pub fn set_read_only(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        self.promote_read_only_locked(&mut inner)
    }

    fn promote_read_only_locked(&self, inner: &mut Inner) -> Result<()> {
        // Re-read the header rather than trust in-memory state, so an
        // out-of-band flag change is never clobbered by this OR.
        let mut buf = [0u8; HEADER_SIZE];
        positional_read(&self.file, &mut buf, 0)?;
        let mut header = header::decode_header(&buf)?;
        header.set_read_only();

        let encoded = header::encode_header(&header);
        // Never touch the magic bytes at offset 0..2 — only the portion
        // from offset 2 onward carries mutable state.
        pwrite(&self.file, &encoded[2..], 2)?;
        self.file.sync_all()?;

        inner.header = header;
        if let Some(delegate) = &self.delegate {
            delegate.set_readonly(true);
        }
        info!(path = %self.data_path.display(), "promoted store to read-only");
        if let Some(cb) = &self.on_read_only {
            cb();
        }
        Ok(())
    }

    /// Fsync and release resources. Dumps the index sidecar if it was
    /// loaded from one at open (so the next open can skip a full scan).
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Ok(());
        }
        self.file.sync_all()?;
        if inner.sidecar_loaded {
            self.index.read().unwrap().dump(&self.idx_path)?;
        }
        inner.closed = true;
        Ok(())
    }
}
