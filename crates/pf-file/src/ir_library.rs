//! Shared impulse-response library
//!
//! Control-side cache of loaded IRs. Entries are keyed by the SHA-256 of
//! the file bytes plus the load options, so the same file loaded for two
//! engine rates yields two entries while renamed copies share one.
//! Effects receive `Arc<ImpulseResponse>` clones; nothing here is touched
//! by the audio thread.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use pf_core::ImpulseResponse;
use sha2::{Digest, Sha256};

use crate::error::{FileError, FileResult};
use crate::ir_loader::{IrLoadOptions, load_impulse_response_bytes};

/// Entries kept before the least recently used one is evicted
pub const DEFAULT_LIBRARY_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct IrKey {
    digest: [u8; 32],
    target_rate: u64,
    normalize_peak: Option<u64>,
    max_length: u64,
}

impl IrKey {
    fn new(digest: [u8; 32], options: &IrLoadOptions) -> Self {
        Self {
            digest,
            target_rate: options.target_rate.to_bits(),
            normalize_peak: options.normalize_peak.map(f64::to_bits),
            max_length: options.max_length_secs.to_bits(),
        }
    }
}

struct LibraryEntry {
    ir: Arc<ImpulseResponse>,
    last_access: AtomicU64,
}

/// Library statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct IrLibrary {
    entries: RwLock<HashMap<IrKey, LibraryEntry>>,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IrLibrary {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LIBRARY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// SHA-256 of raw file contents
    pub fn digest(bytes: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }

    /// Load `path`, or return the cached copy for identical contents
    pub fn load<P: AsRef<Path>>(
        &self,
        path: P,
        options: &IrLoadOptions,
    ) -> FileResult<Arc<ImpulseResponse>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FileError::NotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        self.load_bytes(&bytes, options).inspect_err(|e| {
            log::warn!("IR library rejected {}: {e}", path.display());
        })
    }

    /// Cache lookup keyed on the byte contents
    pub fn load_bytes(
        &self,
        bytes: &[u8],
        options: &IrLoadOptions,
    ) -> FileResult<Arc<ImpulseResponse>> {
        let digest = Self::digest(bytes);
        let key = IrKey::new(digest, options);

        if let Some(entry) = self.entries.read().get(&key) {
            entry.last_access.store(self.tick(), Ordering::Relaxed);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.ir));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let ir = Arc::new(load_impulse_response_bytes(bytes, options)?);
        log::info!(
            "IR library: cached {} ({} frames @ {} Hz)",
            hex::encode(&digest[..8]),
            ir.len(),
            ir.sample_rate()
        );
        self.insert(key, Arc::clone(&ir));
        Ok(ir)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, key: IrKey, ir: Arc<ImpulseResponse>) {
        let mut entries = self.entries.write();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
                .map(|(k, _)| *k);
            if let Some(k) = oldest {
                entries.remove(&k);
            }
        }

        entries.insert(
            key,
            LibraryEntry {
                ir,
                last_access: AtomicU64::new(self.tick()),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for IrLibrary {
    fn default() -> Self {
        Self::new()
    }
}
