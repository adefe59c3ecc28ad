//! Cache façade (component J), the surface the HTTP handlers and the CLI
//! call into. Grounded on the teacher's `query::cache::QueryCache`: an
//! in-process `moka` front for hot entries backed by a durable store, with
//! hit/miss counters exposed the same way (`CacheStats`).
//!
//! `moka` defaults to a TinyLFU eviction policy; this cache is explicitly
//! configured with `EvictionPolicy::lru()` so eviction order matches the
//! design's LRU requirement rather than the crate's own default.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use moka::policy::EvictionPolicy;
use moka::sync::Cache as MokaCache;
use serde::Serialize;

use crate::analysis::binder::Params;
use crate::analysis::{analyze_select, analyze_write};
use crate::decider::should_invalidate;
use crate::error::{AnalysisError, StorageError};
use crate::model::{CacheKey, Fingerprint};
use crate::store::Store;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub invalidations: u64,
    pub parse_failed_errors: u64,
    pub unsupported_errors: u64,
}

pub struct Cache {
    store: Store,
    hot: MokaCache<String, (CacheKey, Vec<u8>)>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    parse_failed_errors: AtomicU64,
    unsupported_errors: AtomicU64,
}

impl Cache {
    pub fn open(db_path: impl AsRef<std::path::Path>, hot_capacity: u64) -> Result<Self, CacheError> {
        let store = Store::open(db_path)?;
        let hot = MokaCache::builder()
            .max_capacity(hot_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Ok(Self {
            store,
            hot,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            parse_failed_errors: AtomicU64::new(0),
            unsupported_errors: AtomicU64::new(0),
        })
    }

    fn record_analysis_error(&self, err: &AnalysisError) {
        match err {
            AnalysisError::ParseFailed(_) => self.parse_failed_errors.fetch_add(1, Ordering::Relaxed),
            AnalysisError::Unsupported(_) => self.unsupported_errors.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Analyze `sql`, register `result_blob` under its fingerprint, and
    /// return the fingerprint so the caller can key future lookups by it.
    pub fn register(
        &self,
        sql: &str,
        params: Option<&Params>,
        result_blob: Vec<u8>,
    ) -> Result<Fingerprint, CacheError> {
        let key = analyze_select(sql, params).map_err(|e| {
            self.record_analysis_error(&e);
            e
        })?;
        let now = now_secs();
        self.store.register(&key, result_blob.clone(), now)?;
        self.hot.insert(key.fingerprint.as_str().to_string(), (key.clone(), result_blob));
        Ok(key.fingerprint)
    }

    /// Analyze `sql` and return its fingerprint without registering a
    /// result — used by `POST /analyze` to expose the analyzer on its own.
    pub fn analyze(&self, sql: &str, params: Option<&Params>) -> Result<CacheKey, CacheError> {
        analyze_select(sql, params)
            .map_err(|e| {
                self.record_analysis_error(&e);
                e
            })
            .map_err(CacheError::from)
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some((_, blob)) = self.hot.get(fingerprint) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(blob));
        }

        match self.store.get(fingerprint)? {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let key: CacheKey = serde_json::from_str(&entry.cache_key_json).map_err(StorageError::from)?;
                self.hot.insert(fingerprint.to_string(), (key, entry.result_blob.clone()));
                Ok(Some(entry.result_blob))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Analyze a write statement and invalidate every cached entry the
    /// decider says may overlap it. Returns the number of entries removed.
    pub fn invalidate(&self, sql: &str, params: Option<&Params>) -> Result<usize, CacheError> {
        let write = analyze_write(sql, params).map_err(|e| {
            self.record_analysis_error(&e);
            e
        })?;
        let candidates = self.store.candidate_keys_for_write(&write)?;

        let mut removed = 0;
        for key in candidates {
            if should_invalidate(&key, &write) {
                self.store.remove(key.fingerprint.as_str())?;
                self.hot.invalidate(key.fingerprint.as_str());
                removed += 1;
            }
        }
        if removed > 0 {
            self.invalidations.fetch_add(removed as u64, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// The pure decider check, exposed directly so callers can test a
    /// hypothetical write against an already-known `CacheKey` without this
    /// cache ever having stored anything for it.
    pub fn should_invalidate(key: &CacheKey, write_sql: &str, params: Option<&Params>) -> Result<bool, CacheError> {
        let write = analyze_write(write_sql, params)?;
        Ok(should_invalidate(key, &write))
    }

    pub fn clear_table(&self, table: &str) -> Result<usize, CacheError> {
        let removed = self.store.clear_table(table)?;
        for fp in &removed {
            self.hot.invalidate(fp);
        }
        Ok(removed.len())
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 { 0.0 } else { hits as f64 / total as f64 };
        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            parse_failed_errors: self.parse_failed_errors.load(Ordering::Relaxed),
            unsupported_errors: self.unsupported_errors.load(Ordering::Relaxed),
        }
    }

    pub fn close(&self) -> Result<(), CacheError> {
        self.store.flush()?;
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
