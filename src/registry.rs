use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::error::RegistryError;
use crate::types::{Dialect, FormatProfile};

/// Keyed store for per-issuer format profiles. Injectable so the registry is
/// never a hidden process-wide singleton; compare-and-swap serializes
/// concurrent updates for the same issuer.
pub trait ProfileStore: Send + Sync {
    fn get(&self, issuer: &str) -> Result<Option<FormatProfile>, RegistryError>;
    fn set(&self, issuer: &str, profile: &FormatProfile) -> Result<(), RegistryError>;
    fn compare_and_swap(
        &self,
        issuer: &str,
        current: Option<&FormatProfile>,
        next: &FormatProfile,
    ) -> Result<bool, RegistryError>;
}

/// File-backed store, inspectable by downstream tooling as JSON values.
pub struct SledProfileStore {
    db: sled::Db,
}

impl SledProfileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

impl ProfileStore for SledProfileStore {
    fn get(&self, issuer: &str) -> Result<Option<FormatProfile>, RegistryError> {
        self.db
            .get(issuer.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(Into::into)
    }

    fn set(&self, issuer: &str, profile: &FormatProfile) -> Result<(), RegistryError> {
        self.db
            .insert(issuer.as_bytes(), serde_json::to_vec(profile)?)?;
        self.db.flush()?;
        Ok(())
    }

    fn compare_and_swap(
        &self,
        issuer: &str,
        current: Option<&FormatProfile>,
        next: &FormatProfile,
    ) -> Result<bool, RegistryError> {
        let old = current.map(serde_json::to_vec).transpose()?;
        let new = serde_json::to_vec(next)?;
        let swapped = self
            .db
            .compare_and_swap(issuer.as_bytes(), old, Some(new))?
            .is_ok();
        if swapped {
            self.db.flush()?;
        }
        Ok(swapped)
    }
}

/// In-memory store for tests and embedding.
#[derive(Default)]
pub struct MemoryProfileStore {
    inner: Mutex<HashMap<String, FormatProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get(&self, issuer: &str) -> Result<Option<FormatProfile>, RegistryError> {
        Ok(self.inner.lock().unwrap().get(issuer).cloned())
    }

    fn set(&self, issuer: &str, profile: &FormatProfile) -> Result<(), RegistryError> {
        self.inner
            .lock()
            .unwrap()
            .insert(issuer.to_string(), profile.clone());
        Ok(())
    }

    fn compare_and_swap(
        &self,
        issuer: &str,
        current: Option<&FormatProfile>,
        next: &FormatProfile,
    ) -> Result<bool, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.get(issuer) != current {
            return Ok(false);
        }
        inner.insert(issuer.to_string(), next.clone());
        Ok(true)
    }
}

/// Classifies document dialect and remembers per-issuer quirks. Filename
/// signature takes precedence; issuer history is consulted only when the
/// signature is inconclusive.
pub struct FormatDetector {
    store: Arc<dyn ProfileStore>,
}

impl FormatDetector {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub fn signature_dialect(name: &str) -> Option<Dialect> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".xml") || lower.ends_with(".xbrl") {
            return Some(Dialect::InstanceXml);
        }
        if lower.ends_with(".htm") || lower.ends_with(".html") || lower.ends_with(".xhtml") {
            return Some(Dialect::InlineHtml);
        }
        None
    }

    pub fn detect(&self, name: &str, issuer: &str) -> FormatProfile {
        let mut profile = self
            .store
            .get(issuer)
            .unwrap_or_else(|e| {
                log::warn!("profile lookup failed for {}: {}", issuer, e);
                None
            })
            .unwrap_or_default();

        if let Some(dialect) = Self::signature_dialect(name) {
            profile.preferred_dialect = Some(dialect);
        }
        profile
    }

    /// Record a successful extraction. The issuer's default becomes the
    /// dialect with the highest historical success count. Entries are only
    /// ever refined, never deleted.
    pub fn learn(
        &self,
        issuer: &str,
        dialect_used: Dialect,
    ) -> Result<FormatProfile, RegistryError> {
        loop {
            let current = self.store.get(issuer)?;
            let mut next = current.clone().unwrap_or_default();
            *next
                .success_counts
                .entry(dialect_used.to_string())
                .or_insert(0) += 1;
            next.preferred_dialect = next
                .success_counts
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                .and_then(|(name, _)| Dialect::from_str(name).ok());

            if self
                .store
                .compare_and_swap(issuer, current.as_ref(), &next)?
            {
                log::debug!(
                    "registry for {} now prefers {:?}",
                    issuer,
                    next.preferred_dialect
                );
                return Ok(next);
            }
            // Lost the race for this issuer, re-read and retry
        }
    }
}
