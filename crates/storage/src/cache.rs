use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use quiz_core::model::{CertConfig, CertId, RawTable, TopicId};

use crate::store::{BankStore, StoreError};

/// Memoizing wrapper around any backend.
///
/// `warm()` front-loads the expensive round trips (certification listing,
/// every bank, every per-cert config) so the first user interaction does
/// not pay for them; image bytes are memoized as they are fetched, keyed
/// by `cert_topic_number`. Entries never expire: the content repositories
/// change between sessions, not during one.
pub struct CachedStore {
    inner: Arc<dyn BankStore>,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    certifications: Option<Vec<CertId>>,
    banks: HashMap<CertId, RawTable>,
    configs: HashMap<CertId, Option<CertConfig>>,
    images: HashMap<String, Option<Vec<u8>>>,
}

fn image_key(cert: &CertId, topic: TopicId, number: u32) -> String {
    format!("{}_{topic}_{number}", cert.as_str())
}

impl CachedStore {
    #[must_use]
    pub fn new(inner: Arc<dyn BankStore>) -> Self {
        Self {
            inner,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Pre-load the certification listing plus every bank and config.
    ///
    /// Individual certifications that fail to load are skipped with a
    /// warning; they will be retried on demand.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` only when the initial listing itself fails.
    pub async fn warm(&self) -> Result<(), StoreError> {
        let certs = self.inner.list_certifications().await?;
        debug!(count = certs.len(), "warming bank cache");

        for cert in &certs {
            match self.inner.load_bank(cert).await {
                Ok(bank) => {
                    let mut guard = self.lock_state()?;
                    guard.banks.insert(cert.clone(), bank);
                }
                Err(err) => warn!(cert = %cert, error = %err, "bank warm-up skipped"),
            }
            match self.inner.load_cert_config(cert).await {
                Ok(config) => {
                    let mut guard = self.lock_state()?;
                    guard.configs.insert(cert.clone(), config);
                }
                Err(err) => warn!(cert = %cert, error = %err, "config warm-up skipped"),
            }
        }

        let mut guard = self.lock_state()?;
        guard.certifications = Some(certs);
        Ok(())
    }

    /// Number of memoized image payloads, mostly useful in tests.
    #[must_use]
    pub fn cached_image_count(&self) -> usize {
        self.lock_state().map_or(0, |guard| guard.images.len())
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, CacheState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Transport(e.to_string()))
    }
}

#[async_trait]
impl BankStore for CachedStore {
    async fn list_certifications(&self) -> Result<Vec<CertId>, StoreError> {
        if let Some(certs) = self.lock_state()?.certifications.clone() {
            return Ok(certs);
        }

        let certs = self.inner.list_certifications().await?;
        self.lock_state()?.certifications = Some(certs.clone());
        Ok(certs)
    }

    async fn load_bank(&self, cert: &CertId) -> Result<RawTable, StoreError> {
        if let Some(bank) = self.lock_state()?.banks.get(cert) {
            return Ok(bank.clone());
        }

        let bank = self.inner.load_bank(cert).await?;
        self.lock_state()?.banks.insert(cert.clone(), bank.clone());
        Ok(bank)
    }

    async fn load_cert_config(&self, cert: &CertId) -> Result<Option<CertConfig>, StoreError> {
        if let Some(config) = self.lock_state()?.configs.get(cert) {
            return Ok(config.clone());
        }

        let config = self.inner.load_cert_config(cert).await?;
        self.lock_state()?.configs.insert(cert.clone(), config.clone());
        Ok(config)
    }

    async fn find_image(
        &self,
        cert: &CertId,
        topic: TopicId,
        number: u32,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let key = image_key(cert, topic, number);
        if let Some(bytes) = self.lock_state()?.images.get(&key) {
            return Ok(bytes.clone());
        }

        // Misses are memoized too: a question without an image stays
        // without one for the whole session.
        let bytes = self.inner.find_image(cert, topic, number).await?;
        self.lock_state()?.images.insert(key, bytes.clone());
        Ok(bytes)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use quiz_core::model::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn demo_table() -> RawTable {
        RawTable::new(
            vec!["Topic".into(), "Numero".into(), "Risposta Esatta".into()],
            vec![vec![Cell::Int(1), Cell::Int(1), Cell::Text("A".into())]],
        )
    }

    /// Counts calls through to the wrapped store.
    struct CountingStore {
        inner: InMemoryStore,
        bank_loads: AtomicUsize,
        image_lookups: AtomicUsize,
    }

    #[async_trait]
    impl BankStore for CountingStore {
        async fn list_certifications(&self) -> Result<Vec<CertId>, StoreError> {
            self.inner.list_certifications().await
        }

        async fn load_bank(&self, cert: &CertId) -> Result<RawTable, StoreError> {
            self.bank_loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_bank(cert).await
        }

        async fn load_cert_config(&self, cert: &CertId) -> Result<Option<CertConfig>, StoreError> {
            self.inner.load_cert_config(cert).await
        }

        async fn find_image(
            &self,
            cert: &CertId,
            topic: TopicId,
            number: u32,
        ) -> Result<Option<Vec<u8>>, StoreError> {
            self.image_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_image(cert, topic, number).await
        }
    }

    fn counting_store() -> Arc<CountingStore> {
        let inner = InMemoryStore::new();
        let cert = CertId::new("demo");
        inner.put_bank(cert.clone(), demo_table()).unwrap();
        inner.put_image(cert, TopicId::new(1), 1, vec![1, 2, 3]).unwrap();
        Arc::new(CountingStore {
            inner,
            bank_loads: AtomicUsize::new(0),
            image_lookups: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn warm_preloads_banks() {
        let counting = counting_store();
        let cache = CachedStore::new(counting.clone());

        cache.warm().await.unwrap();
        assert_eq!(counting.bank_loads.load(Ordering::SeqCst), 1);

        // Everything after warm() is served from memory.
        let cert = CertId::new("demo");
        cache.list_certifications().await.unwrap();
        cache.load_bank(&cert).await.unwrap();
        cache.load_bank(&cert).await.unwrap();
        assert_eq!(counting.bank_loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn image_bytes_fetch_once() {
        let counting = counting_store();
        let cache = CachedStore::new(counting.clone());
        let cert = CertId::new("demo");

        for _ in 0..3 {
            let bytes = cache
                .find_image(&cert, TopicId::new(1), 1)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(bytes, vec![1, 2, 3]);
        }
        assert_eq!(counting.image_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_image_count(), 1);
    }

    #[tokio::test]
    async fn poisoned_cache_degrades_to_an_error() {
        let counting = counting_store();
        let cache = CachedStore::new(counting);
        let cert = CertId::new("demo");
        cache.load_bank(&cert).await.unwrap();

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = cache.state.lock().unwrap();
            panic!("poison the cache state");
        }));

        // Errors instead of panicking; callers degrade it like any other
        // store failure.
        let err = cache.load_bank(&cert).await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
        let err = cache
            .find_image(&cert, TopicId::new(1), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
        assert_eq!(cache.cached_image_count(), 0);
    }

    #[tokio::test]
    async fn image_misses_are_memoized() {
        let counting = counting_store();
        let cache = CachedStore::new(counting.clone());
        let cert = CertId::new("demo");

        for _ in 0..2 {
            assert!(
                cache
                    .find_image(&cert, TopicId::new(9), 1)
                    .await
                    .unwrap()
                    .is_none()
            );
        }
        assert_eq!(counting.image_lookups.load(Ordering::SeqCst), 1);
    }
}
