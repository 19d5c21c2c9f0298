//! Catalog of orderable tests.
//!
//! Lookups by id go through the injected [`CacheStore`]; every mutation invalidates the cached
//! entry after the store commit.

use crate::collaborators::CacheStore;
use crate::config::CoreConfig;
use crate::models::test_catalog::{validate_parameters, validate_price};
use crate::models::{LabTest, NormalRange, TestParameter};
use crate::store::{LabStore, Tables, TEST_CODE_INDEX};
use crate::validation::{normalize_test_code, optional_text, required_text};
use crate::{LisError, LisResult};
use chrono::Utc;
use lis_uuid::EntityId;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct NewTest {
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub sample_type: String,
    pub price: f64,
    pub normal_range: NormalRange,
    pub test_parameters: Vec<TestParameter>,
    pub turnaround_hours: Option<u32>,
}

fn cache_key(id: EntityId) -> String {
    format!("test:{id}")
}

/// Resolves every id in `ids`, keeping the first occurrence of duplicates.
///
/// # Errors
///
/// Returns [`LisError::NotFound`] listing every id that does not resolve. Nothing is returned
/// for the ids that do.
pub(crate) fn resolve_tests(tables: &Tables, ids: &[EntityId]) -> LisResult<Vec<LabTest>> {
    let mut seen = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();
    let mut found = Vec::with_capacity(ids.len());

    for id in ids {
        if seen.contains(id) {
            continue;
        }
        seen.push(*id);
        match tables.get::<LabTest>(*id) {
            Some(test) => found.push(test.clone()),
            None => missing.push(id.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(LisError::NotFound {
            entity: "test",
            id: missing.join(", "),
        });
    }
    Ok(found)
}

#[derive(Clone)]
pub struct TestCatalogService {
    cfg: Arc<CoreConfig>,
    store: LabStore,
    cache: Arc<dyn CacheStore>,
}

impl TestCatalogService {
    pub fn new(cfg: Arc<CoreConfig>, store: LabStore, cache: Arc<dyn CacheStore>) -> Self {
        Self { cfg, store, cache }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Adds a test to the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::InvalidInput`] for a malformed code, blank name, negative price or
    /// an inconsistent range, and [`LisError::Conflict`] when the code is taken.
    pub fn create_test(&self, new: NewTest) -> LisResult<LabTest> {
        validate_price(new.price)?;
        new.normal_range.validate()?;
        validate_parameters(&new.test_parameters)?;

        let now = Utc::now();
        let test = LabTest {
            id: EntityId::new(),
            code: normalize_test_code(&new.code)?,
            name: required_text("name", &new.name)?,
            category: optional_text(new.category),
            sample_type: required_text("sample_type", &new.sample_type)?,
            price: new.price,
            normal_range: new.normal_range,
            test_parameters: new.test_parameters,
            turnaround_hours: new.turnaround_hours,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let stored = test.clone();
        self.store.transaction(|tx| tx.put(stored))?;
        tracing::info!(test = %test.id, code = %test.code, "test added to catalog");
        Ok(test)
    }

    pub fn get_test(&self, id: EntityId) -> LisResult<LabTest> {
        let key = cache_key(id);
        if let Some(cached) = self.cache.get(&key) {
            match serde_json::from_value::<LabTest>(cached) {
                Ok(test) => return Ok(test),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "discarding unreadable cache entry");
                    self.cache.invalidate(&key);
                }
            }
        }

        let test = self.store.read(|t| t.require::<LabTest>(id).cloned())?;
        match serde_json::to_value(&test).map_err(LisError::CacheSerialization) {
            Ok(value) => self.cache.put(&key, value),
            Err(e) => tracing::warn!(%key, error = %e, "test not cached"),
        }
        Ok(test)
    }

    pub fn find_by_code(&self, code: &str) -> LisResult<LabTest> {
        let code = normalize_test_code(code)?;
        let id = self
            .store
            .read(|t| t.lookup(TEST_CODE_INDEX, &code))
            .ok_or_else(|| LisError::not_found("test", &code))?;
        self.get_test(id)
    }

    /// Resolves all of `ids` or fails. See [`resolve_tests`].
    pub fn find_tests(&self, ids: &[EntityId]) -> LisResult<Vec<LabTest>> {
        self.store.read(|t| resolve_tests(t, ids))
    }

    /// Catalog sorted by code.
    pub fn list_tests(&self, active_only: bool) -> Vec<LabTest> {
        let mut tests: Vec<LabTest> = self.store.read(|t| {
            t.iter::<LabTest>()
                .filter(|test| !active_only || test.is_active)
                .cloned()
                .collect()
        });
        tests.sort_by(|a, b| a.code.cmp(&b.code));
        tests
    }

    /// Changes the list price. Existing orders keep the price they snapshotted.
    pub fn update_price(&self, id: EntityId, price: f64) -> LisResult<LabTest> {
        validate_price(price)?;
        self.mutate(id, |test| {
            test.price = price;
            Ok(())
        })
    }

    pub fn update_parameters(
        &self,
        id: EntityId,
        parameters: Vec<TestParameter>,
    ) -> LisResult<LabTest> {
        validate_parameters(&parameters)?;
        self.mutate(id, |test| {
            test.test_parameters = parameters;
            Ok(())
        })
    }

    pub fn update_normal_range(&self, id: EntityId, range: NormalRange) -> LisResult<LabTest> {
        range.validate()?;
        self.mutate(id, |test| {
            test.normal_range = range;
            Ok(())
        })
    }

    pub fn deactivate_test(&self, id: EntityId) -> LisResult<LabTest> {
        self.mutate(id, |test| {
            test.is_active = false;
            Ok(())
        })
    }

    fn mutate<F>(&self, id: EntityId, f: F) -> LisResult<LabTest>
    where
        F: FnOnce(&mut LabTest) -> LisResult<()>,
    {
        let test = self.store.transaction(|tx| {
            tx.update::<LabTest, _>(id, |test| {
                f(test)?;
                test.updated_at = Utc::now();
                Ok(())
            })
        })?;
        self.cache.invalidate(&cache_key(id));
        tracing::info!(test = %id, code = %test.code, "catalog test updated");
        Ok(test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MemoryCache;

    fn service() -> (TestCatalogService, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let svc = TestCatalogService::new(
            Arc::new(CoreConfig::default()),
            LabStore::in_memory(),
            cache.clone(),
        );
        (svc, cache)
    }

    fn cbc() -> NewTest {
        NewTest {
            code: "cbc".into(),
            name: "Complete blood count".into(),
            category: Some("Haematology".into()),
            sample_type: "blood".into(),
            price: 50.0,
            normal_range: NormalRange::between(4.0, 10.0),
            test_parameters: vec![],
            turnaround_hours: Some(24),
        }
    }

    #[test]
    fn codes_are_unique_after_normalisation() {
        let (svc, _) = service();
        let test = svc.create_test(cbc()).expect("create");
        assert_eq!(test.code, "CBC");

        let err = svc.create_test(cbc()).expect_err("duplicate code");
        assert!(matches!(err, LisError::Conflict { index: TEST_CODE_INDEX, .. }));
        assert_eq!(svc.find_by_code("Cbc").expect("by code").id, test.id);
    }

    #[test]
    fn lookups_populate_and_mutations_invalidate_cache() {
        let (svc, cache) = service();
        let test = svc.create_test(cbc()).expect("create");

        svc.get_test(test.id).expect("get");
        assert_eq!(cache.len(), 1);

        let updated = svc.update_price(test.id, 60.0).expect("price");
        assert!(cache.is_empty());
        assert_eq!(svc.get_test(test.id).expect("get").price, updated.price);
    }

    #[test]
    fn find_tests_is_all_or_nothing() {
        let (svc, _) = service();
        let test = svc.create_test(cbc()).expect("create");
        let missing = EntityId::new();

        let err = svc
            .find_tests(&[test.id, missing])
            .expect_err("one id is missing");
        match err {
            LisError::NotFound { entity, id } => {
                assert_eq!(entity, "test");
                assert_eq!(id, missing.to_string());
            }
            other => panic!("expected NotFound, got {other:?}"),
        }

        assert_eq!(svc.find_tests(&[test.id, test.id]).expect("dedup").len(), 1);
    }

    #[test]
    fn invalid_range_is_rejected() {
        let (svc, _) = service();
        let test = svc.create_test(cbc()).expect("create");
        assert!(svc
            .update_normal_range(test.id, NormalRange::between(9.0, 1.0))
            .is_err());
        assert!(svc.update_price(test.id, -5.0).is_err());
    }

    #[test]
    fn inactive_tests_are_hidden_from_active_listing() {
        let (svc, _) = service();
        let test = svc.create_test(cbc()).expect("create");
        svc.deactivate_test(test.id).expect("deactivate");
        assert!(svc.list_tests(true).is_empty());
        assert_eq!(svc.list_tests(false).len(), 1);
    }
}
