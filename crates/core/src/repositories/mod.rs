//! Domain services.
//!
//! Each service owns a handle to the shared [`LabStore`] and the process [`CoreConfig`]. Every
//! write goes through one store transaction, so a failed operation leaves nothing behind.

pub mod orders;
pub mod patients;
pub mod reports;
pub mod results;
pub mod samples;
pub mod test_catalog;
pub mod users;

use crate::collaborators::{CacheStore, Mailer};
use crate::config::CoreConfig;
use crate::store::LabStore;
use lis_uuid::EntityId;
use std::sync::Arc;

/// Outcome of a status write applied to many documents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BulkUpdateOutcome {
    /// Ids that resolved to a document.
    pub matched: usize,
    pub modified: usize,
}

/// Drops repeated ids, keeping first occurrences in order.
pub(crate) fn unique(ids: &[EntityId]) -> Vec<EntityId> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

/// All services wired to one store.
#[derive(Clone)]
pub struct LabServices {
    pub patients: patients::PatientService,
    pub tests: test_catalog::TestCatalogService,
    pub users: users::UserService,
    pub orders: orders::OrderService,
    pub samples: samples::SampleService,
    pub results: results::ResultService,
    pub reports: reports::ReportService,
    cfg: Arc<CoreConfig>,
    store: LabStore,
}

impl LabServices {
    /// Builds every service over `store`.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Configuration shared by all services.
    /// * `store` - The document store, in memory or opened from a data directory.
    /// * `cache` - Cache used for catalog lookups.
    /// * `mailer` - Receives critical-result and delivery notifications.
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: LabStore,
        cache: Arc<dyn CacheStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            patients: patients::PatientService::new(cfg.clone(), store.clone()),
            tests: test_catalog::TestCatalogService::new(cfg.clone(), store.clone(), cache),
            users: users::UserService::new(cfg.clone(), store.clone()),
            orders: orders::OrderService::new(cfg.clone(), store.clone()),
            samples: samples::SampleService::new(cfg.clone(), store.clone()),
            results: results::ResultService::new(cfg.clone(), store.clone(), mailer.clone()),
            reports: reports::ReportService::new(cfg.clone(), store.clone(), mailer),
            cfg,
            store,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn store(&self) -> &LabStore {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::orders::NewOrder;
    use super::patients::NewPatient;
    use super::results::NewResult;
    use super::samples::NewSample;
    use super::test_catalog::NewTest;
    use super::users::NewUser;
    use super::LabServices;
    use crate::collaborators::{MemoryCache, RecordingMailer};
    use crate::config::CoreConfig;
    use crate::constants::DEFAULT_SAMPLE_EXPIRY_DAYS;
    use crate::lifecycle::TransitionPolicy;
    use crate::models::{
        Gender, LabTest, NormalRange, Order, OrderPriority, Patient, Sample, SamplePriority, User,
        UserRole, ValueType,
    };
    use crate::store::LabStore;
    use chrono::NaiveDate;
    use lis_uuid::EntityId;
    use serde_json::Value;
    use std::sync::Arc;

    /// In-memory services seeded with one patient, two tests and two staff users.
    pub(crate) struct Fixture {
        pub services: LabServices,
        pub mailer: Arc<RecordingMailer>,
        pub actor: EntityId,
        pub doctor: User,
        pub patient: Patient,
        /// Priced 50, range 4-10.
        pub cbc: LabTest,
        /// Priced 75, range 0-5.2.
        pub lipid: LabTest,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_policy(TransitionPolicy::Permissive)
        }

        pub fn with_policy(policy: TransitionPolicy) -> Self {
            let cfg = CoreConfig::new(None, policy, DEFAULT_SAMPLE_EXPIRY_DAYS).expect("config");
            let mailer = RecordingMailer::new();
            let services = LabServices::new(
                Arc::new(cfg),
                LabStore::in_memory(),
                Arc::new(MemoryCache::new()),
                mailer.clone(),
            );

            let tech = services
                .users
                .create_user(NewUser {
                    name: "Sam Bench".into(),
                    email: "sam@lab.example".into(),
                    role: UserRole::LabTechnician,
                })
                .expect("technician");
            let doctor = services
                .users
                .create_user(NewUser {
                    name: "Dr Rosa Franklin".into(),
                    email: "rosa@lab.example".into(),
                    role: UserRole::Doctor,
                })
                .expect("doctor");
            let patient = services
                .patients
                .register_patient(
                    NewPatient {
                        mrn: None,
                        first_name: "Ada".into(),
                        last_name: "Lovelace".into(),
                        date_of_birth: NaiveDate::from_ymd_opt(1985, 12, 10).expect("date"),
                        gender: Gender::Female,
                        phone: None,
                        email: None,
                        address: None,
                        allergies: vec![],
                    },
                    tech.id,
                )
                .expect("patient");
            let cbc = services
                .tests
                .create_test(test("CBC", "Complete blood count", 50.0, (4.0, 10.0)))
                .expect("cbc");
            let lipid = services
                .tests
                .create_test(test("LIPID", "Lipid panel", 75.0, (0.0, 5.2)))
                .expect("lipid");

            Self {
                services,
                mailer,
                actor: tech.id,
                doctor,
                patient,
                cbc,
                lipid,
            }
        }

        pub fn new_order(&self, tests: Vec<EntityId>, discount: Option<f64>) -> NewOrder {
            NewOrder {
                patient: self.patient.id,
                tests,
                discount,
                priority: OrderPriority::Routine,
                notes: None,
            }
        }

        pub fn order(&self, tests: Vec<EntityId>) -> Order {
            self.services
                .orders
                .create_order(self.new_order(tests, None), self.actor)
                .expect("order")
        }

        pub fn new_sample(&self, order: &Order) -> NewSample {
            NewSample {
                order: order.id,
                patient: order.patient,
                tests: order.tests.clone(),
                sample_type: "blood".into(),
                container_type: Some("EDTA".into()),
                priority: SamplePriority::Routine,
                scheduled_collection_time: None,
                expiry_date: None,
            }
        }

        /// A pending sample on a fresh single-test order.
        pub fn sample(&self) -> Sample {
            let order = self.order(vec![self.cbc.id]);
            self.services
                .samples
                .create_sample(self.new_sample(&order), self.actor)
                .expect("sample")
        }

        pub fn new_result(&self, order: &Order, test: EntityId, value: Option<Value>) -> NewResult {
            NewResult {
                order: order.id,
                test,
                value,
                value_type: ValueType::Number,
                unit: None,
                normal_range: None,
                parameters: vec![],
                comments: None,
            }
        }
    }

    fn test(code: &str, name: &str, price: f64, range: (f64, f64)) -> NewTest {
        NewTest {
            code: code.into(),
            name: name.into(),
            category: None,
            sample_type: "blood".into(),
            price,
            normal_range: NormalRange::between(range.0, range.1),
            test_parameters: vec![],
            turnaround_hours: None,
        }
    }
}
