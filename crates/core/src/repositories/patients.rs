//! Patient registration and record maintenance.
//!
//! Allergy, condition and medication edits use set semantics (see
//! [`crate::models::patient`]): repeated adds and removals of absent entries succeed without
//! touching the stored document.

use crate::config::CoreConfig;
use crate::constants::MRN_PREFIX;
use crate::models::patient::{set_insert, set_remove};
use crate::models::{Gender, MedicalCondition, Patient};
use crate::store::{LabStore, MRN_INDEX};
use crate::validation::{normalize_mrn, optional_text, required_text};
use crate::{LisError, LisResult};
use chrono::{NaiveDate, Utc};
use lis_types::EmailAddress;
use lis_uuid::{human_reference, EntityId};
use std::sync::Arc;

/// Fields accepted when registering a patient.
#[derive(Clone, Debug)]
pub struct NewPatient {
    /// Supplied MRN. Generated when absent.
    pub mrn: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub allergies: Vec<String>,
}

/// Contact fields to overwrite. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct ContactUpdate {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

fn normalize_email(email: Option<String>) -> LisResult<Option<String>> {
    optional_text(email)
        .map(|e| EmailAddress::parse(e).map(|a| a.as_str().to_string()))
        .transpose()
        .map_err(LisError::from)
}

#[derive(Clone)]
pub struct PatientService {
    cfg: Arc<CoreConfig>,
    store: LabStore,
}

impl PatientService {
    pub fn new(cfg: Arc<CoreConfig>, store: LabStore) -> Self {
        Self { cfg, store }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Registers a new patient.
    ///
    /// # Arguments
    ///
    /// * `new` - Demographics and contact details.
    /// * `actor` - The registering user.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::InvalidInput`] for blank names, a malformed MRN or email, or a date
    /// of birth in the future, and [`LisError::Conflict`] when the MRN is already registered.
    pub fn register_patient(&self, new: NewPatient, actor: EntityId) -> LisResult<Patient> {
        let now = Utc::now();
        if new.date_of_birth > now.date_naive() {
            return Err(LisError::InvalidInput(
                "date_of_birth cannot be in the future".into(),
            ));
        }

        let id = EntityId::new();
        let mrn = match new.mrn.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            Some(mrn) => normalize_mrn(mrn)?,
            None => human_reference(MRN_PREFIX, now, &id),
        };

        let mut patient = Patient {
            id,
            mrn,
            first_name: required_text("first_name", &new.first_name)?,
            last_name: required_text("last_name", &new.last_name)?,
            date_of_birth: new.date_of_birth,
            gender: new.gender,
            phone: optional_text(new.phone),
            email: normalize_email(new.email)?,
            address: optional_text(new.address),
            allergies: Vec::new(),
            medical_history: Vec::new(),
            is_active: true,
            created_by: actor,
            created_at: now,
            updated_at: now,
        };
        for allergy in new.allergies.iter().filter(|a| !a.trim().is_empty()) {
            patient.add_allergy(allergy);
        }

        let stored = patient.clone();
        self.store.transaction(|tx| tx.put(stored))?;
        tracing::info!(patient = %patient.id, mrn = %patient.mrn, "patient registered");
        Ok(patient)
    }

    pub fn get_patient(&self, id: EntityId) -> LisResult<Patient> {
        self.store.read(|t| t.require::<Patient>(id).cloned())
    }

    pub fn find_by_mrn(&self, mrn: &str) -> LisResult<Patient> {
        let key = normalize_mrn(mrn)?;
        self.store.read(|t| {
            let id = t
                .lookup(MRN_INDEX, &key)
                .ok_or_else(|| LisError::not_found("patient", &key))?;
            t.require::<Patient>(id).cloned()
        })
    }

    /// Active patients whose name or MRN contains `query`, sorted by last then first name.
    pub fn search_patients(&self, query: &str) -> Vec<Patient> {
        let mut found: Vec<Patient> = self.store.read(|t| {
            t.iter::<Patient>()
                .filter(|p| p.is_active && p.matches(query))
                .cloned()
                .collect()
        });
        sort_by_name(&mut found);
        found
    }

    pub fn list_patients(&self, include_inactive: bool) -> Vec<Patient> {
        let mut all: Vec<Patient> = self.store.read(|t| {
            t.iter::<Patient>()
                .filter(|p| include_inactive || p.is_active)
                .cloned()
                .collect()
        });
        sort_by_name(&mut all);
        all
    }

    pub fn update_contact(
        &self,
        id: EntityId,
        update: ContactUpdate,
        actor: EntityId,
    ) -> LisResult<Patient> {
        let email = normalize_email(update.email)?;
        let patient = self.store.transaction(|tx| {
            tx.update::<Patient, _>(id, |p| {
                if let Some(phone) = optional_text(update.phone) {
                    p.phone = Some(phone);
                }
                if let Some(email) = email {
                    p.email = Some(email);
                }
                if let Some(address) = optional_text(update.address) {
                    p.address = Some(address);
                }
                p.updated_at = Utc::now();
                Ok(())
            })
        })?;
        tracing::info!(patient = %id, %actor, "patient contact updated");
        Ok(patient)
    }

    /// Soft-deletes a patient. Orders and results keep referencing the record.
    pub fn deactivate_patient(&self, id: EntityId, actor: EntityId) -> LisResult<Patient> {
        let patient = self.store.transaction(|tx| {
            tx.update::<Patient, _>(id, |p| {
                p.is_active = false;
                p.updated_at = Utc::now();
                Ok(())
            })
        })?;
        tracing::info!(patient = %id, %actor, "patient deactivated");
        Ok(patient)
    }

    pub fn add_allergy(&self, id: EntityId, allergy: &str) -> LisResult<Patient> {
        let allergy = required_text("allergy", allergy)?;
        self.edit(id, |p| Ok(p.add_allergy(&allergy)))
    }

    pub fn remove_allergy(&self, id: EntityId, allergy: &str) -> LisResult<Patient> {
        self.edit(id, |p| Ok(p.remove_allergy(allergy)))
    }

    pub fn add_condition(&self, id: EntityId, condition: MedicalCondition) -> LisResult<Patient> {
        required_text("condition", &condition.condition)?;
        self.edit(id, |p| Ok(p.add_condition(condition)))
    }

    pub fn remove_condition(&self, id: EntityId, name: &str) -> LisResult<Patient> {
        self.edit(id, |p| Ok(p.remove_condition(name)))
    }

    /// Adds a medication to an existing condition.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] if the patient has no such condition.
    pub fn add_medication(
        &self,
        id: EntityId,
        condition: &str,
        medication: &str,
    ) -> LisResult<Patient> {
        let medication = required_text("medication", medication)?;
        self.edit(id, |p| {
            let entry = p
                .condition_mut(condition)
                .ok_or_else(|| LisError::not_found("condition", condition))?;
            Ok(set_insert(&mut entry.medications, &medication))
        })
    }

    /// Removes a medication from a condition. Absent conditions or medications are a no-op.
    pub fn remove_medication(
        &self,
        id: EntityId,
        condition: &str,
        medication: &str,
    ) -> LisResult<Patient> {
        self.edit(id, |p| {
            Ok(p
                .condition_mut(condition)
                .map(|entry| set_remove(&mut entry.medications, medication))
                .unwrap_or(false))
        })
    }

    /// Applies a set edit. The document is only rewritten when `f` reports a change.
    fn edit<F>(&self, id: EntityId, f: F) -> LisResult<Patient>
    where
        F: FnOnce(&mut Patient) -> LisResult<bool>,
    {
        self.store.transaction(|tx| {
            let mut patient = tx.fetch::<Patient>(id)?;
            if f(&mut patient)? {
                patient.updated_at = Utc::now();
                tx.put(patient.clone())?;
            }
            Ok(patient)
        })
    }
}

fn sort_by_name(patients: &mut [Patient]) {
    patients.sort_by(|a, b| {
        a.last_name
            .to_lowercase()
            .cmp(&b.last_name.to_lowercase())
            .then_with(|| a.first_name.to_lowercase().cmp(&b.first_name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PatientService {
        PatientService::new(Arc::new(CoreConfig::default()), LabStore::in_memory())
    }

    fn new_patient(mrn: Option<&str>) -> NewPatient {
        NewPatient {
            mrn: mrn.map(str::to_string),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 12, 10).expect("valid date"),
            gender: Gender::Female,
            phone: None,
            email: Some("Ada@Example.org".into()),
            address: None,
            allergies: vec!["Penicillin".into(), "penicillin".into()],
        }
    }

    #[test]
    fn register_generates_mrn_and_dedupes_allergies() {
        let svc = service();
        let patient = svc
            .register_patient(new_patient(None), EntityId::new())
            .expect("register");
        assert!(patient.mrn.starts_with("MRN-"));
        assert_eq!(patient.allergies, vec!["Penicillin".to_string()]);
        assert_eq!(patient.email.as_deref(), Some("ada@example.org"));
        assert_eq!(
            svc.find_by_mrn(&patient.mrn).expect("by mrn").id,
            patient.id
        );
    }

    #[test]
    fn duplicate_mrn_is_a_conflict() {
        let svc = service();
        svc.register_patient(new_patient(Some("MRN-7")), EntityId::new())
            .expect("first");
        let err = svc
            .register_patient(new_patient(Some("mrn-7")), EntityId::new())
            .expect_err("duplicate mrn");
        assert!(matches!(err, LisError::Conflict { index: MRN_INDEX, .. }));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut new = new_patient(None);
        new.last_name = "  ".into();
        let err = service()
            .register_patient(new, EntityId::new())
            .expect_err("blank name");
        assert!(matches!(err, LisError::InvalidInput(_)));
    }

    #[test]
    fn allergy_set_semantics_round_trip() {
        let svc = service();
        let patient = svc
            .register_patient(new_patient(None), EntityId::new())
            .expect("register");

        let after_add = svc.add_allergy(patient.id, "Latex").expect("add");
        let again = svc.add_allergy(patient.id, " LATEX ").expect("add again");
        assert_eq!(after_add.allergies, again.allergies);
        assert_eq!(again.allergies.len(), 2);

        let removed = svc.remove_allergy(patient.id, "Peanuts").expect("remove absent");
        assert_eq!(removed.allergies, again.allergies);
        assert_eq!(removed.updated_at, again.updated_at);
    }

    #[test]
    fn medication_requires_condition() {
        let svc = service();
        let patient = svc
            .register_patient(new_patient(None), EntityId::new())
            .expect("register");

        let err = svc
            .add_medication(patient.id, "Asthma", "Salbutamol")
            .expect_err("no such condition");
        assert!(matches!(err, LisError::NotFound { .. }));

        svc.add_condition(
            patient.id,
            MedicalCondition {
                condition: "Asthma".into(),
                diagnosed_on: None,
                notes: None,
                medications: vec![],
            },
        )
        .expect("add condition");
        svc.add_medication(patient.id, "asthma", "Salbutamol")
            .expect("add medication");
        let patient = svc
            .add_medication(patient.id, "Asthma", "salbutamol")
            .expect("add medication again");
        assert_eq!(
            patient.condition("Asthma").expect("condition").medications,
            vec!["Salbutamol".to_string()]
        );

        let patient = svc
            .remove_medication(patient.id, "Eczema", "Salbutamol")
            .expect("absent condition is a no-op");
        assert_eq!(patient.medical_history.len(), 1);
    }

    #[test]
    fn deactivated_patients_drop_out_of_search() {
        let svc = service();
        let patient = svc
            .register_patient(new_patient(None), EntityId::new())
            .expect("register");
        assert_eq!(svc.search_patients("lovelace").len(), 1);

        svc.deactivate_patient(patient.id, EntityId::new())
            .expect("deactivate");
        assert!(svc.search_patients("lovelace").is_empty());
        assert_eq!(svc.list_patients(true).len(), 1);
        assert!(svc.list_patients(false).is_empty());
    }
}
