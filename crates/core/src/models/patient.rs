//! Patient records.
//!
//! Allergies, conditions and per-condition medications behave as sets: adding an existing
//! entry is a no-op and removing an absent one is not an error. Matching is case-insensitive on
//! the trimmed value; the first spelling stored wins.

use crate::lifecycle::status_strings;
use chrono::{DateTime, NaiveDate, Utc};
use lis_uuid::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

status_strings!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
    Unknown => "unknown",
});

/// A diagnosed condition with the medications prescribed for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalCondition {
    pub condition: String,
    #[serde(default)]
    pub diagnosed_on: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub medications: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: EntityId,
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub medical_history: Vec<MedicalCondition>,
    pub is_active: bool,
    pub created_by: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn same_entry(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Inserts `value` unless an equal entry exists. Returns true if the list changed.
pub(crate) fn set_insert(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|existing| same_entry(existing, value)) {
        return false;
    }
    list.push(value.trim().to_string());
    true
}

/// Removes every entry equal to `value`. Returns true if the list changed.
pub(crate) fn set_remove(list: &mut Vec<String>, value: &str) -> bool {
    let before = list.len();
    list.retain(|existing| !same_entry(existing, value));
    list.len() != before
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn add_allergy(&mut self, allergy: &str) -> bool {
        set_insert(&mut self.allergies, allergy)
    }

    pub fn remove_allergy(&mut self, allergy: &str) -> bool {
        set_remove(&mut self.allergies, allergy)
    }

    /// Adds a condition keyed by name. An existing condition with the same name is kept as is.
    pub fn add_condition(&mut self, condition: MedicalCondition) -> bool {
        if self.condition(&condition.condition).is_some() {
            return false;
        }
        let mut condition = condition;
        condition.condition = condition.condition.trim().to_string();
        self.medical_history.push(condition);
        true
    }

    pub fn remove_condition(&mut self, name: &str) -> bool {
        let before = self.medical_history.len();
        self.medical_history
            .retain(|c| !same_entry(&c.condition, name));
        self.medical_history.len() != before
    }

    pub fn condition(&self, name: &str) -> Option<&MedicalCondition> {
        self.medical_history
            .iter()
            .find(|c| same_entry(&c.condition, name))
    }

    pub fn condition_mut(&mut self, name: &str) -> Option<&mut MedicalCondition> {
        self.medical_history
            .iter_mut()
            .find(|c| same_entry(&c.condition, name))
    }

    /// Case-insensitive substring match over first name, last name, full name and MRN.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            self.first_name.to_lowercase(),
            self.last_name.to_lowercase(),
            self.full_name().to_lowercase(),
            self.mrn.to_lowercase(),
        ]
        .iter()
        .any(|field| field.contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_patient() -> Patient {
        let now = Utc::now();
        Patient {
            id: EntityId::new(),
            mrn: "MRN-1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 12, 10).unwrap(),
            gender: Gender::Female,
            phone: None,
            email: None,
            address: None,
            allergies: vec![],
            medical_history: vec![],
            is_active: true,
            created_by: EntityId::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn adding_existing_allergy_is_idempotent() {
        let mut patient = sample_patient();
        assert!(patient.add_allergy("Penicillin"));
        assert!(!patient.add_allergy(" penicillin "));
        assert_eq!(patient.allergies, vec!["Penicillin".to_string()]);
    }

    #[test]
    fn removing_absent_allergy_is_noop() {
        let mut patient = sample_patient();
        patient.add_allergy("Latex");
        assert!(!patient.remove_allergy("Peanuts"));
        assert_eq!(patient.allergies.len(), 1);
        assert!(patient.remove_allergy("LATEX"));
        assert!(patient.allergies.is_empty());
    }

    #[test]
    fn conditions_are_keyed_by_name() {
        let mut patient = sample_patient();
        let condition = MedicalCondition {
            condition: "Asthma".into(),
            diagnosed_on: None,
            notes: None,
            medications: vec![],
        };
        assert!(patient.add_condition(condition.clone()));
        assert!(!patient.add_condition(condition));

        let asthma = patient.condition_mut("asthma").expect("condition present");
        assert!(set_insert(&mut asthma.medications, "Salbutamol"));
        assert!(!set_insert(&mut asthma.medications, "salbutamol"));

        assert!(patient.remove_condition("ASTHMA"));
        assert!(!patient.remove_condition("Asthma"));
    }

    #[test]
    fn search_matches_name_and_mrn() {
        let patient = sample_patient();
        assert!(patient.matches("ada love"));
        assert!(patient.matches("mrn-1"));
        assert!(!patient.matches("babbage"));
    }
}
