use crate::lifecycle::status_strings;
use chrono::{DateTime, Utc};
use lis_types::EmailAddress;
use lis_uuid::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Doctor,
    LabTechnician,
    Receptionist,
}

status_strings!(UserRole {
    Admin => "admin",
    Doctor => "doctor",
    LabTechnician => "lab_technician",
    Receptionist => "receptionist",
});

/// A staff account. Credentials live with the auth layer, not here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub email: EmailAddress,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
