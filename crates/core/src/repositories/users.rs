//! Staff accounts referenced as actors, doctors and collectors.

use crate::config::CoreConfig;
use crate::models::{User, UserRole};
use crate::store::LabStore;
use crate::validation::required_text;
use crate::LisResult;
use chrono::Utc;
use lis_types::EmailAddress;
use lis_uuid::EntityId;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Clone)]
pub struct UserService {
    cfg: Arc<CoreConfig>,
    store: LabStore,
}

impl UserService {
    pub fn new(cfg: Arc<CoreConfig>, store: LabStore) -> Self {
        Self { cfg, store }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Creates an account. Emails are unique, compared lowercase.
    pub fn create_user(&self, new: NewUser) -> LisResult<User> {
        let user = User {
            id: EntityId::new(),
            name: required_text("name", &new.name)?,
            email: EmailAddress::parse(&new.email)?,
            role: new.role,
            is_active: true,
            created_at: Utc::now(),
        };
        let stored = user.clone();
        self.store.transaction(|tx| tx.put(stored))?;
        tracing::info!(user = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub fn get_user(&self, id: EntityId) -> LisResult<User> {
        self.store.read(|t| t.require::<User>(id).cloned())
    }

    pub fn deactivate_user(&self, id: EntityId) -> LisResult<User> {
        self.store.transaction(|tx| {
            tx.update::<User, _>(id, |u| {
                u.is_active = false;
                Ok(())
            })
        })
    }

    /// Active users with `role`, sorted by name.
    pub fn list_users_by_role(&self, role: UserRole) -> Vec<User> {
        let mut users: Vec<User> = self.store.read(|t| {
            t.iter::<User>()
                .filter(|u| u.is_active && u.role == role)
                .cloned()
                .collect()
        });
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EMAIL_INDEX;
    use crate::LisError;

    fn service() -> UserService {
        UserService::new(Arc::new(CoreConfig::default()), LabStore::in_memory())
    }

    fn doctor(email: &str) -> NewUser {
        NewUser {
            name: "Dr Jane Doe".into(),
            email: email.into(),
            role: UserRole::Doctor,
        }
    }

    #[test]
    fn emails_are_unique_case_insensitively() {
        let svc = service();
        svc.create_user(doctor("jane@lab.example")).expect("create");
        let err = svc
            .create_user(doctor("JANE@lab.example"))
            .expect_err("duplicate email");
        assert!(matches!(err, LisError::Conflict { index: EMAIL_INDEX, .. }));
    }

    #[test]
    fn invalid_email_is_rejected() {
        let err = service()
            .create_user(doctor("not-an-email"))
            .expect_err("bad email");
        assert!(matches!(err, LisError::Text(_)));
    }

    #[test]
    fn deactivated_users_are_not_listed() {
        let svc = service();
        let user = svc.create_user(doctor("a@lab.example")).expect("create");
        svc.create_user(doctor("b@lab.example")).expect("create");
        svc.deactivate_user(user.id).expect("deactivate");
        assert_eq!(svc.list_users_by_role(UserRole::Doctor).len(), 1);
        assert!(svc.list_users_by_role(UserRole::Admin).is_empty());
    }
}
