//! User registration.

use chrono::Utc;
use common::UserId;
use domain::{DomainError, Profile, User};
use store::Store;

use crate::error::{CommerceError, Result};

/// A newly registered user and the profile provisioned with it.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub profile: Profile,
}

/// Registers users and reads their profiles.
pub struct AccountService<S: Store> {
    store: S,
}

impl<S: Store> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a user and provisions their profile in the same write.
    #[tracing::instrument(skip(self, email))]
    pub async fn register(&self, username: &str, email: &str) -> Result<Registration> {
        let user = User::register(username, email, Utc::now())?;
        let profile = Profile::provision(&user);

        self.store
            .create_user(&user, &profile)
            .await
            .map_err(|e| match CommerceError::from(e) {
                CommerceError::Conflict(_) => DomainError::validation(
                    "username",
                    "A user with that username already exists.",
                )
                .into(),
                other => other,
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(Registration { user, profile })
    }

    pub async fn get_user(&self, id: UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id).into())
    }

    pub async fn get_profile(&self, owner: UserId) -> Result<Profile> {
        self.store
            .get_profile(owner)
            .await?
            .ok_or_else(|| DomainError::not_found("Profile", owner).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    #[tokio::test]
    async fn test_register_provisions_profile() {
        let service = AccountService::new(InMemoryStore::new());
        let registration = service.register("erin", "erin@example.com").await.unwrap();

        let profile = service.get_profile(registration.user.id).await.unwrap();
        assert_eq!(profile.owner, registration.user.id);
        assert_eq!(profile.name, "erin");
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_field_error() {
        let service = AccountService::new(InMemoryStore::new());
        service.register("erin", "erin@example.com").await.unwrap();

        let err = service
            .register("erin", "second@example.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Domain(DomainError::Validation { field: "username", .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_profile_is_not_found() {
        let service = AccountService::new(InMemoryStore::new());
        let err = service.get_profile(UserId::new()).await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Domain(DomainError::NotFound { entity: "Profile", .. })
        ));
    }
}
