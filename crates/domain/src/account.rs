//! Registered users and their profiles.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// A registered user. The email address receives order notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Validates registration input and builds a new user.
    pub fn register(
        username: impl Into<String>,
        email: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let username = username.into().trim().to_string();
        let email = email.into().trim().to_string();

        if username.is_empty() {
            return Err(DomainError::validation("username", "This field may not be blank."));
        }
        if username.len() > 150 {
            return Err(DomainError::validation(
                "username",
                "Ensure this field has no more than 150 characters.",
            ));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => {
                return Err(DomainError::validation("email", "Enter a valid email address."));
            }
        }

        Ok(Self {
            id: UserId::new(),
            username,
            email,
            created_at: now,
        })
    }
}

/// Public profile of a user, provisioned once at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub owner: UserId,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Builds the initial profile for a freshly registered user.
    pub fn provision(user: &User) -> Self {
        Self {
            owner: user.id,
            name: user.username.clone(),
            content: String::new(),
            created_at: user.created_at,
            updated_at: user.created_at,
        }
    }
}
