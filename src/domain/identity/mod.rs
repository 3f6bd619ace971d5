//! Recipient identity lookup.
//!
//! The dispatcher only needs [`IdentityDirectory::resolve`]; the in-memory
//! directory adds the user bookkeeping used to seed it from configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::UserSeed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
}

impl From<UserSeed> for User {
    fn from(seed: UserSeed) -> Self {
        Self {
            id: seed.id,
            name: seed.name,
            last_name: seed.last_name,
            email: seed.email,
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user '{0}' not found")]
    NotFound(String),

    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a recipient id to a contact address.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn resolve(&self, recipient_id: &str) -> Result<String, DirectoryError>;
}

/// In-memory user directory.
///
/// Ids and email addresses are unique; emails compare case-insensitively.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a fixed user list, rejecting duplicates.
    pub fn from_users(users: impl IntoIterator<Item = User>) -> Result<Self, DirectoryError> {
        let mut map = HashMap::new();
        for user in users {
            Self::check_unique(&map, &user)?;
            map.insert(user.id.clone(), user);
        }
        Ok(Self {
            users: RwLock::new(map),
        })
    }

    pub fn from_seeds(seeds: &[UserSeed]) -> Result<Self, DirectoryError> {
        Self::from_users(seeds.iter().cloned().map(User::from))
    }

    fn check_unique(users: &HashMap<String, User>, user: &User) -> Result<(), DirectoryError> {
        if users.contains_key(&user.id) {
            return Err(DirectoryError::UserAlreadyExists(format!("id '{}'", user.id)));
        }
        if users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(DirectoryError::UserAlreadyExists(format!(
                "email '{}'",
                user.email
            )));
        }
        Ok(())
    }

    pub async fn save(&self, user: User) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        Self::check_unique(&users, &user)?;
        tracing::debug!(user_id = %user.id, "User saved");
        users.insert(user.id.clone(), user);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<User, DirectoryError> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl IdentityDirectory for MemoryUserDirectory {
    async fn resolve(&self, recipient_id: &str) -> Result<String, DirectoryError> {
        self.get(recipient_id).await.map(|user| user.email)
    }
}
