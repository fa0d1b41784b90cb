// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! User store abstraction with flat-file and in-memory implementations.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use tokio::{fs as tokio_fs, sync::Mutex};
use volunteer_common::UserView;

use crate::auth::Credential;
use crate::error::AppError;

/// A stored account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub pswd_hash: String,
    pub pswd_salt: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("is_admin", &self.is_admin)
            .finish_non_exhaustive()
    }
}

impl UserRecord {
    pub fn credential(&self) -> Credential {
        Credential {
            username: self.username.clone(),
            salt: self.pswd_salt.clone(),
            hash: self.pswd_hash.clone(),
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }
}

/// Account to create; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewUser {
    pub credential: Credential,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
}

impl NewUser {
    fn into_record(self, id: i64) -> UserRecord {
        UserRecord {
            id,
            username: self.credential.username,
            pswd_hash: self.credential.hash,
            pswd_salt: self.credential.salt,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            is_admin: self.is_admin,
        }
    }
}

/// Trait for user storage backends
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact username match
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, AppError>;

    /// Store a new account. Usernames are unique ignoring case.
    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError>;

    /// Swap in a new salt and hash for `credential.username`
    async fn update_credential(&self, credential: Credential) -> Result<(), AppError>;
}

fn storage_error(err: std::io::Error) -> AppError {
    AppError::StorageUnavailable(err.to_string())
}

/// Flat-file implementation of the `UserStore` trait
pub struct FlatFileUserStore {
    path: PathBuf,
    // Serialises read-modify-write cycles on the users file
    lock: Mutex<()>,
}

impl FlatFileUserStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            path: root.join("users.json"),
            lock: Mutex::new(()),
        })
    }

    async fn read_all(&self) -> Result<Vec<UserRecord>, AppError> {
        if !tokio_fs::try_exists(&self.path).await.map_err(storage_error)? {
            return Ok(Vec::new());
        }
        let content = tokio_fs::read_to_string(&self.path)
            .await
            .map_err(storage_error)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Write via a temp file + rename so readers never see half a file
    async fn write_all(&self, users: &[UserRecord]) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(users)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await.map_err(storage_error)?;
        tokio_fs::rename(&tmp, &self.path)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for FlatFileUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        let _guard = self.lock.lock().await;
        let users = self.read_all().await?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, AppError> {
        let _guard = self.lock.lock().await;
        let users = self.read_all().await?;
        Ok(users.into_iter().find(|u| u.id == id))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let _guard = self.lock.lock().await;
        let mut users = self.read_all().await?;

        let username = &user.credential.username;
        if users.iter().any(|u| u.username.eq_ignore_ascii_case(username)) {
            return Err(AppError::UsernameTaken(username.clone()));
        }

        let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let record = user.into_record(id);
        users.push(record.clone());
        self.write_all(&users).await?;

        Ok(record)
    }

    async fn update_credential(&self, credential: Credential) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        let mut users = self.read_all().await?;

        let user = users
            .iter_mut()
            .find(|u| u.username == credential.username)
            .ok_or_else(|| AppError::NotFound(format!("user {}", credential.username)))?;
        user.pswd_salt = credential.salt;
        user.pswd_hash = credential.hash;

        self.write_all(&users).await
    }
}

/// In-memory `UserStore`, keyed by lower-cased username
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserRecord>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .get(&username.to_lowercase())
            .filter(|u| u.username == username)
            .map(|u| u.value().clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.value().clone()))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let key = user.credential.username.to_lowercase();
        match self.users.entry(key) {
            Entry::Occupied(_) => Err(AppError::UsernameTaken(user.credential.username)),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let record = user.into_record(id);
                slot.insert(record.clone());
                Ok(record)
            },
        }
    }

    async fn update_credential(&self, credential: Credential) -> Result<(), AppError> {
        let mut user = self
            .users
            .get_mut(&credential.username.to_lowercase())
            .filter(|u| u.username == credential.username)
            .ok_or_else(|| AppError::NotFound(format!("user {}", credential.username)))?;
        user.pswd_salt = credential.salt;
        user.pswd_hash = credential.hash;
        Ok(())
    }
}
