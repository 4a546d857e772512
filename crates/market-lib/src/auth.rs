//! Accounts and login sessions
//!
//! Passwords are stored as Argon2 PHC strings. Sessions are opaque UUIDv4
//! tokens mapped to a username; both maps live in memory behind `DashMap`.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Username already exists")]
    UsernameTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Stored account
#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// An authenticated session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Account persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, username: &str) -> Option<User>;

    /// Insert a new user, failing if the username is taken
    async fn insert(&self, user: User) -> Result<(), AuthError>;

    async fn count(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, User>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, username: &str) -> Option<User> {
        self.users.get(username).map(|u| u.value().clone())
    }

    async fn insert(&self, user: User) -> Result<(), AuthError> {
        match self.users.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(AuthError::UsernameTaken),
            Entry::Vacant(slot) => {
                slot.insert(user);
                Ok(())
            }
        }
    }

    async fn count(&self) -> usize {
        self.users.len()
    }
}

/// Sessions older than this are dropped unless configured otherwise
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Token to session map with a fixed lifetime per session
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_SESSION_TTL_SECS as i64))
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.created_at >= self.ttl
    }

    /// Start a session, sweeping expired ones first
    pub fn create(&self, username: &str) -> Session {
        let purged = self.purge_expired();
        if purged > 0 {
            debug!(purged, "Removed expired sessions");
        }
        let session = Session {
            token: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        self.sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Live session for a token; an expired one is removed
    pub fn get(&self, token: &str) -> Option<Session> {
        let session = self.sessions.get(token).map(|s| s.value().clone())?;
        if self.is_expired(&session, Utc::now()) {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    /// Drop every expired session, returning how many went
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.created_at < self.ttl);
        before.saturating_sub(self.sessions.len())
    }

    /// Returns whether a session was removed
    pub fn remove(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// False for a wrong password or an unparseable stored hash
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Signup, login and logout over a user store and the session map
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: SessionStore,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self::with_sessions(users, SessionStore::new())
    }

    pub fn with_sessions(users: Arc<dyn UserStore>, sessions: SessionStore) -> Self {
        Self { users, sessions }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryUserStore::new()))
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<(), AuthError> {
        let username = request.username.trim();
        if username.is_empty() {
            return Err(AuthError::MissingField("username"));
        }
        if request.password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }
        if self.users.find(username).await.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let user = User {
            username: username.to_string(),
            email: request.email.filter(|e| !e.trim().is_empty()),
            password_hash: hash_password(&request.password)?,
        };
        self.users.insert(user).await?;
        debug!(username = %username, "Registered user");
        Ok(())
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<Session, AuthError> {
        let username = request.username.trim();
        let user = self
            .users
            .find(username)
            .await
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&request.password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(self.sessions.create(&user.username))
    }

    /// Idempotent; returns whether a session existed
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.remove(token)
    }

    pub fn session(&self, token: &str) -> Option<Session> {
        self.sessions.get(token)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub async fn user_count(&self) -> usize {
        self.users.count().await
    }
}
