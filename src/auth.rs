use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Check a typed password against the roster's password cell
///
/// The roster normally stores passwords as typed, so the check is a direct
/// comparison. A cell holding an Argon2 PHC string (`$argon2id$...`) is
/// verified as a hash instead. An empty cell never authenticates.
///
/// # Examples
/// ```
/// use payslip_signer::auth::verify_password;
///
/// assert!(verify_password("1234", "1234"));
/// assert!(!verify_password("1234", "4321"));
/// assert!(!verify_password("", ""));
/// ```
pub fn verify_password(entered: &str, stored: &str) -> bool {
    if stored.is_empty() {
        return false;
    }

    if stored.starts_with("$argon2") {
        return match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(entered.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        };
    }

    entered == stored
}

/// Hash a password using Argon2id, for rosters that keep hashes instead of plain text
///
/// # Errors
/// * `Error::Credentials` if hashing fails
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| Error::Credentials("password hashing failed".to_string()))
}

/// An authenticated employee and the payslip fetched at login
#[derive(Debug, Clone)]
pub struct Session {
    pub employee: String,
    /// 1-based roster row of the employee
    pub row: usize,
    pub document_link: String,
    pub file_id: String,
    pub email: Option<String>,
    /// The unsigned PDF as downloaded at login
    pub document: Arc<Vec<u8>>,
    pub expires_at: SystemTime,
}

/// In-memory session table keyed by random session ids
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    duration: Duration,
}

impl SessionStore {
    pub fn new(duration: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            duration,
        }
    }

    /// Store a session and return its id; `expires_at` is set here
    pub fn create(&self, mut session: Session) -> String {
        let session_id = Uuid::new_v4().to_string();
        session.expires_at = SystemTime::now() + self.duration;

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let now = SystemTime::now();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session_id.clone(), session);

        session_id
    }

    /// The live session for `session_id`, if any; an expired one is dropped
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let now = SystemTime::now();
        {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            match sessions.get(session_id) {
                Some(session) if session.expires_at > now => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        // Re-check under the write lock
        if sessions
            .get(session_id)
            .is_some_and(|s| s.expires_at <= now)
        {
            sessions.remove(session_id);
        }
        None
    }

    pub fn remove(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
