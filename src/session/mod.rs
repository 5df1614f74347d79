//! Session store: the single source of truth for "who is logged in".
//!
//! The session is derived from the backend's bearer token, a JWT whose payload
//! carries `exp` and subject identity fields. The token is persisted to a file
//! under the configured data directory so the session survives restarts, and
//! is cleared on logout or detected expiry.
//!
//! Client-side decoding is a UX short-circuit, not a security boundary: the
//! signature is never verified here, and every privileged operation is
//! re-checked server-side. That is why decoding runs with signature
//! validation disabled.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const TOKEN_FILE: &str = "session.token";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token is already expired")]
    TokenExpired,

    #[error("failed to persist session: {0}")]
    Persist(#[from] std::io::Error),
}

/// The authenticated user, as decoded from the bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub subject_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Token expiry, epoch seconds. Cached for display only; privileged
    /// operations re-decode `raw_token` instead of trusting this.
    pub expires_at: i64,
    pub raw_token: String,
}

/// JWT payload shape. The backend uses `id` for the subject in some token
/// versions and `sub` in others.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default, alias = "id")]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    exp: i64,
}

/// Decode a token's claims without verifying the signature.
///
/// `validate_exp` is off: callers decide what an expired token means
/// (restore clears it, checkout refuses it).
fn decode_claims(token: &str) -> Result<Claims, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| SessionError::InvalidToken(e.to_string()))?;
    Ok(data.claims)
}

/// Decode just the expiry from a raw token.
///
/// Used by the checkout flow to re-check expiry at the instant of the call
/// rather than trusting the cached session.
pub fn decode_expiry(token: &str) -> Result<i64, SessionError> {
    Ok(decode_claims(token)?.exp)
}

fn session_from_token(token: &str) -> Result<Session, SessionError> {
    let claims = decode_claims(token)?;
    let subject_id = match claims.sub {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Ok(Session {
        subject_id,
        username: claims.username,
        email: claims.email,
        expires_at: claims.exp,
        raw_token: token.to_string(),
    })
}

/// Owns the persisted token and the in-memory session. One instance per
/// process, shared by reference with everything that needs identity.
pub struct SessionStore {
    token_path: PathBuf,
    current: Mutex<Option<Session>>,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            token_path: data_dir.join(TOKEN_FILE),
            current: Mutex::new(None),
        }
    }

    /// Recover a session from the persisted token, if any.
    ///
    /// Never fails: an unreadable, undecodable, or expired token degrades to
    /// "no session" and the stale file is removed.
    pub fn restore(&self) -> Option<Session> {
        let token = match std::fs::read_to_string(&self.token_path) {
            Ok(token) => token.trim().to_string(),
            Err(_) => return None,
        };

        match session_from_token(&token) {
            Ok(session) if session.expires_at > Utc::now().timestamp() => {
                debug!(subject = %session.subject_id, "Restored session from disk");
                *self.current.lock() = Some(session.clone());
                Some(session)
            }
            Ok(_) => {
                debug!("Persisted token is expired, clearing it");
                self.clear_persisted();
                None
            }
            Err(e) => {
                warn!(error = %e, "Persisted token is invalid, clearing it");
                self.clear_persisted();
                None
            }
        }
    }

    /// Adopt a freshly issued token: decode, persist, and return the session.
    ///
    /// Nothing is persisted when the token does not decode or is already
    /// expired.
    pub fn login(&self, token: &str) -> Result<Session, SessionError> {
        let session = session_from_token(token)?;
        if session.expires_at <= Utc::now().timestamp() {
            return Err(SessionError::TokenExpired);
        }

        if let Some(parent) = self.token_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.token_path, token)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(
                &self.token_path,
                std::fs::Permissions::from_mode(0o600),
            );
        }

        *self.current.lock() = Some(session.clone());
        Ok(session)
    }

    /// Drop the session, in memory and on disk. Idempotent.
    pub fn logout(&self) {
        *self.current.lock() = None;
        self.clear_persisted();
    }

    /// The live session, if any. Pure read, no I/O.
    pub fn current(&self) -> Option<Session> {
        self.current.lock().clone()
    }

    fn clear_persisted(&self) {
        if let Err(e) = std::fs::remove_file(&self.token_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "Failed to remove persisted token");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn install_for_tests(&self, session: Session) {
        *self.current.lock() = Some(session);
    }
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        id: i64,
        username: String,
        email: String,
        exp: i64,
    }

    /// Mint an HS256 token the way the backend would.
    pub fn issue(subject: i64, exp: i64) -> String {
        let claims = TestClaims {
            id: subject,
            username: format!("user{}", subject),
            email: format!("user{}@example.com", subject),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn future_exp() -> i64 {
        (Utc::now() + Duration::hours(1)).timestamp()
    }

    fn past_exp() -> i64 {
        (Utc::now() - Duration::hours(1)).timestamp()
    }

    #[test]
    fn login_decodes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let token = test_tokens::issue(42, future_exp());
        let session = store.login(&token).unwrap();

        assert_eq!(session.subject_id, "42");
        assert_eq!(session.username.as_deref(), Some("user42"));
        assert_eq!(session.email.as_deref(), Some("user42@example.com"));
        assert!(dir.path().join(TOKEN_FILE).exists());
        assert!(store.current().is_some());
    }

    #[test]
    fn login_rejects_garbage_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let err = store.login("not-a-jwt").unwrap_err();
        assert!(matches!(err, SessionError::InvalidToken(_)));
        assert!(!dir.path().join(TOKEN_FILE).exists());
        assert!(store.current().is_none());
    }

    #[test]
    fn login_rejects_expired_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let token = test_tokens::issue(1, past_exp());
        let err = store.login(&token).unwrap_err();
        assert!(matches!(err, SessionError::TokenExpired));
        assert!(!dir.path().join(TOKEN_FILE).exists());
    }

    #[test]
    fn restore_round_trips_a_valid_token() {
        let dir = tempfile::tempdir().unwrap();
        let token = test_tokens::issue(7, future_exp());

        {
            let store = SessionStore::new(dir.path());
            store.login(&token).unwrap();
        }

        let store = SessionStore::new(dir.path());
        let session = store.restore().unwrap();
        assert_eq!(session.subject_id, "7");
        assert_eq!(session.raw_token, token);
    }

    #[test]
    fn restore_clears_expired_token() {
        let dir = tempfile::tempdir().unwrap();
        let token = test_tokens::issue(7, past_exp());
        std::fs::write(dir.path().join(TOKEN_FILE), &token).unwrap();

        let store = SessionStore::new(dir.path());
        assert!(store.restore().is_none());
        assert!(!dir.path().join(TOKEN_FILE).exists());
    }

    #[test]
    fn restore_clears_undecodable_token() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TOKEN_FILE), "corrupted").unwrap();

        let store = SessionStore::new(dir.path());
        assert!(store.restore().is_none());
        assert!(!dir.path().join(TOKEN_FILE).exists());
    }

    #[test]
    fn restore_with_no_file_yields_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.restore().is_none());
    }

    #[test]
    fn logout_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let token = test_tokens::issue(3, future_exp());
        store.login(&token).unwrap();

        store.logout();
        assert!(store.current().is_none());
        assert!(!dir.path().join(TOKEN_FILE).exists());

        // Second logout with nothing left to clear
        store.logout();
        assert!(store.current().is_none());
    }

    #[test]
    fn decode_expiry_reads_exp_even_when_past() {
        let exp = past_exp();
        let token = test_tokens::issue(5, exp);
        assert_eq!(decode_expiry(&token).unwrap(), exp);
        assert!(decode_expiry("garbage").is_err());
    }
}
