//! The client's record of who is signed in.
//!
//! The session is an explicit object rather than global state: it starts in
//! [SessionState::Loading], reads the saved token once in
//! [SessionController::restore], and only changes through
//! [log_in](SessionController::log_in), [log_out](SessionController::log_out)
//! and [handle_api_error](SessionController::handle_api_error).

use std::{
    collections::HashSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use time::OffsetDateTime;

use crate::{Claims, Role, UserID, client::ApiError};

/// Errors from the client's session handling.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The saved token could not be read or written.
    #[error("could not access the saved session at {path}: {source}")]
    TokenStorage {
        /// Where the token is kept.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// The server handed out a token the client cannot read, or one that has already expired.
    #[error("the access token is malformed or expired")]
    InvalidToken,
}

/// Somewhere to keep the access token between runs.
pub trait TokenStorage {
    /// Read the saved token, if there is one.
    fn load(&self) -> Result<Option<String>, ClientError>;

    /// Save `token`, replacing any previous token.
    fn save(&self, token: &str) -> Result<(), ClientError>;

    /// Forget the saved token. Clearing an empty storage is not an error.
    fn clear(&self) -> Result<(), ClientError>;
}

/// Keeps the token in a file, e.g. `~/.allowance_token`.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    /// Keep the token in the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file the token is kept in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, source: std::io::Error) -> ClientError {
        ClientError::TokenStorage {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(token) if token.trim().is_empty() => Ok(None),
            Ok(token) => Ok(Some(token.trim().to_owned())),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(self.storage_error(error)),
        }
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        fs::write(&self.path, token).map_err(|error| self.storage_error(error))
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.storage_error(error)),
        }
    }
}

/// Keeps the token in memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    /// Storage that starts out holding `token`.
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_owned())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.slot().clone())
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        *self.slot() = Some(token.to_owned());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.slot() = None;
        Ok(())
    }
}

/// The user a session belongs to, as read from the token.
///
/// These fields are for display only. The server checks the token's
/// signature on every request and never trusts what the client decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    /// The user's ID.
    pub id: UserID,
    /// The user's name.
    pub name: String,
    /// The user's role.
    pub role: Role,
}

/// A signed in user and their access token.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The bearer token to send with requests.
    pub token: String,
    /// Who the token was issued to.
    pub user: SessionUser,
    /// When the token stops working.
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// Read the claims of `token` without checking its signature.
    ///
    /// Returns `None` if the token cannot be decoded or expired before `now`.
    pub fn from_token(token: &str, now: OffsetDateTime) -> Option<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        let claims = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|error| tracing::debug!("could not decode saved token: {error}"))
            .ok()?
            .claims;

        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp as i64).ok()?;
        if expires_at <= now {
            tracing::debug!("saved token expired at {expires_at}");
            return None;
        }

        Some(Self {
            token: token.to_owned(),
            user: SessionUser {
                id: claims.id,
                name: claims.name,
                role: claims.role,
            },
            expires_at,
        })
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// The saved token has not been read yet.
    Loading,
    /// Nobody is signed in.
    Unauthenticated,
    /// A user is signed in.
    Authenticated(Session),
}

/// The screen the client should show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View<'a> {
    /// Ask for a name and password.
    LogIn,
    /// Show the signed in user's transactions.
    Home(&'a SessionUser),
}

/// Owns the session and the storage its token is kept in.
#[derive(Debug)]
pub struct SessionController<S: TokenStorage> {
    storage: S,
    state: SessionState,
}

impl<S: TokenStorage> SessionController<S> {
    /// Create a controller in the [SessionState::Loading] state.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            state: SessionState::Loading,
        }
    }

    /// Read the saved token and decide whether a user is signed in.
    ///
    /// Only the first call reads the storage. A token that cannot be decoded
    /// or has expired is removed from the storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read or cleared.
    pub fn restore(&mut self) -> Result<&SessionState, ClientError> {
        if self.state != SessionState::Loading {
            return Ok(&self.state);
        }

        self.state = match self.storage.load()? {
            Some(token) => match Session::from_token(&token, OffsetDateTime::now_utc()) {
                Some(session) => SessionState::Authenticated(session),
                None => {
                    self.storage.clear()?;
                    SessionState::Unauthenticated
                }
            },
            None => SessionState::Unauthenticated,
        };

        Ok(&self.state)
    }

    /// Save `token` and sign in the user it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [ClientError::InvalidToken] if the token cannot be decoded or
    /// has expired, or an error if the token could not be saved.
    pub fn log_in(&mut self, token: &str) -> Result<Session, ClientError> {
        let session = Session::from_token(token, OffsetDateTime::now_utc())
            .ok_or(ClientError::InvalidToken)?;

        self.storage.save(token)?;
        tracing::debug!("signed in as {}", session.user.name);
        self.state = SessionState::Authenticated(session.clone());

        Ok(session)
    }

    /// Forget the saved token and sign out.
    ///
    /// # Errors
    ///
    /// Returns an error if the token could not be removed from the storage.
    pub fn log_out(&mut self) -> Result<(), ClientError> {
        self.storage.clear()?;
        self.state = SessionState::Unauthenticated;

        Ok(())
    }

    /// Sign out if `error` means the server no longer accepts the session.
    ///
    /// Returns whether the user was signed out.
    ///
    /// # Errors
    ///
    /// Returns an error if the token could not be removed from the storage.
    pub fn handle_api_error(&mut self, error: &ApiError) -> Result<bool, ClientError> {
        if !error.is_auth_failure() {
            return Ok(false);
        }

        tracing::info!("the server rejected the session, signing out: {error}");
        self.log_out()?;

        Ok(true)
    }

    /// The current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The signed in session, if any.
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// The screen to show, or `None` while the session is still loading.
    pub fn view(&self) -> Option<View<'_>> {
        match &self.state {
            SessionState::Loading => None,
            SessionState::Unauthenticated => Some(View::LogIn),
            SessionState::Authenticated(session) => Some(View::Home(&session.user)),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use crate::{
        auth::{DEFAULT_TOKEN_DURATION, JwtKeys, PasswordHash, Role, User, UserID, encode_token_at},
        client::ApiError,
    };

    use super::{
        FileTokenStorage, MemoryTokenStorage, SessionController, SessionState, TokenStorage, View,
    };

    fn token_issued_at(issued_at: OffsetDateTime) -> String {
        let user = User {
            id: UserID::new(2),
            name: "Ann".to_owned(),
            password_hash: PasswordHash::new_unchecked("hunter2"),
            role: Role::Child,
        };

        encode_token_at(
            &user,
            &JwtKeys::from_secret("server secret"),
            issued_at,
            DEFAULT_TOKEN_DURATION,
        )
        .unwrap()
    }

    fn fresh_token() -> String {
        token_issued_at(OffsetDateTime::now_utc())
    }

    #[test]
    fn renders_nothing_before_restore() {
        let controller = SessionController::new(MemoryTokenStorage::with_token(&fresh_token()));

        assert_eq!(controller.state(), &SessionState::Loading);
        assert_eq!(controller.view(), None);
    }

    #[test]
    fn restores_saved_session() {
        let mut controller =
            SessionController::new(MemoryTokenStorage::with_token(&fresh_token()));

        controller.restore().unwrap();

        let Some(View::Home(user)) = controller.view() else {
            panic!("want home view, got {:?}", controller.view());
        };
        assert_eq!(user.name, "Ann");
        assert_eq!(user.role, Role::Child);
        assert_eq!(user.id, UserID::new(2));
    }

    #[test]
    fn restore_without_token_shows_log_in() {
        let mut controller = SessionController::new(MemoryTokenStorage::default());

        controller.restore().unwrap();

        assert_eq!(controller.view(), Some(View::LogIn));
    }

    #[test]
    fn restore_clears_expired_token() {
        let expired = token_issued_at(OffsetDateTime::now_utc() - Duration::days(2));
        let mut controller = SessionController::new(MemoryTokenStorage::with_token(&expired));

        controller.restore().unwrap();

        assert_eq!(controller.state(), &SessionState::Unauthenticated);
        assert_eq!(controller.storage.load().unwrap(), None);
    }

    #[test]
    fn restore_clears_garbage_token() {
        let mut controller = SessionController::new(MemoryTokenStorage::with_token("garbage"));

        controller.restore().unwrap();

        assert_eq!(controller.state(), &SessionState::Unauthenticated);
        assert_eq!(controller.storage.load().unwrap(), None);
    }

    #[test]
    fn restore_reads_storage_once() {
        let mut controller = SessionController::new(MemoryTokenStorage::default());
        controller.restore().unwrap();

        controller.storage.save(&fresh_token()).unwrap();
        controller.restore().unwrap();

        assert_eq!(controller.view(), Some(View::LogIn));
    }

    #[test]
    fn log_in_and_out() {
        let mut controller = SessionController::new(MemoryTokenStorage::default());
        controller.restore().unwrap();
        let token = fresh_token();

        let session = controller.log_in(&token).unwrap();
        assert_eq!(session.user.name, "Ann");
        assert_eq!(controller.storage.load().unwrap(), Some(token));

        controller.log_out().unwrap();
        assert_eq!(controller.view(), Some(View::LogIn));
        assert_eq!(controller.storage.load().unwrap(), None);
    }

    #[test]
    fn log_in_rejects_expired_token() {
        let mut controller = SessionController::new(MemoryTokenStorage::default());
        let expired = token_issued_at(OffsetDateTime::now_utc() - Duration::days(2));

        assert!(controller.log_in(&expired).is_err());
        assert_eq!(controller.storage.load().unwrap(), None);
    }

    #[test]
    fn auth_failures_log_out() {
        for error in [ApiError::Unauthenticated, ApiError::Forbidden] {
            let mut controller =
                SessionController::new(MemoryTokenStorage::with_token(&fresh_token()));
            controller.restore().unwrap();

            assert!(controller.handle_api_error(&error).unwrap());
            assert_eq!(controller.view(), Some(View::LogIn));
        }
    }

    #[test]
    fn other_errors_keep_session() {
        let mut controller =
            SessionController::new(MemoryTokenStorage::with_token(&fresh_token()));
        controller.restore().unwrap();
        let error = ApiError::Rejected {
            status: 409,
            message: "the transaction has already been approved".to_owned(),
        };

        assert!(!controller.handle_api_error(&error).unwrap());
        assert!(controller.session().is_some());
    }

    #[test]
    fn file_storage_round_trip() {
        let directory = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(directory.path().join("token"));

        assert_eq!(storage.load().unwrap(), None);
        storage.save("abc.def.ghi").unwrap();
        assert_eq!(storage.load().unwrap(), Some("abc.def.ghi".to_owned()));
        storage.clear().unwrap();
        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
