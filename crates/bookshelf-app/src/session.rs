// Session state and the auth transitions that mutate it.
//
// `SessionManager` is the single owner of the `Session`. Every transition
// goes through `dispatch`, which applies a `SessionAction` and then pushes
// the new snapshot to every subscriber before returning. The bearer token
// lives in the `StateStore` under `session_token`; it is written on a
// successful signup/login/bootstrap and removed on logout or on any
// authenticated call the backend answers with 401.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use bookshelf_api::{ApiError, AuthApi};
use bookshelf_core::protocol::{
    BackgroundUpdate, Credentials, SignUpRequest, UserProfile, ValidationError,
};
use bookshelf_core::store::StateStore;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The client-held view of who is signed in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Loading,
    Authenticated,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_loading {
            SessionStatus::Loading
        } else if self.is_authenticated() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        }
    }
}

/// Every way the session can change.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    SetLoading(bool),
    SetUser(UserProfile),
    SetError(String),
    ClearError,
    Reset,
}

/// Pure transition function.
pub fn reduce(session: &Session, action: SessionAction) -> Session {
    match action {
        SessionAction::SetLoading(is_loading) => Session {
            is_loading,
            ..session.clone()
        },
        SessionAction::SetUser(user) => Session {
            user: Some(user),
            is_loading: false,
            error: None,
        },
        SessionAction::SetError(error) => Session {
            error: Some(error),
            is_loading: false,
            ..session.clone()
        },
        SessionAction::ClearError => Session {
            error: None,
            ..session.clone()
        },
        SessionAction::Reset => Session::default(),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a session operation, as returned to the front end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Caught client-side; no request was made.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// 401 from the backend.
    #[error("{0}")]
    Unauthorized(String),

    /// 429 from the backend. Transient; the session is left as it was.
    #[error("{0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Any other failure reported by the backend.
    #[error("{message}")]
    Server { status: Option<u16>, message: String },

    /// An authenticated-only operation was called while anonymous.
    #[error("You need to sign in first")]
    NotAuthenticated,
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Validation(v) => AuthError::Validation(v),
            ApiError::Unauthorized { message } => AuthError::Unauthorized(message),
            ApiError::RateLimited { message } => AuthError::RateLimited(message),
            ApiError::Network(message) => AuthError::Network(message),
            ApiError::Status { status, message } => AuthError::Server {
                status: Some(status),
                message,
            },
            other @ ApiError::Decode(_) => AuthError::Server {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Handle returned by [`SessionManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&Session) + Send + Sync>;

/// What [`SessionManager::sync_with_storage`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageSync {
    /// The stored token matches the one this session holds.
    Unchanged,
    /// Another client removed the token; this session is now anonymous.
    SignedOut,
    /// Another client stored a different token; the session was rebuilt
    /// from it (successfully or not, see the session state).
    Reloaded,
}

pub struct SessionManager<A: AuthApi> {
    api: A,
    store: Arc<StateStore>,
    session: Session,
    /// Token the current session was established with. Mirrors the store
    /// unless another client changed it behind our back.
    token: Option<String>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl<A: AuthApi> SessionManager<A> {
    /// Create an anonymous, idle session. Call [`bootstrap`](Self::bootstrap)
    /// to restore a persisted one.
    pub fn new(api: A, store: Arc<StateStore>) -> Self {
        Self {
            api,
            store,
            session: Session::default(),
            token: None,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.session.user.as_ref()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Register a view. It is called synchronously after every transition.
    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Remove a view. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn dispatch(&mut self, action: SessionAction) {
        debug!(?action, "session transition");
        self.session = reduce(&self.session, action);
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.session);
        }
    }

    // -- token persistence --------------------------------------------------

    fn persist_token(&mut self, token: &str) {
        if let Err(e) = self.store.set_token(token) {
            warn!("failed to persist session token: {e:#}");
        }
        self.token = Some(token.to_string());
    }

    fn forget_token(&mut self) {
        if let Err(e) = self.store.clear_token() {
            warn!("failed to remove persisted session token: {e:#}");
        }
        self.token = None;
    }

    fn stored_token(&self) -> Option<String> {
        match self.store.token() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("failed to read persisted session token: {e:#}");
                None
            }
        }
    }

    /// Token for an authenticated-only call, or `NotAuthenticated`.
    fn require_token(&self) -> Result<String, AuthError> {
        match (&self.session.user, &self.token) {
            (Some(_), Some(token)) => Ok(token.clone()),
            _ => Err(AuthError::NotAuthenticated),
        }
    }

    /// Record a failed call that was made *with* the bearer token. A 401
    /// means the token is no longer good, so the session is dropped.
    fn fail_authenticated(&mut self, err: ApiError) -> AuthError {
        let err = AuthError::from(err);
        if matches!(err, AuthError::Unauthorized(_)) {
            info!("backend rejected the session token, signing out locally");
            self.forget_token();
            self.dispatch(SessionAction::Reset);
        }
        self.dispatch(SessionAction::SetError(err.to_string()));
        err
    }

    /// Record a failed signup/login. The existing session, if any, stays.
    fn fail_unauthenticated(&mut self, err: AuthError) -> AuthError {
        self.dispatch(SessionAction::SetError(err.to_string()));
        err
    }

    // -- transitions --------------------------------------------------------

    /// Restore a session from the persisted token.
    ///
    /// Returns `Ok(None)` when there is nothing to restore. If the backend
    /// does not accept the token, it is removed and the session stays
    /// anonymous.
    pub async fn bootstrap(&mut self) -> Result<Option<UserProfile>, AuthError> {
        let Some(token) = self.stored_token() else {
            self.token = None;
            if self.session.user.is_some() {
                info!("persisted session token is gone, signing out locally");
                self.dispatch(SessionAction::Reset);
            } else {
                self.dispatch(SessionAction::SetLoading(false));
            }
            return Ok(None);
        };

        match self.restore(token).await {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!("session validation failed: {e}");
                self.forget_token();
                self.dispatch(SessionAction::Reset);
                Err(AuthError::from(e))
            }
        }
    }

    /// Validate `token` against the profile endpoint and adopt it on
    /// success. On failure the session state is left to the caller.
    async fn restore(&mut self, token: String) -> Result<UserProfile, ApiError> {
        self.dispatch(SessionAction::SetLoading(true));
        let user = self.api.profile(&token).await?;
        info!(email = %user.email, "restored persisted session");
        self.token = Some(token);
        self.dispatch(SessionAction::SetUser(user.clone()));
        Ok(user)
    }

    /// Register a new account with the background questionnaire.
    pub async fn sign_up(&mut self, request: SignUpRequest) -> Result<UserProfile, AuthError> {
        if let Err(e) = request.validate() {
            return Err(self.fail_unauthenticated(e.into()));
        }

        self.dispatch(SessionAction::SetLoading(true));
        match self.api.sign_up(&request).await {
            Ok(grant) => {
                info!(email = %grant.user.email, "signed up");
                self.persist_token(&grant.session.token);
                self.dispatch(SessionAction::SetUser(grant.user.clone()));
                Ok(grant.user)
            }
            Err(e) => Err(self.fail_unauthenticated(e.into())),
        }
    }

    pub async fn sign_in(&mut self, credentials: Credentials) -> Result<UserProfile, AuthError> {
        if let Err(e) = credentials.validate() {
            return Err(self.fail_unauthenticated(e.into()));
        }

        self.dispatch(SessionAction::SetLoading(true));
        match self.api.sign_in(&credentials).await {
            Ok(grant) => {
                info!(email = %grant.user.email, "signed in");
                self.persist_token(&grant.session.token);
                self.dispatch(SessionAction::SetUser(grant.user.clone()));
                Ok(grant.user)
            }
            Err(e) => Err(self.fail_unauthenticated(e.into())),
        }
    }

    /// End the session. The server is told on a best-effort basis; locally
    /// the token is always removed and the session always ends anonymous.
    pub async fn sign_out(&mut self) {
        self.dispatch(SessionAction::SetLoading(true));

        if let Some(token) = self.token.clone().or_else(|| self.stored_token()) {
            if let Err(e) = self.api.sign_out(&token).await {
                warn!("server logout failed, clearing local session anyway: {e}");
            }
        }

        self.forget_token();
        self.dispatch(SessionAction::Reset);
        info!("signed out");
    }

    /// Change part of the background questionnaire. On failure the current
    /// user is left untouched.
    pub async fn update_background(
        &mut self,
        update: BackgroundUpdate,
    ) -> Result<UserProfile, AuthError> {
        let token = self.require_token()?;
        if update.is_empty() {
            return Err(AuthError::Validation(ValidationError::new(
                "background",
                "Nothing to update",
            )));
        }

        self.dispatch(SessionAction::SetLoading(true));
        match self.api.update_background(&token, &update).await {
            Ok(user) => {
                self.dispatch(SessionAction::SetUser(user.clone()));
                Ok(user)
            }
            Err(e) => Err(self.fail_authenticated(e)),
        }
    }

    /// Re-read the profile for the current token.
    pub async fn refresh_profile(&mut self) -> Result<UserProfile, AuthError> {
        let token = self.require_token()?;

        self.dispatch(SessionAction::SetLoading(true));
        match self.api.profile(&token).await {
            Ok(user) => {
                self.dispatch(SessionAction::SetUser(user.clone()));
                Ok(user)
            }
            Err(e) => Err(self.fail_authenticated(e)),
        }
    }

    pub fn clear_error(&mut self) {
        self.dispatch(SessionAction::ClearError);
    }

    /// Reconcile with changes another client made to the shared store.
    pub async fn sync_with_storage(&mut self) -> StorageSync {
        let stored = self.stored_token();
        if stored == self.token {
            return StorageSync::Unchanged;
        }

        match stored {
            None => {
                info!("session token removed by another client");
                self.token = None;
                self.dispatch(SessionAction::Reset);
                StorageSync::SignedOut
            }
            Some(token) => {
                info!("session token changed by another client, reloading");
                if let Err(e) = self.restore(token).await {
                    warn!("reloading shared session failed: {e}");
                    let err = AuthError::from(e);
                    // The token belongs to the other client; only a 401
                    // proves it is dead.
                    if matches!(err, AuthError::Unauthorized(_)) {
                        self.forget_token();
                    } else {
                        self.token = None;
                    }
                    self.dispatch(SessionAction::Reset);
                    self.dispatch(SessionAction::SetError(err.to_string()));
                }
                StorageSync::Reloaded
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
