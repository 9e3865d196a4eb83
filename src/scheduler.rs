//! Client-side refresh scheduler.
//!
//! Keeps a client's session alive: fetches the session once per cycle, refreshes
//! the token pair before the refresh token gets too old and logs out when no
//! credential is left to retry with.
//!
//! The only state is whether the current cycle has fetched the session yet.
//! That flag also stops the scheduler from racing itself.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::Session;
use crate::error::ConfigurationError;
use crate::jwt::{TokenLifetime, decode_unverified, unix_now};

/// Interval between scheduler cycles.
pub const REFRESH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        unix_now()
    }
}

/// A failed call from the client to the session endpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("rejected with status {0}")]
    Rejected(u16),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// The three things the scheduler asks of the server.
pub trait SessionClient: Send + Sync {
    fn fetch_session(&self) -> impl Future<Output = Result<Session, RefreshFailure>> + Send;

    fn refresh(&self, refresh_token: &str)
    -> impl Future<Output = Result<(), RefreshFailure>> + Send;

    /// Drop all credentials. Cannot fail from the caller's point of view.
    fn force_logout(&self) -> impl Future<Output = ()> + Send;
}

impl<C: SessionClient> SessionClient for &C {
    fn fetch_session(&self) -> impl Future<Output = Result<Session, RefreshFailure>> + Send {
        (**self).fetch_session()
    }

    fn refresh(&self, refresh_token: &str)
    -> impl Future<Output = Result<(), RefreshFailure>> + Send {
        (**self).refresh(refresh_token)
    }

    fn force_logout(&self) -> impl Future<Output = ()> + Send {
        (**self).force_logout()
    }
}

impl<C: SessionClient> SessionClient for Arc<C> {
    fn fetch_session(&self) -> impl Future<Output = Result<Session, RefreshFailure>> + Send {
        (**self).fetch_session()
    }

    fn refresh(&self, refresh_token: &str)
    -> impl Future<Output = Result<(), RefreshFailure>> + Send {
        (**self).refresh(refresh_token)
    }

    fn force_logout(&self) -> impl Future<Output = ()> + Send {
        (**self).force_logout()
    }
}

/// Outcome of one [`RefreshScheduler::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    /// Session already fetched this cycle.
    Idle,
    NoRefreshNeeded,
    /// New tokens are in place; the next tick re-fetches.
    Refreshed,
    /// Refresh failed but the access token still works.
    RefreshDeferred,
    /// Refresh failed with nothing left to fall back on.
    LoggedOut,
    FetchFailed,
}

pub struct RefreshScheduler<C, K = SystemClock> {
    client: C,
    clock: K,
    fetched: bool,
    session: Option<Session>,
}

impl<C: SessionClient> RefreshScheduler<C, SystemClock> {
    pub fn new(client: C) -> Self {
        Self::with_clock(client, SystemClock)
    }
}

impl<C: SessionClient, K: Clock> RefreshScheduler<C, K> {
    pub fn with_clock(client: C, clock: K) -> Self {
        Self {
            client,
            clock,
            fetched: false,
            session: None,
        }
    }

    /// Last fetched session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Mark the session as not yet fetched.
    pub fn invalidate(&mut self) {
        self.fetched = false;
    }

    /// Fetch the session if needed and act on it.
    pub async fn tick(&mut self) -> SchedulerAction {
        if self.fetched {
            return SchedulerAction::Idle;
        }

        let session = match self.client.fetch_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session fetch failed");
                return SchedulerAction::FetchFailed;
            }
        };
        self.fetched = true;
        self.session = Some(session.clone());

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return SchedulerAction::NoRefreshNeeded;
        };

        if session.is_authenticated && !refresh_due(refresh_token, self.clock.now_secs()) {
            return SchedulerAction::NoRefreshNeeded;
        }

        match self.client.refresh(refresh_token).await {
            Ok(()) => {
                debug!("Token pair refreshed");
                self.fetched = false;
                SchedulerAction::Refreshed
            }
            Err(e) if session.access_token.is_none() => {
                info!(error = %e, "Refresh failed without an access token, logging out");
                self.client.force_logout().await;
                self.session = Some(Session::unauthenticated(None));
                SchedulerAction::LoggedOut
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, keeping current access token");
                SchedulerAction::RefreshDeferred
            }
        }
    }

    /// Drive the scheduler forever, one cycle per `period`.
    pub async fn run(mut self, period: Duration) {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            self.invalidate();

            let mut action = self.tick().await;
            if action == SchedulerAction::Refreshed {
                // Pick up the new tokens right away.
                action = self.tick().await;
            }
            debug!(action = ?action, "Refresh scheduler cycle");
        }
    }
}

/// Whether less than half of the refresh token's lifetime remains.
///
/// Only `iat` and `exp` are read; the client cannot check the signature.
pub fn refresh_due(refresh_token: &str, now: u64) -> bool {
    match decode_unverified::<TokenLifetime>(refresh_token) {
        Ok(lifetime) => lifetime.remaining(now).saturating_mul(2) < lifetime.total(),
        Err(e) => {
            warn!(reason = %e, "Refresh token claims unreadable");
            false
        }
    }
}

/// Spawn a background task that keeps the client's session fresh.
/// Returns a handle that can be used to abort the task.
pub fn spawn_refresh_scheduler<C, K>(
    scheduler: RefreshScheduler<C, K>,
    period: Duration,
) -> tokio::task::JoinHandle<()>
where
    C: SessionClient + 'static,
    K: Clock + 'static,
{
    tokio::spawn(scheduler.run(period))
}

// ── HTTP client ────────────────────────────────────────────────────

/// [`SessionClient`] talking to this service over HTTP.
///
/// Session cookies live in a `reqwest` cookie store, as they would in a
/// browser.
pub struct HttpSessionClient {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

impl HttpSessionClient {
    pub fn new(
        mut base_url: Url,
        cookies: Arc<reqwest::cookie::Jar>,
    ) -> Result<Self, ConfigurationError> {
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let http = reqwest::Client::builder()
            .cookie_provider(cookies)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, RefreshFailure> {
        self.base_url
            .join(path)
            .map_err(|e| RefreshFailure::Transport(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> RefreshFailure {
    RefreshFailure::Transport(e.to_string())
}

impl SessionClient for HttpSessionClient {
    async fn fetch_session(&self) -> Result<Session, RefreshFailure> {
        let response = self
            .http
            .get(self.url("api/session")?)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(RefreshFailure::Rejected(response.status().as_u16()));
        }
        response
            .json::<Session>()
            .await
            .map_err(|e| RefreshFailure::Decode(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<(), RefreshFailure> {
        let response = self
            .http
            .post(self.url("api/session/refresh")?)
            .json(&RefreshBody { refresh_token })
            .send()
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RefreshFailure::Rejected(response.status().as_u16()))
        }
    }

    async fn force_logout(&self) {
        let result = match self.url("logout") {
            Ok(url) => self.http.post(url).send().await.map(|_| ()).map_err(transport),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "Logout request failed");
        }
    }
}
