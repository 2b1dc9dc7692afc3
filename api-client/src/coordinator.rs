//! Single-flight refresh coordination.
//!
//! Any number of requests may fail concurrently on the same expired
//! access credential; at most one rotation call goes to the credential
//! service. The in-flight renewal is held as a shared future: late
//! failers await it instead of starting their own, and its outcome fans
//! out to every waiter. A renewal the service rejects (or that times
//! out) poisons the session, and every queued request receives the same
//! session-expired signal.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::ClientError;
use crate::transport::{SessionTransport, TokenGrant, TransportError};

/// The client's current credential pair.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of one renewal flight, cloned out to every waiter.
#[derive(Debug, Clone)]
enum RenewOutcome {
    Renewed(String),
    SessionExpired,
    TransientFailure(String),
}

type PendingRenewal = Shared<BoxFuture<'static, RenewOutcome>>;

struct TokenCell {
    tokens: Option<SessionTokens>,
    /// Bumped on every install/renewal; a request that failed against an
    /// older epoch reuses the fresh credential instead of rotating.
    epoch: u64,
    /// Set once renewal is known to be impossible. No further rotation
    /// is attempted for this session.
    expired: bool,
}

struct Inner {
    transport: Arc<dyn SessionTransport>,
    cell: Mutex<TokenCell>,
    pending: Mutex<Option<PendingRenewal>>,
    rotate_timeout: Duration,
}

impl Inner {
    /// The single rotation flight. Clears `pending` as its final act so
    /// the next expiry starts a fresh flight.
    async fn run_rotation(self: Arc<Self>, observed_epoch: u64) -> RenewOutcome {
        let outcome = self.rotate_once(observed_epoch).await;
        *self.pending.lock().await = None;
        outcome
    }

    async fn rotate_once(&self, observed_epoch: u64) -> RenewOutcome {
        let refresh_token = {
            let cell = self.cell.lock().await;
            if cell.expired {
                return RenewOutcome::SessionExpired;
            }
            let tokens = match &cell.tokens {
                Some(tokens) => tokens,
                None => return RenewOutcome::SessionExpired,
            };
            if cell.epoch != observed_epoch {
                // Renewed between scheduling and running this flight
                return RenewOutcome::Renewed(tokens.access_token.clone());
            }
            tokens.refresh_token.clone()
        };

        match tokio::time::timeout(self.rotate_timeout, self.transport.rotate(&refresh_token))
            .await
        {
            Ok(Ok(grant)) => {
                let mut cell = self.cell.lock().await;
                cell.tokens = Some(SessionTokens {
                    access_token: grant.access_token.clone(),
                    refresh_token: grant.refresh_token,
                });
                cell.epoch += 1;
                cell.expired = false;
                tracing::debug!("Access credential renewed");
                RenewOutcome::Renewed(grant.access_token)
            }
            Ok(Err(TransportError::Rejected { status, .. })) => {
                tracing::warn!(status, "Credential renewal rejected; session is over");
                self.poison().await;
                RenewOutcome::SessionExpired
            }
            Ok(Err(TransportError::Transport(msg))) => {
                tracing::warn!(error = %msg, "Credential renewal failed transiently");
                RenewOutcome::TransientFailure(msg)
            }
            Err(_) => {
                tracing::warn!("Credential renewal timed out; session is over");
                self.poison().await;
                RenewOutcome::SessionExpired
            }
        }
    }

    async fn poison(&self) {
        let mut cell = self.cell.lock().await;
        cell.tokens = None;
        cell.expired = true;
    }
}

pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn SessionTransport>, rotate_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                cell: Mutex::new(TokenCell {
                    tokens: None,
                    epoch: 0,
                    expired: false,
                }),
                pending: Mutex::new(None),
                rotate_timeout,
            }),
        }
    }

    /// Install a freshly granted credential pair (after login).
    pub async fn install(&self, grant: &TokenGrant) {
        let mut cell = self.inner.cell.lock().await;
        cell.tokens = Some(SessionTokens {
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
        });
        cell.epoch += 1;
        cell.expired = false;
    }

    /// Drop the session state (after logout).
    pub async fn clear(&self) {
        let mut cell = self.inner.cell.lock().await;
        cell.tokens = None;
        cell.expired = false;
    }

    /// Current credential pair, if a session is active.
    pub async fn session(&self) -> Option<SessionTokens> {
        self.inner.cell.lock().await.tokens.clone()
    }

    /// Current access credential plus the epoch it belongs to. The epoch
    /// is handed back to [`renew`] when the request fails.
    ///
    /// [`renew`]: RefreshCoordinator::renew
    pub async fn current(&self) -> Result<(String, u64), ClientError> {
        let cell = self.inner.cell.lock().await;
        if cell.expired {
            return Err(ClientError::SessionExpired);
        }
        match &cell.tokens {
            Some(tokens) => Ok((tokens.access_token.clone(), cell.epoch)),
            None => Err(ClientError::SessionExpired),
        }
    }

    /// Obtain a valid access credential after a request failed with an
    /// authentication error at `observed_epoch`.
    ///
    /// If a renewal already happened since, the fresh credential is
    /// returned without a rotation call. Otherwise the caller joins the
    /// single in-flight rotation, starting it only if none exists.
    pub async fn renew(&self, observed_epoch: u64) -> Result<String, ClientError> {
        {
            let cell = self.inner.cell.lock().await;
            if cell.expired {
                return Err(ClientError::SessionExpired);
            }
            match &cell.tokens {
                None => return Err(ClientError::SessionExpired),
                Some(tokens) if cell.epoch != observed_epoch => {
                    return Ok(tokens.access_token.clone());
                }
                Some(_) => {}
            }
        }

        let renewal = {
            let mut pending = self.inner.pending.lock().await;
            match pending.as_ref() {
                Some(renewal) => renewal.clone(),
                None => {
                    let renewal = self
                        .inner
                        .clone()
                        .run_rotation(observed_epoch)
                        .boxed()
                        .shared();
                    *pending = Some(renewal.clone());
                    renewal
                }
            }
        };

        match renewal.await {
            RenewOutcome::Renewed(access_token) => Ok(access_token),
            RenewOutcome::SessionExpired => Err(ClientError::SessionExpired),
            RenewOutcome::TransientFailure(msg) => Err(ClientError::Transport(msg)),
        }
    }
}
