use crate::keystore::prover_client::{
    AuthInputs, AuthenticationStatus, ProverClient, SponsorAuthInputs,
};
use alloy::primitives::{B256, Bytes};
use anyhow::Error;
use serde_json::Value;
use std::{fmt, future::Future, path::PathBuf, time::Duration};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const STATUS_PENDING: &str = "pending";
const STATUS_COMPLETED: &str = "completed";
const STATUS_FAILED: &str = "failed";

#[derive(Debug)]
pub enum AuthenticationError {
    /// Prover explicitly failed the request.
    Rejected,
    /// Prover reported completion without an authenticated transaction.
    ProtocolViolation,
    /// Status string this client does not recognize.
    UnknownStatus(String),
    /// Poll budget exhausted while the request was still pending.
    TimedOut(u64),
    Cancelled,
    Transport(Error),
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationError::Rejected => {
                write!(f, "Prover rejected the authentication request")
            }
            AuthenticationError::ProtocolViolation => {
                write!(
                    f,
                    "Prover reported completion without an authenticated transaction"
                )
            }
            AuthenticationError::UnknownStatus(status) => {
                write!(f, "Prover returned an unknown authentication status: {status}")
            }
            AuthenticationError::TimedOut(polls) => {
                write!(f, "Authentication still pending after {polls} polls")
            }
            AuthenticationError::Cancelled => write!(f, "Authentication was cancelled"),
            AuthenticationError::Transport(e) => {
                write!(f, "Authentication transport error: {e}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Next action after one status observation.
#[derive(Debug)]
pub enum PollStep {
    Sleep,
    /// Authenticated transaction, ready for the sequencer.
    Done(Bytes),
    Fail(AuthenticationError),
}

/// Transition core of the authentication polling loop. Status strings are
/// classified case-sensitively; anything unexpected stops the session so a
/// protocol change cannot be mistaken for progress.
pub struct AuthPoller {
    max_polls: u64,
    polls: u64,
}

impl AuthPoller {
    /// `max_polls` of zero means unbounded polling.
    pub fn new(max_polls: u64) -> Self {
        Self {
            max_polls,
            polls: 0,
        }
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn on_status(&mut self, status: &AuthenticationStatus) -> PollStep {
        match status.status.as_str() {
            STATUS_PENDING => {
                self.polls += 1;
                if self.max_polls != 0 && self.polls >= self.max_polls {
                    PollStep::Fail(AuthenticationError::TimedOut(self.polls))
                } else {
                    PollStep::Sleep
                }
            }
            STATUS_COMPLETED => match &status.authenticated_transaction {
                Some(transaction) => PollStep::Done(transaction.clone()),
                None => PollStep::Fail(AuthenticationError::ProtocolViolation),
            },
            STATUS_FAILED => PollStep::Fail(AuthenticationError::Rejected),
            other => PollStep::Fail(AuthenticationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Submission and polling transport of one authentication session.
/// Single-party and sponsored requests use different prover methods with
/// the same session shape.
pub trait AuthenticationTransport {
    fn submit(&self, transaction: Bytes) -> impl Future<Output = Result<B256, Error>> + Send;

    fn poll(
        &self,
        request_hash: B256,
    ) -> impl Future<Output = Result<AuthenticationStatus, Error>> + Send;
}

pub struct SinglePartyAuth<'a> {
    pub prover: &'a ProverClient,
    pub auth_inputs: AuthInputs,
}

impl AuthenticationTransport for SinglePartyAuth<'_> {
    async fn submit(&self, transaction: Bytes) -> Result<B256, Error> {
        self.prover
            .authenticate_transaction(transaction, self.auth_inputs.clone())
            .await
    }

    async fn poll(&self, request_hash: B256) -> Result<AuthenticationStatus, Error> {
        self.prover.get_authentication_status(request_hash).await
    }
}

pub struct SponsoredAuth<'a> {
    pub prover: &'a ProverClient,
    pub sponsor_auth_inputs: SponsorAuthInputs,
}

impl AuthenticationTransport for SponsoredAuth<'_> {
    async fn submit(&self, transaction: Bytes) -> Result<B256, Error> {
        self.prover
            .sponsor_authenticate_transaction(transaction, self.sponsor_auth_inputs.clone())
            .await
    }

    async fn poll(&self, request_hash: B256) -> Result<AuthenticationStatus, Error> {
        self.prover
            .get_sponsor_authentication_status(request_hash)
            .await
    }
}

/// Pre-authentication transaction request persisted for debugging, one
/// JSON file per request named by the request hash.
pub struct DebugArtifact {
    pub dir: PathBuf,
    pub body: Value,
}

impl DebugArtifact {
    /// Write failures are logged and swallowed. A missing artifact must not
    /// fail the session.
    pub fn persist(&self, request_hash: B256) {
        let result = std::fs::create_dir_all(&self.dir).and_then(|()| {
            let body = serde_json::to_string_pretty(&self.body)?;
            std::fs::write(self.dir.join(format!("{request_hash}.json")), body)
        });
        if let Err(e) = result {
            warn!("Failed to write the authentication debug artifact: {e}");
        }
    }
}

/// Drives one authentication session: submit the transaction, persist the
/// debug artifact, then poll until a terminal status.
pub async fn authenticate<T: AuthenticationTransport>(
    transport: &T,
    transaction: Bytes,
    poll_interval: Duration,
    max_polls: u64,
    debug_artifact: Option<&DebugArtifact>,
    cancellation: &CancellationToken,
) -> Result<Bytes, AuthenticationError> {
    let request_hash = transport
        .submit(transaction)
        .await
        .map_err(AuthenticationError::Transport)?;
    info!("Authentication request submitted: {request_hash}");

    if let Some(artifact) = debug_artifact {
        artifact.persist(request_hash);
    }

    let mut poller = AuthPoller::new(max_polls);
    loop {
        let status = transport
            .poll(request_hash)
            .await
            .map_err(AuthenticationError::Transport)?;
        match poller.on_status(&status) {
            PollStep::Done(authenticated) => {
                info!("Authentication completed after {} polls", poller.polls());
                return Ok(authenticated);
            }
            PollStep::Fail(error) => return Err(error),
            PollStep::Sleep => {
                tokio::select! {
                    _ = sleep(poll_interval) => {}
                    _ = cancellation.cancelled() => {
                        return Err(AuthenticationError::Cancelled);
                    }
                }
            }
        }
    }
}
