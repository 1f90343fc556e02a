//! Credential lifecycle: load the stored token, decide whether it can be used, refreshed, or has
//! to be replaced through the consent flow, and write it back when it changed.
//!
//! The decision itself is pure ([`CredentialState::classify`]); the network half lives behind
//! [`TokenSource`] so every branch can be exercised without talking to Google.

use crate::Error;
use crate::record;
use crate::youtube_api::YouTubeClient;
use eyre::Context;
use jiff::{SignedDuration, Timestamp};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// How long before its stated expiry a token stops being used.
const EXPIRY_BUFFER: SignedDuration = SignedDuration::from_secs(300);

/// Lifetime assumed when the token endpoint doesn't say (one hour minus the buffer).
const DEFAULT_LIFETIME: SignedDuration = SignedDuration::from_secs(3300);

/// The network operations credential handling depends on.
pub trait TokenSource {
    /// Runs the interactive consent flow and returns a brand new token.
    fn authorize(&self) -> impl Future<Output = eyre::Result<BasicTokenResponse>> + Send;

    /// Exchanges the token's refresh token for a new one.
    ///
    /// `Ok(None)` means the grant was refused and consent is needed again.
    fn refresh(
        &self,
        token: &BasicTokenResponse,
    ) -> impl Future<Output = eyre::Result<Option<BasicTokenResponse>>> + Send;
}

/// The token record as it is kept on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: BasicTokenResponse,
    /// When the access token should be considered expired. Records without one are treated as
    /// already expired.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

impl StoredCredential {
    /// Wraps a token that was just issued, computing its expiry relative to `now`.
    pub fn issued_at(token: BasicTokenResponse, now: Timestamp) -> Self {
        let lifetime = token
            .expires_in()
            .and_then(|d| SignedDuration::try_from(d).ok())
            .map(|d| d - EXPIRY_BUFFER)
            .unwrap_or(DEFAULT_LIFETIME);
        Self {
            expires_at: Some(now.checked_add(lifetime).unwrap_or(now)),
            token,
        }
    }

    pub fn access_token(&self) -> &str {
        self.token.access_token().secret()
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_none_or(|at| now >= at)
    }

    /// Replaces this credential with the result of a refresh.
    fn renewed(&self, mut token: BasicTokenResponse) -> Self {
        // Google usually leaves the refresh token out of refresh responses.
        if token.refresh_token().is_none() {
            tracing::trace!("new token lacks refresh token, preserving original");
            token.set_refresh_token(self.token.refresh_token().cloned());
        }
        Self::issued_at(token, Timestamp::now())
    }
}

/// Where a stored credential stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing on disk.
    NoRecord,
    /// The access token can be used as-is.
    Valid,
    /// The access token has expired but there is a refresh token to renew it with.
    ExpiredRefreshable,
    /// The access token has expired and there is no refresh token.
    Unrefreshable,
}

/// What to do about a credential in a given [`CredentialState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialAction {
    Reuse,
    Refresh,
    Authorize,
}

impl CredentialState {
    pub fn classify(record: Option<&StoredCredential>, now: Timestamp) -> Self {
        match record {
            None => Self::NoRecord,
            Some(r) if !r.is_expired(now) => Self::Valid,
            Some(r) if r.token.refresh_token().is_some() => Self::ExpiredRefreshable,
            Some(_) => Self::Unrefreshable,
        }
    }

    pub fn action(self) -> CredentialAction {
        match self {
            Self::Valid => CredentialAction::Reuse,
            Self::ExpiredRefreshable => CredentialAction::Refresh,
            Self::NoRecord | Self::Unrefreshable => CredentialAction::Authorize,
        }
    }
}

/// How the credential in use for this run came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Reused,
    Refreshed,
    Authorized,
}

/// The credential resolved for this run.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub credential: StoredCredential,
    pub provenance: Provenance,
}

/// Owns the token record for the lifetime of the process.
#[derive(Debug)]
pub struct CredentialManager<S> {
    token_file: PathBuf,
    source: Arc<S>,
}

impl<S: TokenSource> CredentialManager<S> {
    pub fn new(token_file: impl Into<PathBuf>, source: S) -> Self {
        Self {
            token_file: token_file.into(),
            source: Arc::new(source),
        }
    }

    pub fn token_file(&self) -> &Path {
        &self.token_file
    }

    /// Reads the stored credential, if any. An unreadable or corrupt record is an error rather
    /// than a reason to silently start over.
    pub async fn load(&self) -> Result<Option<StoredCredential>, Error> {
        let Some(bytes) = record::read(&self.token_file).await.map_err(Error::auth)? else {
            return Ok(None);
        };
        record::parse(&bytes).map(Some).map_err(|e| {
            Error::auth(e.wrap_err(format!("parse token record {}", self.token_file.display())))
        })
    }

    /// Resolves a usable credential, refreshing or re-authorizing as needed.
    ///
    /// The record is written at most once, and only if the credential changed.
    #[tracing::instrument(skip(self), fields(token_file = %self.token_file.display()))]
    pub async fn resolve(&self) -> Result<Resolved, Error> {
        let stored = self.load().await?;
        let state = CredentialState::classify(stored.as_ref(), Timestamp::now());
        tracing::debug!(?state, "classified stored credential");

        let resolved = match (state.action(), stored) {
            (CredentialAction::Reuse, Some(credential)) => {
                return Ok(Resolved {
                    credential,
                    provenance: Provenance::Reused,
                });
            }
            (CredentialAction::Refresh, Some(credential)) => {
                match self.refresh(&credential).await {
                    Some(refreshed) => Resolved {
                        credential: refreshed,
                        provenance: Provenance::Refreshed,
                    },
                    None => self.authorize().await?,
                }
            }
            _ => self.authorize().await?,
        };

        record::write(&self.token_file, &resolved.credential)
            .await
            .map_err(|e| Error::io("save OAuth token", e))?;
        tracing::info!(provenance = ?resolved.provenance, "saved OAuth token");
        Ok(resolved)
    }

    /// Resolves the credential and returns a client that uses it.
    ///
    /// The client refreshes the credential on its own if it expires during the run.
    pub async fn authenticated_client(
        &self,
        http: reqwest::Client,
    ) -> Result<YouTubeClient<S>, Error> {
        let resolved = self.resolve().await?;
        let live = LiveCredential::new(
            self.token_file.clone(),
            Arc::clone(&self.source),
            resolved.credential,
        );
        Ok(YouTubeClient::new(live, http))
    }

    /// Returns `None` when refreshing didn't work out and the user has to consent again.
    async fn refresh(&self, credential: &StoredCredential) -> Option<StoredCredential> {
        tracing::info!("access token expired, refreshing");
        match self.source.refresh(&credential.token).await {
            Ok(Some(token)) => Some(credential.renewed(token)),
            Ok(None) => {
                tracing::warn!("token refresh was refused, re-authorizing");
                None
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "token refresh failed, re-authorizing");
                None
            }
        }
    }

    async fn authorize(&self) -> Result<Resolved, Error> {
        let token = self
            .source
            .authorize()
            .await
            .map_err(|e| Error::auth(e.wrap_err("authorize YouTube uploads")))?;
        Ok(Resolved {
            credential: StoredCredential::issued_at(token, Timestamp::now()),
            provenance: Provenance::Authorized,
        })
    }
}

/// The credential a running client sends with its requests.
///
/// Checked before every request and refreshed (and saved) once it has expired. The lock is held
/// across the refresh, so requests that race an expiry wait for a single refresh.
#[derive(Debug)]
pub struct LiveCredential<S> {
    token_file: PathBuf,
    source: Arc<S>,
    current: Mutex<StoredCredential>,
}

impl<S: TokenSource> LiveCredential<S> {
    pub fn new(
        token_file: impl Into<PathBuf>,
        source: Arc<S>,
        credential: StoredCredential,
    ) -> Self {
        Self {
            token_file: token_file.into(),
            source,
            current: Mutex::new(credential),
        }
    }

    /// A copy of the credential as it currently stands.
    pub async fn credential(&self) -> StoredCredential {
        self.current.lock().await.clone()
    }

    /// Returns an access token that has not expired, refreshing first if necessary.
    ///
    /// Consent is not asked for again mid-run: a refused refresh is an error.
    #[tracing::instrument(skip(self), level = tracing::Level::TRACE)]
    pub async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut current = self.current.lock().await;
        if current.is_expired(Timestamp::now()) {
            tracing::debug!("access token expired, attempting refresh");
            let Some(token) = self
                .source
                .refresh(&current.token)
                .await
                .context("refresh OAuth token")?
            else {
                tracing::error!("access token refresh was refused");
                eyre::bail!("unable to refresh expired access token");
            };
            let renewed = current.renewed(token);
            *current = renewed;

            match record::write(&self.token_file, &*current).await {
                Ok(()) => tracing::debug!("saved refreshed OAuth token"),
                Err(e) => {
                    tracing::warn!(
                        error = %format!("{e:#}"),
                        "could not save refreshed OAuth token"
                    );
                }
            }
        }
        Ok(current.access_token().to_string())
    }
}
