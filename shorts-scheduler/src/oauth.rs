//! OAuth 2.0 flows for the YouTube upload scope.
//!
//! This module talks to Google's OAuth endpoints: the interactive installed-app flow that asks
//! the user for consent in their browser, and the refresh-token exchange. Deciding *which* of
//! the two to run is [`crate::credentials`]'s job.

use crate::config::ClientCredentials;
use crate::credentials::TokenSource;
use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
};
use oauth2::reqwest;
use std::future::Future;

/// Google's authorization endpoint for installed applications.
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's token endpoint, used for both the code exchange and refreshes.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope needed to create videos on the user's channel.
pub const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Page shown in the user's browser once the redirect has been received.
pub const OAUTH_DONE_HTML: &str = include_str!("../oauth_success.html");

/// Runs OAuth flows against Google on behalf of one registered client.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client: ClientCredentials,
    oauth_done_html: &'static str,
}

impl OAuthManager {
    /// Creates a manager for the given OAuth client.
    ///
    /// `oauth_done_html` is served to the browser after it follows the redirect back to us.
    pub fn new(client: ClientCredentials, oauth_done_html: &'static str) -> Self {
        Self {
            client,
            oauth_done_html,
        }
    }

    fn http_client() -> eyre::Result<reqwest::Client> {
        reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")
    }

    /// Performs the full interactive authorization flow.
    ///
    /// Binds a callback listener on a random localhost port, opens the consent page in the
    /// user's browser, waits for the redirect carrying the authorization code, and exchanges
    /// that code (with its PKCE verifier) for a token. Blocks until the user finishes.
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = self
            .setup_redirect(csrf.clone())
            .await
            .context("set up redirect endpoint")?;

        let auth_url =
            AuthUrl::new(self.client.auth_uri.clone()).context("parse authorization endpoint")?;
        let token_url = TokenUrl::new(self.client.token_uri.clone()).context("parse token endpoint")?;
        let mut client = BasicClient::new(ClientId::new(self.client.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);
        if let Some(secret) = &self.client.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // We never re-use the CSRF since we only go through the flow exactly once.
            .authorize_url(move || csrf.clone())
            .add_scope(Scope::new(UPLOAD_SCOPE.to_string()))
            // Without offline access Google hands out no refresh token.
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, "check your browser to authorize YouTube uploads");
        if let Err(e) = webbrowser::open(auth_url.as_ref()) {
            tracing::warn!(error = %e, "could not open a browser; open the URL above manually");
        }
        let authorization_code = eventually_authorization_code
            .await
            .context("await user authorization code")?;

        let token = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&Self::http_client()?)
            .await
            .context("exchange authorization code with access token")?;

        tracing::info!("authorization successful");
        Ok(token)
    }

    /// Exchanges the refresh token held by `token` for a new access token.
    ///
    /// Returns `Ok(None)` if there is nothing to refresh with, or if Google says the grant is no
    /// longer valid (revoked, expired, or issued to a different client). In both cases the
    /// caller has to fall back to [`Self::authenticate`].
    pub async fn refresh_token(
        &self,
        token: &BasicTokenResponse,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };

        tracing::debug!("attempting to refresh OAuth token");

        // no redirect needed for a refresh
        let token_url = TokenUrl::new(self.client.token_uri.clone()).context("parse token endpoint")?;
        let mut client = BasicClient::new(ClientId::new(self.client.client_id.clone()))
            .set_token_uri(token_url);
        if let Some(secret) = &self.client.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&Self::http_client()?)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }

    /// Starts a one-shot HTTP server on localhost that waits for the OAuth redirect.
    ///
    /// Returns the redirect URL to register with the authorization request, and a future that
    /// resolves to the authorization code once the browser has been redirected back with a
    /// matching `state`.
    async fn setup_redirect(
        &self,
        csrf: CsrfToken,
    ) -> eyre::Result<(
        RedirectUrl,
        impl Future<Output = eyre::Result<AuthorizationCode>>,
    )> {
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind to localhost")?;
        let addr = socket.local_addr().context("get local address")?;
        let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
            .context("construct redirect url")?;
        let (tx, rx) = tokio::sync::oneshot::channel();
        let oauth_done = self.oauth_done_html;
        tokio::spawn(async move {
            let r = async move {
                let (conn, _) = socket.accept().await.context("accept")?;
                let conn = hyper_util::rt::TokioIo::new(conn);
                let (got, mut gotten) = tokio::sync::mpsc::channel(1);
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let csrf = csrf.clone();
                    let got = got.clone();
                    async move {
                        let (state, code) = parse_callback(req.uri().query().unwrap_or(""));
                        if state.as_deref() != Some(csrf.secret().as_str()) {
                            return Err("invalid csrf token");
                        }
                        let Some(code) = code else {
                            return Err("no authorization code found");
                        };
                        if got.send(AuthorizationCode::new(code)).await.is_err() {
                            return Err("authorization code already received");
                        }
                        Ok(Response::new(Full::<Bytes>::from(oauth_done)))
                    }
                });
                let mut serve = std::pin::pin!(
                    hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
                );

                tokio::select! {
                    exit = &mut serve => {
                        if let Err(e) = exit {
                            Err(e).context("redirect server got bad request")
                        } else {
                            eyre::bail!("redirect server exit prematurely");
                        }
                    }
                    code = gotten.recv() => {
                        serve.as_mut().graceful_shutdown();
                        // let the success page reach the browser
                        let _ = serve.await;
                        code.ok_or_else(|| eyre::eyre!("redirect server stopped without a code"))
                    }
                }
            };
            let _ = tx.send(r.await);
        });
        Ok((url, async move {
            rx.await.context("redirect future dropped prematurely")?
        }))
    }
}

/// Pulls `state` and `code` out of the redirect's query string.
fn parse_callback(query: &str) -> (Option<String>, Option<String>) {
    let mut state = None;
    let mut code = None;
    for (k, v) in form_urlencoded::parse(query.as_bytes()) {
        match &*k {
            "state" => state = Some(v.into_owned()),
            "code" => code = Some(v.into_owned()),
            _ => {}
        }
    }
    (state, code)
}

impl TokenSource for OAuthManager {
    async fn authorize(&self) -> eyre::Result<BasicTokenResponse> {
        self.authenticate().await
    }

    async fn refresh(&self, token: &BasicTokenResponse) -> eyre::Result<Option<BasicTokenResponse>> {
        self.refresh_token(token).await
    }
}
