use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use servitor_core::{errors::Error, ports::OAuthProvider, session::Credential, Result};
use tracing::{debug, warn};
use url::Url;

use crate::{http_client, snippet, GoogleOAuthConfig};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Authorization-code client for Google's OAuth2 endpoints.
#[derive(Clone, Debug)]
pub struct GoogleOAuthClient {
    config: GoogleOAuthConfig,
    http: reqwest::Client,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig, timeout: Duration) -> Result<Self> {
        // Validate once so `authorization_url` cannot fail on a bad base.
        Url::parse(&config.auth_uri)
            .map_err(|e| Error::Config(format!("invalid auth_uri {:?}: {e}", config.auth_uri)))?;
        Ok(Self {
            config,
            http: http_client(timeout)?,
        })
    }

    pub fn config(&self) -> &GoogleOAuthConfig {
        &self.config
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> Result<String> {
        let scope = self.config.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.config.auth_uri,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
                // Offline access so the grant carries a refresh token.
                ("access_type", "offline"),
            ],
        )
        .map_err(|e| Error::Config(format!("invalid auth_uri: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let resp = self
            .http
            .post(&self.config.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::ExchangeFailed(format!("token request error: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::ExchangeFailed(format!("token response read error: {e}")))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<TokenError>(&body) {
                Ok(e) => match e.error_description {
                    Some(d) => format!("{}: {d}", e.error),
                    None => e.error,
                },
                Err(_) => snippet(&body),
            };
            warn!(status = status.as_u16(), %reason, "token exchange rejected");
            return Err(Error::ExchangeFailed(format!("{status} {reason}")));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::ExchangeFailed(format!("token response json error: {e}")))?;
        debug!(
            has_refresh_token = token.refresh_token.is_some(),
            expires_in = ?token.expires_in,
            "token exchange succeeded"
        );

        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: token
                .expires_in
                .map(|s| Utc::now() + chrono::Duration::seconds(s)),
            scope: token.scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token_uri: String) -> GoogleOAuthConfig {
        GoogleOAuthConfig {
            client_id: "cid".to_string(),
            client_secret: "s3cret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri,
            redirect_uri: "https://bot.example.com/auth/google".to_string(),
            scopes: vec![crate::CALENDAR_SCOPE.to_string()],
        }
    }

    fn client(token_uri: String) -> GoogleOAuthClient {
        GoogleOAuthClient::new(config(token_uri), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn authorization_url_carries_state_and_offline_access() {
        let c = client("https://oauth2.googleapis.com/token".to_string());
        let url = Url::parse(&c.authorization_url("42").unwrap()).unwrap();
        let q: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(q["state"], "42");
        assert_eq!(q["access_type"], "offline");
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["client_id"], "cid");
        assert_eq!(q["redirect_uri"], "https://bot.example.com/auth/google");
        assert_eq!(q["scope"], crate::CALENDAR_SCOPE);
    }

    #[test]
    fn invalid_auth_uri_is_rejected_up_front() {
        let mut cfg = config("https://oauth2.googleapis.com/token".to_string());
        cfg.auth_uri = "not a url".to_string();
        let err = GoogleOAuthClient::new(cfg, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn exchange_posts_form_and_maps_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("client_secret=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok123",
                "refresh_token": "ref456",
                "token_type": "Bearer",
                "expires_in": 3599,
                "scope": crate::CALENDAR_SCOPE
            })))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(format!("{}/token", server.uri()));
        let cred = c.exchange_code("abc").await.unwrap();
        assert_eq!(cred.access_token, "tok123");
        assert_eq!(cred.refresh_token.as_deref(), Some("ref456"));
        assert!(cred.expires_at.is_some_and(|t| t > Utc::now()));
    }

    #[tokio::test]
    async fn provider_rejection_is_exchange_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let c = client(format!("{}/token", server.uri()));
        let err = c.exchange_code("used").await.unwrap_err();
        assert!(matches!(err, Error::ExchangeFailed(ref m) if m.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn malformed_success_body_is_exchange_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let c = client(format!("{}/token", server.uri()));
        assert!(matches!(
            c.exchange_code("abc").await.unwrap_err(),
            Error::ExchangeFailed(_)
        ));
    }
}
