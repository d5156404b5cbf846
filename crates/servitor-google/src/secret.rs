use std::path::Path;

use serde::Deserialize;
use servitor_core::{errors::Error, Result};

use crate::CALENDAR_SCOPE;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client settings derived from a Google client-secret file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
struct SecretFile {
    web: Option<SecretBody>,
    installed: Option<SecretBody>,
}

#[derive(Deserialize)]
struct SecretBody {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl GoogleOAuthConfig {
    pub fn load(path: &Path, public_host: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::InvalidPath {
            path: path.to_path_buf(),
            reason: format!("unable to read client secret file: {e}"),
        })?;
        Self::from_client_secret_json(&raw, public_host)
    }

    /// Parse the console's JSON (`web` or `installed` application). The first
    /// registered redirect URI wins; without one the callback route under
    /// `public_host` is used.
    pub fn from_client_secret_json(raw: &str, public_host: &str) -> Result<Self> {
        let file: SecretFile = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("client secret is not valid JSON: {e}")))?;
        let body = file.web.or(file.installed).ok_or_else(|| {
            Error::Config("client secret has neither a `web` nor an `installed` section".to_string())
        })?;

        if body.client_id.trim().is_empty() || body.client_secret.trim().is_empty() {
            return Err(Error::Config(
                "client secret is missing client_id or client_secret".to_string(),
            ));
        }

        let redirect_uri = body
            .redirect_uris
            .into_iter()
            .find(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("{public_host}auth/google"));

        Ok(Self {
            client_id: body.client_id,
            client_secret: body.client_secret,
            auth_uri: body.auth_uri.unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: body.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            redirect_uri,
            scopes: vec![CALENDAR_SCOPE.to_string()],
        })
    }
}
