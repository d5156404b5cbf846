//! Google adapters: OAuth2 authorization-code flow and Calendar push channels.

use std::time::Duration;

use servitor_core::{errors::Error, Result};

mod calendar;
mod oauth;
mod secret;

pub use calendar::GoogleCalendarWatcher;
pub use oauth::GoogleOAuthClient;
pub use secret::GoogleOAuthConfig;

/// Full read/write access to the user's calendars.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("http client build failed: {e}")))
}

/// Shorten a response body for logs and error messages.
fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
