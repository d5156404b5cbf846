use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use servitor_core::{
    errors::Error,
    ports::{CalendarWatcher, WatchChannel},
    session::Credential,
    Result,
};
use tracing::debug;
use uuid::Uuid;

use crate::{http_client, snippet, CALENDAR_API_BASE};

#[derive(Serialize)]
struct WatchRequest<'a> {
    id: String,
    #[serde(rename = "type")]
    kind: &'a str,
    address: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchResponse {
    id: String,
    #[serde(default)]
    resource_id: Option<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    expiration: Option<String>,
}

/// Registers `web_hook` push channels on a user's primary calendar.
#[derive(Clone, Debug)]
pub struct GoogleCalendarWatcher {
    http: reqwest::Client,
    api_base: String,
    notification_address: String,
}

impl GoogleCalendarWatcher {
    pub fn new(notification_address: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_base: CALENDAR_API_BASE.to_string(),
            notification_address: notification_address.into(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl CalendarWatcher for GoogleCalendarWatcher {
    async fn watch_primary(&self, credential: &Credential) -> Result<WatchChannel> {
        let req = WatchRequest {
            id: Uuid::new_v4().to_string(),
            kind: "web_hook",
            address: &self.notification_address,
        };

        let resp = self
            .http
            .post(format!("{}/calendars/primary/events/watch", self.api_base))
            .bearer_auth(&credential.access_token)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::External(format!("calendar watch request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "calendar watch failed: {status} {}",
                snippet(&body)
            )));
        }

        let body: WatchResponse = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("calendar watch json error: {e}")))?;
        debug!(channel_id = %body.id, "calendar channel created");

        Ok(WatchChannel {
            id: body.id,
            resource_id: body.resource_id,
            expires_at: body
                .expiration
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_millis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn watcher(server: &MockServer) -> GoogleCalendarWatcher {
        GoogleCalendarWatcher::new(
            "https://bot.example.com/notification",
            Duration::from_secs(5),
        )
        .unwrap()
        .with_api_base(server.uri())
    }

    #[tokio::test]
    async fn watch_registers_web_hook_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events/watch"))
            .and(header("authorization", "Bearer tok123"))
            .and(body_partial_json(serde_json::json!({
                "type": "web_hook",
                "address": "https://bot.example.com/notification"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "api#channel",
                "id": "chan-1",
                "resourceId": "res-9",
                "expiration": "1767225600000"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ch = watcher(&server)
            .watch_primary(&Credential::bearer("tok123"))
            .await
            .unwrap();
        assert_eq!(ch.id, "chan-1");
        assert_eq!(ch.resource_id.as_deref(), Some("res-9"));
        assert_eq!(ch.expires_at.unwrap().timestamp_millis(), 1_767_225_600_000);
    }

    #[tokio::test]
    async fn rejected_watch_is_external_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = watcher(&server)
            .watch_primary(&Credential::bearer("expired"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::External(ref m) if m.contains("401")));
    }
}
