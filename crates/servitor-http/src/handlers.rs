use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tracing::{info, warn};

use servitor_core::commands::replies;

use crate::{
    page::{CallbackError, Page},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// `GET /auth/google?code=..&state=..`: the OAuth redirect target.
pub async fn auth_google(
    State(app): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Page, CallbackError> {
    if let Some(reason) = present(params.error) {
        return Err(CallbackError::ProviderDenied(reason));
    }
    let (Some(code), Some(token)) = (present(params.code), present(params.state)) else {
        return Err(CallbackError::MissingParams);
    };

    let session = app.engine.complete_session(&token, &code).await?;

    if let Err(e) = app
        .messenger
        .send_text(session.chat_id, replies::AUTHORIZED)
        .await
    {
        warn!(
            chat_id = session.chat_id.0,
            error = %e,
            "failed to notify chat of authorization"
        );
    }

    Ok(Page::ok(
        "Your calendar is now linked. You can return to Telegram.",
    ))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// `POST /notification`: calendar push channel. Acknowledged and logged.
pub async fn notification(headers: HeaderMap) -> StatusCode {
    info!(
        channel_id = header(&headers, "x-goog-channel-id"),
        resource_state = header(&headers, "x-goog-resource-state"),
        resource_id = header(&headers, "x-goog-resource-id"),
        "calendar notification"
    );
    StatusCode::OK
}
