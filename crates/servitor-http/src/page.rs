use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::warn;

use servitor_core::errors::Error;

/// Minimal HTML page shown in the user's browser after the redirect.
#[derive(Debug)]
pub struct Page {
    pub status: StatusCode,
    pub title: &'static str,
    pub message: &'static str,
}

impl Page {
    pub fn ok(message: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            title: "Authorized",
            message,
        }
    }

    fn render(&self) -> String {
        format!(
            "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
             <body><h1>{title}</h1><p>{message}</p></body></html>\n",
            title = self.title,
            message = self.message,
        )
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        (self.status, Html(self.render())).into_response()
    }
}

/// Failure of the OAuth callback, rendered as an HTML page.
#[derive(Debug)]
pub enum CallbackError {
    MissingParams,
    ProviderDenied(String),
    Engine(Error),
}

impl From<Error> for CallbackError {
    fn from(err: Error) -> Self {
        Self::Engine(err)
    }
}

impl CallbackError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParams | Self::ProviderDenied(_) => StatusCode::BAD_REQUEST,
            Self::Engine(e) => match e {
                Error::InvalidToken(_) => StatusCode::BAD_REQUEST,
                Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
                Error::AlreadyBound(_) => StatusCode::CONFLICT,
                Error::ExchangeFailed(_) => StatusCode::BAD_GATEWAY,
                Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn page(&self) -> Page {
        let message = match self {
            Self::MissingParams => "The authorization response is missing its code or state.",
            Self::ProviderDenied(_) => "Authorization was not granted. Send /start to try again.",
            Self::Engine(e) => match e {
                Error::InvalidToken(_) | Error::SessionNotFound(_) => {
                    "This authorization link is not valid. Send /start to get a new one."
                }
                Error::AlreadyBound(_) => "This chat is already authorized.",
                Error::ExchangeFailed(_) => {
                    "Google did not accept the authorization. Send /start to try again."
                }
                Error::StoreUnavailable(_) => "Temporarily unavailable, please retry in a moment.",
                _ => "Something went wrong.",
            },
        };
        Page {
            status: self.status(),
            title: "Authorization failed",
            message,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::MissingParams => "missing_params",
            Self::ProviderDenied(_) => "provider_denied",
            Self::Engine(e) => e.kind(),
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let detail = match &self {
            Self::MissingParams => String::new(),
            Self::ProviderDenied(reason) => reason.clone(),
            Self::Engine(e) => e.to_string(),
        };
        warn!(
            status = self.status().as_u16(),
            kind = self.kind(),
            %detail,
            "oauth callback failed"
        );
        self.page().into_response()
    }
}
