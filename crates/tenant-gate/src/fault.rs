//! Fault taxonomy and the boundary that renders it
//!
//! Every stage and handler reports failures as a [`Fault`]. A fault turns
//! into a bare status response carrying the fault in its extensions;
//! [`fault_boundary`] is the one place that shapes the client-visible body.

use std::any::Any;

use axum::Json;
use axum::extract::Request;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::auth::ParseError;
use crate::constants::GENERIC_ERROR_MESSAGE;
use crate::context::RequestContext;
use crate::identity::IdentityError;
use crate::store::StoreError;
use crate::tenant::TenantRejection;

#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error(transparent)]
    InvalidTenant(#[from] TenantRejection),

    /// Path or body the handler could not extract
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("{0}")]
    IdentityNotFound(String),

    #[error("{0}")]
    IdentityConflict(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Internal detail; logged, never shown to the client
    #[error("{0}")]
    Unexpected(String),
}

impl Fault {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidTenant(TenantRejection::Missing | TenantRejection::Malformed { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTenant(TenantRejection::Mismatch { .. })
            | Self::IdentityNotFound(_)
            | Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::IdentityConflict(_) => StatusCode::CONFLICT,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind, used in logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTenant(TenantRejection::Missing) => "invalid_tenant.missing",
            Self::InvalidTenant(TenantRejection::Malformed { .. }) => "invalid_tenant.malformed",
            Self::InvalidTenant(TenantRejection::Mismatch { .. }) => "invalid_tenant.mismatch",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::IdentityNotFound(_) => "identity_not_found",
            Self::IdentityConflict(_) => "identity_conflict",
            Self::AccessDenied(_) => "access_denied",
            Self::Unexpected(_) => "unexpected",
        }
    }

    /// Message safe to show the client
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Unexpected(_) => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<IdentityError> for Fault {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotFound { .. } => Self::IdentityNotFound(err.to_string()),
            IdentityError::Conflict(message) => Self::IdentityConflict(message),
            IdentityError::Store(e) => Self::Unexpected(e.to_string()),
        }
    }
}

impl From<ParseError> for Fault {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Malformed(_) => Self::Unauthenticated(err.to_string()),
            ParseError::Unavailable(detail) => Self::Unexpected(detail),
        }
    }
}

impl From<PathRejection> for Fault {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for Fault {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for Fault {
    fn from(err: StoreError) -> Self {
        Self::Unexpected(err.to_string())
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Client-visible error body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorBody {
    #[must_use]
    pub fn new(fault: &Fault, path: &str) -> Self {
        let status = fault.status();
        Self {
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: fault.client_message(),
            path: path.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Outermost application middleware
///
/// Installs a fresh [`RequestContext`] for the request and clears it when the
/// request leaves, whatever the exit path. Responses tagged with a [`Fault`]
/// are rendered as an [`ErrorBody`].
pub async fn fault_boundary(mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let context = RequestContext::new();
    let _guard = context.guard();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;

    let Some(fault) = response.extensions_mut().remove::<Fault>() else {
        return response;
    };

    match &fault {
        Fault::Unexpected(detail) => {
            tracing::error!(path = %path, kind = fault.kind(), detail = %detail, "Unexpected fault");
        }
        other => {
            tracing::info!(
                path = %path,
                kind = other.kind(),
                status = other.status().as_u16(),
                "Request failed"
            );
        }
    }

    (fault.status(), Json(ErrorBody::new(&fault, &path))).into_response()
}

/// `CatchPanicLayer` handler: a panicking handler becomes `Fault::Unexpected`
pub fn panic_to_fault(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");

    Fault::Unexpected(format!("handler panicked: {detail}")).into_response()
}
