//! axum middleware running the authorization pipeline

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::AuthorizationPipeline;
use crate::context::RequestContext;
use crate::fault::Fault;

/// Authorize the request and publish the result into its [`RequestContext`]
///
/// Uses the context installed by the fault boundary, or installs one when
/// mounted without it. Either way the context is cleared before this layer
/// returns, on every exit path.
pub async fn tenant_authorization(
    State(pipeline): State<Arc<AuthorizationPipeline>>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = if let Some(existing) = request.extensions().get::<RequestContext>() {
        existing.clone()
    } else {
        let created = RequestContext::new();
        request.extensions_mut().insert(created.clone());
        created
    };
    let _guard = context.guard();

    let path = request.uri().path().to_owned();
    let authorization = match pipeline.authorize(&path, request.headers()).await {
        Ok(authorization) => authorization,
        Err(fault) => return fault.into_response(),
    };

    if let Some(data) = authorization.into_context()
        && let Err(e) = context.populate(data)
    {
        return Fault::Unexpected(e.to_string()).into_response();
    }

    next.run(request).await
}
