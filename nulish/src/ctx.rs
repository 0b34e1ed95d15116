use axum::{
    extract::{Extension, FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::notes::NoteRepository;

#[derive(Clone, FromRequestParts)]
pub struct BaseParams {
    pub ctx: Ctx,
    #[from_request(via(Extension))]
    pub repo: NoteRepository,
}

impl BaseParams {
    pub fn new(repo: NoteRepository, ctx: Ctx) -> Self {
        Self { repo, ctx }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Ctx {
    pub request_id: Option<String>,
}

impl Ctx {
    pub fn new(request_id: Option<String>) -> Self {
        Self { request_id }
    }

    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[derive(Clone)]
pub struct ReqCtx {
    pub headers: HeaderMap,
    pub request_id: Option<String>,
}

tokio::task_local! {
    pub static REQ_CTX: ReqCtx;
}

/// Request id of the request being served, if any.
pub fn current_request_id() -> Option<String> {
    REQ_CTX.try_with(|ctx| ctx.request_id.clone()).ok().flatten()
}

pub async fn with_ctx(headers: HeaderMap, ctx: Ctx, request: Request, next: Next) -> crate::Result<Response> {
    Ok(REQ_CTX
        .scope(
            ReqCtx {
                headers,
                request_id: ctx.request_id,
            },
            next.run(request),
        )
        .await)
}
