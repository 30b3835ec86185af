use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{error, info};

use crate::content_source::Lookup;
use crate::models::is_path_segment;
use crate::state::AppState;

pub const DRAFT_COOKIE: &str = "headless_blog_draft";

/// Cookie value for a draft secret. The secret itself never leaves the server.
pub fn draft_token(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"headless-blog draft mode\0");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn same(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Whether the request may see unpublished content.
///
/// Set when the draft cookie carries the token derived from the configured
/// secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftMode(pub bool);

impl<S> FromRequestParts<S> for DraftMode
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let Some(secret) = app_state.draft_secret.as_deref() else {
            return Ok(DraftMode(false));
        };
        let jar = CookieJar::from_headers(&parts.headers);
        let expected = draft_token(secret);
        let enabled = jar
            .get(DRAFT_COOKIE)
            .is_some_and(|cookie| same(cookie.value(), &expected));
        Ok(DraftMode(enabled))
    }
}

#[derive(Debug, Deserialize)]
pub struct EnableDraftParams {
    secret: Option<String>,
    slug: Option<String>,
}

pub async fn enable_draft(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EnableDraftParams>,
    jar: CookieJar,
) -> Response {
    let Some(secret) = state.draft_secret.as_deref() else {
        return (StatusCode::UNAUTHORIZED, "draft mode is not configured").into_response();
    };
    if !params.secret.as_deref().is_some_and(|given| same(given, secret)) {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }
    let slug = params.slug.unwrap_or_default();
    if !is_path_segment(&slug) {
        return (StatusCode::BAD_REQUEST, "invalid slug").into_response();
    }

    match state.renderer.resolve_metadata(&slug, true).await.map(Lookup::found) {
        Ok(Some(_)) => {
            info!(%slug, "draft mode enabled");
            let cookie = Cookie::build((DRAFT_COOKIE, draft_token(secret)))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            (jar.add(cookie), Redirect::temporary(&format!("/posts/{slug}"))).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "invalid slug").into_response(),
        Err(err) => {
            error!(%slug, error = %err, "draft mode check failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn disable_draft(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(DRAFT_COOKIE).path("/"));
    (jar, Redirect::temporary("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hides_the_secret() {
        let token = draft_token("s3cret");
        assert_eq!(token.len(), 64);
        assert!(!token.contains("s3cret"));
        assert_eq!(token, draft_token("s3cret"));
        assert_ne!(token, draft_token("s3cret2"));
    }

    #[test]
    fn comparison_needs_an_exact_match() {
        assert!(same("abc", "abc"));
        assert!(!same("abc", "abd"));
        assert!(!same("abc", "abcd"));
        assert!(!same("", "abc"));
    }
}
