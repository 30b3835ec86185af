use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, get_service},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::error;

use crate::content_source::Lookup;
use crate::draft::{disable_draft, enable_draft, DraftMode};
use crate::error::ContentError;
use crate::hot_reload::ws_handler;
use crate::renderer::PostPageRenderer;
use crate::state::{AppState, RouterState};
use crate::view::{render_document, render_error, render_not_found, render_post_page};

/// Full HTML document for one post, or `NotFound` before anything is rendered.
pub async fn render_post_document(
    renderer: &PostPageRenderer,
    layout: &str,
    slug: &str,
    draft: bool,
    is_development: bool,
) -> Result<Lookup<String>, ContentError> {
    let metadata = match renderer.resolve_metadata(slug, draft).await? {
        Lookup::Found(metadata) => metadata,
        Lookup::NotFound => return Ok(Lookup::NotFound),
    };
    let page = match renderer.render_page(slug, draft).await? {
        Lookup::Found(page) => page,
        Lookup::NotFound => return Ok(Lookup::NotFound),
    };
    let body = render_post_page(&page);
    Ok(Lookup::Found(render_document(
        layout,
        &metadata,
        &body,
        is_development,
    )))
}

async fn post_page(
    Path(slug): Path<String>,
    DraftMode(draft): DraftMode,
    State(state): State<Arc<AppState>>,
) -> Response {
    let templates = state.templates.read().await.clone();
    let rendered = render_post_document(
        &state.renderer,
        &templates.layout,
        &slug,
        draft,
        state.is_development,
    )
    .await;

    let mut response = match rendered {
        Ok(Lookup::Found(page)) => Html(page).into_response(),
        Ok(Lookup::NotFound) => {
            let page = render_not_found(
                &templates.layout,
                &templates.not_found,
                &slug,
                state.is_development,
            );
            (StatusCode::NOT_FOUND, Html(page)).into_response()
        }
        Err(err) => {
            error!(%slug, draft, error = %err, "failed to render post");
            let page = render_error(&templates.layout, &templates.error, state.is_development);
            (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response()
        }
    };

    if draft {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("private, no-store"));
    }
    response
}

pub fn router(state: RouterState) -> Router {
    let static_dir = get_service(ServeDir::new(state.app_state.content_dir.join("static")));

    let mut app = Router::new()
        .route("/posts/{slug}", get(post_page))
        .route("/api/draft", get(enable_draft))
        .route("/api/disable-draft", get(disable_draft))
        .nest_service("/static", static_dir);

    if state.app_state.is_development {
        app = app.route("/ws", get(ws_handler));
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
