use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use sitegrab_common::PipelineError;

use crate::state::AppState;
use crate::templates::{render_error, render_index, render_not_found};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; \
img-src 'self'; form-action 'self' https://*.google.com; frame-ancestors 'none'; base-uri 'none'";

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/download", post(download))
        .route("/oauth2callback", get(oauth_callback))
        .route("/keep-alive", get(keep_alive))
        .fallback(not_found)
        .with_state(state)
        // Defensive headers on every response
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path only (submitted URLs stay out of the logs)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

// --- Handlers ---

async fn index_page() -> impl IntoResponse {
    Html(render_index())
}

#[derive(Deserialize)]
struct DownloadForm {
    url: Option<String>,
}

async fn download(State(state): State<Arc<AppState>>, Form(form): Form<DownloadForm>) -> Response {
    // Cancelled when this handler is dropped, i.e. the client went away.
    let cancel = state.shutdown.child_token();
    let _disconnect = cancel.clone().drop_guard();

    match state.pipeline.run(form.url.as_deref(), &cancel).await {
        Ok(delivered) => found(&delivered.remote.download_url),
        Err(PipelineError::ReauthRequired { consent_url }) => {
            warn!("Drive authorization expired, redirecting to consent screen");
            found(&consent_url)
        }
        Err(e) => Html(render_error(e.title(), &e.user_message())).into_response(),
    }
}

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            warn!("Redirect target is not a valid header value");
            Html(render_error(
                "Error downloading website!",
                "The download link could not be delivered. Please try again.",
            ))
            .into_response()
        }
    }
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackQuery>,
) -> impl IntoResponse {
    if let Some(error) = params.error {
        warn!(%error, "Authorization was not granted");
        return (StatusCode::BAD_REQUEST, format!("Authorization failed: {error}"));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "Missing authorization code".to_string(),
        );
    };

    match state.session.exchange_code(&code).await {
        Ok(()) => {
            info!("Drive re-authorization complete");
            (
                StatusCode::OK,
                "Authorization successful! New downloads will use the updated credentials."
                    .to_string(),
            )
        }
        Err(e) => {
            warn!(error = %e, "Authorization code exchange failed");
            (
                StatusCode::BAD_GATEWAY,
                "Authorization failed while exchanging the code. Please try again.".to_string(),
            )
        }
    }
}

async fn keep_alive() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(render_not_found()))
}
