pub mod config;
pub mod error;
pub mod handlers;
pub mod session;
pub mod state;
pub mod validation;

use std::any::Any;
use std::backtrace::Backtrace;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as CorsAny, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

use crate::handlers::{
    chat_endpoint, health_check, history_endpoint, service_info, speech_endpoint,
};

/// Full application: routes, middleware and state.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Timeout needs a `Default` response body beneath it, so the body limit
    // sits above it.
    let middleware_stack = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(cors_layer(config.cors_allowed_origins.as_deref()))
        .into_inner();

    let api = Router::new()
        .route("/chat", post(chat_endpoint))
        .route("/speech", post(speech_endpoint))
        .route("/history/{user_id}", get(history_endpoint))
        .route("/health", get(health_check));

    Router::new()
        .route("/", get(service_info))
        .nest("/api", api)
        .layer(DefaultBodyLimit::disable())
        .layer(middleware_stack)
        .layer(axum::middleware::from_fn(add_request_id))
        .with_state(state)
}

/// CORS for the browser client. Without a configured origin list every
/// origin is allowed (development mode).
pub fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(CorsAny)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    match allowed_origins {
        Some(_) if !origins.is_empty() => {
            info!("CORS configured for {} origin(s)", origins.len());
            base.allow_origin(AllowOrigin::list(origins))
        }
        Some(_) => {
            warn!("CORS_ALLOWED_ORIGINS has no usable origin, falling back to permissive CORS");
            base.allow_origin(CorsAny)
        }
        None => {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
            base.allow_origin(CorsAny)
        }
    }
}

// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        return response;
    }
    next.run(request).await
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("Handler panicked: {}\n{}", detail, Backtrace::force_capture());
    ApiError::InternalError(detail).into_response()
}
