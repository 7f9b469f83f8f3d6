//! Embedded static asset serving utilities.

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::MimeGuess;

use crate::application::error::ErrorReport;

static STATIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Serve embedded static assets.
pub async fn serve(path: Option<Path<String>>) -> Response {
    const SOURCE: &str = "infra::assets::serve";

    let Some(Path(requested)) = path else {
        return rejected_response(SOURCE, StatusCode::BAD_REQUEST);
    };

    let normalized = requested.trim_start_matches('/');
    if normalized.is_empty() || normalized.split('/').any(|segment| segment == "..") {
        return rejected_response(SOURCE, StatusCode::BAD_REQUEST);
    }

    match STATIC_ASSETS.get_file(normalized) {
        Some(file) => {
            let mime = MimeGuess::from_path(normalized).first_or_octet_stream();
            let body = Body::from(Bytes::from_static(file.contents()));
            let mut response = Response::new(body);
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_str(mime.as_ref())
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            );
            response.headers_mut().insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=3600"),
            );
            response
        }
        None => not_found_response(SOURCE),
    }
}

fn not_found_response(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

fn rejected_response(source: &'static str, status: StatusCode) -> Response {
    let mut response = status.into_response();
    ErrorReport::from_message(source, status, "Static asset request rejected")
        .attach(&mut response);
    response
}
