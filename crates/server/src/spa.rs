use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

/// Serves the built web client; unknown paths fall back to `index.html` so
/// client-side routes resolve.
pub fn router(static_dir: &Path) -> Router {
    let index = ServeFile::new(static_dir.join("index.html"));
    Router::new().fallback_service(ServeDir::new(static_dir).not_found_service(index))
}
