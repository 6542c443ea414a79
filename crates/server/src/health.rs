use axum::{http::StatusCode, routing::get, Router};

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

pub async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::health::health;

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = health().await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}
