//! Integration tests for serving the web UI

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use serial_test::serial;
    use tower::util::ServiceExt;

    use crate::test_utils::{body_to_string, get_request, test_app};

    /// Tests the index page is served without caching
    #[tokio::test]
    #[serial]
    async fn it_serves_the_web_ui() {
        let t = test_app().await;

        let response = t.app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("Mail Q&amp;A"));
        assert!(body.contains("/api/auth/login"));
    }

    /// Tests missing assets are a 404
    #[tokio::test]
    #[serial]
    async fn it_returns_not_found_for_missing_assets() {
        let t = test_app().await;

        let response = t.app.oneshot(get_request("/missing.js")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
