//! Integration tests for the auth API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};
    use mockito::Matcher;
    use serde_json::json;
    use serial_test::serial;
    use tower::util::ServiceExt;

    use mailqa::microsoft::oauth::find_refresh_token;

    use crate::test_utils::{body_to_json, get_request, json_request, sign_in, test_app};

    /// Tests status reports a signed out session
    #[tokio::test]
    #[serial]
    async fn it_reports_signed_out() {
        let t = test_app().await;

        let response = t.app.oneshot(get_request("/api/auth/status")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body, json!({"authenticated": false, "user": null}));
    }

    /// Tests login redirects to the authorize endpoint with a state
    #[tokio::test]
    #[serial]
    async fn it_redirects_to_microsoft_sign_in() {
        let t = test_app().await;

        let response = t
            .app
            .clone()
            .oneshot(get_request("/api/auth/login"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        let expected = format!("{}/tenant/oauth2/v2.0/authorize?", t.server.url());
        assert!(location.starts_with(&expected));
        assert!(location.contains("client_id=test-client-id"));

        let pending = t.state.read().unwrap().session.pending_state.clone().unwrap();
        assert!(location.contains(&format!("state={}", pending)));
    }

    /// Tests the full sign in round trip stores the session and the
    /// refresh token
    #[tokio::test]
    #[serial]
    async fn it_completes_sign_in_on_callback() {
        let mut t = test_app().await;
        let token_mock = t
            .server
            .mock("POST", "/tenant/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "auth-code".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access_token": "access-1",
                    "refresh_token": "refresh-1",
                    "expires_in": 3600,
                    "token_type": "Bearer",
                })
                .to_string(),
            )
            .create_async()
            .await;
        let me_mock = t
            .server
            .mock("GET", "/me")
            .match_header("authorization", "Bearer access-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"displayName": "Ada Lovelace", "mail": "ada@contoso.com", "userPrincipalName": "ada@contoso.com"}"#,
            )
            .create_async()
            .await;

        t.app
            .clone()
            .oneshot(get_request("/api/auth/login"))
            .await
            .unwrap();
        let csrf = t.state.read().unwrap().session.pending_state.clone().unwrap();

        let response = t
            .app
            .clone()
            .oneshot(get_request(&format!(
                "/api/auth/callback?code=auth-code&state={}",
                csrf
            )))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        token_mock.assert_async().await;
        me_mock.assert_async().await;

        let response = t
            .app
            .clone()
            .oneshot(get_request("/api/auth/status"))
            .await
            .unwrap();
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["user"]["displayName"], "Ada Lovelace");

        let db = t.state.read().unwrap().db.clone();
        let stored = find_refresh_token(&db, None).await.unwrap();
        assert_eq!(
            stored,
            Some((String::from("ada@contoso.com"), String::from("refresh-1")))
        );
    }

    /// Tests a callback whose state doesn't match is rejected
    #[tokio::test]
    #[serial]
    async fn it_rejects_a_mismatched_state() {
        let t = test_app().await;

        t.app
            .clone()
            .oneshot(get_request("/api/auth/login"))
            .await
            .unwrap();
        let response = t
            .app
            .clone()
            .oneshot(get_request("/api/auth/callback?code=auth-code&state=forged"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["kind"], "auth");
        assert!(body["error"].as_str().unwrap().contains("sign in again"));
    }

    /// Tests an error returned by the identity platform is surfaced
    #[tokio::test]
    #[serial]
    async fn it_surfaces_a_sign_in_error() {
        let t = test_app().await;

        let response = t
            .app
            .oneshot(get_request(
                "/api/auth/callback?error=access_denied&error_description=User%20declined",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_to_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("access_denied"));
    }

    /// Tests logout forgets the signed in user
    #[tokio::test]
    #[serial]
    async fn it_signs_out() {
        let t = test_app().await;
        sign_in(&t.state);

        let response = t
            .app
            .clone()
            .oneshot(json_request("POST", "/api/auth/logout", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let session = t.state.read().unwrap().session.clone();
        assert!(session.credentials.is_none());
        assert!(session.user.is_none());
    }
}
