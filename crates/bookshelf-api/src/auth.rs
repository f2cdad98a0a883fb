// The five account calls behind the session lifecycle.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::info;

use bookshelf_core::protocol::{
    AuthGrant, BackgroundUpdate, Credentials, RawAuthResponse, SignUpRequest, UserProfile,
};

use crate::client::{
    ApiClient, BACKGROUND_PATH, LOGIN_PATH, LOGOUT_PATH, PROFILE_PATH, SIGNUP_PATH,
};
use crate::error::ApiError;

/// Account endpoints as the session manager sees them.
///
/// Implementations must surface every failure as an `Err`; the session
/// manager decides what each one means for the session.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthGrant, ApiError>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError>;

    async fn sign_out(&self, token: &str) -> Result<(), ApiError>;

    async fn profile(&self, token: &str) -> Result<UserProfile, ApiError>;

    async fn update_background(
        &self,
        token: &str,
        update: &BackgroundUpdate,
    ) -> Result<UserProfile, ApiError>;
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Turn the backend's loosely shaped signup/login body into an `AuthGrant`
/// with one canonical token.
fn normalize_grant(raw: RawAuthResponse) -> Result<AuthGrant, ApiError> {
    let session = raw
        .session
        .and_then(|s| s.normalize())
        .ok_or_else(|| ApiError::Decode("response did not include a session token".into()))?;
    Ok(AuthGrant {
        user: raw.user,
        session,
    })
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthGrant, ApiError> {
        let req = self.request(Method::POST, SIGNUP_PATH, None).json(request);
        let raw: RawAuthResponse = self.send_json(req, "Signup").await?;
        normalize_grant(raw)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError> {
        let req = self.request(Method::POST, LOGIN_PATH, None).json(credentials);
        let raw: RawAuthResponse = self.send_json(req, "Login").await?;
        normalize_grant(raw)
    }

    async fn sign_out(&self, token: &str) -> Result<(), ApiError> {
        let req = self.request(Method::POST, LOGOUT_PATH, Some(token));
        let body = self.send(req, "Logout").await?;
        if let Ok(MessageResponse { message: Some(msg) }) =
            serde_json::from_str::<MessageResponse>(&body)
        {
            info!("server logout: {msg}");
        }
        Ok(())
    }

    async fn profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let req = self.request(Method::GET, PROFILE_PATH, Some(token));
        self.send_json(req, "Get profile").await
    }

    async fn update_background(
        &self,
        token: &str,
        update: &BackgroundUpdate,
    ) -> Result<UserProfile, ApiError> {
        let req = self
            .request(Method::PUT, BACKGROUND_PATH, Some(token))
            .json(update);
        self.send_json(req, "Update background").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_server::respond_once;
    use bookshelf_core::protocol::ExperienceLevel;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn user_json() -> Value {
        json!({
            "id": "u-1",
            "email": "a@b.com",
            "firstName": "Ada",
            "softwareExperience": "advanced",
            "hardwareExperience": "beginner",
            "technicalBackground": "computer_science",
            "primaryProgrammingLanguage": "python",
            "backgroundCompleted": true
        })
    }

    fn client(base: String) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sign_up_posts_questionnaire_and_normalizes_token() {
        let body = json!({
            "user": user_json(),
            "session": { "id": "sess-9", "token": "T1", "expiresAt": "2025-06-01T00:00:00+00:00" }
        });
        let (base, rx) = respond_once(201, &body.to_string()).await;

        let grant = client(base)
            .sign_up(&SignUpRequest::new("a@b.com", "longpass1"))
            .await
            .unwrap();
        assert_eq!(grant.session.token, "T1");
        assert_eq!(grant.user.email, "a@b.com");

        let captured = rx.await.unwrap();
        assert_eq!(captured.request_line, "POST /api/v1/auth/signup HTTP/1.1");
        let sent: Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(sent["email"], "a@b.com");
        assert_eq!(sent["password"], "longpass1");
        assert_eq!(sent["technicalBackground"], "other");
    }

    #[tokio::test]
    async fn sign_in_falls_back_to_session_id() {
        let body = json!({ "user": user_json(), "session": { "id": "sess-9" } });
        let (base, _rx) = respond_once(200, &body.to_string()).await;

        let grant = client(base)
            .sign_in(&Credentials::new("a@b.com", "pw"))
            .await
            .unwrap();
        assert_eq!(grant.session.token, "sess-9");
    }

    #[tokio::test]
    async fn sign_in_without_session_is_rejected() {
        let body = json!({ "user": user_json() });
        let (base, _rx) = respond_once(200, &body.to_string()).await;

        let err = client(base)
            .sign_in(&Credentials::new("a@b.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn sign_in_401_carries_server_detail() {
        let (base, _rx) = respond_once(401, r#"{"detail":"Invalid email or password"}"#).await;

        let err = client(base)
            .sign_in(&Credentials::new("a@b.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Unauthorized {
                message: "Invalid email or password".into()
            }
        );
    }

    #[tokio::test]
    async fn sign_out_sends_bearer_token() {
        let (base, rx) = respond_once(200, r#"{"message":"Successfully logged out"}"#).await;

        client(base).sign_out("T1").await.unwrap();

        let captured = rx.await.unwrap();
        assert_eq!(captured.request_line, "POST /api/v1/auth/logout HTTP/1.1");
        assert_eq!(captured.header("authorization"), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn profile_parses_user() {
        let (base, rx) = respond_once(200, &user_json().to_string()).await;

        let user = client(base).profile("T1").await.unwrap();
        assert_eq!(user.software_experience, ExperienceLevel::Advanced);
        assert_eq!(rx.await.unwrap().header("authorization"), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn update_background_puts_only_changed_fields() {
        let (base, rx) = respond_once(200, &user_json().to_string()).await;
        let update = BackgroundUpdate {
            software_experience: Some(ExperienceLevel::Advanced),
            ..Default::default()
        };

        client(base).update_background("T1", &update).await.unwrap();

        let captured = rx.await.unwrap();
        assert_eq!(
            captured.request_line,
            "PUT /api/v1/auth/profile/background HTTP/1.1"
        );
        let sent: Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(sent, json!({ "softwareExperience": "advanced" }));
    }

    #[tokio::test]
    async fn rate_limit_is_reported_as_such() {
        let (base, _rx) = respond_once(429, r#"{"detail":"Rate limit exceeded"}"#).await;

        let err = client(base).profile("T1").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::RateLimited {
                message: "Rate limit exceeded".into()
            }
        );
    }
}
