//! HTTP implementation of the backend collaborator contracts.
//!
//! Speaks the hosted backend's REST protocol: the record store under
//! `rest/v1/` (filterable with `id=eq.<id>`, `order=<field>.<dir>` and
//! `limit=<n>` query parameters) and the auth service under `auth/v1/`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{AuthError, AuthProvider, BackendError, RecordStore};
use crate::config::Settings;
use crate::models::{Norma, NormaDraft, Session, SortDirection, SortField, User};

const NORMAS_TABLE: &str = "normas";

/// Client for the hosted backend.
///
/// Reads run with the public anon key; writes are expected to run with an
/// administrator session attached via [`HttpBackend::with_session`], since
/// the store enforces row security server-side.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    bearer: String,
}

impl HttpBackend {
    /// Create a client for the given backend base URL and anon key.
    pub fn new(base_url: &str, anon_key: &str, user_agent: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            bearer: anon_key.to_string(),
        }
    }

    /// Create a client from settings. `None` when the backend is not
    /// configured.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let base_url = settings.backend_url.as_deref()?;
        let anon_key = settings.anon_key.as_deref()?;
        Some(Self::new(
            base_url,
            anon_key,
            &settings.user_agent,
            Duration::from_secs(settings.request_timeout),
        ))
    }

    /// A copy of this client authorized with a session's access token.
    pub fn with_session(&self, session: &Session) -> Self {
        Self {
            bearer: session.access_token.clone(),
            ..self.clone()
        }
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, NORMAS_TABLE)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn authed(&self, request: reqwest::RequestBuilder, bearer: &str) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(ACCEPT, "application/json")
    }

    async fn check(&self, response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), %detail, "record store request failed");
        Err(BackendError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl RecordStore for HttpBackend {
    async fn select(
        &self,
        order: Option<(SortField, SortDirection)>,
        limit: Option<u32>,
    ) -> Result<Vec<Norma>, BackendError> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_string())];
        if let Some((field, direction)) = order {
            let dir = match direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            query.push(("order", format!("{}.{}", field.as_str(), dir)));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        let response = self
            .authed(self.client.get(self.rest_url()), &self.bearer)
            .query(&query)
            .send()
            .await?;
        let rows: Vec<Norma> = self.check(response).await?.json().await?;
        Ok(rows)
    }

    async fn get(&self, id: &str) -> Result<Option<Norma>, BackendError> {
        let response = self
            .authed(self.client.get(self.rest_url()), &self.bearer)
            .query(&[("select", "*"), ("id", &format!("eq.{id}"))])
            .send()
            .await?;
        let mut rows: Vec<Norma> = self.check(response).await?.json().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    async fn insert(&self, draft: &NormaDraft) -> Result<Norma, BackendError> {
        let response = self
            .authed(self.client.post(self.rest_url()), &self.bearer)
            .header("Prefer", "return=representation")
            .json(draft)
            .send()
            .await?;
        let mut rows: Vec<Norma> = self.check(response).await?.json().await?;
        if rows.is_empty() {
            return Err(BackendError::Malformed(
                "insert returned no representation".to_string(),
            ));
        }
        Ok(rows.remove(0))
    }

    async fn update(&self, id: &str, draft: &NormaDraft) -> Result<Norma, BackendError> {
        let response = self
            .authed(self.client.patch(self.rest_url()), &self.bearer)
            .query(&[("id", &format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(draft)
            .send()
            .await?;
        let mut rows: Vec<Norma> = self.check(response).await?.json().await?;
        if rows.is_empty() {
            return Err(BackendError::Status {
                status: 404,
                detail: format!("no record with id {id}"),
            });
        }
        Ok(rows.remove(0))
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        let response = self
            .authed(self.client.delete(self.rest_url()), &self.bearer)
            .query(&[("id", &format!("eq.{id}"))])
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserPayload> for User {
    fn from(payload: UserPayload) -> Self {
        User {
            id: payload.id,
            email: payload.email.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl AuthProvider for HttpBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, Session), AuthError> {
        let response = self
            .authed(self.client.post(self.auth_url("token")), &self.anon_key)
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %detail, "sign-in request failed");
            return Err(AuthError::Other(format!("sign-in returned status {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| AuthError::Other(format!("malformed token response: {err}")))?;
        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_at,
        };
        Ok((token.user.into(), session))
    }

    async fn get_user(&self, session: &Session) -> Result<Option<User>, AuthError> {
        let response = self
            .authed(self.client.get(self.auth_url("user")), &session.access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // The provider no longer recognizes the cached session.
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AuthError::Other(format!(
                "session check returned status {status}"
            )));
        }

        let payload: UserPayload = response
            .json()
            .await
            .map_err(|err| AuthError::Other(format!("malformed user response: {err}")))?;
        Ok(Some(payload.into()))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let response = self
            .authed(self.client.post(self.auth_url("logout")), &session.access_token)
            .send()
            .await?;

        let status = response.status();
        // An already-expired session is as signed out as it gets.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        Err(AuthError::Other(format!(
            "sign-out returned status {status}"
        )))
    }
}
