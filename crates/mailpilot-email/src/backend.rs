use crate::ApiError;
use async_trait::async_trait;
use mailpilot_core::{DraftMail, MailProfile, MessageDetail, MessageList, OutgoingMail};
use mailpilot_security::{LoginSessionStore, MailCredentialStore};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Mail endpoints of the backend, authenticated with the mail credential.
#[async_trait]
pub trait MailApi: Send + Sync {
    async fn profile(&self) -> Result<MailProfile, ApiError>;

    async fn list_messages(&self) -> Result<MessageList, ApiError>;

    async fn message_detail(&self, message_id: &str) -> Result<MessageDetail, ApiError>;

    async fn send(&self, mail: &OutgoingMail) -> Result<(), ApiError>;

    async fn save_draft(&self, draft: &DraftMail) -> Result<(), ApiError>;
}

/// Application account endpoints.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Returns the login token.
    async fn login(&self, email: &str, password: &str) -> Result<String, ApiError>;

    async fn register(&self, email: &str, password: &str) -> Result<Registration, ApiError>;

    async fn verify_email(&self, token: &str) -> Result<String, ApiError>;

    async fn resend_verification(&self, email: &str) -> Result<String, ApiError>;

    async fn reset_mail_tokens(&self, email: &str) -> Result<(), ApiError>;

    async fn delete_user(&self, email: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Registration {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub verification_token: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

const SESSION_EXPIRED: &str = "Session expired. Please reconnect your mail account.";
const SERVER_ERROR: &str = "Server error. Please try again later.";

/// HTTP client for the mail agent backend.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    sessions: LoginSessionStore,
    credentials: MailCredentialStore,
}

impl BackendClient {
    pub fn new(
        base_url: Url,
        timeout: Duration,
        sessions: LoginSessionStore,
        credentials: MailCredentialStore,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            sessions,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Page that starts the mail provider authorization.
    pub fn authorize_url(&self) -> Result<Url, ApiError> {
        self.url("gmail/authorize")
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    /// `prefix` joined with one percent-encoded path segment.
    fn url_with_segment(&self, prefix: &str, segment: &str) -> Result<Url, ApiError> {
        let mut url = self.url(prefix)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Validation(format!("unusable base url: {}", self.base_url)))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    fn public_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(ACCEPT, "application/json")
    }

    fn session_request(&self, method: Method, url: Url) -> Result<RequestBuilder, ApiError> {
        let bearer = self.sessions.bearer()?;
        Ok(self.public_request(method, url).bearer_auth(bearer))
    }

    fn mail_request(&self, method: Method, url: Url) -> Result<RequestBuilder, ApiError> {
        let headers = self.credentials.auth_headers()?;
        Ok(self.http.request(method, url).headers(headers))
    }
}

/// Errors every mail endpoint shares, independent of the body.
fn mail_status_error(status: StatusCode) -> Option<ApiError> {
    match status {
        StatusCode::UNAUTHORIZED => Some(ApiError::Unauthorized(SESSION_EXPIRED.to_string())),
        StatusCode::INTERNAL_SERVER_ERROR => Some(ApiError::Server(SERVER_ERROR.to_string())),
        _ => None,
    }
}

fn detail_message(body: Option<ErrorBody>, fallback: &str) -> String {
    body.and_then(|body| body.detail)
        .map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
        .filter(|detail| !detail.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

async fn rejected(response: Response, fallback: &str) -> ApiError {
    let status = response.status();
    let detail = detail_message(response.json::<ErrorBody>().await.ok(), fallback);
    tracing::debug!(%status, %detail, "backend rejected request");
    ApiError::Rejected {
        status: status.as_u16(),
        detail,
    }
}

async fn mail_response(request: RequestBuilder, fallback: &str) -> Result<Response, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    if let Some(err) = mail_status_error(status) {
        tracing::warn!(%status, url = %response.url(), "mail endpoint failed");
        return Err(err);
    }
    if status.is_success() {
        Ok(response)
    } else {
        Err(rejected(response, fallback).await)
    }
}

async fn account_response(request: RequestBuilder, fallback: &str) -> Result<Response, ApiError> {
    let response = request.send().await?;
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(rejected(response, fallback).await)
    }
}

#[async_trait]
impl MailApi for BackendClient {
    async fn profile(&self) -> Result<MailProfile, ApiError> {
        let request = self.mail_request(Method::GET, self.url("gmail/profile")?)?;
        let response = mail_response(request, "Failed to load mail profile").await?;
        Ok(response.json().await?)
    }

    async fn list_messages(&self) -> Result<MessageList, ApiError> {
        let request = self.mail_request(Method::GET, self.url("gmail/messages")?)?;
        let response = mail_response(request, "Failed to fetch messages").await?;
        let list: MessageList = response.json().await?;
        tracing::debug!(count = list.messages.len(), "listed messages");
        Ok(list)
    }

    async fn message_detail(&self, message_id: &str) -> Result<MessageDetail, ApiError> {
        let url = self.url_with_segment("gmail/message/", message_id)?;
        let request = self.mail_request(Method::GET, url)?;
        let response = mail_response(request, "Failed to fetch email details").await?;
        Ok(response.json().await?)
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<(), ApiError> {
        let request = self
            .mail_request(Method::POST, self.url("gmail/send-email")?)?
            .json(mail);
        mail_response(request, "Failed to send email").await?;
        tracing::info!(to = %mail.to, "mail sent");
        Ok(())
    }

    async fn save_draft(&self, draft: &DraftMail) -> Result<(), ApiError> {
        let request = self
            .mail_request(Method::POST, self.url("gmail/save-draft")?)?
            .json(draft);
        mail_response(request, "Failed to save draft").await?;
        Ok(())
    }
}

#[async_trait]
impl AccountApi for BackendClient {
    async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let request = self
            .public_request(Method::POST, self.url("token")?)
            .json(&Credentials { email, password });
        let response = account_response(request, "Login failed").await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn register(&self, email: &str, password: &str) -> Result<Registration, ApiError> {
        let request = self
            .public_request(Method::POST, self.url("register")?)
            .json(&Credentials { email, password });
        let response = account_response(request, "Registration failed").await?;
        Ok(response.json().await?)
    }

    async fn verify_email(&self, token: &str) -> Result<String, ApiError> {
        let mut url = self.url("verify-email")?;
        url.query_pairs_mut().append_pair("token", token);
        let response = account_response(
            self.public_request(Method::GET, url),
            "Verification failed",
        )
        .await?;
        let body: MessageResponse = response.json().await?;
        Ok(body.msg)
    }

    async fn resend_verification(&self, email: &str) -> Result<String, ApiError> {
        let mut url = self.url("resend-verification")?;
        url.query_pairs_mut().append_pair("email", email);
        let response = account_response(
            self.public_request(Method::POST, url),
            "Failed to resend verification",
        )
        .await?;
        let body: MessageResponse = response.json().await?;
        Ok(body.msg)
    }

    async fn reset_mail_tokens(&self, email: &str) -> Result<(), ApiError> {
        let url = self.url_with_segment("reset-gmail-tokens/", email)?;
        let request = self.session_request(Method::DELETE, url)?;
        account_response(request, "Failed to reset mail tokens").await?;
        Ok(())
    }

    async fn delete_user(&self, email: &str) -> Result<(), ApiError> {
        let mut url = self.url("admin/delete-user")?;
        url.query_pairs_mut().append_pair("email", email);
        let request = self.session_request(Method::DELETE, url)?;
        account_response(request, "Failed to delete user").await?;
        Ok(())
    }
}
