use crate::{AiError, FallbackGenerator};
use async_trait::async_trait;
use mailpilot_core::{AiReply, MessageDetail};
use mailpilot_security::{LoginSessionStore, MailCredentialStore};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Body of a successful `ai-reply` response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawReply {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub reply: String,
}

/// What came back from one call to the AI reply endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyAttempt {
    Answered(RawReply),
    /// Non-success status, or a success body that is not a reply.
    Rejected { status: u16 },
    /// The request never produced a response.
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    WeakReply,
    ServiceError { status: u16 },
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Ai,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiReplyOutcome {
    pub reply: AiReply,
    pub source: ReplySource,
}

impl AiReplyOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ReplySource::Fallback(_))
    }
}

#[async_trait]
pub trait ReplyEndpoint: Send + Sync {
    async fn request_reply(
        &self,
        message_id: &str,
        login_token: &str,
        mail_token: &str,
    ) -> Result<ReplyAttempt, AiError>;
}

/// `POST {base}gmail/ai-reply/{id}?token=<mail token>` with the login bearer.
#[derive(Clone)]
pub struct HttpReplyEndpoint {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpReplyEndpoint {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, AiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    fn reply_url(&self, message_id: &str, mail_token: &str) -> Result<Url, AiError> {
        let mut url = self.base_url.join("gmail/ai-reply/")?;
        url.path_segments_mut()
            .map_err(|_| AiError::Config(format!("base url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push(message_id);
        url.query_pairs_mut().append_pair("token", mail_token);
        Ok(url)
    }
}

#[async_trait]
impl ReplyEndpoint for HttpReplyEndpoint {
    async fn request_reply(
        &self,
        message_id: &str,
        login_token: &str,
        mail_token: &str,
    ) -> Result<ReplyAttempt, AiError> {
        let url = self.reply_url(message_id, mail_token)?;

        let response = match self
            .http
            .post(url)
            .bearer_auth(login_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Ok(ReplyAttempt::Unreachable(err.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %detail, message_id, "ai reply request failed");
            return Ok(ReplyAttempt::Rejected {
                status: status.as_u16(),
            });
        }

        match response.json::<RawReply>().await {
            Ok(raw) => Ok(ReplyAttempt::Answered(raw)),
            Err(err) => {
                tracing::warn!(message_id, "ai reply body did not parse: {err}");
                Ok(ReplyAttempt::Rejected {
                    status: status.as_u16(),
                })
            }
        }
    }
}

const WEAK_REPLY_SUMMARY: &str = "This email requires your attention.";
const FALLBACK_NOTE: &str = "The AI reply was too short, so a fallback reply was written locally.";
const SERVICE_ERROR_SUMMARY: &str =
    "Unable to generate AI summary, but here's a fallback reply based on the email content.";
const NETWORK_SUMMARY: &str =
    "Network error occurred, but here's a fallback reply based on the email content.";

/// Decides between the AI reply and the local fallback.
///
/// The AI reply is kept only when its trimmed length exceeds `min_reply_chars`.
pub fn resolve_reply(
    message_id: &str,
    attempt: ReplyAttempt,
    detail: Option<&MessageDetail>,
    generator: &FallbackGenerator,
    min_reply_chars: usize,
) -> AiReplyOutcome {
    let (summary, reason) = match attempt {
        ReplyAttempt::Answered(raw) if raw.reply.trim().chars().count() > min_reply_chars => {
            return AiReplyOutcome {
                reply: AiReply {
                    message_id: raw.message_id.unwrap_or_else(|| message_id.to_string()),
                    summary: raw.summary,
                    reply: raw.reply,
                },
                source: ReplySource::Ai,
            };
        }
        ReplyAttempt::Answered(raw) => {
            let summary = if raw.summary.trim().is_empty() {
                WEAK_REPLY_SUMMARY
            } else {
                raw.summary.trim()
            };
            (
                format!("{summary} {FALLBACK_NOTE}"),
                FallbackReason::WeakReply,
            )
        }
        ReplyAttempt::Rejected { status } => (
            SERVICE_ERROR_SUMMARY.to_string(),
            FallbackReason::ServiceError { status },
        ),
        ReplyAttempt::Unreachable(_) => (NETWORK_SUMMARY.to_string(), FallbackReason::Network),
    };

    AiReplyOutcome {
        reply: AiReply {
            message_id: message_id.to_string(),
            summary,
            reply: generator.synthesize_reply(detail),
        },
        source: ReplySource::Fallback(reason),
    }
}

#[derive(Clone)]
pub struct AiService {
    endpoint: Arc<dyn ReplyEndpoint>,
    sessions: LoginSessionStore,
    credentials: MailCredentialStore,
    generator: FallbackGenerator,
    min_reply_chars: usize,
}

impl AiService {
    pub fn new(
        endpoint: Arc<dyn ReplyEndpoint>,
        sessions: LoginSessionStore,
        credentials: MailCredentialStore,
        generator: FallbackGenerator,
        min_reply_chars: usize,
    ) -> Self {
        Self {
            endpoint,
            sessions,
            credentials,
            generator,
            min_reply_chars,
        }
    }

    pub fn generator(&self) -> &FallbackGenerator {
        &self.generator
    }

    /// Summary and reply for one message. Fails only when a credential is
    /// missing locally; every remote problem degrades to the fallback reply.
    pub async fn generate_reply(
        &self,
        message_id: &str,
        detail: Option<&MessageDetail>,
    ) -> Result<AiReplyOutcome, AiError> {
        let login_token = self.sessions.bearer()?;
        let mail_token = self.credentials.access_token()?;

        let attempt = self
            .endpoint
            .request_reply(message_id, &login_token, &mail_token)
            .await?;
        if let ReplyAttempt::Unreachable(reason) = &attempt {
            tracing::warn!(message_id, %reason, "ai reply endpoint unreachable");
        }

        let outcome = resolve_reply(
            message_id,
            attempt,
            detail,
            &self.generator,
            self.min_reply_chars,
        );
        match outcome.source {
            ReplySource::Ai => tracing::debug!(message_id, "ai reply accepted"),
            ReplySource::Fallback(reason) => {
                tracing::info!(message_id, ?reason, "using fallback reply")
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailpilot_core::{CredentialUpdate, ErrorClass, LoginSession};
    use mailpilot_storage::MemoryStore;
    use std::sync::Mutex;

    struct FakeEndpoint {
        attempt: ReplyAttempt,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeEndpoint {
        fn new(attempt: ReplyAttempt) -> Arc<Self> {
            Arc::new(Self {
                attempt,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplyEndpoint for FakeEndpoint {
        async fn request_reply(
            &self,
            message_id: &str,
            login_token: &str,
            mail_token: &str,
        ) -> Result<ReplyAttempt, AiError> {
            self.calls.lock().unwrap().push((
                message_id.to_string(),
                login_token.to_string(),
                mail_token.to_string(),
            ));
            Ok(self.attempt.clone())
        }
    }

    fn detail() -> MessageDetail {
        MessageDetail {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            subject: "Project kickoff meeting".to_string(),
            from: "Dana Lee <dana@acme.com>".to_string(),
            to: "me@gmail.com".to_string(),
            date: String::new(),
            snippet: "Can we meet Thursday?".to_string(),
            body: "Can we meet Thursday to plan the project?".to_string(),
        }
    }

    fn service(endpoint: Arc<FakeEndpoint>, logged_in: bool) -> AiService {
        let store = MemoryStore::shared();
        let sessions = LoginSessionStore::new(store.clone());
        let credentials = MailCredentialStore::new(store);
        if logged_in {
            sessions
                .store(&LoginSession {
                    login_token: "jwt".to_string(),
                    user_email: "me@example.com".to_string(),
                })
                .unwrap();
        }
        credentials
            .store_credential(&CredentialUpdate {
                access_token: Some("ya29.mail".to_string()),
                ..CredentialUpdate::default()
            })
            .unwrap();
        AiService::new(
            endpoint,
            sessions,
            credentials,
            FallbackGenerator::default(),
            50,
        )
    }

    fn answered(summary: &str, reply: &str) -> ReplyAttempt {
        ReplyAttempt::Answered(RawReply {
            message_id: None,
            summary: summary.to_string(),
            reply: reply.to_string(),
        })
    }

    #[tokio::test]
    async fn short_ai_reply_is_replaced_by_fallback() {
        let endpoint = FakeEndpoint::new(answered("Says thanks.", "thanks"));
        let ai = service(endpoint.clone(), true);

        let outcome = ai.generate_reply("m1", Some(&detail())).await.unwrap();
        assert_eq!(outcome.source, ReplySource::Fallback(FallbackReason::WeakReply));
        assert!(outcome.reply.summary.starts_with("Says thanks."));
        assert!(outcome.reply.summary.contains("fallback"));
        assert!(outcome.reply.reply.starts_with("Dear Dana Lee,"));
        assert_eq!(
            endpoint.calls(),
            vec![("m1".to_string(), "jwt".to_string(), "ya29.mail".to_string())]
        );
    }

    #[tokio::test]
    async fn substantial_ai_reply_is_kept() {
        let text = "Thursday works for me. I will bring the draft plan and the open questions.";
        let ai = service(FakeEndpoint::new(answered("Meeting request.", text)), true);

        let outcome = ai.generate_reply("m1", Some(&detail())).await.unwrap();
        assert_eq!(outcome.source, ReplySource::Ai);
        assert_eq!(outcome.reply.reply, text);
        assert_eq!(outcome.reply.message_id, "m1");
        assert!(!outcome.is_fallback());
    }

    #[tokio::test]
    async fn service_error_degrades_to_fallback() {
        let ai = service(FakeEndpoint::new(ReplyAttempt::Rejected { status: 500 }), true);

        let outcome = ai.generate_reply("m1", Some(&detail())).await.unwrap();
        assert_eq!(
            outcome.source,
            ReplySource::Fallback(FallbackReason::ServiceError { status: 500 })
        );
        assert!(outcome.reply.summary.contains("fallback"));
        assert!(!outcome.reply.reply.trim().is_empty());
    }

    #[tokio::test]
    async fn network_failure_without_detail_still_replies() {
        let ai = service(
            FakeEndpoint::new(ReplyAttempt::Unreachable("connection refused".to_string())),
            true,
        );

        let outcome = ai.generate_reply("m1", None).await.unwrap();
        assert_eq!(outcome.source, ReplySource::Fallback(FallbackReason::Network));
        assert!(outcome.reply.summary.starts_with("Network error"));
        assert!(outcome.reply.reply.starts_with("Thank you for your email."));
    }

    #[tokio::test]
    async fn missing_login_session_fails_before_any_request() {
        let endpoint = FakeEndpoint::new(answered("", ""));
        let ai = service(endpoint.clone(), false);

        let err = ai.generate_reply("m1", Some(&detail())).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Unauthenticated);
        assert!(endpoint.calls().is_empty());
    }

    #[test]
    fn threshold_is_exclusive() {
        let generator = FallbackGenerator::default();
        let exactly = "x".repeat(50);
        let outcome = resolve_reply("m1", answered("", &exactly), None, &generator, 50);
        assert!(outcome.is_fallback());
        assert!(outcome.reply.summary.starts_with(WEAK_REPLY_SUMMARY));

        let padded = format!("   {}   ", "x".repeat(51));
        let outcome = resolve_reply("m1", answered("", &padded), None, &generator, 50);
        assert_eq!(outcome.source, ReplySource::Ai);
    }

    #[test]
    fn reply_url_carries_mail_token() {
        let endpoint = HttpReplyEndpoint::new(
            Url::parse("https://api.example.com/").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        let url = endpoint.reply_url("18c2f0", "ya29.a b").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/gmail/ai-reply/18c2f0?token=ya29.a+b"
        );
    }
}
