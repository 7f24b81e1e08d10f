use crate::{ApiError, MailApi};
use mailpilot_core::{DraftMail, MessageDetail, OutgoingMail};
use std::sync::Arc;
use url::Url;

/// Outgoing mail with the checks the backend expects to have been made.
#[derive(Clone)]
pub struct ComposeService {
    api: Arc<dyn MailApi>,
}

impl ComposeService {
    pub fn new(api: Arc<dyn MailApi>) -> Self {
        Self { api }
    }

    pub async fn send(&self, mail: &OutgoingMail) -> Result<(), ApiError> {
        let blank = [&mail.to, &mail.subject, &mail.body]
            .iter()
            .any(|field| field.trim().is_empty());
        if blank {
            return Err(ApiError::Validation(
                "Please fill in all required fields".to_string(),
            ));
        }
        self.api.send(mail).await
    }

    pub async fn save_draft(&self, draft: &DraftMail) -> Result<(), ApiError> {
        if draft.body.trim().is_empty() {
            return Err(ApiError::Validation(
                "Please enter email content".to_string(),
            ));
        }
        self.api.save_draft(draft).await?;
        tracing::info!("draft saved");
        Ok(())
    }
}

/// Provider compose page prefilled with a reply to `detail`.
pub fn reply_compose_url(
    compose_base: &Url,
    detail: &MessageDetail,
    text: &str,
) -> Result<Url, ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::Validation(
            "Please enter a reply message".to_string(),
        ));
    }

    let subject = if detail.subject.to_lowercase().starts_with("re:") {
        detail.subject.clone()
    } else {
        format!("Re: {}", detail.subject)
    };

    let mut url = compose_base.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("view", "cm")
        .append_pair("fs", "1")
        .append_pair("to", &detail.from)
        .append_pair("su", &subject)
        .append_pair("body", text);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailpilot_core::{ErrorClass, MailProfile, MessageList};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingApi {
        sent: Mutex<Vec<OutgoingMail>>,
        drafts: Mutex<Vec<DraftMail>>,
    }

    #[async_trait]
    impl MailApi for RecordingApi {
        async fn profile(&self) -> Result<MailProfile, ApiError> {
            Err(ApiError::Validation("unused".to_string()))
        }

        async fn list_messages(&self) -> Result<MessageList, ApiError> {
            Ok(MessageList::default())
        }

        async fn message_detail(&self, _: &str) -> Result<MessageDetail, ApiError> {
            Err(ApiError::Validation("unused".to_string()))
        }

        async fn send(&self, mail: &OutgoingMail) -> Result<(), ApiError> {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }

        async fn save_draft(&self, draft: &DraftMail) -> Result<(), ApiError> {
            self.drafts.lock().unwrap().push(draft.clone());
            Ok(())
        }
    }

    fn mail(to: &str, subject: &str, body: &str) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            in_reply_to: None,
        }
    }

    #[tokio::test]
    async fn blank_fields_never_reach_the_backend() {
        let api = Arc::new(RecordingApi::default());
        let compose = ComposeService::new(api.clone());

        let err = compose
            .send(&mail("dana@acme.com", "  ", "Hello"))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);

        let err = compose
            .save_draft(&DraftMail {
                to: String::new(),
                subject: String::new(),
                body: "\n".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please enter email content");

        assert!(api.sent.lock().unwrap().is_empty());
        assert!(api.drafts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn complete_mail_is_sent() {
        let api = Arc::new(RecordingApi::default());
        let compose = ComposeService::new(api.clone());

        compose
            .send(&mail("dana@acme.com", "Plan", "See attached notes."))
            .await
            .unwrap();
        compose
            .save_draft(&DraftMail {
                to: String::new(),
                subject: String::new(),
                body: "Draft text".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(api.sent.lock().unwrap().len(), 1);
        assert_eq!(api.drafts.lock().unwrap().len(), 1);
    }

    fn detail(subject: &str) -> MessageDetail {
        MessageDetail {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            subject: subject.to_string(),
            from: "dana@acme.com".to_string(),
            to: String::new(),
            date: String::new(),
            snippet: String::new(),
            body: String::new(),
        }
    }

    #[test]
    fn compose_url_prefills_reply() {
        let base = Url::parse("https://mail.google.com/mail/").unwrap();
        let url = reply_compose_url(&base, &detail("Hello"), "Sounds good").unwrap();
        assert_eq!(
            url.as_str(),
            "https://mail.google.com/mail/?view=cm&fs=1&to=dana%40acme.com&su=Re%3A+Hello&body=Sounds+good"
        );

        let url = reply_compose_url(&base, &detail("RE: Hello"), "ok").unwrap();
        let subject = url
            .query_pairs()
            .find(|(key, _)| key == "su")
            .map(|(_, value)| value.into_owned());
        assert_eq!(subject.as_deref(), Some("RE: Hello"));
    }

    #[test]
    fn compose_url_requires_text() {
        let base = Url::parse("https://mail.google.com/mail/").unwrap();
        assert!(reply_compose_url(&base, &detail("Hello"), "   ").is_err());
    }
}
