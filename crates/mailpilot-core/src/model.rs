use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginSession {
    pub login_token: String,
    pub user_email: String,
}

impl fmt::Debug for LoginSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSession")
            .field("login_token", &"[REDACTED]")
            .field("user_email", &self.user_email)
            .finish()
    }
}

/// OAuth-style credential for the mail provider, as held on the client.
///
/// Holding an access token says nothing about its validity; see
/// `MailCredential::is_valid_at`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Raw expiry as received from the backend.
    pub expiry: Option<String>,
    pub mail_address: Option<String>,
}

impl MailCredential {
    /// Parsed expiry. `None` when no expiry is recorded or it cannot be read.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry.as_deref().and_then(parse_expiry)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at() {
            Some(expiry) => now < expiry,
            None => true,
        }
    }
}

impl fmt::Debug for MailCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCredential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expiry", &self.expiry)
            .field("mail_address", &self.mail_address)
            .finish()
    }
}

/// Partial write to the mail credential. `None` fields leave stored values alone.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expiry: Option<String>,
    pub mail_address: Option<String>,
}

impl CredentialUpdate {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.expiry.is_none()
            && self.mail_address.is_none()
    }
}

impl fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expiry", &self.expiry)
            .field("mail_address", &self.mail_address)
            .finish()
    }
}

/// Accepts RFC 3339, naive ISO-8601 (read as UTC) and integer epochs in
/// seconds or milliseconds.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    let epoch = raw.parse::<i64>().ok()?;
    if epoch.abs() >= 1_000_000_000_000 {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MailProfile {
    #[serde(rename = "emailAddress")]
    pub email_address: String,
    #[serde(rename = "messagesTotal", default)]
    pub messages_total: u64,
    #[serde(rename = "threadsTotal", default)]
    pub threads_total: u64,
    #[serde(rename = "historyId", default)]
    pub history_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDetail {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub body: String,
}

impl MessageDetail {
    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            id: self.id.clone(),
            thread_id: self.thread_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Career,
    Professional,
    Gaming,
    Shopping,
    Finance,
    Social,
    Development,
    Marketing,
    Newsletter,
    Personal,
    Automated,
    General,
    Unknown,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Career => "Career",
            Self::Professional => "Professional",
            Self::Gaming => "Gaming",
            Self::Shopping => "Shopping",
            Self::Finance => "Finance",
            Self::Social => "Social",
            Self::Development => "Development",
            Self::Marketing => "Marketing",
            Self::Newsletter => "Newsletter",
            Self::Personal => "Personal",
            Self::Automated => "Automated",
            Self::General => "General",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge colour for a category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColorTag {
    Blue,
    Purple,
    Orange,
    Green,
    Pink,
    Gray,
    Yellow,
    Indigo,
}

/// Display metadata derived from a message detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Labeling {
    pub label: String,
    pub category: Category,
    pub color: ColorTag,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichedMessage {
    pub id: String,
    pub thread_id: String,
    pub details: Option<MessageDetail>,
    pub friendly_name: String,
    pub category: Category,
    pub color: ColorTag,
}

impl EnrichedMessage {
    pub fn from_detail(summary: &MessageSummary, detail: MessageDetail, labeling: Labeling) -> Self {
        Self {
            id: summary.id.clone(),
            thread_id: summary.thread_id.clone(),
            details: Some(detail),
            friendly_name: labeling.label,
            category: labeling.category,
            color: labeling.color,
        }
    }

    /// Entry for a message whose detail is unavailable.
    pub fn placeholder(summary: &MessageSummary) -> Self {
        let short_id: String = summary.id.chars().take(8).collect();
        Self {
            id: summary.id.clone(),
            thread_id: summary.thread_id.clone(),
            details: None,
            friendly_name: format!("Email {short_id}..."),
            category: Category::Unknown,
            color: ColorTag::Gray,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiReply {
    pub message_id: String,
    pub summary: String,
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Window for a 1-based page number.
    pub fn page(number: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        Self {
            limit: per_page,
            offset: number.saturating_sub(1) * per_page,
        }
    }
}

/// Rendered window over an already fetched collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

pub fn paginate<'a, T>(items: &'a [T], window: &Pagination) -> Page<'a, T> {
    let limit = window.limit.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(limit).max(1);
    let start = window.offset.min(total_items);
    let end = start.saturating_add(limit).min(total_items);

    Page {
        items: &items[start..end],
        number: window.offset / limit + 1,
        total_pages,
        total_items,
    }
}
