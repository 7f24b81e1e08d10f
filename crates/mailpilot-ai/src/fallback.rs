use mailpilot_core::{Category, ColorTag, Labeling, MessageDetail};
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_SIGNATURE: &str = "Best regards";

const SUBJECT_PREVIEW_CHARS: usize = 30;

/// Lower-cased view of the fields the rules look at.
struct Signals<'a> {
    detail: &'a MessageDetail,
    from: String,
    subject: String,
}

impl<'a> Signals<'a> {
    fn new(detail: &'a MessageDetail) -> Self {
        Self {
            detail,
            from: detail.from.to_lowercase(),
            subject: detail.subject.to_lowercase(),
        }
    }

    fn from_has(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.from.contains(*needle))
    }

    fn subject_has(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.subject.contains(*needle))
    }

    fn sender_name(&self) -> String {
        sender_name(&self.detail.from)
    }
}

struct CategoryRule {
    applies: fn(&Signals<'_>) -> bool,
    label: fn(&Signals<'_>) -> Labeling,
}

// Evaluated top to bottom; the first rule that applies wins.
const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        applies: is_career_platform,
        label: career_platform,
    },
    CategoryRule {
        applies: is_gaming,
        label: gaming,
    },
    CategoryRule {
        applies: is_shopping,
        label: shopping,
    },
    CategoryRule {
        applies: is_finance,
        label: finance,
    },
    CategoryRule {
        applies: is_social,
        label: social,
    },
    CategoryRule {
        applies: is_developer,
        label: developer,
    },
    CategoryRule {
        applies: is_bulk_sender,
        label: bulk_sender,
    },
    CategoryRule {
        applies: is_personal,
        label: personal,
    },
];

/// Friendly label, category and colour for a message.
pub fn categorize(detail: &MessageDetail) -> Labeling {
    let signals = Signals::new(detail);
    CATEGORY_RULES
        .iter()
        .find(|rule| (rule.applies)(&signals))
        .map(|rule| (rule.label)(&signals))
        .unwrap_or_else(|| general(&signals))
}

fn labeled(label: String, category: Category, color: ColorTag) -> Labeling {
    Labeling {
        label,
        category,
        color,
    }
}

fn first_match(haystack: &str, names: &[(&str, &'static str)], otherwise: &'static str) -> &'static str {
    names
        .iter()
        .find(|(needle, _)| haystack.contains(*needle))
        .map(|(_, name)| *name)
        .unwrap_or(otherwise)
}

fn is_career_platform(s: &Signals<'_>) -> bool {
    s.from_has(&["linkedin"])
}

fn career_platform(s: &Signals<'_>) -> Labeling {
    if s.subject_has(&["job", "alert"]) {
        let headline = s
            .detail
            .subject
            .split(':')
            .next()
            .filter(|part| !part.is_empty())
            .unwrap_or("New Opportunities");
        return labeled(
            format!("LinkedIn Job Alert - {headline}"),
            Category::Career,
            ColorTag::Blue,
        );
    }
    labeled(
        format!("LinkedIn - {}", s.sender_name()),
        Category::Professional,
        ColorTag::Blue,
    )
}

fn is_gaming(s: &Signals<'_>) -> bool {
    s.from_has(&["epic", "steam", "ubisoft"])
}

fn gaming(s: &Signals<'_>) -> Labeling {
    let platform = first_match(
        &s.from,
        &[("epic", "Epic Games"), ("steam", "Steam")],
        "Gaming Platform",
    );
    let label = if s.subject_has(&["sale", "offer"]) {
        format!("{platform} Sale Alert")
    } else {
        format!("{platform} Update")
    };
    labeled(label, Category::Gaming, ColorTag::Purple)
}

fn is_shopping(s: &Signals<'_>) -> bool {
    s.from_has(&["amazon", "flipkart", "myntra"])
}

fn shopping(s: &Signals<'_>) -> Labeling {
    let store = first_match(
        &s.from,
        &[("amazon", "Amazon"), ("flipkart", "Flipkart")],
        "Shopping",
    );
    let label = if s.subject_has(&["order", "delivery"]) {
        format!("{store} Order Update")
    } else if s.subject_has(&["sale", "deal"]) {
        format!("{store} Deal Alert")
    } else {
        format!("{store} Notification")
    };
    labeled(label, Category::Shopping, ColorTag::Orange)
}

fn is_finance(s: &Signals<'_>) -> bool {
    s.from_has(&["bank", "paytm", "phonepe", "gpay"])
}

fn finance(s: &Signals<'_>) -> Labeling {
    let service = first_match(
        &s.from,
        &[
            ("paytm", "Paytm"),
            ("phonepe", "PhonePe"),
            ("gpay", "Google Pay"),
        ],
        "Bank",
    );
    let label = if s.subject_has(&["transaction", "payment"]) {
        format!("{service} Transaction Alert")
    } else {
        format!("{service} Update")
    };
    labeled(label, Category::Finance, ColorTag::Green)
}

fn is_social(s: &Signals<'_>) -> bool {
    s.from_has(&["facebook", "instagram", "twitter"])
}

fn social(s: &Signals<'_>) -> Labeling {
    let platform = first_match(
        &s.from,
        &[("facebook", "Facebook"), ("instagram", "Instagram")],
        "Twitter",
    );
    labeled(
        format!("{platform} Notification"),
        Category::Social,
        ColorTag::Pink,
    )
}

fn is_developer(s: &Signals<'_>) -> bool {
    s.from_has(&["github", "gitlab", "stackoverflow"])
}

fn developer(s: &Signals<'_>) -> Labeling {
    let platform = first_match(
        &s.from,
        &[("github", "GitHub"), ("gitlab", "GitLab")],
        "Stack Overflow",
    );
    labeled(
        format!("{platform} Update"),
        Category::Development,
        ColorTag::Gray,
    )
}

fn is_bulk_sender(s: &Signals<'_>) -> bool {
    s.from_has(&["noreply", "no-reply"]) || s.subject_has(&["newsletter"])
}

fn bulk_sender(s: &Signals<'_>) -> Labeling {
    let company = company_name(&s.detail.from);
    if s.subject_has(&["sale", "offer", "deal"]) {
        return labeled(
            format!("{company} Promotion"),
            Category::Marketing,
            ColorTag::Yellow,
        );
    }
    labeled(
        format!("{company} Newsletter"),
        Category::Newsletter,
        ColorTag::Gray,
    )
}

/// First label of the sender's domain, capitalised.
fn company_name(from: &str) -> String {
    let label = from
        .split('@')
        .nth(1)
        .and_then(|domain| domain.split('.').next())
        .filter(|label| !label.is_empty())
        .unwrap_or("Newsletter");
    capitalize(label)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_personal(s: &Signals<'_>) -> bool {
    !s.detail.from.contains('<')
}

fn personal(s: &Signals<'_>) -> Labeling {
    labeled(
        format!("Personal - {}", s.sender_name()),
        Category::Personal,
        ColorTag::Indigo,
    )
}

fn general(s: &Signals<'_>) -> Labeling {
    let subject = &s.detail.subject;
    let label = if subject.is_empty() {
        format!("Email from {}", s.sender_name())
    } else if subject.chars().count() > SUBJECT_PREVIEW_CHARS {
        let preview: String = subject.chars().take(SUBJECT_PREVIEW_CHARS).collect();
        format!("{preview}...")
    } else {
        subject.clone()
    };
    labeled(label, Category::General, ColorTag::Gray)
}

/// Name shown in list rows: the text before `<`, or the address local part.
pub fn sender_name(from: &str) -> String {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(.+?)\s*<").ok())
        .as_ref()
        .and_then(|re| re.captures(from))
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().trim().to_string())
        .unwrap_or_else(|| from.split('@').next().unwrap_or_default().to_string())
}

/// Display name of `Name <address>`, or the whole header when it has no name.
pub fn display_name(from: &str) -> String {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(.+)\s<.+>$").ok())
        .as_ref()
        .and_then(|re| re.captures(from))
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().trim().to_string())
        .unwrap_or_else(|| from.trim().to_string())
}

/// Badge shown next to an opened message.
pub fn quick_category(detail: &MessageDetail) -> (Category, ColorTag) {
    let domain = sender_domain(&detail.from).to_lowercase();
    let subject = detail.subject.to_lowercase();

    if domain.contains("linkedin") {
        (Category::Professional, ColorTag::Blue)
    } else if domain.contains("github") || domain.contains("gitlab") {
        (Category::Development, ColorTag::Purple)
    } else if subject.contains("job") || subject.contains("career") {
        (Category::Career, ColorTag::Green)
    } else if domain.contains("noreply") || domain.contains("no-reply") {
        (Category::Automated, ColorTag::Gray)
    } else if subject.contains("sale") || subject.contains("offer") {
        (Category::Marketing, ColorTag::Orange)
    } else {
        (Category::General, ColorTag::Gray)
    }
}

fn sender_domain(from: &str) -> &str {
    let address = match (from.find('<'), from.rfind('>')) {
        (Some(start), Some(end)) if end > start + 1 => &from[start + 1..end],
        _ => from,
    };
    address.split('@').nth(1).unwrap_or_default()
}

struct ReplyRule {
    applies: fn(&Signals<'_>) -> bool,
    compose: fn(&Signals<'_>) -> String,
}

const REPLY_RULES: &[ReplyRule] = &[
    ReplyRule {
        applies: is_job_alert,
        compose: job_alert_reply,
    },
    ReplyRule {
        applies: is_application,
        compose: application_reply,
    },
    ReplyRule {
        applies: is_job,
        compose: job_reply,
    },
    ReplyRule {
        applies: is_promotional,
        compose: promotional_reply,
    },
    ReplyRule {
        applies: is_update,
        compose: update_reply,
    },
    ReplyRule {
        applies: is_business,
        compose: business_reply,
    },
];

fn is_job(s: &Signals<'_>) -> bool {
    s.subject_has(&["job", "career", "position", "analyst", "developer", "engineer"])
        || s.from_has(&["linkedin", "naukri", "indeed"])
}

fn is_job_alert(s: &Signals<'_>) -> bool {
    s.from_has(&["linkedin"]) && s.subject_has(&["alert", "recommendation"])
}

fn job_alert_reply(_: &Signals<'_>) -> String {
    "Dear LinkedIn Team,\n\n\
     Thank you for sending me these job recommendations. I am actively looking for new \
     opportunities and will go through the roles you shared.\n\n\
     Please keep me updated with similar positions."
        .to_string()
}

fn is_application(s: &Signals<'_>) -> bool {
    is_job(s) && s.subject_has(&["application", "interview"])
}

fn application_reply(_: &Signals<'_>) -> String {
    "Dear Hiring Manager,\n\n\
     Thank you for your email regarding the position. I am very interested in this \
     opportunity and would welcome the chance to discuss how I can contribute to your team.\n\n\
     I am available for an interview at your convenience. Please let me know the next steps \
     in the process.\n\n\
     Looking forward to hearing from you."
        .to_string()
}

fn job_reply(_: &Signals<'_>) -> String {
    "Dear Hiring Team,\n\n\
     Thank you for reaching out about this opportunity. I would like to learn more about the \
     position and how my background might be a good fit.\n\n\
     Please let me know if you need any additional information from my end."
        .to_string()
}

fn is_promotional(s: &Signals<'_>) -> bool {
    s.subject_has(&["sale", "offer", "discount", "deal"]) || s.from_has(&["noreply", "marketing"])
}

fn promotional_reply(_: &Signals<'_>) -> String {
    "Thank you for your email.\n\n\
     I appreciate you thinking of me for this offer. I will review the details and get back \
     to you if I am interested."
        .to_string()
}

fn is_update(s: &Signals<'_>) -> bool {
    s.subject_has(&["newsletter", "update", "news", "weekly", "monthly"])
}

fn update_reply(_: &Signals<'_>) -> String {
    "Thank you for the update.\n\n\
     I appreciate you keeping me informed. I will review the information you have shared."
        .to_string()
}

fn is_business(s: &Signals<'_>) -> bool {
    s.from_has(&["company", "team"]) || s.subject_has(&["meeting", "project", "collaboration"])
}

fn business_reply(s: &Signals<'_>) -> String {
    format!(
        "Dear {},\n\n\
         Thank you for your email. I have reviewed the information you shared and appreciate \
         you reaching out.\n\n\
         I would be glad to discuss this further. Please let me know if you need anything else \
         from my side or if there are next steps we should take.\n\n\
         I look forward to your response.",
        salutation(s, "Team")
    )
}

fn formal_reply(s: &Signals<'_>) -> String {
    format!(
        "Dear {},\n\n\
         Thank you for your email. I have received your message and will review it carefully.\n\n\
         I will get back to you with a proper response soon. If this is urgent, please feel \
         free to follow up.",
        salutation(s, "Sir/Madam")
    )
}

fn salutation(s: &Signals<'_>, otherwise: &str) -> String {
    let name = display_name(&s.detail.from);
    if name.is_empty() {
        otherwise.to_string()
    } else {
        name
    }
}

/// Locally generated reply text, used when the AI reply is missing or unusable.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    signature: String,
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE)
    }
}

impl FallbackGenerator {
    pub fn new(signature: impl Into<String>) -> Self {
        let signature = signature.into();
        let signature = if signature.trim().is_empty() {
            DEFAULT_SIGNATURE.to_string()
        } else {
            signature
        };
        Self { signature }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Never returns blank text. `None` gets a generic closing.
    pub fn synthesize_reply(&self, detail: Option<&MessageDetail>) -> String {
        let body = match detail {
            Some(detail) => {
                let signals = Signals::new(detail);
                REPLY_RULES
                    .iter()
                    .find(|rule| (rule.applies)(&signals))
                    .map(|rule| (rule.compose)(&signals))
                    .unwrap_or_else(|| formal_reply(&signals))
            }
            None => "Thank you for your email. I will review it and get back to you soon.".to_string(),
        };
        format!("{body}\n\n{}", self.signature)
    }
}
