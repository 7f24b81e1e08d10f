use mailpilot_ai::{AiReplyOutcome, FallbackReason, ReplySource};
use mailpilot_core::{
    Category, ColorTag, ConnectionStatus, EnrichedMessage, ErrorClass, MailProfile, MessageDetail,
    Page,
};
use mailpilot_email::{ListEvent, ListOutcome};

const LABEL_WIDTH: usize = 42;

pub fn row(message: &EnrichedMessage) -> String {
    let sender = message
        .details
        .as_ref()
        .map(|detail| detail.from.as_str())
        .unwrap_or("-");
    format!(
        "{:<width$} {:<14} {:<16} {}",
        message.friendly_name,
        format!("[{}]", message.category),
        message.id,
        sender,
        width = LABEL_WIDTH
    )
}

/// Progress line for one aggregator event.
pub fn event_line(event: &ListEvent) -> String {
    match event {
        ListEvent::Loading { .. } => "Loading messages...".to_string(),
        ListEvent::Appended { message, .. } => row(message),
        ListEvent::Settled { outcome, .. } => match outcome {
            ListOutcome::Success => "Connected".to_string(),
            ListOutcome::Error { class, message } => error_line(*class, message),
        },
    }
}

pub fn page(page: &Page<'_, EnrichedMessage>) -> String {
    if page.total_items == 0 {
        return "No messages found.".to_string();
    }
    if page.items.is_empty() {
        return format!(
            "No messages on page {} ({} pages, {} messages)\n",
            page.number, page.total_pages, page.total_items
        );
    }

    let mut out = format!(
        "Page {} of {} ({} messages)\n",
        page.number, page.total_pages, page.total_items
    );
    for message in page.items {
        out.push_str(&row(message));
        out.push('\n');
    }
    out
}

pub fn status(status: ConnectionStatus, profile: Option<&MailProfile>) -> String {
    match (status, profile) {
        (ConnectionStatus::Connected, Some(profile)) => format!(
            "Connected as {} ({} messages, {} threads)",
            profile.email_address, profile.messages_total, profile.threads_total
        ),
        (ConnectionStatus::Connected, None) => "Connected".to_string(),
        (ConnectionStatus::Disconnected, _) => {
            "Not connected. Run `mailpilot connect` to link your mail account.".to_string()
        }
    }
}

pub fn error_line(class: ErrorClass, message: &str) -> String {
    let hint = match class {
        ErrorClass::Unauthenticated | ErrorClass::Unauthorized => {
            " (run `mailpilot login` or `mailpilot connect`)"
        }
        ErrorClass::Transient => " (try again later)",
        ErrorClass::Validation | ErrorClass::DegradedContent => "",
    };
    format!("Error: {message}{hint}")
}

fn color_name(color: ColorTag) -> &'static str {
    match color {
        ColorTag::Blue => "blue",
        ColorTag::Purple => "purple",
        ColorTag::Orange => "orange",
        ColorTag::Green => "green",
        ColorTag::Pink => "pink",
        ColorTag::Gray => "gray",
        ColorTag::Yellow => "yellow",
        ColorTag::Indigo => "indigo",
    }
}

pub fn detail(detail: &MessageDetail, badge: (Category, ColorTag)) -> String {
    let (category, color) = badge;
    let body = if detail.body.trim().is_empty() {
        &detail.snippet
    } else {
        &detail.body
    };
    format!(
        "Subject: {}\nFrom:    {}\nTo:      {}\nDate:    {}\nLabel:   {} ({})\n\n{}\n",
        detail.subject,
        detail.from,
        detail.to,
        detail.date,
        category,
        color_name(color),
        body.trim()
    )
}

pub fn reply(outcome: &AiReplyOutcome) -> String {
    let source = match outcome.source {
        ReplySource::Ai => "AI reply".to_string(),
        ReplySource::Fallback(FallbackReason::WeakReply) => {
            "Fallback reply (AI reply too short)".to_string()
        }
        ReplySource::Fallback(FallbackReason::ServiceError { status }) => {
            format!("Fallback reply (AI service answered {status})")
        }
        ReplySource::Fallback(FallbackReason::Network) => {
            "Fallback reply (AI service unreachable)".to_string()
        }
    };
    format!(
        "Summary: {}\n\n{source}:\n{}\n",
        outcome.reply.summary, outcome.reply.reply
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailpilot_core::{paginate, AiReply, MessageSummary, Pagination};

    fn placeholder(id: &str) -> EnrichedMessage {
        EnrichedMessage::placeholder(&MessageSummary {
            id: id.to_string(),
            thread_id: "t".to_string(),
        })
    }

    #[test]
    fn empty_page_says_so() {
        let messages: Vec<EnrichedMessage> = Vec::new();
        assert_eq!(
            page(&paginate(&messages, &Pagination::default())),
            "No messages found."
        );
    }

    #[test]
    fn page_lists_rows_with_header() {
        let messages: Vec<_> = (0..12).map(|n| placeholder(&format!("msg{n:05}"))).collect();
        let rendered = page(&paginate(&messages, &Pagination::page(2, 10)));
        assert!(rendered.starts_with("Page 2 of 2 (12 messages)"));
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("[Unknown]"));
    }

    #[test]
    fn page_past_the_end_says_so() {
        let messages: Vec<_> = (0..23).map(|n| placeholder(&format!("msg{n:05}"))).collect();
        let rendered = page(&paginate(&messages, &Pagination::page(9, 10)));
        assert_eq!(rendered, "No messages on page 9 (3 pages, 23 messages)\n");
    }

    #[test]
    fn settled_error_carries_hint() {
        let line = event_line(&ListEvent::Settled {
            generation: 1,
            outcome: ListOutcome::Error {
                class: ErrorClass::Unauthorized,
                message: "Session expired.".to_string(),
            },
            status: Some(ConnectionStatus::Disconnected),
        });
        assert!(line.starts_with("Error: Session expired."));
        assert!(line.contains("mailpilot connect"));
    }

    #[test]
    fn reply_names_its_source() {
        let outcome = AiReplyOutcome {
            reply: AiReply {
                message_id: "m1".to_string(),
                summary: "Short.".to_string(),
                reply: "Thank you.".to_string(),
            },
            source: ReplySource::Fallback(FallbackReason::ServiceError { status: 502 }),
        };
        assert!(reply(&outcome).contains("AI service answered 502"));
    }
}
