mod error;
mod fallback;
mod service;

pub use error::AiError;
pub use fallback::{
    categorize, display_name, quick_category, sender_name, FallbackGenerator, DEFAULT_SIGNATURE,
};
pub use service::{
    resolve_reply, AiReplyOutcome, AiService, FallbackReason, HttpReplyEndpoint, RawReply,
    ReplyAttempt, ReplyEndpoint, ReplySource,
};
