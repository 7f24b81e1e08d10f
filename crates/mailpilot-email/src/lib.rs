mod account;
mod aggregator;
mod backend;
mod compose;
mod connection;
mod error;

pub use account::AccountService;
pub use aggregator::{
    ListEvent, ListOutcome, ListPhase, ListState, MessageAggregator, DEFAULT_FETCH_LIMIT,
};
pub use backend::{AccountApi, BackendClient, MailApi, Registration};
pub use compose::{reply_compose_url, ComposeService};
pub use connection::{ConnectionCheck, ConnectionManager};
pub use error::ApiError;
