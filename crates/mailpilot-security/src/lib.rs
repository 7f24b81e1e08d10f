mod callback;
mod credentials;
mod error;
mod keychain;
mod session;

pub use callback::{parse_callback, strip_callback_params, OAuthCallback};
pub use credentials::MailCredentialStore;
pub use error::SecurityError;
pub use keychain::KeychainStore;
pub use session::LoginSessionStore;
