use crate::SecurityError;
use mailpilot_core::CredentialUpdate;
use url::Url;

const SUCCESS: &str = "success";
const EMAIL: &str = "email";
const ACCESS_TOKEN: [&str; 2] = ["access_token", "token"];
const REFRESH_TOKEN: [&str; 2] = ["refresh_token", "refreshToken"];
const EXPIRY: [&str; 2] = ["token_expiry", "expiry"];

/// Credential handed back by the backend's mail authorization redirect.
#[derive(Debug, Clone)]
pub struct OAuthCallback {
    pub credential: CredentialUpdate,
    /// The callback URL without the consumed parameters.
    pub stripped_url: Url,
}

fn is_callback_param(key: &str) -> bool {
    key == SUCCESS
        || key == EMAIL
        || ACCESS_TOKEN.contains(&key)
        || REFRESH_TOKEN.contains(&key)
        || EXPIRY.contains(&key)
}

/// Removes every callback parameter, keeping unrelated query pairs in order.
pub fn strip_callback_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_callback_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// Reads the authorization result from a callback URL.
///
/// `Ok(None)` means the URL carries no callback parameters at all.
pub fn parse_callback(url: &Url) -> Result<Option<OAuthCallback>, SecurityError> {
    if !url.query_pairs().any(|(key, _)| is_callback_param(&key)) {
        return Ok(None);
    }

    let first_of = |names: &[&str]| {
        names.iter().find_map(|name| {
            url.query_pairs()
                .find(|(key, value)| key == name && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        })
    };

    if let Some(success) = first_of(&[SUCCESS]) {
        if !success.eq_ignore_ascii_case("true") {
            return Err(SecurityError::Rejected(
                "the mail provider did not authorize the connection".to_string(),
            ));
        }
    }

    let access_token = first_of(&ACCESS_TOKEN).ok_or_else(|| {
        SecurityError::IncompleteCallback("callback carried no access token".to_string())
    })?;

    Ok(Some(OAuthCallback {
        credential: CredentialUpdate {
            access_token: Some(access_token),
            refresh_token: first_of(&REFRESH_TOKEN),
            expiry: first_of(&EXPIRY),
            mail_address: first_of(&[EMAIL]),
        },
        stripped_url: strip_callback_params(url),
    }))
}
