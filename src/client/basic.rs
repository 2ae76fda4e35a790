//! Basic authentication, sent only when the server asks for it.

use super::authorization::basic_header_value;
use super::retry::{Challenge, CredentialUpgrade, RetryOnUnauthorizedLayer, UpgradeFuture};

/// Answers any 401 with `Authorization: Basic <base64(username:password)>`.
#[derive(Clone)]
pub struct BasicUpgrade {
    username: String,
    password: String,
}

impl BasicUpgrade {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        BasicUpgrade {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialUpgrade for BasicUpgrade {
    fn upgrade(&self, _challenge: Challenge) -> UpgradeFuture {
        let value = basic_header_value(&self.username, &self.password);
        Box::pin(async move { value.map(Some) })
    }
}

/// Send the request without credentials; if the response is 401, resend it
/// once with Basic credentials and return that response instead.
pub fn basic_if_needed(
    username: impl Into<String>,
    password: impl Into<String>,
) -> RetryOnUnauthorizedLayer<BasicUpgrade> {
    RetryOnUnauthorizedLayer::new(BasicUpgrade::new(username, password))
}
