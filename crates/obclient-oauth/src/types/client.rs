use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Software client identity issued by dynamic client registration.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Client {
    pub id: SmolStr,
    pub secret: SmolStr,
}

impl Client {
    pub fn new(id: impl Into<SmolStr>, secret: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// `true` when both the id and the secret are set.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.secret.is_empty()
    }

    /// HTTP basic `Authorization` header value for this client.
    pub fn auth_header(&self) -> String {
        let credentials = STANDARD.encode(format!("{}:{}", self.id, self.secret));
        format!("Basic {credentials}")
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// https://datatracker.ietf.org/doc/html/rfc7591#section-3.2.1
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientRegistrationResponse {
    pub client_id: SmolStr,
    pub client_secret: SmolStr,
}

impl From<ClientRegistrationResponse> for Client {
    fn from(response: ClientRegistrationResponse) -> Self {
        Client::new(response.client_id, response.client_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header() {
        let client = Client::new("c1", "s1");
        // base64("c1:s1")
        assert_eq!(client.auth_header(), "Basic YzE6czE=");
    }

    #[test]
    fn debug_hides_secret() {
        let client = Client::new("c1", "hunter2");
        let shown = format!("{client:?}");
        assert!(shown.contains("c1"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn completeness() {
        assert!(Client::new("c1", "s1").is_complete());
        assert!(!Client::new("c1", "").is_complete());
        assert!(!Client::default().is_complete());
    }
}
