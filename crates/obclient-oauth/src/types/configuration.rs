use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// OpenID provider configuration, as published at the well-known endpoint.
///
/// Only the endpoints the client actually talks to are kept.
// https://openid.net/specs/openid-connect-discovery-1_0.html#ProviderMetadata
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<SmolStr>,
    pub registration_endpoint: SmolStr,
    pub token_endpoint: SmolStr,
    pub issuer: SmolStr,
}
