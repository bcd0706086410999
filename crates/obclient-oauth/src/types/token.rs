use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Bearer token from the client-credentials grant. Only ever used to create
/// an account access consent.
// https://datatracker.ietf.org/doc/html/rfc6749#section-5.1
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct GrantToken {
    pub access_token: SmolStr,
    #[serde(default)]
    pub token_type: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

/// Access token issued after the PSU granted consent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    pub access_token: SmolStr,
    #[serde(default)]
    pub token_type: SmolStr,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<SmolStr>,
    #[serde(default)]
    pub id_token: Option<SmolStr>,
}
