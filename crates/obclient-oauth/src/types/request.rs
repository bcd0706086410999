use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenGrantType {
    AuthorizationCode,
    RefreshToken,
    ClientCredentials,
}

// https://datatracker.ietf.org/doc/html/rfc6749#section-4.4.2
#[derive(Serialize, Debug)]
pub struct ClientCredentialsParameters<'a> {
    pub grant_type: TokenGrantType,
    pub scope: &'a str,
}

// https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.3
#[derive(Serialize, Debug)]
pub struct AuthorizationCodeParameters<'a> {
    pub grant_type: TokenGrantType,
    pub scope: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
}

#[derive(Serialize, Debug)]
pub struct AuthorizationUrlQuery<'a> {
    pub scope: &'a str,
}
