//! OpenID configuration discovery.

use http::{Method, Request, StatusCode};
use smol_str::SmolStr;

use crate::http_client::HttpClient;
use crate::request::BoxError;
use crate::types::Configuration;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DiscoveryError {
    #[error("invalid discovery endpoint {url}")]
    #[diagnostic(
        code(obclient_oauth::discovery::http_build),
        help("the openid configuration url must be an absolute http(s) url")
    )]
    HttpBuild {
        url: SmolStr,
        #[source]
        source: http::Error,
    },
    #[error("error fetching {url}")]
    #[diagnostic(code(obclient_oauth::discovery::network))]
    Network {
        url: SmolStr,
        #[source]
        source: BoxError,
    },
    #[error("unexpected status {status} from {url}")]
    #[diagnostic(
        code(obclient_oauth::discovery::http_status),
        help("check the openid configuration url")
    )]
    HttpStatus { url: SmolStr, status: StatusCode },
    #[error("malformed openid configuration")]
    #[diagnostic(
        code(obclient_oauth::discovery::serde_json),
        help("the document must carry token_endpoint, registration_endpoint and issuer")
    )]
    SerdeJson(#[from] serde_json::Error),
}

/// Fetch and decode the discovery document at `endpoint`. No retries.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(client)))]
pub async fn get_configuration<C>(client: &C, endpoint: &str) -> Result<Configuration, DiscoveryError>
where
    C: HttpClient + Sync,
{
    let url = SmolStr::new(endpoint);
    let req = Request::builder()
        .method(Method::GET)
        .uri(endpoint)
        .header(http::header::ACCEPT, "application/json")
        .body(Vec::new())
        .map_err(|source| DiscoveryError::HttpBuild {
            url: url.clone(),
            source,
        })?;
    let res = client
        .send_http(req)
        .await
        .map_err(|e| DiscoveryError::Network {
            url: url.clone(),
            source: Box::new(e),
        })?;
    if !res.status().is_success() {
        return Err(DiscoveryError::HttpStatus {
            url,
            status: res.status(),
        });
    }
    Ok(serde_json::from_slice(res.body())?)
}
