use miette::Diagnostic;
use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::transport::TransportError;

/// Errors emitted while assembling an authenticator or a client registration.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    /// A required builder value was not provided
    #[error("error {0} not provided")]
    #[diagnostic(
        code(obclient_oauth::build::missing_field),
        help("every required value must be set on the builder before build()")
    )]
    MissingField(&'static str),
    /// Redirect URL does not parse
    #[error("invalid redirect url")]
    #[diagnostic(
        code(obclient_oauth::build::redirect_url),
        help("the redirect url must be absolute, e.g. http://localhost:8081/")
    )]
    RedirectUrl(#[from] url::ParseError),
    /// OpenID configuration could not be fetched
    #[error("error getting openid configuration")]
    #[diagnostic(code(obclient_oauth::build::discovery))]
    Discovery(
        #[from]
        #[diagnostic_source]
        DiscoveryError,
    ),
    /// HTTP client for discovery could not be built
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),
}

impl BuildError {
    /// Name of the missing builder field, if that is what went wrong.
    pub fn missing_field(&self) -> Option<&'static str> {
        match self {
            BuildError::MissingField(field) => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, BuildError>;
