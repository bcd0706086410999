use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::signer::SignError;

/// Clock skew tolerated on `iat` and `nbf`.
pub const LEEWAY_SECS: i64 = 30;

/// Registered claims plus an application specific claim set `P`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Claims<P> {
    #[serde(flatten)]
    pub registered: RegisteredClaims,
    #[serde(flatten)]
    pub public: P,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegisteredClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<SmolStr>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(SmolStr),
    Multiple(Vec<SmolStr>),
}

impl<P> Claims<P> {
    pub fn new(registered: RegisteredClaims, public: P) -> Self {
        Self { registered, public }
    }

    /// Check the claim set is signable at `now` (unix seconds).
    pub fn validate(&self, now: i64) -> Result<(), SignError> {
        let reg = &self.registered;
        if reg.iss.as_deref().is_none_or(str::is_empty) {
            return Err(SignError::MissingClaim("iss"));
        }
        let iat = reg.iat.ok_or(SignError::MissingClaim("iat"))?;
        let exp = reg.exp.ok_or(SignError::MissingClaim("exp"))?;
        if exp <= now {
            return Err(SignError::Expired { exp, now });
        }
        if iat > now + LEEWAY_SECS {
            return Err(SignError::IssuedInFuture { iat, now });
        }
        match reg.nbf {
            Some(nbf) if nbf > now + LEEWAY_SECS => Err(SignError::NotYetValid { nbf, now }),
            _ => Ok(()),
        }
    }
}

impl From<RegisteredClaims> for Claims<()> {
    fn from(registered: RegisteredClaims) -> Self {
        Self {
            registered,
            public: (),
        }
    }
}
