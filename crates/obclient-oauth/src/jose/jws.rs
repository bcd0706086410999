use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::signer::SigningAlgorithm;

/// Protected header of a compact JWS.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: SigningAlgorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<SmolStr>,
}

impl Header {
    pub fn with_key_id(mut self, kid: Option<SmolStr>) -> Self {
        self.kid = kid;
        self
    }
}

impl From<SigningAlgorithm> for Header {
    fn from(alg: SigningAlgorithm) -> Self {
        Self {
            alg,
            typ: Some(SmolStr::new_static("JWT")),
            kid: None,
        }
    }
}
