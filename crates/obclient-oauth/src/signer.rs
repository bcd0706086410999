//! Compact JWS signing over RSA keys.

use std::fmt;
use std::str::FromStr;

use rsa::RsaPrivateKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer as _};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use smol_str::SmolStr;

use crate::jose::{Claims, Header, create_signed_jwt};
use crate::keys::{KeyError, KeyMaterial};

/// RSA signature algorithms usable for Open Banking assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[serde(rename = "RS256")]
    Rs256,
    #[serde(rename = "RS384")]
    Rs384,
    #[serde(rename = "RS512")]
    Rs512,
    #[serde(rename = "PS256")]
    Ps256,
    #[serde(rename = "PS384")]
    Ps384,
    #[serde(rename = "PS512")]
    Ps512,
}

impl SigningAlgorithm {
    pub const ALL: [SigningAlgorithm; 6] = [
        Self::Rs256,
        Self::Rs384,
        Self::Rs512,
        Self::Ps256,
        Self::Ps384,
        Self::Ps512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
        }
    }

    /// First supported algorithm of a preference list.
    pub fn negotiate<S: AsRef<str>>(preferred: &[S]) -> Result<Self, SignError> {
        preferred
            .iter()
            .find_map(|name| name.as_ref().parse().ok())
            .ok_or_else(|| {
                let wanted: Vec<&str> = preferred.iter().map(AsRef::as_ref).collect();
                SignError::UnsupportedAlgorithm(SmolStr::new(wanted.join(", ")))
            })
    }

    /// Raw signature over `message`.
    pub fn sign(&self, key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>, SignError> {
        use rsa::{pkcs1v15, pss};

        let key = key.clone();
        let mut rng = rand::thread_rng();
        let signature = match self {
            Self::Rs256 => pkcs1v15::SigningKey::<Sha256>::new(key)
                .try_sign(message)?
                .to_vec(),
            Self::Rs384 => pkcs1v15::SigningKey::<Sha384>::new(key)
                .try_sign(message)?
                .to_vec(),
            Self::Rs512 => pkcs1v15::SigningKey::<Sha512>::new(key)
                .try_sign(message)?
                .to_vec(),
            Self::Ps256 => pss::BlindedSigningKey::<Sha256>::new(key)
                .try_sign_with_rng(&mut rng, message)?
                .to_vec(),
            Self::Ps384 => pss::BlindedSigningKey::<Sha384>::new(key)
                .try_sign_with_rng(&mut rng, message)?
                .to_vec(),
            Self::Ps512 => pss::BlindedSigningKey::<Sha512>::new(key)
                .try_sign_with_rng(&mut rng, message)?
                .to_vec(),
        };
        Ok(signature)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SignError::UnsupportedAlgorithm(SmolStr::new(s)))
    }
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SignError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Key(#[from] KeyError),
    #[error("claim `{0}` is required")]
    #[diagnostic(code(obclient_oauth::signer::missing_claim))]
    MissingClaim(&'static str),
    #[error("token expired at {exp} (now {now})")]
    #[diagnostic(code(obclient_oauth::signer::expired))]
    Expired { exp: i64, now: i64 },
    #[error("token not valid before {nbf} (now {now})")]
    #[diagnostic(code(obclient_oauth::signer::not_yet_valid))]
    NotYetValid { nbf: i64, now: i64 },
    #[error("token issued in the future at {iat} (now {now})")]
    #[diagnostic(
        code(obclient_oauth::signer::issued_in_future),
        help("check the system clock")
    )]
    IssuedInFuture { iat: i64, now: i64 },
    #[error("error encoding claims")]
    #[diagnostic(code(obclient_oauth::signer::serde))]
    Serde(#[from] serde_json::Error),
    #[error("signature error")]
    #[diagnostic(code(obclient_oauth::signer::crypto))]
    Crypto(#[from] rsa::signature::Error),
    #[error("unsupported signing algorithm: {0}")]
    #[diagnostic(
        code(obclient_oauth::signer::unsupported_algorithm),
        help("supported algorithms are RS256, RS384, RS512, PS256, PS384 and PS512")
    )]
    UnsupportedAlgorithm(SmolStr),
}

/// Turns a claim set into a compact signed token.
pub trait Signer: Send + Sync {
    fn algorithm(&self) -> SigningAlgorithm;

    fn key_id(&self) -> Option<&str> {
        None
    }

    fn sign<P: Serialize>(&self, claims: &Claims<P>) -> Result<SmolStr, SignError>;
}

/// [`Signer`] using one fixed algorithm and a [`KeyMaterial`] source.
#[derive(Debug)]
pub struct ClaimSigner<K> {
    keys: K,
    algorithm: SigningAlgorithm,
    key_id: Option<SmolStr>,
}

impl<K: KeyMaterial> ClaimSigner<K> {
    pub fn new(keys: K, algorithm: SigningAlgorithm) -> Self {
        Self {
            keys,
            algorithm,
            key_id: None,
        }
    }

    pub fn with_key_id(mut self, key_id: impl Into<SmolStr>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }
}

impl<K: KeyMaterial> Signer for ClaimSigner<K> {
    fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(alg = %self.algorithm)))]
    fn sign<P: Serialize>(&self, claims: &Claims<P>) -> Result<SmolStr, SignError> {
        claims.validate(chrono::Utc::now().timestamp())?;
        let key = self.keys.private_key()?;
        let header = Header::from(self.algorithm).with_key_id(self.key_id.clone());
        create_signed_jwt(&key, &header, claims)
    }
}
