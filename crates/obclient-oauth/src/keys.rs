//! RSA signing key material loaded from PEM files.
//!
//! By default keys are read from disk on every use and dropped straight
//! after, so private key bytes only live in memory for the duration of one
//! signature. [`KeyLoadPolicy::Cached`] trades that for a single read.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rsa::pkcs1::{self, DecodeRsaPublicKey};
use rsa::pkcs8::der::pem;
use rsa::pkcs8::{DecodePublicKey, PrivateKeyInfo};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Public,
    Private,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            KeyKind::Public => "public",
            KeyKind::Private => "private",
        })
    }
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum KeyError {
    #[error("error loading {kind} cert file {}", path.display())]
    #[diagnostic(code(obclient_oauth::keys::load))]
    Load {
        kind: KeyKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing {kind} cert file {}: {message}", path.display())]
    #[diagnostic(
        code(obclient_oauth::keys::parse),
        help("expected a PEM encoded RSA key (PKCS#8 or PKCS#1)")
    )]
    Parse {
        kind: KeyKind,
        path: PathBuf,
        message: SmolStr,
    },
    #[error("error validating private key")]
    #[diagnostic(code(obclient_oauth::keys::validation))]
    Validation(#[source] rsa::Error),
}

/// When key files are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyLoadPolicy {
    /// Read and parse the PEM file on every call.
    #[default]
    ReloadOnUse,
    /// Read once, keep the parsed key in memory.
    Cached,
}

/// Provider of an RSA key pair.
pub trait KeyMaterial: Send + Sync {
    fn public_key(&self) -> Result<RsaPublicKey, KeyError>;
    fn private_key(&self) -> Result<RsaPrivateKey, KeyError>;
}

/// Key pair backed by two PEM files. Only the paths are held unless the
/// policy says otherwise.
#[derive(Debug)]
pub struct PemKeyPair {
    public_key_file: PathBuf,
    private_key_file: PathBuf,
    policy: KeyLoadPolicy,
    public_key: OnceLock<RsaPublicKey>,
    private_key: OnceLock<RsaPrivateKey>,
}

impl PemKeyPair {
    pub fn new(public_key_file: impl Into<PathBuf>, private_key_file: impl Into<PathBuf>) -> Self {
        Self {
            public_key_file: public_key_file.into(),
            private_key_file: private_key_file.into(),
            policy: KeyLoadPolicy::default(),
            public_key: OnceLock::new(),
            private_key: OnceLock::new(),
        }
    }

    pub fn with_policy(mut self, policy: KeyLoadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> KeyLoadPolicy {
        self.policy
    }
}

impl KeyMaterial for PemKeyPair {
    fn public_key(&self) -> Result<RsaPublicKey, KeyError> {
        match self.policy {
            KeyLoadPolicy::ReloadOnUse => load_public_key(&self.public_key_file),
            KeyLoadPolicy::Cached => cached(&self.public_key, || {
                load_public_key(&self.public_key_file)
            }),
        }
    }

    fn private_key(&self) -> Result<RsaPrivateKey, KeyError> {
        match self.policy {
            KeyLoadPolicy::ReloadOnUse => load_private_key(&self.private_key_file),
            KeyLoadPolicy::Cached => cached(&self.private_key, || {
                load_private_key(&self.private_key_file)
            }),
        }
    }
}

impl<K: KeyMaterial + ?Sized> KeyMaterial for std::sync::Arc<K> {
    fn public_key(&self) -> Result<RsaPublicKey, KeyError> {
        self.as_ref().public_key()
    }

    fn private_key(&self) -> Result<RsaPrivateKey, KeyError> {
        self.as_ref().private_key()
    }
}

fn cached<T: Clone>(
    slot: &OnceLock<T>,
    load: impl FnOnce() -> Result<T, KeyError>,
) -> Result<T, KeyError> {
    if let Some(value) = slot.get() {
        return Ok(value.clone());
    }
    let value = load()?;
    // a concurrent caller may have won the race; either copy is the same key
    let _ = slot.set(value.clone());
    Ok(value)
}

const PKCS8_PRIVATE_LABEL: &str = "PRIVATE KEY";
const PKCS1_PRIVATE_LABEL: &str = "RSA PRIVATE KEY";
const SPKI_PUBLIC_LABEL: &str = "PUBLIC KEY";
const PKCS1_PUBLIC_LABEL: &str = "RSA PUBLIC KEY";

/// Read and parse an RSA public key (SPKI or PKCS#1 PEM).
pub fn load_public_key(path: &Path) -> Result<RsaPublicKey, KeyError> {
    let (label, der) = read_pem(path, KeyKind::Public)?;
    let parsed = match label.as_str() {
        SPKI_PUBLIC_LABEL => RsaPublicKey::from_public_key_der(&der).map_err(|e| e.to_string()),
        PKCS1_PUBLIC_LABEL => RsaPublicKey::from_pkcs1_der(&der).map_err(|e| e.to_string()),
        other => Err(unexpected_label(other)),
    };
    parsed.map_err(|message| parse_error(path, KeyKind::Public, message))
}

/// Read, parse and validate an RSA private key (PKCS#8 or PKCS#1 PEM).
///
/// Structural problems are [`KeyError::Parse`]; a well-formed key whose
/// components do not agree is [`KeyError::Validation`].
pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey, KeyError> {
    let (label, der) = read_pem(path, KeyKind::Private)?;
    let parse = |message: String| parse_error(path, KeyKind::Private, message);
    let pkcs1_der = match label.as_str() {
        PKCS1_PRIVATE_LABEL => der,
        PKCS8_PRIVATE_LABEL => {
            let info = PrivateKeyInfo::try_from(der.as_slice()).map_err(|e| parse(e.to_string()))?;
            info.algorithm
                .assert_algorithm_oid(rsa::pkcs1::ALGORITHM_OID)
                .map_err(|e| parse(e.to_string()))?;
            info.private_key.to_vec()
        }
        other => return Err(parse(unexpected_label(other))),
    };
    let parts = pkcs1::RsaPrivateKey::try_from(pkcs1_der.as_slice())
        .map_err(|e| parse(e.to_string()))?;
    from_parts(&parts)
}

fn from_parts(parts: &pkcs1::RsaPrivateKey<'_>) -> Result<RsaPrivateKey, KeyError> {
    let uint = |v: pkcs1::der::asn1::UintRef<'_>| BigUint::from_bytes_be(v.as_bytes());
    let key = RsaPrivateKey::from_components(
        uint(parts.modulus),
        uint(parts.public_exponent),
        uint(parts.private_exponent),
        vec![uint(parts.prime1), uint(parts.prime2)],
    )
    .map_err(KeyError::Validation)?;
    key.validate().map_err(KeyError::Validation)?;
    Ok(key)
}

fn unexpected_label(label: &str) -> String {
    format!("unexpected PEM label `{label}`")
}

/// The PEM label and decoded DER of the file at `path`.
fn read_pem(path: &Path, kind: KeyKind) -> Result<(String, Vec<u8>), KeyError> {
    let text = std::fs::read(path).map_err(|source| KeyError::Load {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    let (label, der) = pem::decode_vec(&text).map_err(|e| parse_error(path, kind, e))?;
    Ok((label.to_owned(), der))
}

fn parse_error(path: &Path, kind: KeyKind, cause: impl std::fmt::Display) -> KeyError {
    KeyError::Parse {
        kind,
        path: path.to_path_buf(),
        message: smol_str::format_smolstr!("{}", cause),
    }
}
