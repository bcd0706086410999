use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rsa::RsaPrivateKey;
use serde::Serialize;
use smol_str::SmolStr;

use super::{Header, jwt::Claims};
use crate::signer::SignError;

pub fn create_signed_jwt<P: Serialize>(
    key: &RsaPrivateKey,
    header: &Header,
    claims: &Claims<P>,
) -> Result<SmolStr, SignError> {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_string(header)?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_string(claims)?);
    let signature = header
        .alg
        .sign(key, format!("{header_b64}.{payload}").as_bytes())?;
    Ok(smol_str::format_smolstr!(
        "{header_b64}.{payload}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}
