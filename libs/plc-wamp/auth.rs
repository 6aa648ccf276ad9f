//! WAMP challenge-response authentication (wampcra)

use crate::error::AuthenticationError;
use crate::protocol::Dict;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// The only challenge-based method this client speaks
pub const WAMPCRA: &str = "wampcra";

/// Compute the wampcra signature for a broker challenge
///
/// The signature is computed as:
/// 1. HMAC-SHA256 over the challenge string, keyed with the shared secret
/// 2. Base64-encode the digest (standard alphabet, padded)
pub fn compute_response(secret: &[u8], challenge: &str) -> Result<String, AuthenticationError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthenticationError::Signature(e.to_string()))?;

    mac.update(challenge.as_bytes());

    let signature_bytes = mac.finalize().into_bytes();
    Ok(STANDARD.encode(signature_bytes))
}

/// Answer a CHALLENGE message
///
/// `extra` is the CHALLENGE details dictionary. Salted (derived key)
/// challenges are signed with the raw secret, with a warning, since key
/// derivation is not supported.
pub fn respond(
    method: &str,
    extra: &Dict,
    secret: Option<&[u8]>,
) -> Result<String, AuthenticationError> {
    if method != WAMPCRA {
        return Err(AuthenticationError::UnsupportedMethod(method.to_string()));
    }

    let secret = secret.ok_or(AuthenticationError::NoSecret)?;
    let challenge = extra
        .get("challenge")
        .and_then(|value| value.as_str())
        .ok_or(AuthenticationError::MissingChallenge)?;

    if is_salted(extra) {
        warn!(
            "Broker asks for a salted wampcra key (salt, iterations {}), \
             signing with the raw secret; authentication will likely fail",
            extra.get("iterations").cloned().unwrap_or_default()
        );
    }

    compute_response(secret, challenge)
}

/// Whether a wampcra challenge expects a PBKDF2-derived key
pub fn is_salted(extra: &Dict) -> bool {
    extra.contains_key("salt")
}
