//! ============================================================================
//! Wallet Credential - Decoding the relay one login token
//! ============================================================================
//! Token shape: `<base64 JSON claims>.<signature>`. Only the claims segment
//! is read; the signature is kept as part of the stored token.
//! ============================================================================

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};

use crate::error::AuthError;
use crate::session::{AuthClaims, Identity};

fn decode_segment(segment: &str) -> Result<Vec<u8>, AuthError> {
    for engine in [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD] {
        if let Ok(bytes) = engine.decode(segment) {
            return Ok(bytes);
        }
    }
    Err(AuthError::InvalidCredential(
        "claims segment is not base64".to_string(),
    ))
}

/// Decode the claims segment of a credential
pub fn decode_claims(token: &str) -> Result<AuthClaims, AuthError> {
    let segment = token
        .trim()
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::InvalidCredential("empty credential".to_string()))?;

    let bytes = decode_segment(segment)?;
    let claims: AuthClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidCredential(format!("claims are not valid JSON: {}", e)))?;

    if !claims.paymail.contains('@') {
        return Err(AuthError::InvalidCredential(format!(
            "'{}' is not a paymail",
            claims.paymail
        )));
    }

    Ok(claims)
}

/// Decode a credential into its claims and the identity they describe
pub fn decode_identity(token: &str) -> Result<(AuthClaims, Identity), AuthError> {
    let claims = decode_claims(token)?;
    let identity = claims.identity().ok_or_else(|| {
        AuthError::InvalidCredential(format!(
            "unreadable issued_at '{}'",
            claims.issued_at.as_stored()
        ))
    })?;
    Ok((claims, identity))
}

#[cfg(test)]
pub(crate) fn encode_for_test(claims: &serde_json::Value) -> String {
    format!("{}.c2lnbmF0dXJl", STANDARD.encode(claims.to_string()))
}
