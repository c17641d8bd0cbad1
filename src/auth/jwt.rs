// JWT expiry extraction
// Only the `exp` claim matters to the client; signatures are never verified
// here, the node does that on its side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Fallback lifetime applied when the access token carries no usable `exp`
pub const DEFAULT_TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Extract the expiry of a JWT-shaped access token as epoch milliseconds
///
/// Returns `None` when the token is not a three-segment JWT, the payload is
/// not base64url JSON, or the `exp` claim is missing or non-numeric. Callers
/// fall back to [`DEFAULT_TOKEN_TTL_MS`] from the moment the token was
/// obtained.
pub fn parse_expiry(access_token: &str) -> Option<i64> {
    let segments: Vec<&str> = access_token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }

    // Some issuers pad base64url segments; the alphabet itself must be url-safe
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

    let exp = claims.get("exp")?;
    if let Some(secs) = exp.as_i64() {
        Some(secs.saturating_mul(1000))
    } else {
        exp.as_f64().map(|secs| (secs * 1000.0) as i64)
    }
}
