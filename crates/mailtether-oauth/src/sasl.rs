//! SASL initial responses for `OAuth2` bearer tokens.
//!
//! - XOAUTH2 (Google/Microsoft)
//! - OAUTHBEARER (RFC 7628)

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Builds the base64 XOAUTH2 initial response:
/// `user=<user>^Aauth=Bearer <token>^A^A`.
///
/// ```
/// use mailtether_oauth::sasl::xoauth2_response;
///
/// let response = xoauth2_response("user@outlook.com", "EwB4A8l6...");
/// // AUTHENTICATE XOAUTH2 {response}
/// ```
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    STANDARD.encode(format!("user={user}\x01auth=Bearer {token}\x01\x01"))
}

/// Builds the base64 OAUTHBEARER initial response:
/// `n,a=<user>,^Aauth=Bearer <token>^A^A`.
#[must_use]
pub fn oauthbearer_response(user: &str, token: &str) -> String {
    STANDARD.encode(format!("n,a={user},\x01auth=Bearer {token}\x01\x01"))
}

/// Decodes the base64 JSON error challenge a server sends after a rejected
/// token, e.g. `{"status":"401","schemes":"bearer"}`. Returns `None` if the
/// challenge is not valid base64 text.
#[must_use]
pub fn decode_error_challenge(challenge: &str) -> Option<String> {
    let bytes = STANDARD.decode(challenge.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_xoauth2_format() {
        let decoded = STANDARD.decode(xoauth2_response("test@test.com", "abc")).unwrap();
        assert_eq!(decoded, b"user=test@test.com\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_oauthbearer_format() {
        let decoded = STANDARD
            .decode(oauthbearer_response("test@test.com", "abc"))
            .unwrap();
        assert_eq!(decoded, b"n,a=test@test.com,\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_decode_error_challenge() {
        assert_eq!(
            decode_error_challenge("eyJzdGF0dXMiOiI0MDEifQ==").as_deref(),
            Some(r#"{"status":"401"}"#)
        );
        assert_eq!(decode_error_challenge("***"), None);
    }
}
