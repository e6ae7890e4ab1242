//! Stateless session tokens.
//!
//! A session token is a compact signed structure: base64url claims payload,
//! a dot, and a base64url HMAC-SHA256 signature over the encoded payload.
//! Validity is purely cryptographic plus an embedded expiry — there is no
//! server-side session table.
//!
//! `verify` is fail-closed and total: an invalid signature, expired token,
//! or malformed payload all return `None`, so callers treat "no session"
//! and "bad session" identically. Because the token is the sole carrier of
//! authorization-relevant profile state (subscription tier in particular),
//! any server-side change to that state requires active re-issuance —
//! there is nothing to invalidate passively.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::{Session, User};

type HmacSha256 = Hmac<Sha256>;

/// Session validity window: 7 days.
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Errors from session token issuance.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The claims payload could not be encoded.
    #[error("failed to encode session claims: {reason}")]
    Encode { reason: String },
}

/// The server-side signing key, wrapped so it zeroizes on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    #[must_use]
    pub fn new(signing_secret: &str) -> Self {
        Self(signing_secret.as_bytes().to_vec())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail.
        #[allow(clippy::unwrap_used)]
        let mac = HmacSha256::new_from_slice(&self.0).unwrap();
        mac
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey").finish_non_exhaustive()
    }
}

/// Signed claims payload.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Principal id.
    sub: String,
    /// Full profile snapshot, including the subscription tier used for
    /// authorization decisions.
    user: User,
    /// Identity-provider access token.
    access_token: String,
    /// Issued-at, unix seconds.
    iat: i64,
    /// Expiry, unix seconds.
    exp: i64,
}

/// A freshly issued token and its expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Issue a session token for the given principal.
///
/// # Errors
///
/// Returns [`SessionError::Encode`] if the claims cannot be serialized.
pub fn issue(
    key: &SessionKey,
    user: &User,
    access_token: &str,
) -> Result<IssuedToken, SessionError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.clone(),
        user: user.clone(),
        access_token: access_token.to_owned(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };
    let token = sign(key, &claims)?;
    Ok(IssuedToken {
        token,
        expires_at: claims.exp,
    })
}

/// Re-issue a token after authorization-relevant profile data changed
/// (e.g. a billing upgrade). The previous token simply ages out — the new
/// one carries the updated snapshot for its own full validity window.
///
/// # Errors
///
/// Returns [`SessionError::Encode`] if the claims cannot be serialized.
pub fn reissue(
    key: &SessionKey,
    session: &Session,
    updated_user: &User,
) -> Result<IssuedToken, SessionError> {
    issue(key, updated_user, &session.access_token)
}

/// Verify a session token. Returns `None` for anything other than a
/// well-formed, correctly signed, unexpired token.
#[must_use]
pub fn verify(key: &SessionKey, token: &str) -> Option<Session> {
    let (payload_b64, sig_b64) = token.split_once('.')?;
    let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;

    // Constant-time comparison via Mac::verify_slice.
    let mut mac = key.mac();
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&sig).ok()?;

    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let claims: Claims = serde_json::from_slice(&payload).ok()?;

    if claims.exp <= Utc::now().timestamp() {
        return None;
    }

    Some(Session {
        user: claims.user,
        access_token: claims.access_token,
        expires_at: claims.exp,
    })
}

fn sign(key: &SessionKey, claims: &Claims) -> Result<String, SessionError> {
    let payload = serde_json::to_vec(claims).map_err(|e| SessionError::Encode {
        reason: e.to_string(),
    })?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac = key.mac();
    mac.update(payload_b64.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{payload_b64}.{sig_b64}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Subscription, SubscriptionTier};

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: "user-1".to_owned(),
            github_id: 42,
            github_username: "octocat".to_owned(),
            name: Some("Octo Cat".to_owned()),
            email: Some("octo@example.com".to_owned()),
            avatar_url: "https://example.com/a.png".to_owned(),
            subscription: Subscription {
                tier: SubscriptionTier::Pro,
                expires_at: None,
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn test_key() -> SessionKey {
        SessionKey::new("unit-test-signing-secret")
    }

    #[test]
    fn verify_of_issued_token_returns_equivalent_principal() {
        let key = test_key();
        let user = test_user();
        let issued = issue(&key, &user, "gh-access-token").unwrap();

        let session = verify(&key, &issued.token).unwrap();
        assert_eq!(session.user, user);
        assert_eq!(session.access_token, "gh-access-token");
        assert_eq!(session.expires_at, issued.expires_at);
    }

    #[test]
    fn expiry_is_seven_days_out() {
        let key = test_key();
        let before = Utc::now().timestamp();
        let issued = issue(&key, &test_user(), "t").unwrap();
        let after = Utc::now().timestamp();
        assert!(issued.expires_at >= before + SESSION_TTL_SECS);
        assert!(issued.expires_at <= after + SESSION_TTL_SECS);
    }

    #[test]
    fn expired_token_verifies_to_none() {
        let key = test_key();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "user-1".to_owned(),
            user: test_user(),
            access_token: "t".to_owned(),
            iat: now - SESSION_TTL_SECS - 10,
            exp: now - 10,
        };
        let token = sign(&key, &claims).unwrap();
        assert!(verify(&key, &token).is_none());
    }

    #[test]
    fn flipped_signature_byte_verifies_to_none() {
        let key = test_key();
        let issued = issue(&key, &test_user(), "t").unwrap();

        let (payload, sig) = issued.token.split_once('.').unwrap();
        let mut sig_bytes = URL_SAFE_NO_PAD.decode(sig).unwrap();
        sig_bytes[0] ^= 0x01;
        let tampered = format!("{payload}.{}", URL_SAFE_NO_PAD.encode(sig_bytes));

        assert!(verify(&key, &tampered).is_none());
    }

    #[test]
    fn tampered_claims_verify_to_none() {
        let key = test_key();
        let issued = issue(&key, &test_user(), "t").unwrap();

        let (_, sig) = issued.token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(b"{\"sub\":\"someone-else\"}");
        let forged = format!("{forged_payload}.{sig}");

        assert!(verify(&key, &forged).is_none());
    }

    #[test]
    fn malformed_tokens_verify_to_none() {
        let key = test_key();
        for bad in ["", "no-dot", "a.b", "!!!.###", "a.b.c"] {
            assert!(verify(&key, bad).is_none(), "accepted: {bad}");
        }
    }

    #[test]
    fn different_signing_secret_verifies_to_none() {
        let issued = issue(&test_key(), &test_user(), "t").unwrap();
        let other = SessionKey::new("a-different-secret");
        assert!(verify(&other, &issued.token).is_none());
    }

    #[test]
    fn reissue_carries_updated_subscription() {
        let key = test_key();
        let user = test_user();
        let issued = issue(&key, &user, "gh-token").unwrap();
        let session = verify(&key, &issued.token).unwrap();

        let mut upgraded = user;
        upgraded.subscription.tier = SubscriptionTier::Enterprise;
        let reissued = reissue(&key, &session, &upgraded).unwrap();

        let refreshed = verify(&key, &reissued.token).unwrap();
        assert_eq!(refreshed.user.subscription.tier, SubscriptionTier::Enterprise);
        assert_eq!(refreshed.access_token, "gh-token");
    }
}
