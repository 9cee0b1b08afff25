use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";
const MAX_TOKEN_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported token version")]
    UnsupportedVersion,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid expiry '{0}'")]
    InvalidExpiry(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HMAC-SHA256 signed session tokens.
///
/// Format: `v1.<base64url(claims json)>.<base64url(mac)>`, MAC computed over
/// the first two dot-separated parts.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Signer with a random secret. Tokens do not survive a restart.
    pub fn ephemeral(ttl: Duration) -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Self::new(hex::encode(bytes), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: &str) -> String {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.num_seconds()),
        })
    }

    fn sign(&self, claims: &Claims) -> String {
        // Claims is plain data; serialization cannot fail
        let payload = serde_json::to_vec(claims).unwrap_or_default();
        let signed_part = format!("{}.{}", TOKEN_VERSION, URL_SAFE_NO_PAD.encode(payload));
        let sig = URL_SAFE_NO_PAD.encode(self.mac(signed_part.as_bytes()).finalize().into_bytes());
        format!("{}.{}", signed_part, sig)
    }

    fn mac(&self, data: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        mac.update(data);
        mac
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed);
        }
        let mut parts = token.split('.');
        let (version, payload, sig) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(v), Some(p), Some(s), None) => (v, p, s),
            _ => return Err(TokenError::Malformed),
        };
        if version != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion);
        }

        let sig = URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|_| TokenError::Malformed)?;
        let signed_len = version.len() + 1 + payload.len();
        self.mac(token[..signed_len].as_bytes())
            .verify_slice(&sig)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Parse an expiry such as `7d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_expiry(value: &str) -> Result<Duration, TokenError> {
    let value = value.trim();
    let invalid = || TokenError::InvalidExpiry(value.to_string());

    let (digits, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], Some(c)),
        Some(_) => (value, None),
        None => return Err(invalid()),
    };
    let amount: i64 = digits.parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let duration = match unit {
        Some('d') => Duration::try_days(amount),
        Some('h') => Duration::try_hours(amount),
        Some('m') => Duration::try_minutes(amount),
        Some('s') | None => Duration::try_seconds(amount),
        Some(_) => None,
    };
    duration.ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", Duration::days(7))
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let signer = signer();
        let token = signer.issue("user-1");
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = TokenSigner::new("other", Duration::days(7)).issue("user-1");
        assert_eq!(signer().verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let signer = signer();
        let token = signer.issue("user-1");
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = Claims {
            sub: "admin".into(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert_eq!(signer.verify(&tampered), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = signer();
        let now = Utc::now().timestamp();
        let token = signer.sign(&Claims {
            sub: "user-1".into(),
            iat: now - 100,
            exp: now - 1,
        });
        assert_eq!(signer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let signer = signer();
        assert_eq!(signer.verify(""), Err(TokenError::Malformed));
        assert_eq!(signer.verify("a.b"), Err(TokenError::Malformed));
        assert_eq!(signer.verify("a.b.c.d"), Err(TokenError::Malformed));
        assert_eq!(
            signer.verify("v2.abc.def"),
            Err(TokenError::UnsupportedVersion)
        );
        assert_eq!(
            signer.verify(&"x".repeat(MAX_TOKEN_LEN + 1)),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn parse_expiry_accepts_units() {
        assert_eq!(parse_expiry("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_expiry("12h").unwrap(), Duration::hours(12));
        assert_eq!(parse_expiry("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_expiry("45s").unwrap(), Duration::seconds(45));
        assert_eq!(parse_expiry("3600").unwrap(), Duration::seconds(3600));
    }

    #[test]
    fn parse_expiry_rejects_nonsense() {
        for bad in ["", "d", "0d", "-1d", "7w", "seven days", "999999999999999d"] {
            assert!(parse_expiry(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn longest_expiry_still_issues_tokens() {
        let ttl = parse_expiry("100000000000d").unwrap();
        let signer = TokenSigner::new("test-secret", ttl);
        let claims = signer.verify(&signer.issue("user-1")).unwrap();
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn ephemeral_signers_do_not_share_secrets() {
        let a = TokenSigner::ephemeral(Duration::hours(1));
        let b = TokenSigner::ephemeral(Duration::hours(1));
        assert!(b.verify(&a.issue("u")).is_err());
    }
}
