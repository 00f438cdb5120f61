//! Signed bearer tokens
//!
//! A token is `base64url(claims_json) "." base64url(hmac_sha256(claims_json))`.
//! The claims name the user (`sub`), the session whose unlocked key sits in
//! the session cache (`jti`) and the expiry as a unix timestamp (`exp`).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use zeroize::Zeroizing;

use common::session_cache::SessionId;

type HmacSha256 = Hmac<Sha256>;

const SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("random source failure: {0}")]
    Entropy(getrandom::Error),
    #[error("invalid token key")]
    Key,
    #[error("failed to encode claims: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub jti: SessionId,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> Result<OffsetDateTime, TokenError> {
        OffsetDateTime::from_unix_timestamp(self.exp).map_err(|_| TokenError::Malformed)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct TokenIssuer {
    secret: Zeroizing<Vec<u8>>,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            secret: Zeroizing::new(secret.to_vec()),
            lifetime,
        }
    }

    /// An issuer with a random key. Its tokens do not outlive the process.
    pub fn random(lifetime: Duration) -> Result<Self, TokenError> {
        let mut secret = Zeroizing::new(vec![0u8; SECRET_LEN]);
        getrandom::getrandom(&mut secret).map_err(TokenError::Entropy)?;
        Ok(Self { secret, lifetime })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Key)
    }

    pub fn issue(&self, user_id: Uuid, session_id: &SessionId) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, session_id, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        session_id: &SessionId,
        now: OffsetDateTime,
    ) -> Result<IssuedToken, TokenError> {
        // whole seconds, so the cache expiry matches `exp` exactly
        let exp = (now + self.lifetime).unix_timestamp();
        let claims = Claims {
            sub: user_id,
            jti: session_id.clone(),
            exp,
        };
        let payload = serde_json::to_vec(&claims)?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        Ok(IssuedToken {
            token: format!(
                "{}.{}",
                URL_SAFE_NO_PAD.encode(&payload),
                URL_SAFE_NO_PAD.encode(signature)
            ),
            expires_at: claims.expires_at()?,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if now.unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&[42u8; 32], Duration::minutes(60))
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();
        let session_id = SessionId::generate();
        let now = OffsetDateTime::now_utc();

        let issued = issuer.issue_at(user_id, &session_id, now).unwrap();
        assert_eq!(
            issued.expires_at.unix_timestamp(),
            (now + Duration::minutes(60)).unix_timestamp()
        );

        let claims = issuer.verify_at(&issued.token, now).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.jti, session_id);
        assert_eq!(claims.expires_at().unwrap(), issued.expires_at);
    }

    #[test]
    fn test_expired() {
        let issuer = issuer();
        let now = OffsetDateTime::now_utc();
        let issued = issuer
            .issue_at(Uuid::new_v4(), &SessionId::generate(), now)
            .unwrap();

        assert!(issuer
            .verify_at(&issued.token, issued.expires_at - Duration::seconds(1))
            .is_ok());
        assert!(matches!(
            issuer.verify_at(&issued.token, issued.expires_at),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_or_foreign_tokens() {
        let issuer = issuer();
        let issued = issuer.issue(Uuid::new_v4(), &SessionId::generate()).unwrap();

        let other = TokenIssuer::new(&[7u8; 32], Duration::minutes(60));
        assert!(matches!(
            other.verify(&issued.token),
            Err(TokenError::BadSignature)
        ));

        // swap in a payload for a different user
        let (_, signature) = issued.token.split_once('.').unwrap();
        let forged_claims = Claims {
            sub: Uuid::new_v4(),
            jti: SessionId::generate(),
            exp: i64::MAX,
        };
        let forged = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap()),
            signature
        );
        assert!(matches!(
            issuer.verify(&forged),
            Err(TokenError::BadSignature)
        ));

        assert!(matches!(
            issuer.verify("not-a-token"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(issuer.verify("a.b.c"), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_random_issuers_differ() {
        let first = TokenIssuer::random(Duration::minutes(5)).unwrap();
        let second = TokenIssuer::random(Duration::minutes(5)).unwrap();
        let issued = first.issue(Uuid::new_v4(), &SessionId::generate()).unwrap();
        assert!(first.verify(&issued.token).is_ok());
        assert!(second.verify(&issued.token).is_err());
    }
}
