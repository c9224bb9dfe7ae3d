//! Signed, expiring confirmation tokens for email links.
//!
//! A token is `base64url(claims JSON) "." hex(HMAC-SHA256(secret, payload))`
//! where the MAC covers the encoded payload exactly as it appears in the
//! link.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use common::AggregateId;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a confirmation link.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 48;

/// What a token authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenAction {
    VerifyOrder,
    CancelOrder,
}

impl std::fmt::Display for TokenAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenAction::VerifyOrder => f.write_str("VerifyOrder"),
            TokenAction::CancelOrder => f.write_str("CancelOrder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub order_id: AggregateId,
    pub action: TokenAction,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("confirmation link is malformed")]
    Malformed,

    #[error("confirmation link signature is invalid")]
    BadSignature,

    #[error("confirmation link is for {actual}, expected {expected}")]
    WrongAction {
        expected: TokenAction,
        actual: TokenAction,
    },

    #[error("confirmation link has expired")]
    Expired,

    #[error("confirmation secret is unusable")]
    InvalidKey,
}

/// Issues and checks confirmation tokens.
#[derive(Clone)]
pub struct TokenSigner {
    secret: SecretString,
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
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign(
        &self,
        order_id: AggregateId,
        action: TokenAction,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = TokenClaims {
            order_id,
            action,
            issued_at: now,
        };
        let json = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Checks structure, signature, action and age, in that order.
    pub fn verify(
        &self,
        token: &str,
        expected: TokenAction,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

        if claims.action != expected {
            return Err(TokenError::WrongAction {
                expected,
                actual: claims.action,
            });
        }
        if now - claims.issued_at > self.ttl {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::InvalidKey)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}
