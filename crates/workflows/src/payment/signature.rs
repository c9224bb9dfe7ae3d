//! Signed gateway callbacks.
//!
//! The gateway sends `hex(HMAC-SHA256(secret, body))` over the raw request
//! body in [`SIGNATURE_HEADER`]. Nothing in the body is trusted until that
//! signature checks out.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("callback signature is missing")]
    Missing,

    #[error("callback signature is malformed")]
    Malformed,

    #[error("callback signature does not match")]
    Mismatch,

    #[error("callback secret is unusable")]
    InvalidKey,
}

/// Checks callback bodies against the shared gateway secret.
#[derive(Clone)]
pub struct CallbackVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for CallbackVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackVerifier").finish_non_exhaustive()
    }
}

impl CallbackVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Signs `body` the way the gateway does.
    pub fn sign(&self, body: &[u8]) -> Result<String, SignatureError> {
        Ok(hex::encode(self.mac(body)?.finalize().into_bytes()))
    }

    /// Constant-time comparison of `signature` against the MAC of `body`.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let signature = signature.ok_or(SignatureError::Missing)?;
        let signature = hex::decode(signature.trim()).map_err(|_| SignatureError::Malformed)?;
        self.mac(body)?
            .verify_slice(&signature)
            .map_err(|_| SignatureError::Mismatch)
    }

    fn mac(&self, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(body);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"order_id":"x","reference":"pay_1","outcome":"confirmed"}"#;

    fn verifier(secret: &str) -> CallbackVerifier {
        CallbackVerifier::new(SecretString::from(secret.to_string()))
    }

    #[test]
    fn test_gateway_signature_accepted() {
        let gateway = verifier("gateway-secret");
        let signature = gateway.sign(BODY).unwrap();
        assert_eq!(signature.len(), 64);
        assert_eq!(gateway.verify(BODY, Some(&signature)), Ok(()));
    }

    #[test]
    fn test_forged_callbacks_rejected() {
        let gateway = verifier("gateway-secret");
        let forged = verifier("guessed-secret").sign(BODY).unwrap();
        assert_eq!(
            gateway.verify(BODY, Some(&forged)),
            Err(SignatureError::Mismatch)
        );

        let signature = gateway.sign(BODY).unwrap();
        let tampered = br#"{"order_id":"x","reference":"pay_2","outcome":"confirmed"}"#;
        assert_eq!(
            gateway.verify(tampered, Some(&signature)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_missing_or_garbled_signature() {
        let gateway = verifier("gateway-secret");
        assert_eq!(gateway.verify(BODY, None), Err(SignatureError::Missing));
        assert_eq!(
            gateway.verify(BODY, Some("not-hex")),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            gateway.verify(BODY, Some("abcd")),
            Err(SignatureError::Mismatch)
        );
    }
}
