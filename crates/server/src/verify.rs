use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("public key is not valid hex")]
    KeyNotHex,
    #[error("public key is not a valid Ed25519 point")]
    InvalidKey,
}

/// Validates inbound webhook signatures before anything else touches the
/// request. The platform signs `timestamp || body` with the application's
/// Ed25519 key; anything that fails here is answered 401 without parsing.
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn new(public_key_hex: &str) -> Result<Self, VerifyError> {
        let bytes = hex::decode(public_key_hex.trim()).map_err(|_| VerifyError::KeyNotHex)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| VerifyError::KeyNotHex)?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| VerifyError::InvalidKey)?;
        Ok(Self { key })
    }

    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> bool {
        let Ok(signature_bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let signature_bytes: [u8; 64] = match signature_bytes.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let signature = Signature::from_bytes(&signature_bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key.verify(&message, &signature).is_ok()
    }
}
