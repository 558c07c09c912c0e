//! Request signature verification.
//!
//! The platform signs every callback with the application's Ed25519 key. The
//! signed message is the `X-Signature-Timestamp` header followed by the raw
//! request body; the signature arrives hex-encoded in `X-Signature-Ed25519`.

use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};

use crate::error::InvalidKey;

/// Header carrying the hex-encoded signature.
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
/// Header carrying the signed timestamp.
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

/// Verifies inbound requests against the application's public key.
///
/// ```rust,ignore
/// let verifier = Verifier::from_hex(&config.application.public_key)?;
/// if !verifier.verify(signature, timestamp, &body) {
///     return StatusCode::UNAUTHORIZED.into_response();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Verifier {
    public_key: VerifyingKey,
}

impl Verifier {
    /// Parses a 64-digit hex public key.
    pub fn from_hex(public_key: &str) -> Result<Self, InvalidKey> {
        let bytes = parse_hex::<32>(public_key.trim()).ok_or(InvalidKey::Encoding)?;
        Self::try_new(bytes)
    }

    /// Uses raw public key bytes.
    pub fn try_new(public_key: [u8; 32]) -> Result<Self, InvalidKey> {
        Ok(Self {
            public_key: VerifyingKey::from_bytes(&public_key).map_err(InvalidKey::Key)?,
        })
    }

    /// Whether `signature` (hex) signs `timestamp` followed by `body`.
    pub fn verify(&self, signature: &str, timestamp: &str, body: &[u8]) -> bool {
        let Some(signature) = parse_hex::<64>(signature) else {
            return false;
        };
        let signature = Signature::from_bytes(&signature);
        let message = [timestamp.as_bytes(), body].concat();
        self.public_key.verify(&message, &signature).is_ok()
    }
}

fn parse_hex<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).ok()?;
    Some(out)
}
