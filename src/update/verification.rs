use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use minisign_verify::{PublicKey, Signature};
use thiserror::Error;
use tracing::{debug, info};

const UNTRUSTED_COMMENT: &str = "untrusted comment:";

/// Why a binary was refused.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("public key is malformed: {0}")]
    MalformedKey(#[source] minisign_verify::Error),

    #[error("signature is malformed: {0}")]
    MalformedSignature(#[source] minisign_verify::Error),

    #[error("signature does not match the content and trusted key: {0}")]
    Rejected(#[source] minisign_verify::Error),
}

/// Identifier of the key that produced a valid signature, for audit logs.
///
/// Rendered the way minisign prints key ids: 16 upper-case hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignerId(String);

impl SignerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks detached minisign signatures against a trusted public key.
///
/// This is the trust boundary of the launcher: content only reaches the disk,
/// and later gets executed, after [`verify`](Self::verify) returned `Ok`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier {
    allow_legacy: bool,
}

impl SignatureVerifier {
    /// Verifier accepting both prehashed and legacy minisign signatures.
    pub fn new() -> Self {
        Self {
            allow_legacy: true,
        }
    }

    /// Only accept prehashed (`ED`) signatures.
    pub fn prehashed_only() -> Self {
        Self {
            allow_legacy: false,
        }
    }

    /// Verify `content` against the armored `signature` and `public_key`.
    ///
    /// Returns the signer's key id on success. Malformed input of any kind is
    /// an error; there is no partial pass.
    pub fn verify(
        &self,
        signature: &str,
        content: &[u8],
        public_key: &str,
    ) -> Result<SignerId, VerificationError> {
        debug!(bytes = content.len(), "Verification started");

        let key_b64 = key_line(public_key);
        let key = PublicKey::from_base64(key_b64).map_err(VerificationError::MalformedKey)?;
        let signature =
            Signature::decode(signature).map_err(VerificationError::MalformedSignature)?;

        key.verify(content, &signature, self.allow_legacy).map_err(VerificationError::Rejected)?;

        let signer = signer_id(key_b64).map_err(VerificationError::MalformedKey)?;
        info!("Verification signed by {signer}");
        Ok(signer)
    }
}

/// The base64 line of an armored key; the comment line is optional.
fn key_line(armored: &str) -> &str {
    armored
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with(UNTRUSTED_COMMENT))
        .unwrap_or("")
}

/// Key id bytes sit right after the two-byte algorithm tag, little-endian.
fn signer_id(key_b64: &str) -> Result<SignerId, minisign_verify::Error> {
    let raw = STANDARD.decode(key_b64).map_err(|_| minisign_verify::Error::InvalidEncoding)?;
    let id: [u8; 8] = raw
        .get(2..10)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(minisign_verify::Error::InvalidEncoding)?;
    Ok(SignerId(format!("{:016X}", u64::from_le_bytes(id))))
}
