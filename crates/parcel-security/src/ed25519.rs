use anyhow::{anyhow, Context, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Returns `Ok(false)` for a well-formed signature that does not verify, and
/// an error when the key or signature cannot be decoded.
pub fn verify_ed25519_signature_hex(
    payload: &[u8],
    public_key_hex: &str,
    signature_hex: &str,
) -> Result<bool> {
    let public_key_bytes =
        hex::decode(public_key_hex.trim()).context("failed to decode Ed25519 public key hex")?;
    let signature_bytes =
        hex::decode(signature_hex.trim()).context("failed to decode Ed25519 signature hex")?;

    let public_key_len = public_key_bytes.len();
    let public_key: [u8; 32] = public_key_bytes.try_into().map_err(|_| {
        anyhow!("invalid Ed25519 public key length: expected 32 bytes, got {public_key_len}")
    })?;
    let signature_len = signature_bytes.len();
    let signature: [u8; 64] = signature_bytes.try_into().map_err(|_| {
        anyhow!("invalid Ed25519 signature length: expected 64 bytes, got {signature_len}")
    })?;

    let verifying_key =
        VerifyingKey::from_bytes(&public_key).context("invalid Ed25519 public key bytes")?;
    Ok(verifying_key
        .verify(payload, &Signature::from_bytes(&signature))
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8032 test vector 1.
    const PUBLIC_KEY_HEX: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const SIGNATURE_HEX: &str = concat!(
        "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e06522490155",
        "5fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
    );

    #[test]
    fn accepts_rfc_vector() {
        let verified = verify_ed25519_signature_hex(b"", PUBLIC_KEY_HEX, SIGNATURE_HEX)
            .expect("verification must complete");
        assert!(verified);
    }

    #[test]
    fn rejects_other_payload() {
        let verified = verify_ed25519_signature_hex(b"editor\n", PUBLIC_KEY_HEX, SIGNATURE_HEX)
            .expect("verification must complete");
        assert!(!verified);
    }

    #[test]
    fn malformed_inputs_are_errors() {
        assert!(verify_ed25519_signature_hex(b"", PUBLIC_KEY_HEX, "zz").is_err());
        assert!(verify_ed25519_signature_hex(b"", PUBLIC_KEY_HEX, "00").is_err());
        assert!(verify_ed25519_signature_hex(b"", "00", SIGNATURE_HEX).is_err());
    }
}
