use parcel_core::PackageRecord;

use crate::verify_ed25519_signature_hex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustVerdict {
    Trusted,
    Unsigned,
    /// Signed, but the repository has no key to check it against.
    NoTrustedKey,
    Invalid(String),
}

impl TrustVerdict {
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Trusted)
    }
}

pub fn check_record_trust(record: &PackageRecord, public_key_hex: Option<&str>) -> TrustVerdict {
    let Some(signature) = record.signature.as_deref() else {
        return TrustVerdict::Unsigned;
    };
    let Some(public_key_hex) = public_key_hex else {
        return TrustVerdict::NoTrustedKey;
    };

    match verify_ed25519_signature_hex(&record.signing_payload(), public_key_hex, signature) {
        Ok(true) => TrustVerdict::Trusted,
        Ok(false) => TrustVerdict::Invalid("signature does not match record".to_string()),
        Err(err) => TrustVerdict::Invalid(format!("{err:#}")),
    }
}
