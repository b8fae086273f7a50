//! Integrity digest over a profile's canonical JSON.
//!
//! The signature is the lowercase hex SHA-256 of the profile serialised with
//! its `signature` field removed. Struct fields serialise in declaration
//! order and parameter maps are key-sorted, so the encoding is stable.

use sha2::{Digest, Sha256};

use crate::error::{ProfileError, ProfileResult};
use crate::model::Profile;

/// Compute the signature a profile should carry.
pub fn compute_signature(profile: &Profile) -> ProfileResult<String> {
    let mut unsigned = profile.clone();
    unsigned.signature = None;
    let canonical = serde_json::to_vec(&unsigned)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Compute and store the signature on `profile`.
pub fn sign(profile: &mut Profile) -> ProfileResult<()> {
    profile.signature = Some(compute_signature(profile)?);
    Ok(())
}

/// Check a signed profile. Unsigned profiles pass.
pub fn verify_signature(profile: &Profile) -> ProfileResult<()> {
    let Some(expected) = profile.signature.as_deref() else {
        return Ok(());
    };
    let actual = compute_signature(profile)?;
    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(ProfileError::SignatureMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
