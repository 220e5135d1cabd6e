//! PKCE parameter generation (RFC 7636, S256 only).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{AuthError, Result};

/// The only challenge method this crate emits.
pub const CHALLENGE_METHOD: &str = "S256";

/// Random bytes behind the code verifier (43 chars once encoded).
const VERIFIER_BYTES: usize = 32;

/// Random bytes behind the CSRF state (22 chars once encoded).
const STATE_BYTES: usize = 16;

/// Verifier, derived challenge, and CSRF state for one sign-in.
#[derive(Clone)]
pub struct PkceParams {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl std::fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceParams")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .field("state", &"<redacted>")
            .finish()
    }
}

impl PkceParams {
    /// Generate fresh parameters from the operating system RNG.
    pub fn generate() -> Result<Self> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate fresh parameters from the given fallible RNG.
    ///
    /// Any RNG failure is reported as [`AuthError::RandomnessUnavailable`];
    /// there is no fallback source.
    pub fn generate_with<R: TryRngCore + ?Sized>(rng: &mut R) -> Result<Self> {
        let verifier = random_token::<VERIFIER_BYTES, R>(rng)?;
        let state = random_token::<STATE_BYTES, R>(rng)?;
        let challenge = challenge_for(&verifier);

        Ok(Self {
            verifier,
            challenge,
            state,
        })
    }

    pub fn challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

/// Compute the S256 challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn random_token<const N: usize, R: TryRngCore + ?Sized>(rng: &mut R) -> Result<String> {
    let mut bytes = [0u8; N];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::RandomnessUnavailable(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
