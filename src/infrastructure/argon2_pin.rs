use crate::domain::ports::PinVerifier;
use crate::error::PaymentError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use tracing::warn;

/// Verifies PINs against Argon2 PHC strings.
///
/// The comparison is done by `argon2`'s verifier, which is constant time in
/// the hash output.
#[derive(Default, Clone)]
pub struct Argon2PinVerifier {
    argon2: Argon2<'static>,
}

impl Argon2PinVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes a PIN into a PHC string suitable for `Account::pin_hash`.
    pub fn hash_pin(&self, pin: &str) -> Result<String, PaymentError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(pin.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PaymentError::Internal(format!("PIN hashing failed: {e}")))
    }
}

impl PinVerifier for Argon2PinVerifier {
    fn verify(&self, pin: &str, pin_hash: &str) -> bool {
        let parsed = match PasswordHash::new(pin_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored PIN hash is malformed");
                return false;
            }
        };
        self.argon2.verify_password(pin.as_bytes(), &parsed).is_ok()
    }
}
