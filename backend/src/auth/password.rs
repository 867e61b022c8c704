use crate::error::{AgriTechError, AgriTechResult};

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Salted digest of `plaintext`. Each call draws a fresh salt.
    pub fn hash(&self, plaintext: &str) -> AgriTechResult<String> {
        if plaintext.is_empty() {
            return Err(AgriTechError::Validation(
                "password must not be empty".to_string(),
            ));
        }
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(AgriTechError::Validation(format!(
                "password must be at most {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    /// Never errors: a malformed digest simply does not match.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        match bcrypt::verify(plaintext, digest) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!("Password digest could not be checked: {}", e);
                false
            }
        }
    }
}
