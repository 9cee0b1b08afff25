use std::sync::Arc;

pub const MIN_PASSWORD_LEN: usize = 6;

/// bcrypt hashing with a configured cost.
///
/// Holds a dummy hash at the same cost, computed at construction, so that a
/// login for an unknown email performs exactly one bcrypt verify, the same
/// as a wrong password for a known one.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    cost: u32,
    dummy: Arc<Option<String>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        let dummy = match bcrypt::hash("inkwell-dummy-password", cost) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!("Could not prepare dummy password hash: {}", e);
                None
            }
        };
        Self {
            cost,
            dummy: Arc::new(dummy),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, self.cost)
    }

    /// Verify against a stored hash. A corrupt hash counts as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Burn one verification's worth of work and report a mismatch.
    pub fn verify_dummy(&self, password: &str) -> bool {
        if let Some(hash) = self.dummy.as_deref() {
            let _ = bcrypt::verify(password, hash);
        }
        false
    }
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}
