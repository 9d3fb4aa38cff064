use std::fmt;
use std::sync::Arc;

use subtle::ConstantTimeEq;

/// The single shared secret that gates every request.
#[derive(Clone)]
pub struct SharedSecret(Arc<str>);

impl SharedSecret {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    /// Constant-time comparison against the presented value. Absent means rejected.
    pub fn verify(&self, presented: Option<&str>) -> bool {
        match presented {
            Some(candidate) => self.0.as_bytes().ct_eq(candidate.as_bytes()).into(),
            None => false,
        }
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}
