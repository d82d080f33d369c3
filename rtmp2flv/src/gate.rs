use subtle::ConstantTimeEq;

/// Shared-secret check on the `appkey` query parameter.
///
/// An empty secret disables the gate.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    secret: String,
}

impl AccessGate {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Whether a request carrying `supplied` may proceed. A missing key is
    /// compared as the empty string.
    #[must_use]
    pub fn permits(&self, supplied: Option<&str>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let supplied = supplied.unwrap_or_default();
        self.secret.as_bytes().ct_eq(supplied.as_bytes()).into()
    }
}
