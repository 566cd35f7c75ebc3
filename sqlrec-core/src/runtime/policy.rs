//! Classification of first-attempt failures.

use crate::error::RecError;

/// Backend error fragments that a rephrased prompt can usually fix:
/// JSON set-returning functions applied to text columns, and type mismatches.
pub const DEFAULT_SIGNATURES: &[&str] = &[
    "jsonb_array_elements",
    "json_array_elements",
    "jsonb_typeof",
    "operator does not exist",
    "cannot cast type",
    "invalid input syntax for type",
    "bad request",
];

/// Decides whether a failed simple attempt earns a guided retry.
///
/// Matching is a case-insensitive substring test against the error message.
/// Missing or truncated SQL is never retryable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    signatures: Vec<String>,
    retry_on_timeout: bool,
}

impl RetryPolicy {
    /// Create a policy with the default signatures
    pub fn new() -> Self {
        Self::empty().with_signatures(DEFAULT_SIGNATURES.iter().copied())
    }

    /// Create a policy with no signatures (timeouts still retry)
    pub fn empty() -> Self {
        Self {
            signatures: Vec::new(),
            retry_on_timeout: true,
        }
    }

    /// Add one signature
    pub fn with_signature(mut self, signature: impl AsRef<str>) -> Self {
        let signature = signature.as_ref().trim().to_lowercase();
        if !signature.is_empty() && !self.signatures.contains(&signature) {
            self.signatures.push(signature);
        }
        self
    }

    /// Add several signatures
    pub fn with_signatures<I, S>(self, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        signatures
            .into_iter()
            .fold(self, |policy, s| policy.with_signature(s))
    }

    /// Set whether a timed-out call earns a retry
    pub fn with_retry_on_timeout(mut self, retry: bool) -> Self {
        self.retry_on_timeout = retry;
        self
    }

    /// Get the normalized signatures
    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    /// Check whether `err` should escalate to the guided attempt
    pub fn is_retryable(&self, err: &RecError) -> bool {
        match err {
            RecError::NoSqlFound | RecError::EllipsisRejected(_) => false,
            RecError::Timeout(_) => self.retry_on_timeout,
            _ => {
                let message = err.to_string().to_lowercase();
                self.signatures.iter().any(|s| message.contains(s.as_str()))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
