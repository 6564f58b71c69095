//! TOTP code generation
//!
//! Wraps `totp-rs` and remembers the last issued code so that a login attempt
//! never presents a code the backend has already consumed.

use super::CodeProvider;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use totp_rs::{Algorithm, Secret, TOTP};

/// Code and window most recently handed out
#[derive(Debug, Default)]
struct Issued {
    code: Option<String>,
    window: u64,
}

/// RFC 6238 generator bound to one shared secret
pub struct TotpGenerator {
    totp: TOTP,
    step: u64,
    issued: Mutex<Issued>,
}

impl std::fmt::Debug for TotpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotpGenerator")
            .field("step", &self.step)
            .field("digits", &self.totp.digits)
            .finish_non_exhaustive()
    }
}

impl TotpGenerator {
    /// Create a generator from a base32 secret.
    ///
    /// Lowercase letters, whitespace and `=` padding are accepted, as
    /// authenticator apps commonly display secrets that way.
    pub fn new(secret: &str, step: u64, digits: usize) -> Result<Self> {
        if step == 0 {
            return Err(Error::otp("code step must be at least one second"));
        }
        if !(6..=8).contains(&digits) {
            return Err(Error::otp(format!(
                "code length must be between 6 and 8 digits, got {}",
                digits
            )));
        }

        let normalized: String = secret
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if normalized.is_empty() {
            return Err(Error::otp("secret is empty"));
        }

        let bytes = Secret::Encoded(normalized)
            .to_bytes()
            .map_err(|e| Error::otp(format!("secret is not valid base32: {:?}", e)))?;

        // The backend issues secrets shorter than the 128 bits `TOTP::new` insists on.
        let totp = TOTP::new_unchecked(
            Algorithm::SHA1,
            digits,
            1,
            step,
            bytes,
            None,
            String::new(),
        );

        Ok(Self {
            totp,
            step,
            issued: Mutex::new(Issued::default()),
        })
    }

    fn unix_secs(at: DateTime<Utc>) -> Result<u64> {
        u64::try_from(at.timestamp())
            .map_err(|_| Error::otp(format!("timestamp before the epoch: {}", at)))
    }

    fn last_issued(&self) -> Option<(u64, String)> {
        let issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.code.clone().map(|code| (issued.window, code))
    }
}

#[async_trait::async_trait]
impl CodeProvider for TotpGenerator {
    fn generate(&self, at: DateTime<Utc>) -> Result<String> {
        let secs = Self::unix_secs(at)?;
        let code = self.totp.generate(secs);

        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.code = Some(code.clone());
        issued.window = secs / self.step;

        Ok(code)
    }

    async fn wait_for_next_window(&self) {
        let Some((last_window, last_code)) = self.last_issued() else {
            return;
        };

        loop {
            let now = Utc::now();
            let now_ms = u64::try_from(now.timestamp_millis()).unwrap_or(0);
            let window = now_ms / 1000 / self.step;

            if window > last_window {
                if self.totp.generate(now_ms / 1000) != last_code {
                    return;
                }
                // Same digits in a fresh window; one more window is enough.
                if window > last_window + 1 {
                    return;
                }
                tracing::debug!("Fresh OTP window repeated the previous code, waiting once more");
            }

            let boundary_ms = (window + 1) * self.step * 1000;
            let remaining = boundary_ms.saturating_sub(now_ms).max(1);
            tracing::debug!("Waiting {}ms for the next OTP window", remaining);
            tokio::time::sleep(Duration::from_millis(remaining)).await;
        }
    }
}
