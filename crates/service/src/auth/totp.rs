use std::time::{SystemTime, UNIX_EPOCH};

use totp_rs::{Algorithm, Secret, TOTP};

/// RFC 6238 parameters: SHA-1, 6 digits, 30 second step, one step of skew
const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum TotpError {
    #[error("stored totp secret is not valid base32")]
    Secret,
    #[error("invalid totp configuration: {0}")]
    Url(#[from] totp_rs::TotpUrlError),
}

/// Creates and checks second-factor codes for one issuer
#[derive(Debug, Clone)]
pub struct TotpFactory {
    issuer: String,
}

impl TotpFactory {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// A fresh 160-bit secret, base32 encoded
    pub fn new_secret() -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    fn totp(&self, secret: &str, account: &str) -> Result<TOTP, TotpError> {
        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|_| TotpError::Secret)?;
        Ok(TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )?)
    }

    /// `otpauth://` URI for enrolling an authenticator app
    pub fn provisioning_uri(&self, secret: &str, account: &str) -> Result<String, TotpError> {
        Ok(self.totp(secret, account)?.get_url())
    }

    pub fn verify(&self, secret: &str, account: &str, code: &str) -> Result<bool, TotpError> {
        self.verify_at(secret, account, code, unix_now())
    }

    pub fn verify_at(
        &self,
        secret: &str,
        account: &str,
        code: &str,
        unix_time: u64,
    ) -> Result<bool, TotpError> {
        Ok(self.totp(secret, account)?.check(code.trim(), unix_time))
    }

    /// The code an authenticator would show at `unix_time`
    pub fn code_at(&self, secret: &str, account: &str, unix_time: u64) -> Result<String, TotpError> {
        Ok(self.totp(secret, account)?.generate(unix_time))
    }

    pub fn current_code(&self, secret: &str, account: &str) -> Result<String, TotpError> {
        self.code_at(secret, account, unix_now())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
