//! Short-lived verification secrets: phone OTP codes and email confirmation tokens.
//!
//! Both verifiers sit on a [`TokenStore`] so a deployment can swap the in-memory map for
//! a shared cache, and deliver through a [`MessageSender`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use rand::Rng;
use tracing::{debug, info};

use super::ports::{EmailVerification, OtpService, ProviderError};

pub const OTP_DIGITS: usize = 6;
pub const OTP_MAX_ATTEMPTS: u32 = 3;
pub const EMAIL_TOKEN_BYTES: usize = 32;

pub fn otp_ttl() -> Duration {
    Duration::minutes(5)
}

pub fn email_token_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl StoredToken {
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

/// Key/value store with per-entry expiry. Expired entries read as absent.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put(&self, key: &str, token: StoredToken, ttl: Duration) -> Result<(), ProviderError>;
    async fn get(&self, key: &str) -> Result<Option<StoredToken>, ProviderError>;
    async fn delete(&self, key: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<(), ProviderError>;
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), ProviderError>;
}

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    entries: Mutex<HashMap<String, StoredToken>>,
}

impl InMemoryTokenStore {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredToken>>, ProviderError> {
        self.entries
            .lock()
            .map_err(|_| ProviderError::Unavailable("token store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn put(&self, key: &str, token: StoredToken, ttl: Duration) -> Result<(), ProviderError> {
        let expires_at = Utc::now() + ttl;
        let token = StoredToken {
            expires_at: expires_at.min(token.expires_at),
            ..token
        };
        self.lock()?.insert(key.to_string(), token);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredToken>, ProviderError> {
        let mut entries = self.lock()?;
        let expired = entries
            .get(key)
            .map(|token| token.expires_at <= Utc::now())
            .unwrap_or(false);
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), ProviderError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// SMS one-time codes backed by a token store.
pub struct StoreBackedOtp {
    store: Arc<dyn TokenStore>,
    sender: Arc<dyn MessageSender>,
    ttl: Duration,
    max_attempts: u32,
}

impl StoreBackedOtp {
    pub fn new(store: Arc<dyn TokenStore>, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            store,
            sender,
            ttl: otp_ttl(),
            max_attempts: OTP_MAX_ATTEMPTS,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn key(phone: &str) -> String {
        format!("otp:{}", phone.trim())
    }
}

#[async_trait]
impl OtpService for StoreBackedOtp {
    async fn send_otp(&self, phone: &str) -> Result<bool, ProviderError> {
        let code = generate_otp();
        let key = Self::key(phone);
        let token = StoredToken {
            secret: code.clone(),
            expires_at: Utc::now() + self.ttl,
            attempts: 0,
        };
        self.store.put(&key, token, self.ttl).await?;

        let body = format!(
            "Your verification code is {code}. It expires in {} minutes.",
            self.ttl.num_minutes()
        );
        if let Err(err) = self.sender.send_sms(phone, &body).await {
            self.store.delete(&key).await?;
            return Err(err);
        }

        info!("otp issued");
        Ok(true)
    }

    async fn verify_otp(&self, phone: &str, code: &str) -> Result<bool, ProviderError> {
        let key = Self::key(phone);
        let Some(mut token) = self.store.get(&key).await? else {
            debug!("otp missing or expired");
            return Ok(false);
        };

        if token.attempts >= self.max_attempts {
            self.store.delete(&key).await?;
            return Ok(false);
        }

        if secrets_match(&token.secret, code) {
            self.store.delete(&key).await?;
            return Ok(true);
        }

        token.attempts += 1;
        if token.attempts >= self.max_attempts {
            debug!("otp attempts exhausted");
            self.store.delete(&key).await?;
        } else {
            let remaining = token.remaining(Utc::now());
            self.store.put(&key, token, remaining).await?;
        }
        Ok(false)
    }
}

/// Email confirmation tokens backed by a token store.
pub struct StoreBackedEmailTokens {
    store: Arc<dyn TokenStore>,
    sender: Arc<dyn MessageSender>,
    ttl: Duration,
}

impl StoreBackedEmailTokens {
    pub fn new(store: Arc<dyn TokenStore>, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            store,
            sender,
            ttl: email_token_ttl(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn key(email: &str) -> String {
        format!("email:{}", email.trim().to_lowercase())
    }
}

#[async_trait]
impl EmailVerification for StoreBackedEmailTokens {
    async fn send_token(&self, email: &str) -> Result<bool, ProviderError> {
        let secret = generate_email_token();
        let key = Self::key(email);
        let token = StoredToken {
            secret: secret.clone(),
            expires_at: Utc::now() + self.ttl,
            attempts: 0,
        };
        self.store.put(&key, token, self.ttl).await?;

        let body = format!(
            "Use this token to confirm your email address: {secret}\nIt expires in {} hours.",
            self.ttl.num_hours()
        );
        if let Err(err) = self
            .sender
            .send_email(email, "Confirm your email address", &body)
            .await
        {
            self.store.delete(&key).await?;
            return Err(err);
        }

        info!("email token issued");
        Ok(true)
    }

    async fn verify_token(&self, email: &str, token: &str) -> Result<bool, ProviderError> {
        let key = Self::key(email);
        let Some(stored) = self.store.get(&key).await? else {
            return Ok(false);
        };

        if !secrets_match(&stored.secret, token) {
            return Ok(false);
        }

        self.store.delete(&key).await?;
        Ok(true)
    }
}

fn secrets_match(stored: &str, submitted: &str) -> bool {
    constant_time_eq(stored.as_bytes(), submitted.trim().as_bytes())
}

fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("{code:0width$}", width = OTP_DIGITS)
}

fn generate_email_token() -> String {
    let bytes: [u8; EMAIL_TOKEN_BYTES] = rand::thread_rng().gen();
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
