use std::env;
use std::fmt;
use std::time::Duration;

use crate::workflows::onboarding::{NumberingPolicy, VerificationConfig};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub onboarding: OnboardingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = NumberingPolicy::default();
        let numbering = NumberingPolicy {
            rider_floor: floor_var("ONBOARDING_RIDER_CODE_FLOOR", defaults.rider_floor)?,
            driver_floor: floor_var("ONBOARDING_DRIVER_CODE_FLOOR", defaults.driver_floor)?,
        };

        let mut verification = VerificationConfig::default();
        if let Some(millis) = parsed_var::<u64>("ONBOARDING_CHECK_TIMEOUT_MS")? {
            if millis == 0 {
                return Err(ConfigError::OutOfRange {
                    var: "ONBOARDING_CHECK_TIMEOUT_MS",
                    value: millis.to_string(),
                });
            }
            verification.check_timeout = Duration::from_millis(millis);
        }
        if let Some(threshold) = threshold_var("ONBOARDING_DRIVER_FACE_THRESHOLD")? {
            verification.driver_face_match_threshold = threshold;
        }
        if let Some(threshold) = threshold_var("ONBOARDING_RIDER_FACE_THRESHOLD")? {
            verification.rider_face_match_threshold = threshold;
        }

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            onboarding: OnboardingConfig {
                numbering,
                verification,
            },
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Code numbering and verification thresholds.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    pub numbering: NumberingPolicy,
    pub verification: VerificationConfig,
}

fn parsed_var<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        _ => Ok(None),
    }
}

fn floor_var(var: &'static str, default: u32) -> Result<u32, ConfigError> {
    let floor = parsed_var::<u32>(var)?.unwrap_or(default);
    if !(1..=9999).contains(&floor) {
        return Err(ConfigError::OutOfRange {
            var,
            value: floor.to_string(),
        });
    }
    Ok(floor)
}

fn threshold_var(var: &'static str) -> Result<Option<f32>, ConfigError> {
    let Some(threshold) = parsed_var::<f32>(var)? else {
        return Ok(None);
    };
    if !(0.0..=100.0).contains(&threshold) {
        return Err(ConfigError::OutOfRange {
            var,
            value: threshold.to_string(),
        });
    }
    Ok(Some(threshold))
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, value: String },
    OutOfRange { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a number, got '{value}'")
            }
            ConfigError::OutOfRange { var, value } => {
                write!(f, "{var} is out of range: {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
