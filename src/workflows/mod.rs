pub mod contacts;
pub mod onboarding;
