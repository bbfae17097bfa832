//! Care Onboard — signup wizard over the care-risk REST gateway.

pub mod config;
pub mod error;
pub mod gateway;
pub mod onboarding;
