//! Maps raw engine error text to user-facing messages
//!
//! Classification only changes the text stored in a task's `last_error`.
//! It never influences state transitions.

use serde::{Deserialize, Serialize};

/// Category of a failed download
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Video requires sign-in for age verification
    AgeRestricted,
    /// Video is not available in the user's country
    GeoBlocked,
    /// Video is private
    Private,
    /// Video was taken down on a copyright claim
    Copyright,
    /// Video was deleted or is otherwise unavailable
    Unavailable,
    /// Network failure or timeout
    Network,
    /// Site requires authentication
    AuthRequired,
}

// Checked in order; first match wins.
const PATTERNS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::AgeRestricted,
        &["age-restricted", "age restricted", "confirm your age", "inappropriate for some users"],
    ),
    (
        ErrorCategory::GeoBlocked,
        &["available in your country", "geo-restricted", "geo restricted", "geoblocked", "geo-blocked"],
    ),
    (ErrorCategory::Private, &["private video", "video is private"]),
    (ErrorCategory::Copyright, &["copyright"]),
    (
        ErrorCategory::Unavailable,
        &["video unavailable", "has been removed", "been deleted", "no longer available", "unavailable"],
    ),
    (
        ErrorCategory::Network,
        &["network", "timed out", "timeout", "connection reset", "connection refused", "unable to connect"],
    ),
    (
        ErrorCategory::AuthRequired,
        &["sign in", "login required", "log in", "authentication", "unauthorized", "http error 401"],
    ),
];

impl ErrorCategory {
    /// Classify a raw error message, case-insensitively
    pub fn from_message(raw: &str) -> Option<Self> {
        let lower = raw.to_lowercase();
        PATTERNS
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
            .map(|(category, _)| *category)
    }

    /// Message shown to the user for this category
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::AgeRestricted => "Video is age-restricted and requires sign-in",
            ErrorCategory::GeoBlocked => "Video is not available in your region",
            ErrorCategory::Private => "Video is private",
            ErrorCategory::Copyright => "Video was blocked due to a copyright claim",
            ErrorCategory::Unavailable => "Video has been deleted or is unavailable",
            ErrorCategory::Network => "Network error or timeout, check your connection",
            ErrorCategory::AuthRequired => "Authentication required to access this video",
        }
    }
}

/// User-facing text for a raw engine error; unmatched messages pass through unchanged
pub fn classify_error(raw: &str) -> String {
    match ErrorCategory::from_message(raw) {
        Some(category) => category.user_message().to_string(),
        None => raw.to_string(),
    }
}
