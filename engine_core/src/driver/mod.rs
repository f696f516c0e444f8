pub mod playwright;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// # NDOC
/// component: `driver`
/// purpose: The page/frame contract the engine requires of its browser
///          collaborator. One implementation wraps playwright; tests
///          inject scripted fakes.
/// invariants:
///   - Frame 0 is always the main frame.
///   - `evaluate` returns a JSON-compatible value or a classified error.
///   - Errors carrying navigation/disconnect signatures must classify as
///     such; the controller's retry semantics depend on it.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Current page URL. Cheap and synchronous on every known driver.
    fn page_url(&self) -> String;

    async fn title(&self) -> DriverResult<String>;

    /// Full HTML of the current page.
    async fn content(&self) -> DriverResult<String>;

    /// All frames, main frame first.
    async fn frames(&self) -> DriverResult<Vec<FrameInfo>>;

    /// Evaluate a function expression in the given frame, passing `args`
    /// as its single argument.
    async fn evaluate(&self, frame: usize, expression: &str, args: Value) -> DriverResult<Value>;

    /// Dispatch a pointer click at viewport coordinates on the main frame.
    async fn click_xy(&self, x: f64, y: f64) -> DriverResult<()>;

    /// Type into the currently focused element.
    async fn type_text(&self, text: &str, delay_ms: u64) -> DriverResult<()>;

    async fn press_key(&self, key: &str) -> DriverResult<()>;

    async fn goto(&self, url: &str, timeout: Duration) -> DriverResult<()>;

    /// Wait for the document to reach a settled load state.
    async fn wait_for_load(&self, timeout: Duration) -> DriverResult<()>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> DriverResult<()>;
}

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameInfo {
    pub index: usize,
    pub url: String,
    pub name: String,
}

/// Transport-level failures, pre-classified so the controller can map
/// them straight onto its retry semantics.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DriverError {
    /// The execution context died under us. Not an error for clicks:
    /// the action succeeded so thoroughly the page is gone.
    #[error("navigation interrupted evaluation: {0}")]
    NavigationDetected(String),
    /// The browser or page is gone for good. Terminal.
    #[error("browser disconnected: {0}")]
    Disconnected(String),
    #[error("driver timeout: {0}")]
    Timeout(String),
    /// In-page evaluation failed for a reason other than navigation.
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    #[error("driver protocol error: {0}")]
    Protocol(String),
}

static NAVIGATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Execution context was destroyed|navigation").expect("navigation regex")
});
static CLOSED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Target .* closed|browser has been closed").expect("closed regex")
});
static TIMEOUT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)timeout|timed out").expect("timeout regex"));

/// Classify a raw driver failure message into the taxonomy above.
pub fn classify_failure(message: &str) -> DriverError {
    if CLOSED_PATTERN.is_match(message) {
        DriverError::Disconnected(message.to_string())
    } else if NAVIGATION_PATTERN.is_match(message) {
        DriverError::NavigationDetected(message.to_string())
    } else if TIMEOUT_PATTERN.is_match(message) {
        DriverError::Timeout(message.to_string())
    } else {
        DriverError::Evaluation(message.to_string())
    }
}

impl DriverError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DriverError::Disconnected(_))
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self, DriverError::NavigationDetected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_navigation_messages() {
        let e = classify_failure("Execution context was destroyed, most likely because of a navigation");
        assert!(e.is_navigation());
        let e = classify_failure("frame was detached during navigation");
        assert!(e.is_navigation());
    }

    #[test]
    fn classifies_disconnects_before_navigation() {
        let e = classify_failure("Target page, context or browser has been closed");
        assert!(e.is_terminal());
        let e = classify_failure("Target TAB123 closed");
        assert!(e.is_terminal());
    }

    #[test]
    fn classifies_timeouts_and_rest() {
        assert!(matches!(
            classify_failure("Timeout 5000ms exceeded"),
            DriverError::Timeout(_)
        ));
        assert!(matches!(
            classify_failure("ReferenceError: foo is not defined"),
            DriverError::Evaluation(_)
        ));
    }
}
