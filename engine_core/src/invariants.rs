use crate::contracts::{ErrorKind, Outcome};

/// # NDOC
/// component: `engine_core::invariants`
/// purpose: Shared invariant checks used by the public facade before any DOM work.
/// invariants:
///   - Helpers must not perform I/O or touch the page.
///   - Failures come back as caller-safe `Outcome` records, never panics.
pub fn ensure_non_empty_trimmed(value: &str, field: &str, action: &str) -> Result<(), Outcome> {
    if value.trim().is_empty() {
        return Err(Outcome::failure(
            action,
            ErrorKind::Unsupported,
            format!("'{}' cannot be empty", field),
        ));
    }
    Ok(())
}

pub fn ensure_keywords(keywords: &[&str], action: &str) -> Result<(), Outcome> {
    if keywords.is_empty() || keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(Outcome::failure(
            action,
            ErrorKind::Unsupported,
            "at least one non-empty keyword is required",
        ));
    }
    Ok(())
}

pub fn ensure_quantity(value: u32, action: &str) -> Result<(), Outcome> {
    if value == 0 {
        return Err(Outcome::failure(
            action,
            ErrorKind::Unsupported,
            "quantity must be >= 1",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Naming scheme: inv_global_<domain>_<nnn>_<behavior>
    #[test]
    fn inv_global_intent_001_rejects_empty_trimmed_value() {
        let err = ensure_non_empty_trimmed("   ", "value", "select_variant").expect_err("must fail");
        assert_eq!(err.error.expect("error").kind, ErrorKind::Unsupported);
    }

    #[test]
    fn inv_global_intent_002_rejects_blank_keyword_lists() {
        assert!(ensure_keywords(&["checkout"], "click").is_ok());
        assert!(ensure_keywords(&[], "click").is_err());
        assert!(ensure_keywords(&["  ", ""], "click").is_err());
    }

    #[test]
    fn inv_global_intent_003_rejects_zero_quantity() {
        assert!(ensure_quantity(1, "quantity").is_ok());
        assert!(ensure_quantity(0, "quantity").is_err());
    }
}
