use crate::contracts::SelectionCheck;
use crate::driver::DriverResult;
use crate::engine::Context;
use crate::executor::{self, ExecError};
use crate::js::{self, JsAsset};
use crate::locator::Located;
use crate::normalizer;
use serde_json::{json, Value};

/// # NDOC
/// component: `verifier`
/// purpose: Decides whether the intended state is actually true after an
///          action: DOM scan for selections, read-after-write for
///          fields, OCR as a fallback for field/existence confirmation.
/// invariants:
///   - Verification never clicks or fills; it only reads.
///   - OCR never adjudicates which of several siblings is selected.

#[derive(Debug, Clone)]
pub struct FieldVerify {
    pub verified: bool,
    pub observed: String,
}

/// DOM-scan verification for a variant/dropdown selection. Safe to call
/// repeatedly; an already-verified page verifies again without side
/// effects.
pub async fn verify_selection(
    ctx: &Context,
    kind: &str,
    value: &str,
    frame: usize,
) -> DriverResult<SelectionCheck> {
    let args = json!({ "op": "selection", "kind": kind, "value": value });
    let result = ctx
        .driver
        .evaluate(frame, js::composed(JsAsset::Verification), args)
        .await?;

    if result.get("verified").and_then(Value::as_bool) == Some(true) {
        Ok(SelectionCheck {
            verified: true,
            matched_text: result
                .get("matchedText")
                .and_then(Value::as_str)
                .map(|s| s.to_string()),
            method: result
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or("dom")
                .to_string(),
        })
    } else {
        Ok(SelectionCheck {
            verified: false,
            matched_text: None,
            method: "dom scan found no selection signal".to_string(),
        })
    }
}

/// Read-after-write check for a filled field. When the control reads
/// back empty (custom widgets that mirror the value elsewhere), the OCR
/// existence check may still confirm it.
pub async fn verify_field(
    ctx: &Context,
    located: &Located,
    intended: &str,
    phone: bool,
) -> Result<FieldVerify, ExecError> {
    let observed = executor::read_field_value(ctx, located).await?;

    if executor::field_value_matches(&observed, intended, phone) {
        return Ok(FieldVerify {
            verified: true,
            observed,
        });
    }

    if observed.trim().is_empty() {
        if let Some(check) = ocr_confirm_text(ctx, "field", intended).await {
            if check.verified {
                return Ok(FieldVerify {
                    verified: true,
                    observed: check.matched_text.unwrap_or_else(|| intended.to_string()),
                });
            }
        }
    }

    Ok(FieldVerify {
        verified: false,
        observed,
    })
}

fn normalize_fuzzy(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else if c.is_whitespace() {
                ' '
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Screenshot + OCR existence check: is this text anywhere on the page?
/// Three strategies, strongest first. Returns `None` when OCR is off or
/// unavailable; the caller treats that as "no opinion".
pub async fn ocr_confirm_text(ctx: &Context, tag: &str, value: &str) -> Option<SelectionCheck> {
    if !ctx.config.ocr_enabled {
        return None;
    }
    let ocr = ctx.ocr.as_ref()?;

    if let Err(e) = tokio::fs::create_dir_all(&ctx.config.debug_dir).await {
        log::warn!(target: "engine", "debug dir unavailable: {}", e);
        return None;
    }
    let slug: String = value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(24)
        .collect();
    let shot = ctx
        .config
        .debug_dir
        .join(format!("screenshot_{}_{}.png", tag, slug));
    if let Err(e) = ctx.driver.screenshot(&shot, true).await {
        log::warn!(target: "engine", "OCR screenshot failed: {}", e);
        return None;
    }

    let extracted = match ocr.image_to_string(&shot).await {
        Ok(text) => text,
        Err(e) => {
            log::warn!(target: "engine", "OCR extraction failed: {}", e);
            return None;
        }
    };
    let text_path = ctx.config.debug_dir.join(format!("ocr_{}_{}.txt", tag, slug));
    if let Err(e) = tokio::fs::write(&text_path, &extracted).await {
        log::warn!(target: "engine", "OCR debug write failed: {}", e);
    }

    let value_strict = normalizer::normalize_strict(value);
    let value_fuzzy = normalize_fuzzy(value);
    let extracted_strict = normalizer::normalize_strict(&extracted);
    let extracted_fuzzy = normalize_fuzzy(&extracted);

    if !value_strict.is_empty() && extracted_strict.contains(&value_strict) {
        let matched = extracted
            .lines()
            .find(|line| normalizer::normalize_strict(line).contains(&value_strict))
            .map(|l| l.trim().to_string());
        return Some(SelectionCheck {
            verified: true,
            matched_text: matched.or_else(|| Some(value.to_string())),
            method: "OCR strict match".to_string(),
        });
    }

    if !value_fuzzy.is_empty() && extracted_fuzzy.contains(&value_fuzzy) {
        let matched = extracted
            .lines()
            .find(|line| normalize_fuzzy(line).contains(&value_fuzzy))
            .map(|l| l.trim().to_string());
        return Some(SelectionCheck {
            verified: true,
            matched_text: matched.or_else(|| Some(value.to_string())),
            method: "OCR fuzzy match".to_string(),
        });
    }

    let words: Vec<&str> = value_fuzzy
        .split(' ')
        .filter(|w| w.chars().count() > 2)
        .collect();
    if !words.is_empty() && words.iter().all(|w| extracted_fuzzy.contains(w)) {
        return Some(SelectionCheck {
            verified: true,
            matched_text: Some(value.to_string()),
            method: "OCR word match".to_string(),
        });
    }

    Some(SelectionCheck {
        verified: false,
        matched_text: None,
        method: "OCR failed".to_string(),
    })
}

/// Visible validation messages on the page, for the orchestrator's
/// re-fill decisions.
pub async fn validation_errors(ctx: &Context) -> DriverResult<Vec<String>> {
    let args = json!({ "op": "errors" });
    let result = ctx
        .driver
        .evaluate(0, js::composed(JsAsset::Verification), args)
        .await?;
    Ok(result
        .get("errors")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_normalization_flattens_punctuation() {
        assert_eq!(normalize_fuzzy("Midnight-Blue (XL)"), "midnight blue xl");
        assert_eq!(normalize_fuzzy("  "), "");
    }
}
