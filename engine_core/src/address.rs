use crate::data_models::profile::ShippingAddress;
use crate::engine::Context;
use crate::js;
use crate::normalizer;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// # NDOC
/// component: `address`
/// purpose: Before filling a fresh address, check whether the storefront
///          already has a close-enough saved one and select it instead.
/// invariants:
///   - Weighted similarity: postal 0.40, city 0.25, street 0.20,
///     name 0.15; selection requires >= 0.70.
///   - This path never mixes with the generic field-fill path; the
///     orchestrator decides which one is active.

const POSTAL_WEIGHT: f64 = 0.40;
const CITY_WEIGHT: f64 = 0.25;
const STREET_WEIGHT: f64 = 0.20;
const NAME_WEIGHT: f64 = 0.15;
const MATCH_THRESHOLD: f64 = 0.70;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressOutcome {
    /// A saved address scored above threshold and was selected.
    SelectedExisting { matched_text: String },
    /// No saved match; the add-new-address form was opened and the
    /// engine is ready for ordinary field fills.
    AddNewInitiated,
    /// Neither a saved match nor a reachable add-new affordance.
    AddNewFailed { detail: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SavedAddress {
    index: i64,
    name: String,
    street: String,
    city: String,
    postal: String,
    full_text: String,
}

const EXTRACT_ADDRESSES_JS: &str = r#"
    (args) => {
        const cardSelector =
            '[class*="address-card"], [class*="addressCard"], [class*="address-item"], ' +
            '[class*="saved-address"], [data-address-id], [class*="address"] li';
        const cards = [];
        const seen = new Set();
        let index = 0;
        for (const el of document.querySelectorAll(cardSelector)) {
            if (!__isVisible(el)) continue;
            const text = (el.textContent || '').trim();
            if (!text || text.length < 15 || text.length > 600) continue;
            if (seen.has(text)) continue;
            seen.add(text);
            el.setAttribute('data-dom-el', args.marker + '-' + index);
            const postalMatch = text.match(/\b\d{5,6}\b/);
            cards.push({
                index: index,
                name: '',
                street: '',
                city: '',
                postal: postalMatch ? postalMatch[0] : '',
                fullText: text.slice(0, 400)
            });
            index += 1;
        }
        return { cards: cards };
    }
"#;

const SELECT_ADDRESS_JS: &str = r#"
    (args) => {
        const card = document.querySelector(
            '[data-dom-el="' + args.marker + '-' + args.index + '"]');
        if (!card) return { success: false };
        const radio = card.querySelector('input[type="radio"]');
        const target = radio || card;
        try {
            target.click();
            if (radio && !radio.checked) {
                radio.checked = true;
                radio.dispatchEvent(new Event('change', { bubbles: true }));
            }
            return { success: true };
        } catch (e) {
            return { success: false, error: e.toString() };
        }
    }
"#;

const ADD_NEW_JS: &str = r#"
    (args) => {
        const needles = ['add new address', 'add a new address', 'new address', 'add address'];
        for (const el of document.querySelectorAll('button, a, [role="button"], label')) {
            if (!__isVisible(el)) continue;
            const text = __norm(el.textContent || el.getAttribute('aria-label') || '');
            if (needles.some(n => text.includes(n))) {
                try {
                    el.click();
                    return { success: true, matchedText: text };
                } catch (e) { /* keep looking */ }
            }
        }
        return { success: false };
    }
"#;

fn similarity(a: &str, b: &str) -> f64 {
    let na = normalizer::normalize(a);
    let nb = normalizer::normalize(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    strsim::jaro_winkler(&na, &nb)
}

fn score_against(card: &SavedAddress, target: &ShippingAddress, full_name: &str) -> f64 {
    let mut score = 0.0;

    // Postal code is the strongest signal and only counts on equality.
    let card_postal = if card.postal.is_empty() {
        normalizer::digits_only(&card.full_text)
    } else {
        card.postal.clone()
    };
    if !target.postal.is_empty() && card_postal.contains(&normalizer::digits_only(&target.postal)) {
        score += POSTAL_WEIGHT;
    }

    let city_hay = if card.city.is_empty() {
        card.full_text.as_str()
    } else {
        card.city.as_str()
    };
    if normalizer::matches(city_hay, &target.city, false).is_some() {
        score += CITY_WEIGHT;
    } else {
        score += CITY_WEIGHT * similarity(city_hay, &target.city) * 0.5;
    }

    let street_hay = if card.street.is_empty() {
        card.full_text.as_str()
    } else {
        card.street.as_str()
    };
    if normalizer::matches(street_hay, &target.line1, false).is_some() {
        score += STREET_WEIGHT;
    } else {
        score += STREET_WEIGHT * similarity(street_hay, &target.line1) * 0.5;
    }

    let name_hay = if card.name.is_empty() {
        card.full_text.as_str()
    } else {
        card.name.as_str()
    };
    if normalizer::matches(name_hay, full_name, false).is_some() {
        score += NAME_WEIGHT;
    }

    score
}

/// Try to match one of the page's saved addresses against the profile's
/// shipping address; select it on a hit, otherwise open the add-new form.
pub async fn verify_and_select(ctx: &Context) -> AddressOutcome {
    let marker = js::new_marker();
    let target = &ctx.profile.shipping;
    let full_name = ctx.profile.full_name();

    let extract = js::compose_inline(EXTRACT_ADDRESSES_JS);
    let result: Value = match ctx
        .driver
        .evaluate(0, &extract, json!({ "marker": marker }))
        .await
    {
        Ok(v) => v,
        Err(e) => {
            return AddressOutcome::AddNewFailed {
                detail: format!("address scan failed: {}", e),
            }
        }
    };

    let cards: Vec<SavedAddress> = result
        .get("cards")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let mut best: Option<(&SavedAddress, f64)> = None;
    for card in &cards {
        let score = score_against(card, target, &full_name);
        log::info!(
            target: "engine",
            "saved address {} scored {:.2}",
            card.index,
            score
        );
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((card, score));
        }
    }

    if let Some((card, score)) = best {
        if score >= MATCH_THRESHOLD {
            let select = js::compose_inline(SELECT_ADDRESS_JS);
            let picked = ctx
                .driver
                .evaluate(0, &select, json!({ "marker": marker, "index": card.index }))
                .await;
            if let Ok(v) = picked {
                if v.get("success").and_then(Value::as_bool) == Some(true) {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    return AddressOutcome::SelectedExisting {
                        matched_text: card.full_text.clone(),
                    };
                }
            }
        }
    }

    let add_new = js::compose_inline(ADD_NEW_JS);
    match ctx.driver.evaluate(0, &add_new, json!({})).await {
        Ok(v) if v.get("success").and_then(Value::as_bool) == Some(true) => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            AddressOutcome::AddNewInitiated
        }
        Ok(_) => {
            // No saved cards and no add-new affordance usually means the
            // page is already a bare address form.
            if cards.is_empty() {
                AddressOutcome::AddNewInitiated
            } else {
                AddressOutcome::AddNewFailed {
                    detail: "saved addresses present but none matched and no add-new control"
                        .to_string(),
                }
            }
        }
        Err(e) => AddressOutcome::AddNewFailed {
            detail: format!("add-new click failed: {}", e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ShippingAddress {
        ShippingAddress {
            line1: "12 Analytical Way".into(),
            line2: String::new(),
            landmark: String::new(),
            city: "San Francisco".into(),
            state: "CA".into(),
            postal: "94107".into(),
            country: "US".into(),
        }
    }

    #[test]
    fn matching_card_crosses_threshold() {
        let card = SavedAddress {
            index: 0,
            postal: "94107".into(),
            full_text: "Ada Lovelace, 12 Analytical Way, San Francisco CA 94107".into(),
            ..SavedAddress::default()
        };
        let score = score_against(&card, &target(), "Ada Lovelace");
        assert!(score >= MATCH_THRESHOLD, "score was {:.2}", score);
    }

    #[test]
    fn unrelated_card_stays_below_threshold() {
        let card = SavedAddress {
            index: 1,
            postal: "10001".into(),
            full_text: "Grace Hopper, 7 Compiler Court, New York NY 10001".into(),
            ..SavedAddress::default()
        };
        let score = score_against(&card, &target(), "Ada Lovelace");
        assert!(score < MATCH_THRESHOLD, "score was {:.2}", score);
    }

    #[test]
    fn postal_match_dominates_scoring() {
        let with_pin = SavedAddress {
            index: 0,
            postal: "94107".into(),
            full_text: "Somewhere else entirely 94107".into(),
            ..SavedAddress::default()
        };
        let without_pin = SavedAddress {
            index: 1,
            postal: "60601".into(),
            full_text: "Somewhere else entirely 60601".into(),
            ..SavedAddress::default()
        };
        let a = score_against(&with_pin, &target(), "Ada Lovelace");
        let b = score_against(&without_pin, &target(), "Ada Lovelace");
        assert!(a > b);
        assert!(a - b >= POSTAL_WEIGHT - 0.01);
    }
}
