use crate::contracts::{ErrorKind, Outcome};
use crate::engine::Context;
use crate::indexer;
use crate::js::{self, JsAsset};
use serde_json::{json, Value};
use std::time::Duration;

/// Scan the shipping-method radio groups, parse the money amount out of
/// each label, and pick the cheapest. Free shipping counts as zero.
pub async fn select_cheapest(ctx: &Context, max_retries: u32) -> Outcome {
    let action = "select_cheapest_shipping";
    let attempts = max_retries.max(1);

    for attempt in 1..=attempts {
        let marker = js::new_marker();
        let args = json!({
            "marker": marker,
            "excludeTokens": indexer::exclusion_tokens(),
        });
        let result = match ctx
            .driver
            .evaluate(0, js::composed(JsAsset::ShippingScan), args)
            .await
        {
            Ok(v) => v,
            Err(e) if e.is_navigation() => {
                return Outcome::navigated(action, "shipping_scan");
            }
            Err(e) if e.is_terminal() => {
                return Outcome::failure(action, ErrorKind::BrowserDisconnected, e.to_string());
            }
            Err(e) => {
                log::warn!(target: "engine", "shipping scan attempt {} failed: {}", attempt, e);
                tokio::time::sleep(ctx.config.restabilize_wait).await;
                continue;
            }
        };

        crate::locator::sweep_markers(ctx, &marker).await;

        if result.get("success").and_then(Value::as_bool) == Some(true) {
            let matched = result
                .get("matchedText")
                .and_then(Value::as_str)
                .map(|s| s.to_string());
            log::info!(
                target: "engine",
                "cheapest shipping selected at price {:?}",
                result.get("price")
            );
            return Outcome::success(action, "shipping_scan").verified(matched);
        }

        let option_count = result
            .get("optionCount")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if option_count == 0 && attempt < attempts {
            // Shipping options often render late; give the page a beat.
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    Outcome::failure(
        action,
        ErrorKind::NotFound,
        "no priced shipping options found",
    )
}
