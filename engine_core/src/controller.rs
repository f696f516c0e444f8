use crate::contracts::{ClickKind, ErrorKind, Intent, Outcome};
use crate::driver::DriverError;
use crate::engine::Context;
use crate::executor::{self, ExecError};
use crate::handlers::HandlerDecision;
use crate::js;
use crate::locator::{self, Located, PlannedAction};
use crate::utils::logger;
use crate::verifier;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Instant;

/// # NDOC
/// component: `controller`
/// purpose: Drives one intent to one outcome: bounded attempts, phase
///          escalation, intent-specific recovery, and the
///          navigation-as-success convention.
/// invariants:
///   - No intent runs longer than the hard ceiling, waits included.
///   - Attempts never cache DOM state; every retry searches from scratch.
///   - Markers are swept before any outcome leaves this module.

const CART_PATHS: &[&str] = &[
    "/cart",
    "/checkout",
    "/basket",
    "/bag",
    "/shopping-cart",
    "/checkout/cart",
];

const CART_MODAL_JS: &str = r#"
    // probe: cart_modal
    (args) => {
        const modalSelector =
            '[class*="cart-modal"], [class*="cart-drawer"], [class*="minicart"], ' +
            '[class*="mini-cart"], [class*="drawer"][class*="cart"]';
        for (const modal of document.querySelectorAll(modalSelector)) {
            if (!__isVisible(modal)) continue;
            const needles = ['view cart', 'view bag', 'checkout', 'go to cart'];
            for (const el of modal.querySelectorAll('a, button, [role="button"]')) {
                if (!__isVisible(el)) continue;
                const text = __norm(el.textContent || el.getAttribute('aria-label') || '');
                if (needles.some(n => text.includes(n))) {
                    el.click();
                    return { modal: true, clicked: true, matchedText: text };
                }
            }
            return { modal: true, clicked: false };
        }
        return { modal: false };
    }
"#;

const CART_ICON_JS: &str = r#"
    // probe: cart_icon
    (args) => {
        const selector =
            'a[href*="/cart"], a[href*="/bag"], [class*="cart-icon"], ' +
            '[aria-label*="cart" i], [aria-label*="bag" i], [data-test*="cart"]';
        for (const el of document.querySelectorAll(selector)) {
            if (!__isVisible(el)) continue;
            const rect = el.getBoundingClientRect();
            // Header icons live in the top strip.
            if (rect.top > 200) continue;
            try {
                el.click();
                return { clicked: true };
            } catch (e) { /* try the next one */ }
        }
        return { clicked: false };
    }
"#;

/// Run one intent through the search/act/verify loop with escalation.
pub async fn run_intent(ctx: &Context, intent: Intent) -> Outcome {
    let label = intent.label();
    logger::set_current_intent_id(format!("{}#{}", label, js::new_marker()));
    let outcome = run_intent_inner(ctx, &intent, false).await;
    logger::log_outcome(&label, &outcome);
    logger::clear_current_intent_id();
    outcome
}

/// Recovery chains re-enter the intent loop; boxing breaks the async
/// recursion cycle.
fn run_intent_boxed<'a>(
    ctx: &'a Context,
    intent: &'a Intent,
    in_recovery: bool,
) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>> {
    Box::pin(run_intent_inner(ctx, intent, in_recovery))
}

fn exec_failure_outcome(action: &str, e: &ExecError) -> Outcome {
    match e {
        ExecError::Driver(d) => Outcome::failure(action, driver_error_kind(d), d.to_string()),
        ExecError::Failed { kind, detail } => Outcome::failure(action, *kind, detail.clone()),
    }
}

fn driver_error_kind(e: &DriverError) -> ErrorKind {
    match e {
        DriverError::Disconnected(_) => ErrorKind::BrowserDisconnected,
        DriverError::NavigationDetected(_) => ErrorKind::NavigationDetected,
        DriverError::Timeout(_) => ErrorKind::Timeout,
        _ => ErrorKind::NotFound,
    }
}

async fn run_intent_inner(ctx: &Context, intent: &Intent, in_recovery: bool) -> Outcome {
    let action = intent.label();
    let deadline = Instant::now() + ctx.config.hard_ceiling;

    // Site-specific handlers get first refusal.
    if let Some(handler) = ctx.handlers.lookup(&ctx.driver.page_url()) {
        if let HandlerDecision::Handled(outcome) = handler.handle(ctx, intent).await {
            logger::log_phase(&action, "site-handler", "intent claimed by site handler");
            return outcome;
        }
    }

    let mut last_failure = Outcome::failure(action.as_str(), ErrorKind::NotFound, "element not found");

    for attempt in 1..=ctx.config.max_attempts {
        if Instant::now() >= deadline {
            return Outcome::failure(action.as_str(), ErrorKind::Timeout, "hard ceiling reached");
        }

        if attempt == 1 {
            let _ = ctx.driver.wait_for_load(Duration::from_secs(3)).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
        } else {
            // Re-stabilize, then search from scratch; nothing from the
            // previous attempt's snapshot survives.
            tokio::time::sleep(ctx.config.restabilize_wait).await;
        }

        let marker = js::new_marker();
        logger::log_phase(
            &action,
            "searching",
            &format!("attempt {}/{}", attempt, ctx.config.max_attempts),
        );

        let located = match locator::locate(ctx, intent, &marker).await {
            Ok(found) => found,
            Err(e) if e.is_navigation() => {
                return navigation_success(ctx, action.as_str(), "search").await;
            }
            Err(e) if e.is_terminal() => {
                return Outcome::failure(action.as_str(), ErrorKind::BrowserDisconnected, e.to_string());
            }
            Err(e) => {
                log::warn!(target: "engine", "search attempt {} errored: {}", attempt, e);
                locator::sweep_markers(ctx, &marker).await;
                continue;
            }
        };

        let located = match located {
            Some(l) => l,
            None => {
                locator::sweep_markers(ctx, &marker).await;
                continue;
            }
        };
        logger::log_phase(
            &action,
            "acting",
            &format!(
                "candidate in frame {} via {} (score {})",
                located.frame,
                located.phase.as_str(),
                located.score
            ),
        );

        let report = match executor::execute(ctx, &located).await {
            Ok(r) => r,
            Err(ExecError::Driver(e)) if e.is_navigation() => {
                return navigation_success(ctx, action.as_str(), "acting").await;
            }
            Err(ExecError::Driver(e)) if e.is_terminal() => {
                return Outcome::failure(action.as_str(), ErrorKind::BrowserDisconnected, e.to_string());
            }
            Err(e) => {
                last_failure = exec_failure_outcome(action.as_str(), &e);
                locator::sweep_markers(ctx, &located.marker).await;
                continue;
            }
        };

        match verify_after(ctx, intent, &located).await {
            Ok(VerifyResult::Verified(matched)) => {
                locator::sweep_markers(ctx, &located.marker).await;
                return Outcome::success(action.as_str(), report.method.as_str())
                    .verified(matched.or(report.matched_text));
            }
            Ok(VerifyResult::Unverifiable) => {
                locator::sweep_markers(ctx, &located.marker).await;
                let mut outcome = Outcome::success(action.as_str(), report.method.as_str());
                outcome.matched_text = report.matched_text;
                return outcome;
            }
            Ok(VerifyResult::Mismatch(detail)) => {
                last_failure =
                    Outcome::failure(action.as_str(), ErrorKind::VerificationFailed, detail.clone());
                if let Intent::FillField { .. } = intent {
                    last_failure.error = Some(crate::contracts::OutcomeError {
                        kind: ErrorKind::ValueRejected,
                        detail,
                    });
                }
                locator::sweep_markers(ctx, &located.marker).await;
                continue;
            }
            Err(e) if e.is_navigation() => {
                return navigation_success(ctx, action.as_str(), "verifying").await;
            }
            Err(e) if e.is_terminal() => {
                return Outcome::failure(action.as_str(), ErrorKind::BrowserDisconnected, e.to_string());
            }
            Err(e) => {
                last_failure = Outcome::failure(action.as_str(), driver_error_kind(&e), e.to_string());
                locator::sweep_markers(ctx, &located.marker).await;
                continue;
            }
        }
    }

    // Escalation: discovery for variant/field intents, intent-specific
    // recovery for navigation actions.
    if intent.is_discoverable() && !in_recovery {
        if let Some(outcome) = discovery_pass(ctx, intent, &action, deadline).await {
            return outcome;
        }
    } else if !in_recovery {
        if let Intent::ClickAction { kind } = intent {
            match kind {
                ClickKind::AddToCart => {
                    if let Some(outcome) = add_to_cart_recovery(ctx, deadline).await {
                        return outcome;
                    }
                }
                ClickKind::Checkout => {
                    if let Some(outcome) = checkout_recovery(ctx, deadline).await {
                        return outcome;
                    }
                }
                _ => {}
            }
        }
    }

    last_failure
}

enum VerifyResult {
    Verified(Option<String>),
    /// No meaningful element-level post-condition exists; the caller
    /// owns the page-transition check.
    Unverifiable,
    Mismatch(String),
}

async fn verify_after(
    ctx: &Context,
    intent: &Intent,
    located: &Located,
) -> Result<VerifyResult, DriverError> {
    match intent {
        // Action post-conditions are page transitions, not element state.
        Intent::ClickAction { .. } => Ok(VerifyResult::Verified(None)),

        Intent::FillField { field, value } => {
            if matches!(located.action, PlannedAction::IframeType { .. }) {
                // Cross-origin: nothing to read back.
                return Ok(VerifyResult::Unverifiable);
            }
            let phone = matches!(field, crate::contracts::FieldKind::Phone);
            match verifier::verify_field(ctx, located, value, phone).await {
                Ok(v) if v.verified => Ok(VerifyResult::Verified(Some(v.observed))),
                Ok(v) => Ok(VerifyResult::Mismatch(format!(
                    "expected '{}', field holds '{}'",
                    value, v.observed
                ))),
                Err(ExecError::Driver(e)) => Err(e),
                Err(ExecError::Failed { detail, .. }) => Ok(VerifyResult::Mismatch(detail)),
            }
        }

        Intent::SelectVariant { kind, value } => {
            let check = verifier::verify_selection(ctx, kind, value, located.frame).await?;
            if check.verified {
                Ok(VerifyResult::Verified(check.matched_text))
            } else {
                Ok(VerifyResult::Mismatch(format!(
                    "no selection signal for {}={} ({})",
                    kind, value, check.method
                )))
            }
        }

        Intent::SelectDropdown { field, value } => {
            let check = verifier::verify_selection(ctx, field.as_str(), value, located.frame).await?;
            if check.verified {
                Ok(VerifyResult::Verified(check.matched_text))
            } else {
                Ok(VerifyResult::Mismatch(format!(
                    "dropdown shows no signal for '{}'",
                    value
                )))
            }
        }

        // The executors for these verify inline (read-back, checked state).
        Intent::SetQuantity { .. } | Intent::Checkbox { .. } => Ok(VerifyResult::Verified(None)),
    }
}

async fn navigation_success(ctx: &Context, action: &str, stage: &str) -> Outcome {
    log::info!(
        target: "engine",
        "navigation during {}; treating as success",
        stage
    );
    tokio::time::sleep(ctx.config.navigation_settle).await;
    Outcome::navigated(action, format!("{}:navigation", stage))
}

async fn discovery_pass(
    ctx: &Context,
    intent: &Intent,
    action: &str,
    deadline: Instant,
) -> Option<Outcome> {
    if Instant::now() >= deadline {
        return Some(Outcome::failure(
            action,
            ErrorKind::Timeout,
            "hard ceiling reached before discovery",
        ));
    }
    logger::log_phase(action, "discovery", "escalating to discovery phase");
    let marker = js::new_marker();
    let hit = match locator::discover(ctx, intent, &marker).await {
        Ok(Some(h)) => h,
        Ok(None) => {
            locator::sweep_markers(ctx, &marker).await;
            return None;
        }
        Err(e) if e.is_navigation() => {
            return Some(navigation_success(ctx, action, "discovery").await);
        }
        Err(_) => {
            locator::sweep_markers(ctx, &marker).await;
            return None;
        }
    };

    if !hit.clicked {
        locator::sweep_markers(ctx, &marker).await;
        return None;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    // One more verifying pass; discovery already acted.
    let mut outcome = Outcome::success(action, "discovery");
    outcome.matched_text = hit.matched_text.clone();
    if let Intent::SelectVariant { kind, value } = intent {
        if let Ok(check) = verifier::verify_selection(ctx, kind, value, 0).await {
            if check.verified {
                outcome.verified = true;
                outcome.matched_text = check.matched_text.or(outcome.matched_text);
            }
        }
    }
    locator::sweep_markers(ctx, &marker).await;
    Some(outcome)
}

/// Cycle the prioritized add-to-cart keyword list as distinct intents,
/// each with its own attempt budget.
async fn add_to_cart_recovery(ctx: &Context, deadline: Instant) -> Option<Outcome> {
    let keywords = ctx.keywords.for_action(&ClickKind::AddToCart);
    for keyword in keywords.iter().skip(1) {
        if Instant::now() >= deadline {
            return None;
        }
        logger::log_phase("click:add_to_cart", "recovery", &format!("cycling keyword '{}'", keyword));
        let intent = Intent::ClickAction {
            kind: ClickKind::Custom(keyword.clone()),
        };
        let outcome = run_intent_boxed(ctx, &intent, true).await;
        if outcome.success {
            return Some(outcome);
        }
    }
    None
}

async fn checkout_recovery(ctx: &Context, deadline: Instant) -> Option<Outcome> {
    let action = "click:checkout";

    // (a) The header cart icon often unblocks a checkout that only
    // exists inside the cart page.
    logger::log_phase(action, "recovery", "trying header cart icon");
    let icon_script = js::compose_inline(CART_ICON_JS);
    if let Ok(v) = ctx.driver.evaluate(0, &icon_script, json!({})).await {
        if v.get("clicked").and_then(Value::as_bool) == Some(true) {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let retry = Intent::ClickAction {
                kind: ClickKind::Checkout,
            };
            let outcome = run_intent_boxed(ctx, &retry, true).await;
            if outcome.success {
                return Some(outcome);
            }
        }
    }

    // (b) Direct cart/checkout URLs, each gated on a real cart-page
    // signature before it counts.
    let original_url = ctx.driver.page_url();
    if let Some(outcome) = probe_cart_urls(ctx, &original_url, action, deadline).await {
        return Some(outcome);
    }

    // (c) Return to where we started and give the cascade one more shot.
    if Instant::now() < deadline {
        logger::log_phase(action, "recovery", "returning to original page for a final pass");
        let _ = ctx
            .driver
            .goto(&original_url, Duration::from_secs(15))
            .await;
        let _ = ctx.driver.wait_for_load(Duration::from_secs(5)).await;
        let retry = Intent::ClickAction {
            kind: ClickKind::Checkout,
        };
        let outcome = run_intent_boxed(ctx, &retry, true).await;
        if outcome.success {
            return Some(outcome);
        }
    }
    None
}

async fn probe_cart_urls(
    ctx: &Context,
    original_url: &str,
    action: &str,
    deadline: Instant,
) -> Option<Outcome> {
    let base = url::Url::parse(original_url).ok()?;
    let origin = format!(
        "{}://{}",
        base.scheme(),
        base.host_str().unwrap_or_default()
    );

    for path in CART_PATHS {
        if Instant::now() >= deadline {
            return None;
        }
        let cart_url = format!("{}{}", origin, path);
        logger::log_phase(action, "recovery", &format!("probing {}", cart_url));
        if ctx
            .driver
            .goto(&cart_url, Duration::from_secs(15))
            .await
            .is_err()
        {
            continue;
        }
        let _ = ctx.driver.wait_for_load(Duration::from_secs(5)).await;
        let html = match ctx.driver.content().await {
            Ok(h) => h,
            Err(_) => continue,
        };
        if cart_page_signature(&html) {
            let mut outcome = Outcome::navigated(action, "recovery:direct_url");
            outcome.matched_text = Some(cart_url);
            return Some(outcome);
        }
    }
    None
}

/// A page counts as a cart/checkout page when it exposes a checkout
/// button or at least two form fields with an email signature among them.
pub fn cart_page_signature(html: &str) -> bool {
    let doc = Html::parse_document(html);

    if let Ok(selector) = Selector::parse("button, a, input[type=\"submit\"]") {
        for el in doc.select(&selector) {
            let text: String = el.text().collect::<String>().to_lowercase();
            let value = el.value().attr("value").unwrap_or("").to_lowercase();
            if text.contains("checkout")
                || text.contains("place order")
                || value.contains("checkout")
            {
                return true;
            }
        }
    }

    if let Ok(selector) = Selector::parse("input") {
        let mut field_count = 0;
        let mut email_signature = false;
        for el in doc.select(&selector) {
            let input_type = el.value().attr("type").unwrap_or("text").to_lowercase();
            if matches!(input_type.as_str(), "hidden" | "submit" | "button") {
                continue;
            }
            field_count += 1;
            let hay = format!(
                "{} {} {}",
                input_type,
                el.value().attr("name").unwrap_or(""),
                el.value().attr("id").unwrap_or("")
            )
            .to_lowercase();
            if hay.contains("email") {
                email_signature = true;
            }
        }
        if field_count >= 2 && email_signature {
            return true;
        }
    }

    false
}

/// Cart navigation: cart modal first, then the view-cart affordance,
/// then direct URLs.
pub async fn navigate_to_cart(ctx: &Context) -> Outcome {
    let action = "navigate_to_cart";
    let deadline = Instant::now() + ctx.config.hard_ceiling;

    // A cart modal frequently appears right after add-to-cart; its
    // "view cart" button is the cheapest route.
    let modal_script = js::compose_inline(CART_MODAL_JS);
    match ctx.driver.evaluate(0, &modal_script, json!({})).await {
        Ok(v) if v.get("clicked").and_then(Value::as_bool) == Some(true) => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let mut outcome = Outcome::navigated(action, "cart_modal");
            outcome.matched_text = v
                .get("matchedText")
                .and_then(Value::as_str)
                .map(|s| s.to_string());
            return outcome;
        }
        Ok(_) => {}
        Err(e) if e.is_navigation() => {
            return navigation_success(ctx, action, "cart-modal").await;
        }
        Err(e) if e.is_terminal() => {
            return Outcome::failure(action, ErrorKind::BrowserDisconnected, e.to_string());
        }
        Err(_) => {}
    }

    // Generic view-cart click.
    let view = Intent::ClickAction {
        kind: ClickKind::ViewCart,
    };
    let outcome = run_intent_inner(ctx, &view, true).await;
    if outcome.success {
        return outcome;
    }

    // Direct URLs.
    let original_url = ctx.driver.page_url();
    if let Some(outcome) = probe_cart_urls(ctx, &original_url, action, deadline).await {
        return outcome;
    }

    Outcome::failure(action, ErrorKind::NotFound, "no route to the cart page")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_signature_accepts_checkout_button() {
        let html = r#"
            <html><body>
              <div class="cart"><button class="btn">Proceed to Checkout</button></div>
            </body></html>
        "#;
        assert!(cart_page_signature(html));
    }

    #[test]
    fn cart_signature_accepts_email_form() {
        let html = r#"
            <html><body><form>
              <input type="email" name="customer-email">
              <input type="text" name="first-name">
            </form></body></html>
        "#;
        assert!(cart_page_signature(html));
    }

    #[test]
    fn cart_signature_rejects_plain_pages() {
        let html = r#"
            <html><body>
              <h1>404</h1>
              <a href="/">Back home</a>
              <input type="hidden" name="csrf">
            </body></html>
        "#;
        assert!(!cart_page_signature(html));
    }

    #[test]
    fn driver_errors_map_to_outcome_kinds() {
        assert_eq!(
            driver_error_kind(&DriverError::Disconnected("x".into())),
            ErrorKind::BrowserDisconnected
        );
        assert_eq!(
            driver_error_kind(&DriverError::Timeout("x".into())),
            ErrorKind::Timeout
        );
        assert_eq!(
            driver_error_kind(&DriverError::Evaluation("x".into())),
            ErrorKind::NotFound
        );
    }
}
