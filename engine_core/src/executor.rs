use crate::contracts::ErrorKind;
use crate::driver::DriverError;
use crate::engine::Context;
use crate::js::{self, JsAsset};
use crate::locator::{Located, PlannedAction};
use crate::normalizer;
use serde_json::{json, Value};
use std::time::Duration;

/// # NDOC
/// component: `executor`
/// purpose: Turns a located candidate into real page mutations under the
///          scan-plan-act discipline: fresh geometry before every
///          pointer event, smooth scroll toward center when off-screen,
///          nudge when obscured, coordinate click only when clean.
/// invariants:
///   - Geometry cached during search is never used for a click.
///   - Synthetic `element.click()` is a fallback, not the first strategy,
///     except inside child frames where coordinate clicks cannot land.

#[derive(Debug, Clone)]
pub struct ExecReport {
    pub method: String,
    pub matched_text: Option<String>,
}

/// Executor failures. Driver-level navigation/disconnect classifications
/// pass through untouched so the controller can apply its conventions.
#[derive(Debug)]
pub enum ExecError {
    Driver(DriverError),
    Failed { kind: ErrorKind, detail: String },
}

impl From<DriverError> for ExecError {
    fn from(e: DriverError) -> Self {
        ExecError::Driver(e)
    }
}

impl ExecError {
    fn failed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        ExecError::Failed {
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Inspection {
    center_x: f64,
    center_y: f64,
    viewport_h: f64,
    visible: bool,
    enabled: bool,
    obscured: bool,
}

const SCROLL_BY_JS: &str = "// probe: scroll_by\n(args) => { window.scrollBy({ top: args.top, behavior: 'smooth' }); return true; }";

const SELECT_NATIVE_JS: &str = r#"
    // probe: select_native
    (args) => {
        const { marker, targetIndex, option } = args;
        const el = document.querySelector('[data-dom-el="' + marker + '-' + targetIndex + '"]');
        if (!el || el.tagName !== 'SELECT') return { success: false, error: 'select not found' };
        for (const opt of el.options) {
            const text = (opt.textContent || '').trim();
            if (opt.value === option || __matchQuality(text, option, false) ||
                __matchQuality(opt.value, option, false)) {
                el.value = opt.value;
                el.dispatchEvent(new Event('change', { bubbles: true }));
                return { success: true, value: opt.value, matchedText: text || opt.value };
            }
        }
        return { success: false, error: 'no option matched' };
    }
"#;

const COUNT_SELECTS_JS: &str = r#"
    // probe: select_count
    (args) => {
        let count = 0;
        for (const el of document.querySelectorAll('select')) {
            if (el.disabled) continue;
            const rect = el.getBoundingClientRect();
            if (rect.width > 0 && rect.height > 0) count += 1;
        }
        return { count: count };
    }
"#;

pub async fn execute(ctx: &Context, located: &Located) -> Result<ExecReport, ExecError> {
    match &located.action {
        PlannedAction::Click => click(ctx, located).await,
        PlannedAction::SelectNative { option } => select_native(ctx, located, option).await,
        PlannedAction::OpenDropdownAndPick { option } => dropdown(ctx, located, option).await,
        PlannedAction::Fill { value } => fill(ctx, located, value).await,
        PlannedAction::Quantity { value } => quantity(ctx, located, *value).await,
        PlannedAction::IframeType { value } => iframe_type(ctx, located, value).await,
        PlannedAction::ToggleCheckbox { want_checked } => {
            checkbox(ctx, located, *want_checked).await
        }
    }
}

async fn inspect(ctx: &Context, located: &Located) -> Result<Option<Inspection>, ExecError> {
    let args = json!({ "marker": located.marker, "targetIndex": located.element_index });
    let info = ctx
        .driver
        .evaluate(
            located.frame,
            js::composed(JsAsset::InspectElement),
            args,
        )
        .await?;
    if info.get("found").and_then(Value::as_bool) != Some(true) {
        return Ok(None);
    }
    let num = |path: &[&str]| -> f64 {
        let mut v = &info;
        for key in path {
            v = match v.get(key) {
                Some(n) => n,
                None => return 0.0,
            };
        }
        v.as_f64().unwrap_or(0.0)
    };
    Ok(Some(Inspection {
        center_x: num(&["center", "x"]),
        center_y: num(&["center", "y"]),
        viewport_h: num(&["window", "innerHeight"]),
        visible: info.get("isVisible").and_then(Value::as_bool) == Some(true),
        enabled: info.get("isEnabled").and_then(Value::as_bool) == Some(true),
        obscured: info.get("isObscured").and_then(Value::as_bool) == Some(true),
    }))
}

async fn scroll_by(ctx: &Context, frame: usize, top: f64) -> Result<(), ExecError> {
    let script = js::compose_inline(SCROLL_BY_JS);
    ctx.driver
        .evaluate(frame, &script, json!({ "top": top }))
        .await?;
    Ok(())
}

/// Bring the element on screen and unobscured, re-reading geometry after
/// every scroll. Returns the final clean inspection.
async fn stabilize(ctx: &Context, located: &Located) -> Result<Inspection, ExecError> {
    for _ in 0..3 {
        let info = match inspect(ctx, located).await? {
            Some(i) => i,
            None => {
                return Err(ExecError::failed(
                    ErrorKind::NotFound,
                    "element vanished before interaction",
                ))
            }
        };

        if !info.visible {
            let delta = info.center_y - info.viewport_h / 2.0;
            log::info!(
                target: "engine",
                "element off-screen, scrolling {:.0}px toward center",
                delta
            );
            scroll_by(ctx, located.frame, delta).await?;
            tokio::time::sleep(Duration::from_millis(1200)).await;
            continue;
        }

        if !info.enabled {
            log::warn!(target: "engine", "element reports disabled; proceeding with caution");
        }

        if info.obscured {
            log::info!(target: "engine", "element obscured at point test, nudging scroll");
            scroll_by(ctx, located.frame, 50.0).await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
            continue;
        }

        return Ok(info);
    }
    Err(ExecError::failed(
        ErrorKind::Obscured,
        "failed to stabilize element after 3 scroll passes",
    ))
}

async fn js_click(ctx: &Context, located: &Located) -> Result<String, ExecError> {
    let args = json!({ "marker": located.marker, "targetIndex": located.element_index });
    let result = ctx
        .driver
        .evaluate(located.frame, js::composed(JsAsset::ActionClick), args)
        .await?;
    if result.get("success").and_then(Value::as_bool) == Some(true) {
        let strategy = result
            .get("strategy")
            .and_then(Value::as_str)
            .unwrap_or("js_click");
        Ok(strategy.to_string())
    } else {
        Err(ExecError::failed(
            ErrorKind::NotInteractive,
            result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("all click strategies failed")
                .to_string(),
        ))
    }
}

async fn click(ctx: &Context, located: &Located) -> Result<ExecReport, ExecError> {
    let info = stabilize(ctx, located).await?;

    if located.frame == 0 {
        match ctx.driver.click_xy(info.center_x, info.center_y).await {
            Ok(()) => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                return Ok(ExecReport {
                    method: format!("{}:coordinate_click", located.phase.as_str()),
                    matched_text: located.matched_text.clone(),
                });
            }
            Err(e) if e.is_navigation() || e.is_terminal() => return Err(e.into()),
            Err(e) => {
                log::warn!(target: "engine", "coordinate click failed ({}), trying in-page ladder", e);
            }
        }
    }

    // Child frames (and failed pointer clicks) go through the in-page
    // strategy ladder.
    let strategy = js_click(ctx, located).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(ExecReport {
        method: format!("{}:{}", located.phase.as_str(), strategy),
        matched_text: located.matched_text.clone(),
    })
}

async fn select_native(
    ctx: &Context,
    located: &Located,
    option: &str,
) -> Result<ExecReport, ExecError> {
    let script = js::compose_inline(SELECT_NATIVE_JS);
    let args = json!({
        "marker": located.marker,
        "targetIndex": located.element_index,
        "option": option,
    });
    let result = ctx.driver.evaluate(located.frame, &script, args).await?;
    if result.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(ExecReport {
            method: format!("{}:select_option", located.phase.as_str()),
            matched_text: result
                .get("matchedText")
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .or_else(|| located.matched_text.clone()),
        })
    } else {
        Err(ExecError::failed(
            ErrorKind::NotFound,
            format!("no option matching '{}' in native select", option),
        ))
    }
}

async fn dropdown(
    ctx: &Context,
    located: &Located,
    option: &str,
) -> Result<ExecReport, ExecError> {
    stabilize(ctx, located).await?;

    let open_args = json!({
        "marker": located.marker,
        "targetIndex": located.element_index,
        "op": "open",
    });
    let opened = ctx
        .driver
        .evaluate(
            located.frame,
            js::composed(JsAsset::ActionDropdown),
            open_args,
        )
        .await?;
    if opened.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(ExecError::failed(
            ErrorKind::NotInteractive,
            "dropdown trigger did not open",
        ));
    }
    let before_count = opened.get("beforeCount").and_then(Value::as_i64);

    if let Some(report) = poll_pick(ctx, located, option, before_count).await? {
        return Ok(report);
    }

    // Combobox filters want keystrokes: type the first few characters
    // and re-scan once.
    let prefix: String = option.chars().take(3).collect();
    if located.frame == 0 && !prefix.is_empty() {
        ctx.driver
            .type_text(&prefix, ctx.config.type_delay_ms)
            .await?;
        tokio::time::sleep(Duration::from_millis(300)).await;
        if let Some(report) = poll_pick(ctx, located, option, None).await? {
            return Ok(report);
        }
    }

    Err(ExecError::failed(
        ErrorKind::NotFound,
        format!("no dropdown option matched '{}'", option),
    ))
}

async fn poll_pick(
    ctx: &Context,
    located: &Located,
    option: &str,
    before_count: Option<i64>,
) -> Result<Option<ExecReport>, ExecError> {
    let deadline = tokio::time::Instant::now() + ctx.config.dropdown_render_wait;
    loop {
        let pick_args = json!({
            "marker": located.marker,
            "targetIndex": located.element_index,
            "op": "pick",
            "target": option,
            "beforeCount": before_count,
        });
        let picked = ctx
            .driver
            .evaluate(
                located.frame,
                js::composed(JsAsset::ActionDropdown),
                pick_args,
            )
            .await?;
        if picked.get("success").and_then(Value::as_bool) == Some(true) {
            return Ok(Some(ExecReport {
                method: format!("{}:dropdown_pick", located.phase.as_str()),
                matched_text: picked
                    .get("matchedText")
                    .and_then(Value::as_str)
                    .map(|s| s.to_string()),
            }));
        }
        let still_rendering = picked.get("rendering").and_then(Value::as_bool) == Some(true);
        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
        if !still_rendering {
            // Options are on screen and none matched; waiting longer
            // will not change that.
            return Ok(None);
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

async fn fill(ctx: &Context, located: &Located, value: &str) -> Result<ExecReport, ExecError> {
    stabilize(ctx, located).await?;

    let fill_args = json!({
        "marker": located.marker,
        "targetIndex": located.element_index,
        "op": "fill",
        "value": value,
    });
    let mut result = ctx
        .driver
        .evaluate(located.frame, js::composed(JsAsset::ActionFill), fill_args)
        .await?;
    let mut method = "fill";

    if result.get("success").and_then(Value::as_bool) != Some(true) {
        // Detached or readonly: re-inspect and fall back to direct
        // assignment plus manual event dispatch.
        if inspect(ctx, located).await?.is_none() {
            return Err(ExecError::failed(
                ErrorKind::NotFound,
                "field vanished during fill",
            ));
        }
        let force_args = json!({
            "marker": located.marker,
            "targetIndex": located.element_index,
            "op": "force",
            "value": value,
        });
        result = ctx
            .driver
            .evaluate(located.frame, js::composed(JsAsset::ActionFill), force_args)
            .await?;
        method = "fill_forced";
        if result.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(ExecError::failed(
                ErrorKind::NotInteractive,
                "field rejected both fill strategies",
            ));
        }
    }

    Ok(ExecReport {
        method: format!("{}:{}", located.phase.as_str(), method),
        matched_text: located.matched_text.clone(),
    })
}

async fn quantity(ctx: &Context, located: &Located, value: u32) -> Result<ExecReport, ExecError> {
    let apply_args = json!({
        "marker": located.marker,
        "targetIndex": located.element_index,
        "op": "apply",
        "quantity": value,
    });
    let applied = ctx
        .driver
        .evaluate(
            located.frame,
            js::composed(JsAsset::ActionQuantity),
            apply_args,
        )
        .await?;

    let mode = applied.get("mode").and_then(Value::as_str).unwrap_or("");
    let applied_ok = applied.get("success").and_then(Value::as_bool) == Some(true);

    if applied_ok && mode == "select" {
        return Ok(ExecReport {
            method: "quantity:select".into(),
            matched_text: Some(value.to_string()),
        });
    }

    if applied_ok {
        // Give the site a beat to fight back, then re-read.
        tokio::time::sleep(Duration::from_millis(500)).await;
        if quantity_reads_back(ctx, located, value).await? {
            return Ok(ExecReport {
                method: "quantity:input".into(),
                matched_text: Some(value.to_string()),
            });
        }
        let retype_args = json!({
            "marker": located.marker,
            "targetIndex": located.element_index,
            "op": "retype",
            "quantity": value,
        });
        ctx.driver
            .evaluate(
                located.frame,
                js::composed(JsAsset::ActionQuantity),
                retype_args,
            )
            .await?;
        tokio::time::sleep(Duration::from_millis(300)).await;
        if quantity_reads_back(ctx, located, value).await? {
            return Ok(ExecReport {
                method: "quantity:retype".into(),
                matched_text: Some(value.to_string()),
            });
        }
        return Err(ExecError::failed(
            ErrorKind::ValueRejected,
            format!("site keeps rewriting quantity away from {}", value),
        ));
    }

    if mode == "none" {
        // Stepper buttons: bump until the display reads the target,
        // bounded hard.
        for _ in 0..20 {
            let bump_args = json!({
                "marker": located.marker,
                "targetIndex": located.element_index,
                "op": "bump",
                "quantity": value,
            });
            let bumped = ctx
                .driver
                .evaluate(
                    located.frame,
                    js::composed(JsAsset::ActionQuantity),
                    bump_args,
                )
                .await?;
            if bumped.get("success").and_then(Value::as_bool) != Some(true) {
                break;
            }
            let current = bumped.get("value").and_then(Value::as_str).unwrap_or("");
            if current == value.to_string() {
                return Ok(ExecReport {
                    method: "quantity:stepper".into(),
                    matched_text: Some(value.to_string()),
                });
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        return Err(ExecError::failed(
            ErrorKind::ValueRejected,
            "stepper never reached the target quantity",
        ));
    }

    Err(ExecError::failed(
        ErrorKind::NotInteractive,
        "quantity element accepted no strategy",
    ))
}

async fn quantity_reads_back(
    ctx: &Context,
    located: &Located,
    value: u32,
) -> Result<bool, ExecError> {
    let args = json!({
        "marker": located.marker,
        "targetIndex": located.element_index,
        "op": "reread",
        "quantity": value,
    });
    let read = ctx
        .driver
        .evaluate(located.frame, js::composed(JsAsset::ActionQuantity), args)
        .await?;
    Ok(read.get("value").and_then(Value::as_str) == Some(value.to_string().as_str()))
}

async fn iframe_type(
    ctx: &Context,
    located: &Located,
    value: &str,
) -> Result<ExecReport, ExecError> {
    // The iframe element itself lives in the main document; focus it
    // with a real pointer click, then type. The frame's own DOM stays
    // untouched: it is cross-origin.
    let info = stabilize(ctx, located).await?;
    ctx.driver.click_xy(info.center_x, info.center_y).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    ctx.driver
        .type_text(value, ctx.config.type_delay_ms)
        .await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Tab out to trigger the hosted field's own validation.
    ctx.driver.press_key("Tab").await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    Ok(ExecReport {
        method: "payment-iframe:iframe_keyboard".into(),
        matched_text: located.matched_text.clone(),
    })
}

async fn checkbox(
    ctx: &Context,
    located: &Located,
    want_checked: bool,
) -> Result<ExecReport, ExecError> {
    let state = read_checked(ctx, located).await?;
    if state == Some(want_checked) {
        return Ok(ExecReport {
            method: "checkbox:already_set".into(),
            matched_text: located.matched_text.clone(),
        });
    }

    let report = click(ctx, located).await?;

    match read_checked(ctx, located).await? {
        Some(now) if now == want_checked => Ok(ExecReport {
            method: format!("checkbox:{}", report.method),
            matched_text: report.matched_text,
        }),
        Some(_) => Err(ExecError::failed(
            ErrorKind::VerificationFailed,
            "checkbox did not take the requested state",
        )),
        None => Ok(report),
    }
}

async fn read_checked(ctx: &Context, located: &Located) -> Result<Option<bool>, ExecError> {
    let args = json!({
        "op": "checked",
        "marker": located.marker,
        "targetIndex": located.element_index,
    });
    let result = ctx
        .driver
        .evaluate(located.frame, js::composed(JsAsset::Verification), args)
        .await?;
    if result.get("found").and_then(Value::as_bool) == Some(true) {
        Ok(result.get("checked").and_then(Value::as_bool))
    } else {
        Ok(None)
    }
}

/// After a selection that spawns a dependent control (country -> state),
/// wait for a new enabled `<select>` to show up.
pub async fn wait_for_dependent_dropdown(ctx: &Context, frame: usize) -> Result<bool, ExecError> {
    let script = js::compose_inline(COUNT_SELECTS_JS);
    let initial = ctx
        .driver
        .evaluate(frame, &script, json!({}))
        .await?
        .get("count")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let deadline = tokio::time::Instant::now() + ctx.config.dependent_dropdown_wait;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let now = ctx
            .driver
            .evaluate(frame, &script, json!({}))
            .await?
            .get("count")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if now > initial {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Read a field's live value; the verifier's read-after-write probe.
pub async fn read_field_value(ctx: &Context, located: &Located) -> Result<String, ExecError> {
    let args = json!({
        "marker": located.marker,
        "targetIndex": located.element_index,
        "op": "read",
    });
    let result = ctx
        .driver
        .evaluate(located.frame, js::composed(JsAsset::ActionFill), args)
        .await?;
    Ok(result
        .get("value")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

/// Compare a read-back value against the intended one, phone-aware.
pub fn field_value_matches(observed: &str, intended: &str, phone: bool) -> bool {
    if phone {
        let od = normalizer::digits_only(observed);
        let id = normalizer::digits_only(intended);
        return !id.is_empty() && od.contains(&id);
    }
    normalizer::matches(observed, intended, false).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_comparison_is_phone_aware() {
        assert!(field_value_matches("Ada", "ada", false));
        assert!(!field_value_matches("Ada Lovelace", "Grace", false));
        assert!(field_value_matches("+1 (415) 555-0142", "4155550142", true));
        assert!(!field_value_matches("415", "4155550142", true));
    }

    #[test]
    fn exec_error_wraps_driver_classification() {
        let e: ExecError = DriverError::NavigationDetected("ctx destroyed".into()).into();
        match e {
            ExecError::Driver(inner) => assert!(inner.is_navigation()),
            _ => panic!("expected driver error"),
        }
    }
}
