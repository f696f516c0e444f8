use crate::contracts::{FieldKind, Intent};
use crate::data_models::candidate::CandidateElement;
use crate::driver::{DriverError, DriverResult};
use crate::engine::Context;
use crate::indexer::{self, SelectorTier, TREE_WALK_CONTAINERS};
use crate::js::{self, JsAsset};
use crate::keywords::KeywordCatalog;
use crate::normalizer;
use serde_json::{json, Value};

/// # NDOC
/// component: `locator`
/// purpose: The four-phase search cascade. Runs overlay, tree-walk and
///          pattern phases in every accessible frame, compares frame
///          winners against a running global best, and hands exactly one
///          planned action to the executor.
/// invariants:
///   - Phases are totally ordered within a frame; a frame stops at its
///     first phase that crosses the phase threshold.
///   - Cross-origin frames that refuse evaluation are skipped silently.
///   - Payment fields short-circuit to the iframe-type plan before any
///     DOM phase runs.

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    Click,
    /// Native `<select>`; `option` is matched against option value or text.
    SelectNative { option: String },
    /// Custom dropdown: open the trigger, then pick `option`.
    OpenDropdownAndPick { option: String },
    Fill { value: String },
    Quantity { value: u32 },
    /// Focus a hosted payment iframe and type on the keyboard.
    IframeType { value: String },
    ToggleCheckbox { want_checked: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Overlay,
    DomTree,
    Pattern,
    Discovery,
    PaymentIframe,
}

impl SearchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPhase::Overlay => "overlay",
            SearchPhase::DomTree => "dom-tree",
            SearchPhase::Pattern => "pattern",
            SearchPhase::Discovery => "discovery",
            SearchPhase::PaymentIframe => "payment-iframe",
        }
    }
}

/// One winning candidate, addressable through its per-intent marker.
#[derive(Debug, Clone)]
pub struct Located {
    pub frame: usize,
    pub element_index: i64,
    pub marker: String,
    pub action: PlannedAction,
    pub phase: SearchPhase,
    pub score: i64,
    pub matched_text: Option<String>,
    /// The annotated element record, when the search phase produced one.
    /// Its geometry is a scoring-time snapshot; the executor re-reads
    /// geometry before acting.
    pub candidate: Option<CandidateElement>,
}

/// What discovery reports back: it both finds and clicks in-page.
#[derive(Debug, Clone)]
pub struct DiscoveryHit {
    pub clicked: bool,
    pub matched_text: Option<String>,
    pub score: i64,
}

struct SearchProfile {
    targets: Vec<String>,
    tier: SelectorTier,
    label_mode: bool,
    action_intent: bool,
    phone: bool,
    field_negatives: Vec<String>,
    run_tree_walk: bool,
    run_pattern: bool,
    intent_kind: &'static str,
}

fn profile_for(intent: &Intent, catalog: &KeywordCatalog) -> SearchProfile {
    match intent {
        Intent::SelectVariant { value, .. } => SearchProfile {
            targets: vec![value.clone()],
            tier: SelectorTier::ActionsAndSelection,
            label_mode: false,
            action_intent: false,
            phone: false,
            field_negatives: Vec::new(),
            run_tree_walk: true,
            run_pattern: true,
            intent_kind: "variant",
        },
        Intent::ClickAction { kind } => SearchProfile {
            targets: catalog.for_action(kind),
            tier: SelectorTier::ActionsAndSelection,
            label_mode: false,
            action_intent: true,
            phone: false,
            field_negatives: Vec::new(),
            run_tree_walk: false,
            run_pattern: false,
            intent_kind: "action",
        },
        Intent::FillField { field, .. } => SearchProfile {
            targets: catalog.for_field(field),
            tier: SelectorTier::Inputs,
            label_mode: true,
            action_intent: false,
            phone: matches!(field, FieldKind::Phone),
            field_negatives: normalizer::cross_contamination(field)
                .iter()
                .map(|s| s.to_string())
                .collect(),
            run_tree_walk: false,
            run_pattern: false,
            intent_kind: "field",
        },
        Intent::SelectDropdown { field, .. } => SearchProfile {
            targets: catalog.for_field(field),
            tier: SelectorTier::Inputs,
            label_mode: true,
            action_intent: false,
            phone: false,
            field_negatives: normalizer::cross_contamination(field)
                .iter()
                .map(|s| s.to_string())
                .collect(),
            run_tree_walk: false,
            run_pattern: true,
            intent_kind: "dropdown",
        },
        Intent::SetQuantity { .. } => SearchProfile {
            targets: vec!["quantity".into(), "qty".into()],
            tier: SelectorTier::Inputs,
            label_mode: true,
            action_intent: false,
            phone: false,
            field_negatives: Vec::new(),
            run_tree_walk: false,
            run_pattern: true,
            intent_kind: "quantity",
        },
        Intent::Checkbox { label, .. } => SearchProfile {
            targets: vec![label.clone()],
            tier: SelectorTier::Selection,
            label_mode: false,
            action_intent: false,
            phone: false,
            field_negatives: Vec::new(),
            run_tree_walk: false,
            run_pattern: true,
            intent_kind: "checkbox",
        },
    }
}

fn plan_for(intent: &Intent, js_action: &str, js_value: Option<&str>) -> PlannedAction {
    match intent {
        Intent::FillField { value, .. } => PlannedAction::Fill {
            value: value.clone(),
        },
        Intent::SetQuantity { value } => PlannedAction::Quantity { value: *value },
        Intent::Checkbox { checked, .. } => PlannedAction::ToggleCheckbox {
            want_checked: *checked,
        },
        Intent::SelectVariant { value, .. } | Intent::SelectDropdown { value, .. } => {
            match js_action {
                "select" => PlannedAction::SelectNative {
                    option: js_value.unwrap_or(value).to_string(),
                },
                "dropdown" => PlannedAction::OpenDropdownAndPick {
                    option: js_value.unwrap_or(value).to_string(),
                },
                _ => PlannedAction::Click,
            }
        }
        Intent::ClickAction { .. } => PlannedAction::Click,
    }
}

/// Run the cascade for one intent. Returns at most one candidate; `None`
/// means every phase in every frame came up empty this attempt.
pub async fn locate(
    ctx: &Context,
    intent: &Intent,
    marker: &str,
) -> Result<Option<Located>, DriverError> {
    // Hosted payment fields never resolve through the DOM cascade.
    if let Intent::FillField { field, value } = intent {
        if field.is_payment() {
            if let Some(hit) = detect_payment_iframe(ctx, field, marker).await? {
                return Ok(Some(Located {
                    frame: 0,
                    element_index: 0,
                    marker: marker.to_string(),
                    action: PlannedAction::IframeType {
                        value: value.clone(),
                    },
                    phase: SearchPhase::PaymentIframe,
                    score: 100,
                    matched_text: Some(hit),
                    candidate: None,
                }));
            }
        }
    }

    let profile = profile_for(intent, &ctx.keywords);

    let frames = ctx.driver.frames().await?;
    let container = indexer::detect_container(ctx.driver.as_ref(), 0)
        .await
        .unwrap_or(None);

    let mut best: Option<Located> = None;
    for frame in &frames {
        let frame_container = if frame.index == 0 {
            container.clone()
        } else {
            None
        };
        match search_in_frame(ctx, intent, &profile, frame.index, frame_container, marker).await {
            Ok(Some(candidate)) => {
                let better = best
                    .as_ref()
                    .map(|b| candidate.score > b.score)
                    .unwrap_or(true);
                if better {
                    best = Some(candidate);
                }
            }
            Ok(None) => {}
            Err(e) if e.is_terminal() || e.is_navigation() => return Err(e),
            Err(e) => {
                // Cross-origin frame or transient evaluation failure:
                // skip the frame, keep the cascade alive.
                log::debug!(target: "engine", "frame {} skipped: {}", frame.index, e);
            }
        }
    }
    Ok(best)
}

async fn search_in_frame(
    ctx: &Context,
    intent: &Intent,
    profile: &SearchProfile,
    frame: usize,
    container: Option<String>,
    marker: &str,
) -> Result<Option<Located>, DriverError> {
    // Phase 1: overlay search over the tier pool.
    let args = json!({
        "target": profile.targets,
        "selectors": profile.tier.selectors(),
        "marker": marker,
        "containerSelector": container,
        "excludeTokens": indexer::exclusion_tokens(),
        "negativeTexts": KeywordCatalog::unwanted_action_texts(),
        "labelMode": profile.label_mode,
        "fieldNegatives": profile.field_negatives,
        "phone": profile.phone,
        "actionIntent": profile.action_intent,
    });
    let result = ctx
        .driver
        .evaluate(frame, js::composed(JsAsset::OverlaySearch), args)
        .await?;
    if let Some(located) = parse_hit(intent, &result, frame, marker, SearchPhase::Overlay) {
        return Ok(Some(located));
    }

    // Phase 2: tree walk of product containers.
    if profile.run_tree_walk {
        let args = json!({
            "target": profile.targets.first().cloned().unwrap_or_default(),
            "marker": marker,
            "containerSelectors": TREE_WALK_CONTAINERS,
            "excludeTokens": indexer::exclusion_tokens(),
            "phone": profile.phone,
            "maxDepth": 10,
            "ancestorHops": 3,
        });
        let result = ctx
            .driver
            .evaluate(frame, js::composed(JsAsset::DomTreeSearch), args)
            .await?;
        if let Some(located) = parse_hit(intent, &result, frame, marker, SearchPhase::DomTree) {
            return Ok(Some(located));
        }
    }

    // Phase 3: curated widget patterns.
    if profile.run_pattern {
        let option_target = intent.target_value().map(|s| s.to_string());
        let args = json!({
            "labelTarget": profile.targets,
            "optionTarget": option_target,
            "marker": marker,
            "excludeTokens": indexer::exclusion_tokens(),
            "intentKind": profile.intent_kind,
            "phone": profile.phone,
        });
        let result = ctx
            .driver
            .evaluate(frame, js::composed(JsAsset::PatternMatch), args)
            .await?;
        if let Some(located) = parse_hit(intent, &result, frame, marker, SearchPhase::Pattern) {
            return Ok(Some(located));
        }
    }

    Ok(None)
}

fn parse_hit(
    intent: &Intent,
    result: &Value,
    frame: usize,
    marker: &str,
    phase: SearchPhase,
) -> Option<Located> {
    if result.get("found").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let element_index = result.get("elementIndex").and_then(Value::as_i64)?;
    let js_action = result.get("action").and_then(Value::as_str).unwrap_or("click");
    let js_value = result
        .get("value")
        .and_then(Value::as_str)
        .or_else(|| result.get("searchValue").and_then(Value::as_str));
    let score = result.get("score").and_then(Value::as_i64).unwrap_or(1);
    let matched_text = result
        .get("matchedText")
        .and_then(Value::as_str)
        .map(|s| s.to_string());
    let candidate = result
        .get("candidate")
        .cloned()
        .and_then(|v| serde_json::from_value::<CandidateElement>(v).ok())
        .map(|mut c| {
            c.frame = frame;
            c
        })
        .filter(|c| c.geometry.has_area());

    Some(Located {
        frame,
        element_index,
        marker: marker.to_string(),
        action: plan_for(intent, js_action, js_value),
        phase,
        score,
        matched_text,
        candidate,
    })
}

/// Phase 4. Only for variant/field intents; the caller enforces that.
/// Discovery both finds and clicks, so a hit goes straight to verify.
pub async fn discover(
    ctx: &Context,
    intent: &Intent,
    marker: &str,
) -> Result<Option<DiscoveryHit>, DriverError> {
    let target = match intent.target_value() {
        Some(t) => t.to_string(),
        None => match intent {
            Intent::SetQuantity { value } => value.to_string(),
            _ => return Ok(None),
        },
    };
    let args = json!({
        "target": target,
        "marker": marker,
        "excludeTokens": indexer::exclusion_tokens(),
    });
    let result = ctx
        .driver
        .evaluate(0, js::composed(JsAsset::Discovery), args)
        .await?;
    if result.get("found").and_then(Value::as_bool) != Some(true) {
        return Ok(None);
    }
    Ok(Some(DiscoveryHit {
        clicked: result.get("clicked").and_then(Value::as_bool) == Some(true),
        matched_text: result
            .get("matchedText")
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
        score: result.get("matchScore").and_then(Value::as_i64).unwrap_or(0),
    }))
}

async fn detect_payment_iframe(
    ctx: &Context,
    field: &FieldKind,
    marker: &str,
) -> DriverResult<Option<String>> {
    let keywords = ctx.keywords.for_field(field);
    let args = json!({ "keywords": keywords, "marker": marker });
    let result = ctx
        .driver
        .evaluate(0, js::composed(JsAsset::PaymentIframeDetect), args)
        .await?;
    if result.get("found").and_then(Value::as_bool) == Some(true) {
        let title = result
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Some(title))
    } else {
        Ok(None)
    }
}

/// Sweep every marker this intent wrote. Best effort: a page that
/// navigated away has nothing left to sweep.
pub async fn sweep_markers(ctx: &Context, marker: &str) {
    let frames = match ctx.driver.frames().await {
        Ok(f) => f,
        Err(_) => return,
    };
    for frame in frames {
        let args = json!({ "marker": marker });
        let _ = ctx
            .driver
            .evaluate(frame.index, js::composed(JsAsset::MarkerSweep), args)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ClickKind;

    #[test]
    fn click_intents_never_tree_walk_or_pattern() {
        let catalog = KeywordCatalog::default();
        let p = profile_for(
            &Intent::ClickAction {
                kind: ClickKind::AddToCart,
            },
            &catalog,
        );
        assert!(p.action_intent);
        assert!(!p.run_tree_walk);
        assert!(!p.run_pattern);
        assert_eq!(p.targets[0], "add to cart");
    }

    #[test]
    fn field_intents_search_inputs_by_label() {
        let catalog = KeywordCatalog::default();
        let p = profile_for(
            &Intent::FillField {
                field: FieldKind::FirstName,
                value: "Ada".into(),
            },
            &catalog,
        );
        assert!(p.label_mode);
        assert_eq!(p.tier, SelectorTier::Inputs);
        assert!(p.field_negatives.iter().any(|t| t == "last"));
    }

    #[test]
    fn phone_fields_widen_matching() {
        let catalog = KeywordCatalog::default();
        let p = profile_for(
            &Intent::FillField {
                field: FieldKind::Phone,
                value: "4155550142".into(),
            },
            &catalog,
        );
        assert!(p.phone);
    }

    #[test]
    fn plan_maps_js_actions_per_intent() {
        let variant = Intent::SelectVariant {
            kind: "color".into(),
            value: "Red".into(),
        };
        assert_eq!(
            plan_for(&variant, "select", Some("red-01")),
            PlannedAction::SelectNative {
                option: "red-01".into()
            }
        );
        assert_eq!(
            plan_for(&variant, "dropdown", None),
            PlannedAction::OpenDropdownAndPick {
                option: "Red".into()
            }
        );
        assert_eq!(plan_for(&variant, "click", None), PlannedAction::Click);

        let fill = Intent::FillField {
            field: FieldKind::Email,
            value: "a@b.c".into(),
        };
        assert_eq!(
            plan_for(&fill, "fill", None),
            PlannedAction::Fill {
                value: "a@b.c".into()
            }
        );
    }

    #[test]
    fn parse_hit_requires_found_and_index() {
        let intent = Intent::ClickAction {
            kind: ClickKind::Checkout,
        };
        let miss = serde_json::json!({ "found": false });
        assert!(parse_hit(&intent, &miss, 0, "m", SearchPhase::Overlay).is_none());

        let hit = serde_json::json!({
            "found": true,
            "elementIndex": 4,
            "action": "click",
            "score": 120,
            "matchedText": "Checkout"
        });
        let located = parse_hit(&intent, &hit, 0, "m", SearchPhase::Overlay).expect("hit");
        assert_eq!(located.element_index, 4);
        assert_eq!(located.score, 120);
        assert_eq!(located.action, PlannedAction::Click);
        assert!(located.candidate.is_none());
    }

    #[test]
    fn parse_hit_carries_the_annotated_candidate() {
        use crate::data_models::candidate::ElementKind;

        let intent = Intent::SelectVariant {
            kind: "color".into(),
            value: "Red".into(),
        };
        let hit = serde_json::json!({
            "found": true,
            "elementIndex": 1,
            "action": "click",
            "score": 100,
            "candidate": {
                "elementIndex": 1,
                "kind": "swatch",
                "tagName": "IMG",
                "textBag": { "alt": "Red" },
                "geometry": { "x": 4.0, "y": 8.0, "w": 32.0, "h": 32.0, "inViewport": true },
                "interactive": true,
                "score": 100
            }
        });
        let located = parse_hit(&intent, &hit, 2, "m", SearchPhase::Overlay).expect("hit");
        let candidate = located.candidate.expect("candidate");
        assert_eq!(candidate.frame, 2);
        assert_eq!(candidate.kind, ElementKind::Swatch);
        assert!(candidate.interactive);
        assert!(candidate.geometry.has_area());
    }
}
