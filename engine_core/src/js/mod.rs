use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::HashMap;

/// # NDOC
/// component: `js`
/// purpose: The pre-authored browser payloads and the harness that wraps
///          them for evaluation. Payloads are data, not code: the engine
///          composes and ships them as opaque strings.
/// invariants:
///   - Every payload is a single function expression taking one args object.
///   - The wrapped form awaits thenables, strips non-ASCII from returned
///     strings, and converts thrown exceptions into `{found:false, error}`.
///   - Composition happens once, at first use, per asset.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsAsset {
    OverlaySearch,
    DomTreeSearch,
    PatternMatch,
    Discovery,
    InspectElement,
    ActionClick,
    ActionDropdown,
    ActionQuantity,
    ActionFill,
    Verification,
    ShippingScan,
    PopupDismiss,
    ContainerDetect,
    MarkerSweep,
    PaymentIframeDetect,
}

const EXCLUSION_HELPER: &str = include_str!("assets/exclusion_helper.js");

impl JsAsset {
    fn source(self) -> &'static str {
        match self {
            JsAsset::OverlaySearch => include_str!("assets/overlay_search.js"),
            JsAsset::DomTreeSearch => include_str!("assets/dom_tree_search.js"),
            JsAsset::PatternMatch => include_str!("assets/pattern_match.js"),
            JsAsset::Discovery => include_str!("assets/discovery.js"),
            JsAsset::InspectElement => include_str!("assets/inspect_element.js"),
            JsAsset::ActionClick => include_str!("assets/action_click.js"),
            JsAsset::ActionDropdown => include_str!("assets/action_dropdown.js"),
            JsAsset::ActionQuantity => include_str!("assets/action_quantity.js"),
            JsAsset::ActionFill => include_str!("assets/action_fill.js"),
            JsAsset::Verification => include_str!("assets/verification.js"),
            JsAsset::ShippingScan => include_str!("assets/shipping_scan.js"),
            JsAsset::PopupDismiss => include_str!("assets/popup_dismiss.js"),
            JsAsset::ContainerDetect => include_str!("assets/container_detect.js"),
            JsAsset::MarkerSweep => include_str!("assets/marker_sweep.js"),
            JsAsset::PaymentIframeDetect => include_str!("assets/payment_iframe_detect.js"),
        }
    }

    const ALL: &'static [JsAsset] = &[
        JsAsset::OverlaySearch,
        JsAsset::DomTreeSearch,
        JsAsset::PatternMatch,
        JsAsset::Discovery,
        JsAsset::InspectElement,
        JsAsset::ActionClick,
        JsAsset::ActionDropdown,
        JsAsset::ActionQuantity,
        JsAsset::ActionFill,
        JsAsset::Verification,
        JsAsset::ShippingScan,
        JsAsset::PopupDismiss,
        JsAsset::ContainerDetect,
        JsAsset::MarkerSweep,
        JsAsset::PaymentIframeDetect,
    ];
}

/// Wrap a payload with the shared helpers and the sanitization harness.
fn wrap(payload: &str) -> String {
    format!(
        r#"async (args) => {{
{helper}
    const originalFunc = {payload};
    try {{
        let result = originalFunc(args);
        if (result && typeof result.then === 'function') {{
            result = await result;
        }}
        const sanitize = (obj) => {{
            if (typeof obj === 'string') {{
                return obj.replace(/[^\x00-\x7F]/g, '?');
            }}
            if (Array.isArray(obj)) {{
                return obj.map(sanitize);
            }}
            if (obj && typeof obj === 'object') {{
                const out = {{}};
                for (const key in obj) {{
                    out[key] = sanitize(obj[key]);
                }}
                return out;
            }}
            return obj;
        }};
        return sanitize(result);
    }} catch (e) {{
        return {{ found: false, error: e.toString() }};
    }}
}}"#,
        helper = EXCLUSION_HELPER,
        payload = payload,
    )
}

static COMPOSED: Lazy<HashMap<JsAsset, String>> = Lazy::new(|| {
    JsAsset::ALL
        .iter()
        .map(|asset| (*asset, wrap(asset.source())))
        .collect()
});

/// The wrapped, ready-to-evaluate form of an asset.
pub fn composed(asset: JsAsset) -> &'static str {
    COMPOSED
        .get(&asset)
        .map(|s| s.as_str())
        .expect("every asset is composed at load time")
}

/// Wrap an ad-hoc snippet with the same harness the assets get.
pub fn compose_inline(payload: &str) -> String {
    wrap(payload)
}

/// A fresh per-intent marker token. Markers scope every DOM attribute
/// the engine writes, so two intents can never read each other's tags.
pub fn new_marker() -> String {
    let mut rng = rand::thread_rng();
    format!("ec-{:08x}", rng.gen::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_asset_composes_with_harness() {
        for asset in JsAsset::ALL {
            let s = composed(*asset);
            assert!(s.starts_with("async (args) =>"), "{:?}", asset);
            assert!(s.contains("originalFunc"), "{:?}", asset);
            assert!(s.contains("sanitize"), "{:?}", asset);
            assert!(s.contains("isInExcludedSection"), "{:?}", asset);
        }
    }

    #[test]
    fn assets_carry_their_routing_needle() {
        assert!(composed(JsAsset::OverlaySearch).contains("// asset: overlay_search"));
        assert!(composed(JsAsset::Verification).contains("// asset: verification"));
        assert!(composed(JsAsset::MarkerSweep).contains("// asset: marker_sweep"));
    }

    #[test]
    fn markers_are_unique_per_call() {
        let a = new_marker();
        let b = new_marker();
        assert!(a.starts_with("ec-"));
        assert_eq!(a.len(), "ec-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn inline_composition_uses_same_harness() {
        let wrapped = compose_inline("(args) => 42");
        assert!(wrapped.contains("const originalFunc = (args) => 42"));
        assert!(wrapped.contains("sanitize"));
    }
}
