use crate::driver::{DriverResult, PageDriver};
use crate::js::{self, JsAsset};
use crate::normalizer::{site_hint, StoreFamily, EXCLUDED_SECTION_TOKENS};
use serde_json::{json, Value};

/// # NDOC
/// component: `indexer`
/// purpose: Owns the selector tiers and the search-scope decision. The
///          enumeration itself happens in the search payloads; this
///          module decides *what* they enumerate and *where*.
/// invariants:
///   - Tier selection is data handed to payloads, never branched in JS.
///   - Frame traversal is the locator's job; the indexer works one root.

/// Strict action elements.
pub const TIER_A: &[&str] = &[
    "button",
    "[role=\"button\"]",
    "input[type=\"submit\"]",
    "input[type=\"button\"]",
];

/// Selection widgets.
pub const TIER_B: &[&str] = &[
    "input[type=\"radio\"]",
    "input[type=\"checkbox\"]",
    "label",
    "select",
    "option",
    "[role=\"option\"]",
    "[role=\"combobox\"]",
];

/// Permissive discovery additions.
pub const TIER_C: &[&str] = &[
    "a",
    "[onclick]",
    "[style*=\"cursor:pointer\"]",
    "[class*=\"clickable\"]",
    "[class*=\"selectable\"]",
    "[class*=\"swatch\"]",
    "img[alt]",
];

/// Form inputs.
pub const TIER_D: &[&str] = &[
    "input:not([type=\"hidden\"]):not([type=\"checkbox\"]):not([type=\"radio\"])",
    "textarea",
    "select",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorTier {
    Actions,
    Selection,
    Permissive,
    Inputs,
    /// Tier A ∪ B, the overlay phase's default pool.
    ActionsAndSelection,
}

impl SelectorTier {
    pub fn selectors(self) -> Vec<&'static str> {
        match self {
            SelectorTier::Actions => TIER_A.to_vec(),
            SelectorTier::Selection => TIER_B.to_vec(),
            SelectorTier::Permissive => {
                let mut v = TIER_A.to_vec();
                v.extend_from_slice(TIER_B);
                v.extend_from_slice(TIER_C);
                v
            }
            SelectorTier::Inputs => TIER_D.to_vec(),
            SelectorTier::ActionsAndSelection => {
                let mut v = TIER_A.to_vec();
                v.extend_from_slice(TIER_B);
                v
            }
        }
    }
}

/// Product containers that bound a variant search when one is visible
/// and tall enough to be the real thing.
pub const GENERIC_CONTAINERS: &[&str] = &[
    "[data-testid=\"product-container\"]",
    ".product-detail",
    ".product-main",
    "#product-main",
    ".pdp-main",
    ".product-info-main",
    "main",
];

/// Containers the phase-2 tree walk starts from.
pub const TREE_WALK_CONTAINERS: &[&str] = &[
    "form[data-product-id]",
    ".variant-selector",
    "[class*=\"product\"]",
    "[class*=\"variant\"]",
    "[class*=\"option\"]",
    "main",
];

/// Storefront-family boosts for container detection.
fn site_containers(family: StoreFamily) -> Vec<&'static str> {
    match family {
        StoreFamily::Myntra => vec![".pdp-main", ".pdp-product-detail", ".pdpContent"],
        StoreFamily::Amazon => vec!["#dp-container", "#ppd", "#rightCol", "#centerCol"],
        StoreFamily::Ajio => vec![".prod-desc", ".pdp-cont", ".product-content"],
        StoreFamily::Flipkart => vec!["._1YokD2", "._2c7YLP", ".col-8-12"],
        StoreFamily::BigBasket => vec![".product-main", ".product-detail"],
        StoreFamily::Swiggy => vec![".product-container", ".item-details"],
        _ => Vec::new(),
    }
}

/// Detect the main product container on the given frame. `None` means
/// search the whole document with exclusions applied.
pub async fn detect_container(driver: &dyn PageDriver, frame: usize) -> DriverResult<Option<String>> {
    let family = site_hint(&driver.page_url());
    let args = json!({
        "siteSelectors": site_containers(family),
        "genericSelectors": GENERIC_CONTAINERS,
    });
    let result = driver
        .evaluate(frame, js::composed(JsAsset::ContainerDetect), args)
        .await?;
    Ok(result
        .get("selector")
        .and_then(Value::as_str)
        .map(|s| s.to_string()))
}

/// The exclusion token set as JSON, ready to pass into any payload.
pub fn exclusion_tokens() -> Value {
    json!(EXCLUDED_SECTION_TOKENS)
}
