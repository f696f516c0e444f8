use crate::contracts::DismissReport;
use crate::engine::Context;
use crate::js::{self, JsAsset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One popup-close affordance: a selector, optionally narrowed by the
/// texts its matches must carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopupRule {
    pub selector: String,
    #[serde(default)]
    pub texts: Vec<String>,
}

/// The minimal built-in catalog. The heavy dismissal heuristics are an
/// external collaborator; orchestrators inject their own catalogs here.
pub fn builtin_catalog() -> Vec<PopupRule> {
    vec![
        PopupRule {
            selector: "[class*=\"cookie\"] button, #onetrust-accept-btn-handler".into(),
            texts: vec!["accept".into(), "agree".into(), "allow".into(), "got it".into()],
        },
        PopupRule {
            selector: "[class*=\"newsletter\"] [class*=\"close\"], [class*=\"popup\"] [class*=\"close\"]".into(),
            texts: Vec::new(),
        },
        PopupRule {
            selector: "[role=\"dialog\"] [aria-label=\"Close\"], [role=\"dialog\"] button[class*=\"close\"]".into(),
            texts: Vec::new(),
        },
    ]
}

/// One catalog sweep over the main frame.
pub async fn dismiss(ctx: &Context, catalog: &[PopupRule]) -> DismissReport {
    let args = json!({ "catalog": catalog });
    match ctx
        .driver
        .evaluate(0, js::composed(JsAsset::PopupDismiss), args)
        .await
    {
        Ok(result) => DismissReport {
            dismissed_count: result
                .get("dismissed")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
        },
        Err(e) => {
            log::warn!(target: "engine", "popup sweep failed: {}", e);
            DismissReport { dismissed_count: 0 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_serializes_for_the_payload() {
        let catalog = builtin_catalog();
        assert!(!catalog.is_empty());
        let v = serde_json::to_value(&catalog).expect("serialize");
        assert!(v[0].get("selector").is_some());
    }
}
