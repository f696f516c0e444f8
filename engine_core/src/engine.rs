use crate::address::{self, AddressOutcome};
use crate::config::EngineConfig;
use crate::contracts::{
    ClickKind, DismissReport, FieldKind, Intent, Outcome, SelectionCheck,
};
use crate::controller;
use crate::data_models::profile::CustomerProfile;
use crate::driver::PageDriver;
use crate::handlers::HandlerTable;
use crate::invariants;
use crate::keywords::KeywordCatalog;
use crate::ocr::OcrEngine;
use crate::executor;
use crate::js;
use crate::popups::{self, PopupRule};
use crate::shipping;
use crate::verifier;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// One visible form control, for orchestrator-side planning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormField {
    pub label: String,
    pub name: String,
    pub id: String,
    pub input_type: String,
    pub required: bool,
}

const FORM_FIELDS_JS: &str = r#"
    // probe: form_fields
    (args) => {
        const fields = [];
        const selector =
            'input:not([type="hidden"]):not([type="checkbox"]):not([type="radio"]), ' +
            'textarea, select';
        for (const el of document.querySelectorAll(selector)) {
            if (!__isVisible(el)) continue;
            fields.push({
                label: __labelTextFor(el).slice(0, 120),
                name: el.name || '',
                id: el.id || '',
                inputType: el.tagName === 'SELECT' ? 'select'
                    : el.tagName === 'TEXTAREA' ? 'textarea'
                    : (el.type || 'text'),
                required: !!el.required
            });
        }
        return { fields: fields };
    }
"#;

/// # NDOC
/// component: `engine`
/// purpose: Everything a public operation needs, threaded explicitly
///          through every call instead of module-level globals.
pub struct Context {
    pub driver: Arc<dyn PageDriver>,
    pub profile: CustomerProfile,
    pub config: EngineConfig,
    pub keywords: KeywordCatalog,
    pub handlers: HandlerTable,
    pub ocr: Option<Arc<dyn OcrEngine>>,
}

/// The engine facade an orchestrator talks to. One engine owns one page
/// for the duration of each intent; operations are sequential, never
/// reentrant.
pub struct Engine {
    ctx: Context,
    popup_catalog: Vec<PopupRule>,
}

impl Engine {
    pub fn new(driver: Arc<dyn PageDriver>, profile: CustomerProfile) -> Self {
        Self {
            ctx: Context {
                driver,
                profile,
                config: EngineConfig::default(),
                keywords: KeywordCatalog::default(),
                handlers: HandlerTable::builtin(),
                ocr: None,
            },
            popup_catalog: popups::builtin_catalog(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.ctx.config = config;
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordCatalog) -> Self {
        self.ctx.keywords = keywords;
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.ctx.handlers = handlers;
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ctx.ocr = Some(ocr);
        self.ctx.config.ocr_enabled = true;
        self
    }

    pub fn with_popup_catalog(mut self, catalog: Vec<PopupRule>) -> Self {
        self.popup_catalog = catalog;
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Select a product variant ("color" = "Midnight Blue").
    pub async fn find_and_select_variant(&self, kind: &str, value: &str) -> Outcome {
        let action = format!("select_variant:{}", kind);
        if let Err(outcome) = invariants::ensure_non_empty_trimmed(value, "value", &action) {
            return outcome;
        }
        controller::run_intent(
            &self.ctx,
            Intent::SelectVariant {
                kind: kind.to_string(),
                value: value.to_string(),
            },
        )
        .await
    }

    pub async fn add_to_cart(&self) -> Outcome {
        controller::run_intent(
            &self.ctx,
            Intent::ClickAction {
                kind: ClickKind::AddToCart,
            },
        )
        .await
    }

    pub async fn navigate_to_cart(&self) -> Outcome {
        controller::navigate_to_cart(&self.ctx).await
    }

    /// Click through to checkout, with the full recovery chain behind it
    /// (cart icon, direct cart URLs, return-and-retry).
    pub async fn proceed_to_checkout(&self) -> Outcome {
        controller::run_intent(
            &self.ctx,
            Intent::ClickAction {
                kind: ClickKind::Checkout,
            },
        )
        .await
    }

    /// Click a button matched by the caller's own keyword list.
    pub async fn find_and_click_button(&self, keywords: &[&str], max_retries: u32) -> Outcome {
        if let Err(outcome) = invariants::ensure_keywords(keywords, "click") {
            return outcome;
        }
        let ctx = self.retry_scoped(max_retries);
        let mut catalog = ctx.keywords.clone();
        let kind = ClickKind::Custom(keywords[0].to_string());
        catalog.override_action(
            kind.clone(),
            keywords.iter().map(|s| s.to_string()).collect(),
        );
        let ctx = Context {
            keywords: catalog,
            ..ctx
        };
        controller::run_intent(&ctx, Intent::ClickAction { kind }).await
    }

    /// Fill a labelled input. `label_keywords` override the registry's
    /// list for this one call.
    pub async fn fill_input_field(
        &self,
        label_keywords: &[&str],
        value: &str,
        max_retries: u32,
    ) -> Outcome {
        if let Err(outcome) = invariants::ensure_keywords(label_keywords, "fill") {
            return outcome;
        }
        if let Err(outcome) = invariants::ensure_non_empty_trimmed(value, "value", "fill") {
            return outcome;
        }
        let ctx = self.retry_scoped(max_retries);
        let field = FieldKind::Custom(label_keywords[0].to_string());
        let mut catalog = ctx.keywords.clone();
        catalog.override_field(
            field.clone(),
            label_keywords.iter().map(|s| s.to_string()).collect(),
        );
        let ctx = Context {
            keywords: catalog,
            ..ctx
        };
        controller::run_intent(
            &ctx,
            Intent::FillField {
                field,
                value: value.to_string(),
            },
        )
        .await
    }

    /// Fill a field the registry already knows (email, postal, ...).
    pub async fn fill_known_field(&self, field: FieldKind, value: &str) -> Outcome {
        if let Err(outcome) = invariants::ensure_non_empty_trimmed(value, "value", "fill") {
            return outcome;
        }
        controller::run_intent(
            &self.ctx,
            Intent::FillField {
                field,
                value: value.to_string(),
            },
        )
        .await
    }

    pub async fn find_and_select_dropdown(
        &self,
        label_keywords: &[&str],
        option_value: &str,
        max_retries: u32,
    ) -> Outcome {
        if let Err(outcome) = invariants::ensure_keywords(label_keywords, "dropdown") {
            return outcome;
        }
        if let Err(outcome) =
            invariants::ensure_non_empty_trimmed(option_value, "option", "dropdown")
        {
            return outcome;
        }
        let ctx = self.retry_scoped(max_retries);
        let field = FieldKind::Custom(label_keywords[0].to_string());
        let mut catalog = ctx.keywords.clone();
        catalog.override_field(
            field.clone(),
            label_keywords.iter().map(|s| s.to_string()).collect(),
        );
        let ctx = Context {
            keywords: catalog,
            ..ctx
        };
        controller::run_intent(
            &ctx,
            Intent::SelectDropdown {
                field,
                value: option_value.to_string(),
            },
        )
        .await
    }

    pub async fn set_quantity(&self, value: u32) -> Outcome {
        if let Err(outcome) = invariants::ensure_quantity(value, "quantity") {
            return outcome;
        }
        controller::run_intent(&self.ctx, Intent::SetQuantity { value }).await
    }

    pub async fn set_checkbox(&self, label: &str, checked: bool) -> Outcome {
        if let Err(outcome) = invariants::ensure_non_empty_trimmed(label, "label", "checkbox") {
            return outcome;
        }
        controller::run_intent(
            &self.ctx,
            Intent::Checkbox {
                label: label.to_string(),
                checked,
            },
        )
        .await
    }

    pub async fn select_cheapest_shipping(&self, max_retries: u32) -> Outcome {
        shipping::select_cheapest(&self.ctx, max_retries).await
    }

    /// Read-only probe: is this variant currently selected? Never clicks
    /// or fills; safe to call repeatedly.
    pub async fn verify_selection(&self, kind: &str, value: &str) -> SelectionCheck {
        match verifier::verify_selection(&self.ctx, kind, value, 0).await {
            Ok(check) => check,
            Err(e) => SelectionCheck {
                verified: false,
                matched_text: None,
                method: format!("verification error: {}", e),
            },
        }
    }

    /// Visible validation messages, for orchestrator-side re-fills.
    pub async fn validation_errors(&self) -> Vec<String> {
        verifier::validation_errors(&self.ctx)
            .await
            .unwrap_or_default()
    }

    pub async fn dismiss_popups(&self) -> DismissReport {
        popups::dismiss(&self.ctx, &self.popup_catalog).await
    }

    /// Saved-address match-or-add-new, see the address module.
    pub async fn verify_address(&self) -> AddressOutcome {
        address::verify_and_select(&self.ctx).await
    }

    /// After a selection that spawns a dependent control (country ->
    /// state), wait for the new `<select>` to appear.
    pub async fn wait_for_dependent_dropdown(&self) -> bool {
        executor::wait_for_dependent_dropdown(&self.ctx, 0)
            .await
            .unwrap_or(false)
    }

    /// Enumerate the page's visible form fields with their labels.
    pub async fn form_fields(&self) -> Vec<FormField> {
        let script = js::compose_inline(FORM_FIELDS_JS);
        match self.ctx.driver.evaluate(0, &script, json!({})).await {
            Ok(result) => result
                .get("fields")
                .cloned()
                .and_then(|v: Value| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            Err(e) => {
                log::warn!(target: "engine", "form field inventory failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Ordered fills sharing one stability wait.
    pub async fn fill_many(&self, fields: &[(FieldKind, String)]) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(fields.len());
        for (field, value) in fields {
            let outcome = self.fill_known_field(field.clone(), value).await;
            let failed_terminally = outcome
                .error
                .as_ref()
                .map(|e| e.kind == crate::contracts::ErrorKind::BrowserDisconnected)
                .unwrap_or(false);
            outcomes.push(outcome);
            if failed_terminally {
                break;
            }
        }
        outcomes
    }

    /// A context clone with the attempt budget swapped for this call.
    fn retry_scoped(&self, max_retries: u32) -> Context {
        let mut config = self.ctx.config.clone();
        config.max_attempts = max_retries.max(1);
        Context {
            driver: Arc::clone(&self.ctx.driver),
            profile: self.ctx.profile.clone(),
            config,
            keywords: self.ctx.keywords.clone(),
            handlers: self.ctx.handlers.clone(),
            ocr: self.ctx.ocr.clone(),
        }
    }
}
