use crate::contracts::{Intent, Outcome};
use crate::engine::Context;
use crate::js;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Site handlers run before the generic cascade and may claim an intent
/// outright or wave it through.
pub enum HandlerDecision {
    Handled(Outcome),
    Skip,
}

#[async_trait]
pub trait SiteHandler: Send + Sync {
    async fn handle(&self, ctx: &Context, intent: &Intent) -> HandlerDecision;
}

/// hostname-substring -> handler. First matching entry wins; a `Skip`
/// from the handler falls through to the cascade, not to later entries.
#[derive(Clone, Default)]
pub struct HandlerTable {
    entries: Vec<(String, Arc<dyn SiteHandler>)>,
}

impl HandlerTable {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        table.register("patagonia.com", Arc::new(SwatchCaptionHandler));
        table
    }

    pub fn register(&mut self, host_substring: &str, handler: Arc<dyn SiteHandler>) {
        self.entries.push((host_substring.to_string(), handler));
    }

    pub fn lookup(&self, page_url: &str) -> Option<Arc<dyn SiteHandler>> {
        let host = url::Url::parse(page_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))?;
        self.entries
            .iter()
            .find(|(needle, _)| host.contains(needle.as_str()))
            .map(|(_, h)| Arc::clone(h))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const SWATCH_CAPTION_JS: &str = r#"
    (args) => {
        const { kind, value } = args;
        const norm = (t) => String(t || '').toLowerCase();
        if (kind === 'color') {
            const buttons = document.querySelectorAll('button.product-swatch[data-caption]');
            for (const btn of buttons) {
                const caption = btn.getAttribute('data-caption');
                if (caption && norm(caption).includes(norm(value))) {
                    btn.scrollIntoView({ block: 'center' });
                    btn.click();
                    return { clicked: true, matchedText: caption };
                }
            }
            return { clicked: false };
        }
        if (kind === 'size') {
            const buttons = document.querySelectorAll('button[data-attr-value]');
            for (const btn of buttons) {
                const attr = btn.getAttribute('data-attr-value');
                const text = (btn.textContent || '').trim();
                if ((attr && attr === value) || (text && text === value)) {
                    btn.scrollIntoView({ block: 'center' });
                    btn.click();
                    return { clicked: true, matchedText: attr || text };
                }
            }
            return { clicked: false };
        }
        return { clicked: false };
    }
"#;

/// Storefronts that key their swatches off `data-caption` (colors) and
/// `data-attr-value` (sizes) instead of anything the generic cascade can
/// see as text.
pub struct SwatchCaptionHandler;

#[async_trait]
impl SiteHandler for SwatchCaptionHandler {
    async fn handle(&self, ctx: &Context, intent: &Intent) -> HandlerDecision {
        let (kind, value) = match intent {
            Intent::SelectVariant { kind, value } => (kind.to_lowercase(), value.clone()),
            _ => return HandlerDecision::Skip,
        };
        if kind != "color" && kind != "size" {
            return HandlerDecision::Skip;
        }

        let script = js::compose_inline(SWATCH_CAPTION_JS);
        let result: Value = match ctx
            .driver
            .evaluate(0, &script, json!({ "kind": kind, "value": value }))
            .await
        {
            Ok(v) => v,
            Err(_) => return HandlerDecision::Skip,
        };

        if result.get("clicked").and_then(Value::as_bool) == Some(true) {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let matched = result
                .get("matchedText")
                .and_then(Value::as_str)
                .map(|s| s.to_string());
            let outcome =
                Outcome::success(intent.label(), "site-handler:data-caption").verified(matched);
            HandlerDecision::Handled(outcome)
        } else {
            HandlerDecision::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_host_substring() {
        let table = HandlerTable::builtin();
        assert!(table
            .lookup("https://www.patagonia.com/product/p-1")
            .is_some());
        assert!(table.lookup("https://example.com/product").is_none());
        assert!(table.lookup("garbage-url").is_none());
    }

    #[test]
    fn builtin_table_is_populated() {
        assert!(!HandlerTable::builtin().is_empty());
        assert!(HandlerTable::default().is_empty());
    }
}
