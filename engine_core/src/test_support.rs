//! Scripted fake driver for exercising the engine without a browser.
//! Responders match on payload needles (the `// asset:` headers or any
//! distinctive substring) and take priority over the built-in defaults.

use crate::driver::{DriverError, DriverResult, FrameInfo, PageDriver};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(usize, &str, &Value) -> Option<Value> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Evaluate { frame: usize, asset: String, args: Value },
    ClickXy { x: f64, y: f64 },
    TypeText(String),
    PressKey(String),
    Goto(String),
    Screenshot,
}

pub struct FakeDriver {
    url: Mutex<String>,
    frames: Mutex<Vec<FrameInfo>>,
    content: Mutex<String>,
    responders: Mutex<Vec<(String, Responder)>>,
    pub calls: Mutex<Vec<Call>>,
    pub click_error: Mutex<Option<DriverError>>,
}

fn asset_name(expression: &str) -> String {
    // The shared helper prelude carries its own header; the payload's
    // header comes last, so the last match names the evaluation.
    let mut name = None;
    for line in expression.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("// asset: ") {
            name = Some(rest.trim().to_string());
        }
    }
    name.unwrap_or_else(|| "inline".to_string())
}

impl FakeDriver {
    pub fn new(url: &str) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            frames: Mutex::new(vec![FrameInfo {
                index: 0,
                url: url.to_string(),
                name: String::new(),
            }]),
            content: Mutex::new("<html><body></body></html>".to_string()),
            responders: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            click_error: Mutex::new(None),
        }
    }

    /// Register a responder for any evaluation whose payload contains
    /// `needle`. Later registrations win over earlier ones.
    pub fn on<F>(&self, needle: &str, f: F)
    where
        F: Fn(usize, &str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .expect("responders lock")
            .insert(0, (needle.to_string(), Box::new(f)));
    }

    /// Convenience: a fixed response for every evaluation matching
    /// `needle`.
    pub fn respond(&self, needle: &str, value: Value) {
        self.on(needle, move |_, _, _| Some(value.clone()));
    }

    pub fn set_content(&self, html: &str) {
        *self.content.lock().expect("content lock") = html.to_string();
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock().expect("url lock") = url.to_string();
    }

    pub fn fail_clicks_with(&self, error: DriverError) {
        *self.click_error.lock().expect("click error lock") = Some(error);
    }

    pub fn calls_snapshot(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn evaluations_of(&self, asset: &str) -> Vec<(usize, Value)> {
        self.calls_snapshot()
            .into_iter()
            .filter_map(|c| match c {
                Call::Evaluate {
                    frame,
                    asset: a,
                    args,
                } if a == asset => Some((frame, args)),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<(f64, f64)> {
        self.calls_snapshot()
            .into_iter()
            .filter_map(|c| match c {
                Call::ClickXy { x, y } => Some((x, y)),
                _ => None,
            })
            .collect()
    }

    pub fn typed(&self) -> Vec<String> {
        self.calls_snapshot()
            .into_iter()
            .filter_map(|c| match c {
                Call::TypeText(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn default_response(expression: &str, args: &Value) -> Value {
        let asset = asset_name(expression);
        let op = args.get("op").and_then(Value::as_str).unwrap_or("");
        match asset.as_str() {
            "container_detect" => json!({ "selector": null, "source": null }),
            "overlay_search" | "dom_tree_search" | "pattern_match" | "discovery"
            | "payment_iframe_detect" => json!({ "found": false }),
            "inspect_element" => json!({
                "found": true,
                "rect": { "x": 80.0, "y": 90.0, "width": 40.0, "height": 20.0 },
                "center": { "x": 100.0, "y": 100.0 },
                "isVisible": true,
                "isEnabled": true,
                "isObscured": false,
                "window": { "innerWidth": 1280.0, "innerHeight": 800.0 }
            }),
            "action_click" => json!({ "success": true, "strategy": "element_click" }),
            "action_dropdown" => json!({ "success": false, "error": "unscripted" }),
            "action_quantity" => json!({ "success": false, "error": "unscripted" }),
            "action_fill" => match op {
                "read" => json!({ "success": true, "value": "" }),
                _ => json!({ "success": true, "finalValue": "" }),
            },
            "verification" => match op {
                "errors" => json!({ "errors": [] }),
                "checked" => json!({ "found": false }),
                _ => json!({ "verified": false }),
            },
            "marker_sweep" => json!({ "removed": 0 }),
            "shipping_scan" => json!({ "success": false, "optionCount": 0 }),
            "popup_dismiss" => json!({ "dismissed": 0 }),
            _ => json!({}),
        }
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    fn page_url(&self) -> String {
        self.url.lock().expect("url lock").clone()
    }

    async fn title(&self) -> DriverResult<String> {
        Ok("Fake Storefront".to_string())
    }

    async fn content(&self) -> DriverResult<String> {
        Ok(self.content.lock().expect("content lock").clone())
    }

    async fn frames(&self) -> DriverResult<Vec<FrameInfo>> {
        Ok(self.frames.lock().expect("frames lock").clone())
    }

    async fn evaluate(&self, frame: usize, expression: &str, args: Value) -> DriverResult<Value> {
        self.calls.lock().expect("calls lock").push(Call::Evaluate {
            frame,
            asset: asset_name(expression),
            args: args.clone(),
        });
        let responders = self.responders.lock().expect("responders lock");
        for (needle, responder) in responders.iter() {
            if expression.contains(needle.as_str()) {
                if let Some(v) = responder(frame, expression, &args) {
                    return Ok(v);
                }
            }
        }
        Ok(Self::default_response(expression, &args))
    }

    async fn click_xy(&self, x: f64, y: f64) -> DriverResult<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(Call::ClickXy { x, y });
        if let Some(e) = self.click_error.lock().expect("click error lock").clone() {
            return Err(e);
        }
        Ok(())
    }

    async fn type_text(&self, text: &str, _delay_ms: u64) -> DriverResult<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(Call::TypeText(text.to_string()));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> DriverResult<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(Call::PressKey(key.to_string()));
        Ok(())
    }

    async fn goto(&self, url: &str, _timeout: Duration) -> DriverResult<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(Call::Goto(url.to_string()));
        self.set_url(url);
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    async fn screenshot(&self, _path: &Path, _full_page: bool) -> DriverResult<()> {
        self.calls.lock().expect("calls lock").push(Call::Screenshot);
        Ok(())
    }
}

/// A config tuned so failing-path tests stay fast.
pub fn quick_config() -> crate::config::EngineConfig {
    let mut cfg = crate::config::EngineConfig::default();
    cfg.restabilize_wait = Duration::from_millis(10);
    cfg.navigation_settle = Duration::from_millis(10);
    cfg.dropdown_render_wait = Duration::from_millis(50);
    cfg.dependent_dropdown_wait = Duration::from_millis(300);
    cfg
}

/// A profile every test can share.
pub fn sample_profile() -> crate::data_models::profile::CustomerProfile {
    use crate::data_models::profile::{CustomerProfile, ShippingAddress};
    CustomerProfile {
        email: "ada@example.com".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        phone: "+1 415 555 0142".into(),
        shipping: ShippingAddress {
            line1: "12 Analytical Way".into(),
            line2: String::new(),
            landmark: String::new(),
            city: "San Francisco".into(),
            state: "CA".into(),
            postal: "94107".into(),
            country: "US".into(),
        },
        payment: None,
    }
}
