use super::{classify_failure, DriverError, DriverResult, FrameInfo, PageDriver};
use async_trait::async_trait;
use playwright::api::{Frame, Page};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Production driver: wraps a playwright page behind the engine's
/// `PageDriver` contract.
///
/// The 0.0.x binding exposes no input-device API, so coordinate clicks
/// and keystrokes are synthesized in-page through `evaluate`.
pub struct PlaywrightPage {
    page: Page,
}

impl PlaywrightPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    fn frames_inner(&self) -> DriverResult<Vec<Frame>> {
        self.page
            .frames()
            .map_err(|e| classify_failure(&e.to_string()))
    }

    fn nth_frame(&self, index: usize) -> DriverResult<Frame> {
        let frames = self.frames_inner()?;
        frames
            .into_iter()
            .nth(index)
            .ok_or_else(|| DriverError::Protocol(format!("frame index {} out of range", index)))
    }
}

const CLICK_XY_JS: &str = r#"
    (args) => {
        const { x, y } = args;
        const el = document.elementFromPoint(x, y);
        if (!el) return false;
        for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup', 'click']) {
            const Ctor = type.startsWith('pointer') ? PointerEvent : MouseEvent;
            el.dispatchEvent(new Ctor(type, {
                bubbles: true,
                cancelable: true,
                view: window,
                clientX: x,
                clientY: y
            }));
        }
        return true;
    }
"#;

const TYPE_TEXT_JS: &str = r#"
    async (args) => {
        const { text, delay } = args;
        const sleep = (ms) => new Promise(r => setTimeout(r, ms));
        const el = document.activeElement;
        if (!el) return false;
        const setter = el instanceof HTMLInputElement
            ? Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value')
            : el instanceof HTMLTextAreaElement
                ? Object.getOwnPropertyDescriptor(HTMLTextAreaElement.prototype, 'value')
                : null;
        for (const ch of text) {
            el.dispatchEvent(new KeyboardEvent('keydown', { key: ch, bubbles: true }));
            if (setter) {
                setter.set.call(el, (el.value || '') + ch);
            }
            el.dispatchEvent(new InputEvent('input', { data: ch, bubbles: true }));
            el.dispatchEvent(new KeyboardEvent('keyup', { key: ch, bubbles: true }));
            if (delay > 0) await sleep(delay);
        }
        return true;
    }
"#;

const PRESS_KEY_JS: &str = r#"
    (args) => {
        const { key } = args;
        const el = document.activeElement || document.body;
        el.dispatchEvent(new KeyboardEvent('keydown', { key, bubbles: true }));
        el.dispatchEvent(new KeyboardEvent('keyup', { key, bubbles: true }));
        if (key === 'Tab') {
            el.dispatchEvent(new FocusEvent('blur', { bubbles: true }));
        }
        return true;
    }
"#;

const READY_STATE_JS: &str = "() => document.readyState";

#[async_trait]
impl PageDriver for PlaywrightPage {
    fn page_url(&self) -> String {
        self.page.url().unwrap_or_default()
    }

    async fn title(&self) -> DriverResult<String> {
        self.page
            .title()
            .await
            .map_err(|e| classify_failure(&e.to_string()))
    }

    async fn content(&self) -> DriverResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| classify_failure(&e.to_string()))
    }

    async fn frames(&self) -> DriverResult<Vec<FrameInfo>> {
        let frames = self.frames_inner()?;
        Ok(frames
            .iter()
            .enumerate()
            .map(|(index, f)| FrameInfo {
                index,
                url: f.url().unwrap_or_default(),
                name: f.name().unwrap_or_default(),
            })
            .collect())
    }

    async fn evaluate(&self, frame: usize, expression: &str, args: Value) -> DriverResult<Value> {
        if frame == 0 {
            return self
                .page
                .evaluate::<Value, Value>(expression, args)
                .await
                .map_err(|e| classify_failure(&e.to_string()));
        }
        let target = self.nth_frame(frame)?;
        target
            .evaluate::<Value, Value>(expression, args)
            .await
            .map_err(|e| classify_failure(&e.to_string()))
    }

    async fn click_xy(&self, x: f64, y: f64) -> DriverResult<()> {
        let hit: Value = self
            .page
            .evaluate::<Value, Value>(CLICK_XY_JS, serde_json::json!({ "x": x, "y": y }))
            .await
            .map_err(|e| classify_failure(&e.to_string()))?;
        if hit.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::Evaluation(format!(
                "no element at ({}, {})",
                x, y
            )))
        }
    }

    async fn type_text(&self, text: &str, delay_ms: u64) -> DriverResult<()> {
        self.page
            .evaluate::<Value, Value>(
                TYPE_TEXT_JS,
                serde_json::json!({ "text": text, "delay": delay_ms }),
            )
            .await
            .map_err(|e| classify_failure(&e.to_string()))?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> DriverResult<()> {
        self.page
            .evaluate::<Value, Value>(PRESS_KEY_JS, serde_json::json!({ "key": key }))
            .await
            .map_err(|e| classify_failure(&e.to_string()))?;
        Ok(())
    }

    async fn goto(&self, url: &str, timeout: Duration) -> DriverResult<()> {
        let nav = self.page.goto_builder(url).goto();
        match tokio::time::timeout(timeout, nav).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(classify_failure(&e.to_string())),
            Err(_) => Err(DriverError::Timeout(format!(
                "goto {} exceeded {:?}",
                url, timeout
            ))),
        }
    }

    async fn wait_for_load(&self, timeout: Duration) -> DriverResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state: Value = self
                .page
                .evaluate::<Value, Value>(READY_STATE_JS, Value::Null)
                .await
                .unwrap_or(Value::Null);
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Timeout("load state wait exceeded".into()));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> DriverResult<()> {
        let bytes = self
            .page
            .screenshot_builder()
            .full_page(full_page)
            .screenshot()
            .await
            .map_err(|e| classify_failure(&e.to_string()))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| DriverError::Protocol(format!("screenshot write failed: {}", e)))
    }
}
