//! Element controls backed by injected JavaScript plus CDP input dispatch.
//!
//! A control is identified by (rendering context, locator, match index) and
//! re-resolved on every operation, so handles stay valid across re-renders.
//! Reads and scripted mutation go through `Runtime.evaluate`; clicks and
//! typing go through the `Input` domain so the page sees real events.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::page::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{DriverError, Result};
use crate::locator::Locator;
use crate::session::Control;

/// Quotes `s` as a JavaScript string literal.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

/// Statements binding `host` (the iframe element or null) and `doc` (the
/// context's document). A missing or cross-origin iframe yields null.
fn context_prelude(frame: Option<usize>) -> String {
    match frame {
        None => "const host = null; const doc = document;".to_string(),
        Some(index) => format!(
            "const host = document.getElementsByTagName('iframe')[{}]; \
             if (!host || !host.contentDocument) return null; \
             const doc = host.contentDocument;",
            index
        ),
    }
}

/// Wraps `body` in an IIFE that resolves the target document (top-level, or
/// an iframe's content document) and runs `querySelectorAll` for the
/// locator. `body` sees `host`, `doc`, and `els`.
pub(crate) fn query_script(frame: Option<usize>, locator: &Locator, body: &str) -> String {
    format!(
        "(() => {{ {} const els = doc.querySelectorAll({}); {} }})()",
        context_prelude(frame),
        js_string(&locator.to_css()),
        body
    )
}

/// Script serializing the context's document.
pub(crate) fn document_script(frame: Option<usize>) -> String {
    format!(
        "(() => {{ {} return doc.documentElement ? doc.documentElement.outerHTML : ''; }})()",
        context_prelude(frame)
    )
}

/// Script returning how many elements the locator matches in the context.
pub(crate) fn count_script(frame: Option<usize>, locator: &Locator) -> String {
    query_script(frame, locator, "return els.length;")
}

#[derive(Deserialize)]
struct JsPoint {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
struct ValueProbe {
    v: Option<String>,
}

pub struct ChromeControl {
    page: Page,
    frame: Option<usize>,
    locator: Locator,
    index: usize,
}

impl ChromeControl {
    pub(crate) fn new(page: Page, frame: Option<usize>, locator: Locator, index: usize) -> Self {
        Self {
            page,
            frame,
            locator,
            index,
        }
    }

    fn stale(&self) -> DriverError {
        DriverError::ElementNotFound(format!("{} (match {})", self.locator, self.index))
    }

    /// Runs `body` with `el` bound to this control's element. Null results
    /// mean the element (or its context) is gone.
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        let script = query_script(
            self.frame,
            &self.locator,
            &format!(
                "if (els.length <= {idx}) return null; const el = els[{idx}]; {body}",
                idx = self.index,
                body = body
            ),
        );
        let result = self.page.evaluate(script).await?;
        result
            .into_value()
            .map_err(|e| DriverError::Other(format!("Failed to deserialize result: {}", e)))
    }

    /// Viewport coordinates of the element's center, offset by the hosting
    /// iframe's position when the control lives in a nested context.
    async fn center(&self) -> Result<(f64, f64)> {
        let body = "const r = el.getBoundingClientRect(); \
                    let x = r.x + r.width / 2; let y = r.y + r.height / 2; \
                    if (host) { const hr = host.getBoundingClientRect(); x += hr.x; y += hr.y; } \
                    return { x: x, y: y };";
        let point: Option<JsPoint> = self.eval(body).await?;
        let point = point.ok_or_else(|| self.stale())?;
        Ok((point.x, point.y))
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
        click_count: Option<i64>,
    ) -> Result<()> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
        if let Some(count) = click_count {
            builder = builder.button(MouseButton::Left).click_count(count);
        }
        let params = builder.build().map_err(DriverError::Other)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y, None)
            .await?;
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, x, y, Some(1))
            .await?;
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, x, y, Some(1))
            .await?;
        Ok(())
    }

    /// Submits each character as its own key event.
    async fn type_chars(&self, text: &str) -> Result<()> {
        for ch in text.chars() {
            let params = DispatchKeyEventParams::builder()
                .r#type(DispatchKeyEventType::Char)
                .text(ch.to_string())
                .build()
                .map_err(DriverError::Other)?;
            self.page.execute(params).await?;
        }
        Ok(())
    }

    async fn focus(&self) -> Result<()> {
        let focused: Option<bool> = self.eval("el.focus(); return true;").await?;
        focused.map(|_| ()).ok_or_else(|| self.stale())
    }
}

#[async_trait]
impl Control for ChromeControl {
    async fn click(&self) -> Result<()> {
        let (x, y) = self.center().await?;
        self.click_at(x, y).await
    }

    async fn clear(&self) -> Result<()> {
        let body = "if ('value' in el) { el.value = ''; \
                    el.dispatchEvent(new Event('input', { bubbles: true })); } \
                    else { el.textContent = ''; } return true;";
        let cleared: Option<bool> = self.eval(body).await?;
        cleared.map(|_| ()).ok_or_else(|| self.stale())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.focus().await?;
        self.type_chars(text).await
    }

    async fn pointer_click_and_type(&self, text: &str) -> Result<()> {
        let (x, y) = self.center().await?;
        self.click_at(x, y).await?;
        self.type_chars(text).await
    }

    async fn set_value_scripted(&self, text: &str) -> Result<()> {
        let body = format!(
            "if (!('value' in el)) return 'no-value'; el.value = {}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); return 'ok';",
            js_string(text)
        );
        let outcome: Option<String> = self.eval(&body).await?;
        match outcome.as_deref() {
            Some("ok") => Ok(()),
            Some(_) => Err(DriverError::Other(format!(
                "{} has no value property to set",
                self.locator
            ))),
            None => Err(self.stale()),
        }
    }

    async fn read_value(&self) -> Result<Option<String>> {
        let body = "if (!('value' in el)) return { v: null }; return { v: String(el.value) };";
        let probe: Option<ValueProbe> = self.eval(body).await?;
        probe.map(|p| p.v).ok_or_else(|| self.stale())
    }

    async fn read_display_text(&self) -> Result<String> {
        let body = "return el.innerText || el.textContent || '';";
        let text: Option<String> = self.eval(body).await?;
        text.ok_or_else(|| self.stale())
    }
}
