//! Scripted fakes for exercising the interaction engine without a browser.
//!
//! `ScriptedControl` models an editable (or stubborn) page control: each
//! delivery mechanism only writes the value if the control was configured to
//! accept it, and every call is logged so tests can assert ordering.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sturdy_webdriver::{Control, DriverError, Locator, Result, Session};

/// The delivery mechanisms a control can accept input through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    SendText,
    PointerChain,
    ScriptedSet,
}

#[derive(Default)]
pub struct ScriptedControl {
    accepts: Vec<Mechanism>,
    /// Typing only lands after the control has been clicked.
    needs_click_first: bool,
    /// Models a control with no readable value attribute.
    no_value: bool,
    /// Models a control whose content survives a clear attempt.
    refuse_clear: bool,
    pub value: Mutex<String>,
    pub ops: Mutex<Vec<&'static str>>,
}

impl ScriptedControl {
    pub fn accepting(mechanisms: &[Mechanism]) -> Arc<Self> {
        Arc::new(Self {
            accepts: mechanisms.to_vec(),
            ..Self::default()
        })
    }

    /// Accepts typed text, but only once focused by a click.
    pub fn focus_hungry() -> Arc<Self> {
        Arc::new(Self {
            accepts: vec![Mechanism::SendText],
            needs_click_first: true,
            ..Self::default()
        })
    }

    /// Never accepts anything and has no value to read.
    pub fn stubborn() -> Arc<Self> {
        Arc::new(Self {
            no_value: true,
            ..Self::default()
        })
    }

    /// Holds `value`, rejects clearing, and accepts no mechanism.
    pub fn sticky(value: &str) -> Arc<Self> {
        Arc::new(Self {
            refuse_clear: true,
            value: Mutex::new(value.to_string()),
            ..Self::default()
        })
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.ops.lock().unwrap().clone()
    }

    fn log(&self, op: &'static str) {
        self.ops.lock().unwrap().push(op);
    }

    fn write_if_accepted(&self, mechanism: Mechanism, text: &str) {
        if !self.accepts.contains(&mechanism) {
            return;
        }
        if self.needs_click_first && !self.ops().contains(&"click") {
            return;
        }
        *self.value.lock().unwrap() = text.to_string();
    }
}

/// Boxable handle onto a shared `ScriptedControl`.
pub struct ControlRef(pub Arc<ScriptedControl>);

#[async_trait]
impl Control for ControlRef {
    async fn click(&self) -> Result<()> {
        self.0.log("click");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.0.log("clear");
        if self.0.refuse_clear {
            return Err(DriverError::Other("control rejected the clear".into()));
        }
        self.0.value.lock().unwrap().clear();
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.0.log("send_text");
        self.0.write_if_accepted(Mechanism::SendText, text);
        Ok(())
    }

    async fn pointer_click_and_type(&self, text: &str) -> Result<()> {
        self.0.log("pointer_click_and_type");
        self.0.write_if_accepted(Mechanism::PointerChain, text);
        Ok(())
    }

    async fn set_value_scripted(&self, text: &str) -> Result<()> {
        self.0.log("set_value_scripted");
        if self.0.no_value {
            return Err(DriverError::Other("control has no value property".into()));
        }
        self.0.write_if_accepted(Mechanism::ScriptedSet, text);
        Ok(())
    }

    async fn read_value(&self) -> Result<Option<String>> {
        if self.0.no_value {
            return Ok(None);
        }
        Ok(Some(self.0.value.lock().unwrap().clone()))
    }

    async fn read_display_text(&self) -> Result<String> {
        Ok(String::new())
    }
}

/// A fake session: controls keyed by locator string, per context.
#[derive(Default)]
pub struct MockSession {
    pub top: HashMap<String, Arc<ScriptedControl>>,
    pub frames: Vec<HashMap<String, Arc<ScriptedControl>>>,
    pub active: Mutex<Option<usize>>,
    /// Every context switch, in order (None = top).
    pub switches: Mutex<Vec<Option<usize>>>,
    pub captures: Mutex<usize>,
    pub modal: Mutex<Option<String>>,
    /// Page state reflecting the last acknowledged dialog.
    pub confirmed: Mutex<Option<String>>,
}

impl MockSession {
    pub fn with_top_control(locator: &Locator, control: Arc<ScriptedControl>) -> Self {
        let mut session = Self::default();
        session.top.insert(locator.to_string(), control);
        session
    }

    pub fn active_context(&self) -> Option<usize> {
        *self.active.lock().unwrap()
    }

    pub fn capture_count(&self) -> usize {
        *self.captures.lock().unwrap()
    }

    fn context_controls(&self) -> &HashMap<String, Arc<ScriptedControl>> {
        match self.active_context() {
            None => &self.top,
            Some(index) => &self.frames[index],
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn title(&self) -> Result<String> {
        Ok("Mock Page".to_string())
    }

    async fn page_source(&self) -> Result<String> {
        // Serializes the active context's document, as the real session does.
        Ok(match self.active_context() {
            None => "<html><body>top document</body></html>".to_string(),
            Some(index) => format!("<html><body>iframe {} document</body></html>", index),
        })
    }

    async fn find_controls(&self, locator: &Locator) -> Result<Vec<Box<dyn Control>>> {
        Ok(self
            .context_controls()
            .get(&locator.to_string())
            .map(|control| {
                vec![Box::new(ControlRef(Arc::clone(control))) as Box<dyn Control>]
            })
            .unwrap_or_default())
    }

    async fn nested_context_count(&self) -> Result<usize> {
        Ok(self.frames.len())
    }

    async fn enter_nested_context(&self, index: usize) -> Result<()> {
        if index >= self.frames.len() {
            return Err(DriverError::Other(format!("no iframe at index {}", index)));
        }
        *self.active.lock().unwrap() = Some(index);
        self.switches.lock().unwrap().push(Some(index));
        Ok(())
    }

    async fn enter_top_context(&self) -> Result<()> {
        *self.active.lock().unwrap() = None;
        self.switches.lock().unwrap().push(None);
        Ok(())
    }

    async fn execute_script(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn capture_visual(&self) -> Result<Vec<u8>> {
        *self.captures.lock().unwrap() += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn poll_modal(&self) -> Result<Option<String>> {
        Ok(self.modal.lock().unwrap().clone())
    }

    async fn modal_accept(&self, input: Option<&str>) -> Result<()> {
        let mut modal = self.modal.lock().unwrap();
        if modal.is_none() {
            return Err(DriverError::NoModalPresent);
        }
        *modal = None;
        *self.confirmed.lock().unwrap() = Some(match input {
            Some(text) => format!("You entered: {}", text),
            None => "You clicked: Ok".to_string(),
        });
        Ok(())
    }

    async fn modal_dismiss(&self) -> Result<()> {
        let mut modal = self.modal.lock().unwrap();
        if modal.is_none() {
            return Err(DriverError::NoModalPresent);
        }
        *modal = None;
        *self.confirmed.lock().unwrap() = Some("You clicked: Cancel".to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Engine timings tightened so the suite stays fast.
pub fn fast_config(debug_dir: std::path::PathBuf) -> sturdy_webdriver::EngineConfig {
    sturdy_webdriver::EngineConfig {
        locate_timeout: std::time::Duration::from_millis(200),
        poll_interval: std::time::Duration::from_millis(20),
        settle_delay: std::time::Duration::from_millis(10),
        focus_delay: std::time::Duration::from_millis(5),
        debug_dir,
    }
}

/// Unique scratch directory for one test's artifacts.
pub fn scratch_dir(tag: &str) -> std::path::PathBuf {
    let unique = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("sturdy-webdriver-test-{}-{}", tag, unique))
}
