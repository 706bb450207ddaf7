//! Capability traits the interaction engine drives a browser through.
//!
//! The engine never talks to CDP directly; it sees a [`Session`] (one
//! exclusively-owned browser tab plus its rendering contexts and dialog
//! state) and [`Control`]s (individual page elements). The production
//! implementation lives in [`crate::browser`]; tests substitute scripted
//! fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::locator::Locator;

/// Which rendering context an element was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingContext {
    /// The top-level document.
    Top,
    /// An immediate child iframe, by DOM order index.
    Nested(usize),
}

/// A resolved element together with the context it was found in.
///
/// When the context is [`RenderingContext::Nested`], the session has been
/// left switched into that context; the caller switches back when done.
pub struct Located {
    pub control: Box<dyn Control>,
    pub context: RenderingContext,
}

/// One browser session. All operations address the currently active
/// rendering context unless stated otherwise.
#[async_trait]
pub trait Session: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn title(&self) -> Result<String>;

    /// Serialized document of the active rendering context, so a failure
    /// inside an iframe is diagnosed with that iframe's DOM.
    async fn page_source(&self) -> Result<String>;

    /// Non-blocking element query in the active context. An empty result is
    /// not an error.
    async fn find_controls(&self, locator: &Locator) -> Result<Vec<Box<dyn Control>>>;

    /// Number of immediate child iframes of the top-level document.
    async fn nested_context_count(&self) -> Result<usize>;

    /// Makes the iframe at `index` (DOM order) the active context.
    async fn enter_nested_context(&self, index: usize) -> Result<()>;

    /// Makes the top-level document the active context.
    async fn enter_top_context(&self) -> Result<()>;

    /// Evaluates a script in the page and returns its JSON value.
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value>;

    /// PNG screenshot of the current viewport.
    async fn capture_visual(&self) -> Result<Vec<u8>>;

    /// Message of the currently open native dialog, if any. Non-blocking.
    async fn poll_modal(&self) -> Result<Option<String>>;

    /// Confirms the open dialog, supplying `input` as the prompt reply.
    /// Fails with `NoModalPresent` when no dialog is open.
    async fn modal_accept(&self, input: Option<&str>) -> Result<()>;

    /// Cancels the open dialog. Fails with `NoModalPresent` when no dialog
    /// is open.
    async fn modal_dismiss(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// One element in some rendering context of a session.
#[async_trait]
pub trait Control: Send + Sync {
    /// Real pointer click on the element's center.
    async fn click(&self) -> Result<()>;

    /// Empties the control's current content.
    async fn clear(&self) -> Result<()>;

    /// Focuses the element and submits `text` as discrete input events.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Composed low-level sequence: move pointer onto the element, click,
    /// then submit `text` as input events.
    async fn pointer_click_and_type(&self, text: &str) -> Result<()>;

    /// Sets the control's value through page scripting and synthesizes the
    /// `input` event. Bypasses the real input pipeline.
    async fn set_value_scripted(&self, text: &str) -> Result<()>;

    /// The control's current value, or `None` for elements without one.
    async fn read_value(&self) -> Result<Option<String>>;

    /// The element's rendered text.
    async fn read_display_text(&self) -> Result<String>;
}
