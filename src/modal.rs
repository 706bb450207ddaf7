//! Native dialog (alert / confirm / prompt) acknowledgment.
//!
//! A dialog moves through three states: absent, open-and-unread, and
//! acknowledged. [`crate::engine::Engine::await_modal`] performs the bounded
//! wait for the absent-to-open transition; the handle returned here performs
//! one of the two terminal actions.

use crate::error::Result;
use crate::session::Session;

/// An open native dialog. Consumed by `accept` or `dismiss`; at most one
/// dialog is open per session at a time.
pub struct ModalHandle<'a> {
    session: &'a dyn Session,
    message: String,
    staged_input: Option<String>,
}

impl<'a> ModalHandle<'a> {
    pub(crate) fn new(session: &'a dyn Session, message: String) -> Self {
        Self {
            session,
            message,
            staged_input: None,
        }
    }

    /// The dialog's message text.
    pub fn text(&self) -> &str {
        &self.message
    }

    /// Stages a prompt reply. The browser only applies prompt text together
    /// with confirmation, so the value is submitted by [`accept`](Self::accept).
    pub fn enter_text(&mut self, text: impl Into<String>) {
        self.staged_input = Some(text.into());
    }

    /// Confirms the dialog, submitting any staged prompt reply.
    pub async fn accept(self) -> Result<()> {
        self.session
            .modal_accept(self.staged_input.as_deref())
            .await
    }

    /// Cancels the dialog. Any staged reply is discarded.
    pub async fn dismiss(self) -> Result<()> {
        self.session.modal_dismiss().await
    }
}
