//! The resilient interaction engine.
//!
//! Given a locator and a target text value, the engine finds the element
//! (falling back to a one-level sweep of child iframes), then tries an
//! ordered list of delivery strategies until one verifies, capturing debug
//! artifacts when every strategy fails.

use std::path::PathBuf;
use std::time::Duration;

use crate::diagnostics::DiagnosticRecorder;
use crate::error::{DriverError, Result};
use crate::locator::Locator;
use crate::modal::ModalHandle;
use crate::session::{Control, Located, RenderingContext, Session};
use crate::wait;

/// Timing and artifact configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded-wait budget for locating an element in the top context.
    pub locate_timeout: Duration,
    /// Interval between polls in every bounded wait.
    pub poll_interval: Duration,
    /// Pause before verification reads, letting page reactions finish.
    pub settle_delay: Duration,
    /// Pause after transferring focus, before typing.
    pub focus_delay: Duration,
    /// Where failure artifacts are written.
    pub debug_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locate_timeout: Duration::from_secs(8),
            poll_interval: wait::DEFAULT_POLL_INTERVAL,
            settle_delay: Duration::from_millis(500),
            focus_delay: Duration::from_millis(200),
            debug_dir: PathBuf::from("debug"),
        }
    }
}

/// The delivery strategies, in fixed priority order.
///
/// `ScriptedMutation` is last: it can defeat pages that swallow synthetic
/// key events, but exercises none of the real input handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStrategy {
    DirectEntry,
    FocusThenEnter,
    PointerChain,
    ScriptedMutation,
}

impl DeliveryStrategy {
    pub const ORDER: [DeliveryStrategy; 4] = [
        DeliveryStrategy::DirectEntry,
        DeliveryStrategy::FocusThenEnter,
        DeliveryStrategy::PointerChain,
        DeliveryStrategy::ScriptedMutation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeliveryStrategy::DirectEntry => "direct-entry",
            DeliveryStrategy::FocusThenEnter => "focus-then-enter",
            DeliveryStrategy::PointerChain => "pointer-chain",
            DeliveryStrategy::ScriptedMutation => "scripted-mutation",
        }
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub strategy: DeliveryStrategy,
    pub success: bool,
    pub observed: String,
    pub error: Option<String>,
}

pub struct Engine {
    config: EngineConfig,
    diagnostics: DiagnosticRecorder,
}

impl Engine {
    /// Builds an engine, creating the debug artifact directory up front.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let diagnostics = DiagnosticRecorder::new(&config.debug_dir)?;
        Ok(Self {
            config,
            diagnostics,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Finds one element matching `locator`.
    ///
    /// First a bounded wait in the top context. On a miss, each immediate
    /// child iframe is entered in DOM order and checked without waiting; the
    /// first context containing a match wins and the session is left
    /// switched into it, since interaction continues there. If nothing
    /// matches anywhere the top context is restored and the locate fails.
    pub async fn locate(&self, session: &dyn Session, locator: &Locator) -> Result<Located> {
        session.enter_top_context().await?;

        let waited = wait::wait_until(
            self.config.locate_timeout,
            self.config.poll_interval,
            || async move {
                let controls = session.find_controls(locator).await?;
                Ok(controls.into_iter().next())
            },
        )
        .await;

        match waited {
            Ok(control) => {
                return Ok(Located {
                    control,
                    context: RenderingContext::Top,
                })
            }
            Err(DriverError::TimeoutExceeded(_)) => {
                log::info!("{} not in top context, sweeping child iframes", locator);
            }
            Err(e) => return Err(e),
        }

        let count = session.nested_context_count().await?;
        for index in 0..count {
            session.enter_nested_context(index).await?;
            let mut controls = session.find_controls(locator).await?;
            if !controls.is_empty() {
                log::info!("found {} inside iframe {}", locator, index);
                return Ok(Located {
                    control: controls.remove(0),
                    context: RenderingContext::Nested(index),
                });
            }
            session.enter_top_context().await?;
        }

        session.enter_top_context().await?;
        Err(DriverError::ElementNotFound(locator.to_string()))
    }

    /// Delivers `text` into the element matching `locator`, trying each
    /// strategy in [`DeliveryStrategy::ORDER`] until one verifies.
    ///
    /// A strategy whose mechanics raise an error counts as a failed attempt;
    /// only failed verification advances the sequence. When all strategies
    /// fail, one diagnostic bundle is captured and the engine fails with
    /// `AllStrategiesExhausted`. The top context is restored on every path.
    pub async fn deliver_text(
        &self,
        session: &dyn Session,
        locator: &Locator,
        text: &str,
    ) -> Result<DeliveryStrategy> {
        let located = self.locate(session, locator).await?;

        let mut last_observed = String::new();
        for strategy in DeliveryStrategy::ORDER {
            let outcome = self
                .attempt(located.control.as_ref(), strategy, text)
                .await;
            match &outcome.error {
                Some(err) => log::warn!(
                    "strategy {} errored: {} (observed {:?})",
                    strategy.name(),
                    err,
                    outcome.observed
                ),
                None => log::debug!(
                    "strategy {}: success={} observed={:?}",
                    strategy.name(),
                    outcome.success,
                    outcome.observed
                ),
            }
            last_observed = outcome.observed;
            if outcome.success {
                log::info!("delivered {:?} via {}", text, strategy.name());
                session.enter_top_context().await?;
                return Ok(strategy);
            }
        }

        // Capture while still in the failing context, then restore.
        self.diagnostics
            .capture(session, "delivery-failure")
            .await;
        session.enter_top_context().await?;

        Err(DriverError::AllStrategiesExhausted {
            locator: locator.to_string(),
            observed: last_observed,
        })
    }

    /// Runs one strategy's mechanics and verifies the result.
    ///
    /// Exceptions from the mechanics become a failed outcome rather than
    /// aborting the sequence.
    async fn attempt(
        &self,
        control: &dyn Control,
        strategy: DeliveryStrategy,
        text: &str,
    ) -> AttemptOutcome {
        let mechanics = match strategy {
            DeliveryStrategy::DirectEntry => {
                // Controls without clearable content are fine to leave as-is.
                if let Err(e) = control.clear().await {
                    log::debug!("clear before direct entry failed: {}", e);
                }
                control.send_text(text).await
            }
            DeliveryStrategy::FocusThenEnter => match control.click().await {
                Ok(()) => {
                    tokio::time::sleep(self.config.focus_delay).await;
                    control.send_text(text).await
                }
                Err(e) => Err(e),
            },
            DeliveryStrategy::PointerChain => control.pointer_click_and_type(text).await,
            DeliveryStrategy::ScriptedMutation => control.set_value_scripted(text).await,
        };

        if let Err(e) = mechanics {
            return AttemptOutcome {
                strategy,
                success: false,
                observed: String::new(),
                error: Some(e.to_string()),
            };
        }

        tokio::time::sleep(self.config.settle_delay).await;
        let observed = self.observe(control).await;
        // Containment is vacuous for an empty target text; delivering ""
        // only verifies once the control actually shows nothing.
        let success = if text.is_empty() {
            observed.is_empty()
        } else {
            observed.contains(text)
        };
        AttemptOutcome {
            strategy,
            success,
            observed,
            error: None,
        }
    }

    /// Reads the control's value, falling back to its displayed text for
    /// controls without a readable value.
    async fn observe(&self, control: &dyn Control) -> String {
        match control.read_value().await {
            Ok(Some(value)) => value,
            Ok(None) | Err(_) => control.read_display_text().await.unwrap_or_default(),
        }
    }

    /// Waits until a native dialog opens, up to `timeout`.
    pub async fn await_modal<'a>(
        &self,
        session: &'a dyn Session,
        timeout: Duration,
    ) -> Result<ModalHandle<'a>> {
        let message = wait::wait_until(timeout, self.config.poll_interval, || async move {
            session.poll_modal().await
        })
        .await?;
        Ok(ModalHandle::new(session, message))
    }

    /// Message of the currently open dialog, without waiting.
    pub async fn modal_text(&self, session: &dyn Session) -> Result<String> {
        session
            .poll_modal()
            .await?
            .ok_or(DriverError::NoModalPresent)
    }
}
