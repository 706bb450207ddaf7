pub mod browser;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod locator;
pub mod modal;
pub mod session;
pub mod wait;

// Re-export commonly used items
pub use browser::chrome::{ChromeDriver, ConnectionMode};
pub use diagnostics::DiagnosticRecorder;
pub use engine::{AttemptOutcome, DeliveryStrategy, Engine, EngineConfig};
pub use error::{DriverError, Result};
pub use locator::Locator;
pub use modal::ModalHandle;
pub use session::{Control, Located, RenderingContext, Session};
pub use wait::wait_until;
