use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("every delivery strategy failed for {locator} (last observed value: {observed:?})")]
    AllStrategiesExhausted { locator: String, observed: String },

    #[error("timed out after {0:?}")]
    TimeoutExceeded(Duration),

    #[error("no modal dialog is present")]
    NoModalPresent,

    #[error("No page available")]
    NoPage,

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;
