pub mod chrome;
pub mod control;

pub use chrome::{ChromeDriver, ConnectionMode};
