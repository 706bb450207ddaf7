//! Failure artifacts: a screenshot plus the serialized page, written as a
//! timestamped pair under a configurable debug directory.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{DriverError, Result};
use crate::session::Session;

pub struct DiagnosticRecorder {
    dir: PathBuf,
}

impl DiagnosticRecorder {
    /// Creates the recorder and its target directory. Directory creation is
    /// the only fallible setup and happens once, here.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            DriverError::Other(format!("Failed to create debug dir {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a `<label>-<timestamp>.png` / `.html` pair for the session's
    /// current state. Capture failures are logged and swallowed so they can
    /// never mask the error being diagnosed.
    pub async fn capture(&self, session: &dyn Session, label: &str) -> Option<(PathBuf, PathBuf)> {
        match self.try_capture(session, label).await {
            Ok((png, html)) => {
                log::info!("[debug saved] {}", png.display());
                log::info!("[debug saved] {}", html.display());
                Some((png, html))
            }
            Err(e) => {
                log::warn!("Failed to save debug artifacts: {}", e);
                None
            }
        }
    }

    async fn try_capture(&self, session: &dyn Session, label: &str) -> Result<(PathBuf, PathBuf)> {
        let ts = Local::now().format("%Y%m%d-%H%M%S");
        let png = self.dir.join(format!("{}-{}.png", label, ts));
        let html = self.dir.join(format!("{}-{}.html", label, ts));

        let shot = session.capture_visual().await?;
        tokio::fs::write(&png, shot)
            .await
            .map_err(|e| DriverError::Other(format!("Failed to write {}: {}", png.display(), e)))?;

        let source = session.page_source().await?;
        tokio::fs::write(&html, source)
            .await
            .map_err(|e| DriverError::Other(format!("Failed to write {}: {}", html.display(), e)))?;

        Ok((png, html))
    }
}
