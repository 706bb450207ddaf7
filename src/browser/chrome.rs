//! Chromium session over CDP, using the chromiumoxide API.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::{
    GetDocumentParams, QuerySelectorParams, SetFileInputFilesParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, EventLoadEventFired, HandleJavaScriptDialogParams,
    NavigateParams,
};
use chromiumoxide::cdp::browser_protocol::target::{CloseTargetParams, TargetId};
use chromiumoxide::page::Page;
use futures::StreamExt;

use crate::browser::control::{count_script, document_script, ChromeControl};
use crate::error::{DriverError, Result};
use crate::locator::Locator;
use crate::session::{Control, Session};

/// Connection mode for the Chrome session
pub enum ConnectionMode {
    /// Launch a Chrome of our own
    Launched {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Attach to an existing Chrome on its remote-debugging port
    DebugPort(u16),
}

pub struct ChromeDriver {
    /// None once the session has been released.
    browser: tokio::sync::Mutex<Option<Browser>>,
    temp_dir: Option<PathBuf>,
    /// Active rendering context: None = top document, Some(i) = iframe i.
    active_frame: Mutex<Option<usize>>,
    /// Window the session addresses; None falls back to a page scan.
    selected_target: Mutex<Option<TargetId>>,
    /// Message of the currently open JS dialog, fed by the event watcher.
    dialog: Arc<Mutex<Option<String>>>,
    /// Target whose dialog events are currently being watched.
    watched_target: Mutex<Option<TargetId>>,
}

impl ChromeDriver {
    /// Launch Chrome with default settings (visible, sandboxed)
    pub async fn launch() -> Result<Self> {
        Self::new(ConnectionMode::Launched {
            chrome_path: None,
            no_sandbox: false,
            headless: false,
        })
        .await
    }

    /// Launch Chrome from a specific binary
    pub async fn launch_with_path(
        chrome_path: String,
        no_sandbox: bool,
        headless: bool,
    ) -> Result<Self> {
        Self::new(ConnectionMode::Launched {
            chrome_path: Some(chrome_path),
            no_sandbox,
            headless,
        })
        .await
    }

    /// Launch Chrome with settings suited to the environment: CI runners get
    /// headless + no-sandbox, everything else gets a visible window.
    pub async fn launch_auto() -> Result<Self> {
        let is_ci = std::env::var("CI").is_ok()
            || std::env::var("GITHUB_ACTIONS").is_ok()
            || std::env::var("GITLAB_CI").is_ok()
            || std::env::var("JENKINS_HOME").is_ok();

        Self::new(ConnectionMode::Launched {
            chrome_path: None,
            no_sandbox: is_ci,
            headless: is_ci,
        })
        .await
    }

    /// Connect to an already-running Chrome on a debug port
    pub async fn connect_debug_port(port: u16) -> Result<Self> {
        Self::new(ConnectionMode::DebugPort(port)).await
    }

    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, temp_dir) = match mode {
            ConnectionMode::Launched {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // Unique profile directory so parallel sessions don't share state
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map_err(|e| DriverError::LaunchFailed(e.to_string()))?
                    .as_nanos();
                let temp_dir = std::env::temp_dir().join(format!("sturdy-webdriver-{}", unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    DriverError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };
                config = config.user_data_dir(&temp_dir);
                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }
                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                }

                let config = config.build().map_err(|e| {
                    DriverError::LaunchFailed(format!(
                        "{}. Install Chrome/Chromium or pass --chrome-path; \
                         Linux sandbox issues? Try --no-sandbox",
                        e
                    ))
                })?;

                let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
                    DriverError::LaunchFailed(format!(
                        "{}. Install Chrome/Chromium or pass --chrome-path; \
                         Linux sandbox issues? Try --no-sandbox",
                        e
                    ))
                })?;

                tokio::spawn(async move { while handler.next().await.is_some() {} });

                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    DriverError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                         Is it running with --remote-debugging-port={}? {}",
                        port, port, e
                    ))
                })?;

                tokio::spawn(async move { while handler.next().await.is_some() {} });

                (browser, None)
            }
        };

        let driver = Self {
            browser: tokio::sync::Mutex::new(Some(browser)),
            temp_dir,
            active_frame: Mutex::new(None),
            selected_target: Mutex::new(None),
            dialog: Arc::new(Mutex::new(None)),
            watched_target: Mutex::new(None),
        };

        // Attached sessions may never navigate, so dialogs raised on the
        // existing page must be observable right away.
        match driver.get_active_page().await {
            Ok(page) => {
                if let Err(e) = driver.watch_dialogs(&page).await {
                    log::debug!("dialog watcher not attached yet: {}", e);
                }
            }
            Err(e) => log::debug!("no page to watch yet: {}", e),
        }

        Ok(driver)
    }

    /// The page the session currently addresses: the selected window if one
    /// is set and still open, otherwise the first non-chrome:// page.
    async fn get_active_page(&self) -> Result<Page> {
        let selected = self.selected_target.lock().unwrap().clone();
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| DriverError::Other("browser session is closed".to_string()))?;
        let pages = browser.pages().await?;

        if let Some(target) = selected {
            if let Some(page) = pages.iter().find(|p| p.target_id() == &target) {
                return Ok(page.clone());
            }
            // The selected window is gone; fall back to the scan.
            *self.selected_target.lock().unwrap() = None;
        }

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Other(format!("Failed to create page: {}", e)))
    }

    /// Starts forwarding the page's JS dialog events into the dialog slot.
    /// Attaching twice to the same target is a no-op.
    async fn watch_dialogs(&self, page: &Page) -> Result<()> {
        {
            let mut watched = self.watched_target.lock().unwrap();
            if watched.as_ref() == Some(page.target_id()) {
                return Ok(());
            }
            *watched = Some(page.target_id().clone());
        }

        let mut events = page.event_listener::<EventJavascriptDialogOpening>().await?;
        let slot = Arc::clone(&self.dialog);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                log::debug!("dialog opened: {:?}", event.message);
                *slot.lock().unwrap() = Some(event.message.clone());
            }
        });
        Ok(())
    }

    async fn handle_dialog(&self, accept: bool, input: Option<&str>) -> Result<()> {
        if self.dialog.lock().unwrap().is_none() {
            return Err(DriverError::NoModalPresent);
        }
        let page = self.get_active_page().await?;
        page.execute(HandleJavaScriptDialogParams {
            accept,
            prompt_text: input.map(str::to_string),
        })
        .await?;
        *self.dialog.lock().unwrap() = None;
        Ok(())
    }

    /// Navigate the session's single page to a URL, waiting for the load
    /// event. Resets the active rendering context and any tracked dialog.
    pub async fn goto(&self, url: &str) -> Result<()> {
        // Scheme defaulting, so "example.com" works
        let normalized_url = if !url.starts_with("http://")
            && !url.starts_with("https://")
            && !url.starts_with("file://")
            && !url.starts_with("about:")
            && !url.starts_with("data:")
        {
            format!("https://{}", url)
        } else {
            url.to_string()
        };
        log::debug!("navigating to {}", normalized_url);

        let page = self.get_active_page().await?;

        *self.active_frame.lock().unwrap() = None;
        *self.dialog.lock().unwrap() = None;

        // Dialog events must be flowing before the navigate: a page can
        // raise a dialog while it loads, which also holds the load event
        // back until the dialog is acknowledged.
        self.watch_dialogs(&page).await?;

        // Subscribe before navigating so a fast load can't slip past us
        let mut load_events = page.event_listener::<EventLoadEventFired>().await?;

        let params = NavigateParams::builder()
            .url(&normalized_url)
            .build()
            .map_err(|e| {
                DriverError::NavigationFailed(format!("Invalid URL {}: {}", normalized_url, e))
            })?;

        let response = page.execute(params).await.map_err(|e| {
            DriverError::NavigationFailed(format!(
                "Failed to navigate to {}: {}",
                normalized_url, e
            ))
        })?;

        if let Some(error_text) = &response.result.error_text {
            return Err(DriverError::NavigationFailed(format!(
                "Navigation error: {}",
                error_text
            )));
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        loop {
            match tokio::time::timeout(Duration::from_millis(100), load_events.next()).await {
                Ok(Some(_)) => {
                    log::debug!("load event fired");
                    break;
                }
                Ok(None) => {
                    log::warn!("load event stream ended before the event fired");
                    break;
                }
                Err(_) => {
                    // An open dialog blocks the load event; hand control
                    // back so the caller can acknowledge it.
                    if self.dialog.lock().unwrap().is_some() {
                        log::debug!("dialog opened during load, not waiting for the load event");
                        break;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(DriverError::NavigationFailed(format!(
                            "Timed out waiting for {} to load",
                            normalized_url
                        )));
                    }
                }
            }
        }

        // Small grace period for page state to stabilize
        tokio::time::sleep(Duration::from_millis(500)).await;

        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let page = self.get_active_page().await?;
        page.url()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?
            .ok_or(DriverError::NoPage)
    }

    /// Visible text of a single element in the top context.
    pub async fn element_text(&self, locator: &Locator) -> Result<String> {
        let page = self.get_active_page().await?;
        let control = ChromeControl::new(page, None, locator.clone(), 0);
        control.read_display_text().await
    }

    /// Handles of every open window, in the browser's page order. Chrome's
    /// own chrome:// pages are not included.
    pub async fn window_handles(&self) -> Result<Vec<TargetId>> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| DriverError::Other("browser session is closed".to_string()))?;
        let pages = browser.pages().await?;

        let mut handles = Vec::new();
        for page in pages {
            if let Ok(Some(url)) = page.url().await {
                if url.starts_with("chrome://") {
                    continue;
                }
            }
            handles.push(page.target_id().clone());
        }
        Ok(handles)
    }

    /// Makes the window with `handle` the one the session addresses.
    /// Resets the active rendering context and starts watching the window's
    /// dialogs.
    pub async fn switch_to_window(&self, handle: &TargetId) -> Result<()> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard
                .as_ref()
                .ok_or_else(|| DriverError::Other("browser session is closed".to_string()))?;
            let pages = browser.pages().await?;
            pages
                .into_iter()
                .find(|p| p.target_id() == handle)
                .ok_or_else(|| {
                    DriverError::Other(format!("no window with handle {:?}", handle))
                })?
        };

        *self.selected_target.lock().unwrap() = Some(handle.clone());
        *self.active_frame.lock().unwrap() = None;
        *self.dialog.lock().unwrap() = None;
        self.watch_dialogs(&page).await
    }

    /// Closes the window the session currently addresses. The session falls
    /// back to scanning for a page until the next `switch_to_window`.
    pub async fn close_window(&self) -> Result<()> {
        let page = self.get_active_page().await?;
        let target = page.target_id().clone();
        log::debug!("closing window {:?}", target);
        page.execute(CloseTargetParams::new(target)).await?;

        *self.selected_target.lock().unwrap() = None;
        *self.active_frame.lock().unwrap() = None;
        *self.dialog.lock().unwrap() = None;
        *self.watched_target.lock().unwrap() = None;
        Ok(())
    }

    /// Stages `path` on the file input matching `locator` in the top-level
    /// document, as if the user had picked it in the file chooser.
    pub async fn deliver_file(&self, locator: &Locator, path: &std::path::Path) -> Result<()> {
        // The browser resolves the path itself, so it must be absolute.
        let absolute = std::fs::canonicalize(path).map_err(|e| {
            DriverError::Other(format!("Cannot resolve {}: {}", path.display(), e))
        })?;
        let page = self.get_active_page().await?;

        let result = page.evaluate(count_script(None, locator)).await?;
        let count: Option<u64> = result
            .into_value()
            .map_err(|e| DriverError::Other(format!("Failed to deserialize result: {}", e)))?;
        if count.unwrap_or(0) == 0 {
            return Err(DriverError::ElementNotFound(locator.to_string()));
        }

        let document = page.execute(GetDocumentParams::default()).await?;
        let root = document.result.root.node_id.clone();
        let node = page
            .execute(
                QuerySelectorParams::builder()
                    .node_id(root)
                    .selector(locator.to_css())
                    .build()
                    .map_err(DriverError::Other)?,
            )
            .await?;

        page.execute(SetFileInputFilesParams {
            files: vec![absolute.to_string_lossy().into_owned()],
            node_id: Some(node.result.node_id.clone()),
            backend_node_id: None,
            object_id: None,
        })
        .await?;
        Ok(())
    }

    /// Screenshot the current page and write it to `path`.
    pub async fn screenshot_to_file(&self, path: &std::path::Path) -> Result<()> {
        let data = self.capture_visual().await?;
        tokio::fs::write(path, data)
            .await
            .map_err(|e| DriverError::Other(format!("Failed to write screenshot: {}", e)))
    }

    /// Evaluate a script and deserialize its result.
    pub async fn execute_script_typed<T: serde::de::DeserializeOwned>(
        &self,
        script: &str,
    ) -> Result<T> {
        let page = self.get_active_page().await?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Other(format!("Script execution failed: {}", e)))?;
        result
            .into_value()
            .map_err(|e| DriverError::Other(format!("Failed to deserialize result: {}", e)))
    }

    /// Whether the browser connection is still healthy.
    pub async fn is_alive(&self) -> bool {
        let guard = self.browser.lock().await;
        let browser = match guard.as_ref() {
            Some(browser) => browser,
            None => return false,
        };
        match browser.pages().await {
            Ok(pages) => {
                if let Some(page) = pages.first() {
                    matches!(
                        tokio::time::timeout(Duration::from_secs(2), page.url()).await,
                        Ok(Ok(_))
                    )
                } else {
                    true
                }
            }
            Err(_) => false,
        }
    }
}

#[async_trait]
impl Session for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.goto(url).await
    }

    async fn title(&self) -> Result<String> {
        let page = self.get_active_page().await?;
        page.get_title()
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?
            .ok_or(DriverError::NoPage)
    }

    async fn page_source(&self) -> Result<String> {
        let frame = *self.active_frame.lock().unwrap();
        let page = self.get_active_page().await?;
        match frame {
            None => page
                .content()
                .await
                .map_err(|e| DriverError::Other(e.to_string())),
            Some(index) => {
                let result = page.evaluate(document_script(frame)).await?;
                let source: Option<String> = result.into_value().map_err(|e| {
                    DriverError::Other(format!("Failed to deserialize result: {}", e))
                })?;
                source.ok_or_else(|| {
                    DriverError::Other(format!("iframe {} has no accessible document", index))
                })
            }
        }
    }

    async fn find_controls(&self, locator: &Locator) -> Result<Vec<Box<dyn Control>>> {
        let frame = *self.active_frame.lock().unwrap();
        let page = self.get_active_page().await?;

        let result = page.evaluate(count_script(frame, locator)).await?;
        let count: Option<u64> = result
            .into_value()
            .map_err(|e| DriverError::Other(format!("Failed to deserialize result: {}", e)))?;
        let count = count.unwrap_or(0) as usize;

        Ok((0..count)
            .map(|index| {
                Box::new(ChromeControl::new(page.clone(), frame, locator.clone(), index))
                    as Box<dyn Control>
            })
            .collect())
    }

    async fn nested_context_count(&self) -> Result<usize> {
        let page = self.get_active_page().await?;
        let result = page
            .evaluate("document.getElementsByTagName('iframe').length")
            .await?;
        let count: u64 = result
            .into_value()
            .map_err(|e| DriverError::Other(format!("Failed to deserialize result: {}", e)))?;
        Ok(count as usize)
    }

    async fn enter_nested_context(&self, index: usize) -> Result<()> {
        let count = self.nested_context_count().await?;
        if index >= count {
            return Err(DriverError::Other(format!(
                "no iframe at index {} (page has {})",
                index, count
            )));
        }
        *self.active_frame.lock().unwrap() = Some(index);
        Ok(())
    }

    async fn enter_top_context(&self) -> Result<()> {
        *self.active_frame.lock().unwrap() = None;
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.get_active_page().await?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Other(format!("Script execution failed: {}", e)))?;
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn capture_visual(&self) -> Result<Vec<u8>> {
        let page = self.get_active_page().await?;
        page.screenshot(chromiumoxide::page::ScreenshotParams::default())
            .await
            .map_err(|e| DriverError::Other(format!("Failed to take screenshot: {}", e)))
    }

    async fn poll_modal(&self) -> Result<Option<String>> {
        Ok(self.dialog.lock().unwrap().clone())
    }

    async fn modal_accept(&self, input: Option<&str>) -> Result<()> {
        self.handle_dialog(true, input).await
    }

    async fn modal_dismiss(&self) -> Result<()> {
        self.handle_dialog(false, None).await
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            browser
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}
