//! Local HTTP server serving the fixture pages the live-browser suite
//! drives: a plain form, a page whose input hides inside an iframe, and a
//! page with alert/confirm/prompt triggers.
//!
//! Each instance binds a random port for test isolation.

use std::net::SocketAddr;
use tokio::sync::oneshot;
use warp::Filter;

pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let index = warp::path::end().map(|| {
            warp::reply::html(
                r#"<!DOCTYPE html>
<html lang="en">
<head><title>Key Presses</title></head>
<body>
    <h1>Key Presses</h1>
    <form>
        <input id="target" type="text" autocomplete="off">
    </form>
    <p id="result"></p>
</body>
</html>"#,
            )
        });

        let framed = warp::path("framed").map(|| {
            warp::reply::html(
                r#"<!DOCTYPE html>
<html lang="en">
<head><title>Framed Editor</title></head>
<body>
    <h3>An iFrame containing the editor</h3>
    <iframe id="empty-frame" srcdoc="<p>nothing to type into here</p>"></iframe>
    <iframe id="editor-frame" srcdoc="<input id='target' type='text'>"></iframe>
</body>
</html>"#,
            )
        });

        let alerts = warp::path("alerts").map(|| {
            warp::reply::html(
                r#"<!DOCTYPE html>
<html lang="en">
<head><title>JavaScript Alerts</title></head>
<body>
    <h1>JavaScript Alerts</h1>
    <button id="alert-btn" onclick="alert('I am a JS Alert'); document.getElementById('result').textContent = 'You successfully clicked an alert';">Click for JS Alert</button>
    <button id="confirm-btn" onclick="document.getElementById('result').textContent = 'You clicked: ' + (confirm('I am a JS Confirm') ? 'Ok' : 'Cancel');">Click for JS Confirm</button>
    <button id="prompt-btn" onclick="document.getElementById('result').textContent = 'You entered: ' + prompt('I am a JS prompt');">Click for JS Prompt</button>
    <p id="result"></p>
</body>
</html>"#,
            )
        });

        let windows = warp::path("windows").map(|| {
            warp::reply::html(
                r#"<!DOCTYPE html>
<html lang="en">
<head><title>Windows</title></head>
<body>
    <h1>Opening a new window</h1>
    <a id="open-child" href="/" target="_blank">Click Here</a>
</body>
</html>"#,
            )
        });

        let upload = warp::path("upload").map(|| {
            warp::reply::html(
                r#"<!DOCTYPE html>
<html lang="en">
<head><title>File Upload</title></head>
<body>
    <h1>File Uploader</h1>
    <form>
        <input id="file-input" type="file">
    </form>
</body>
</html>"#,
            )
        });

        let early_alert = warp::path("early-alert").map(|| {
            warp::reply::html(
                r#"<!DOCTYPE html>
<html lang="en">
<head><title>Early Alert</title></head>
<body>
    <script>alert('early bird');</script>
    <p>This page raises an alert while it loads.</p>
</body>
</html>"#,
            )
        });

        let routes = index.or(framed).or(alerts).or(windows).or(upload).or(early_alert);

        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });

        tokio::spawn(server);

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL, e.g. "http://127.0.0.1:12345"
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Waits until the server answers requests.
    pub async fn wait_ready(&self) -> anyhow::Result<()> {
        let url = self.url();
        let max_attempts = 10;

        for attempt in 1..=max_attempts {
            match reqwest::get(&url).await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    println!("attempt {}: server returned {}", attempt, response.status());
                }
                Err(e) => {
                    println!("attempt {}: server not ready - {}", attempt, e);
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        }

        anyhow::bail!("Server did not become ready after {} attempts", max_attempts)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
