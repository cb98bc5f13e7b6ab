//! Playwright browser automation
//!
//! Each [`PlaywrightSession`] runs one `node` process hosting a Playwright
//! browser context. The process executes an embedded bridge script and
//! speaks line-delimited JSON: one request per stdin line, one response
//! per stdout line, matched by id. Anything else the process prints is
//! logged and skipped.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use chatqa_common::Viewport;

use crate::driver::{BrowserDriver, LoadState};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    /// Parse a browser name, defaulting to Chromium for unknown names
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "firefox" => Browser::Firefox,
            "webkit" => Browser::Webkit,
            _ => Browser::Chromium,
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Base URL for relative navigations
    pub base_url: String,

    /// Directory for screenshots
    pub screenshot_dir: PathBuf,

    /// Initial viewport
    pub viewport: Viewport,

    pub browser: Browser,
    pub headless: bool,

    /// Saved login state to start the context from
    pub storage_state: Option<PathBuf>,

    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,

    /// Default timeout for Playwright actions
    pub default_timeout: Duration,

    /// Upper bound for one bridge round trip
    pub request_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            viewport: Viewport::default(),
            browser: Browser::Chromium,
            headless: true,
            storage_state: None,
            project_dir: PathBuf::from("."),
            default_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(180),
        }
    }
}

/// Bridge commands understood by [`BRIDGE_SCRIPT`]
pub const COMMANDS: &[&str] = &[
    "goto",
    "waitForLoadState",
    "waitForSelector",
    "click",
    "fill",
    "clear",
    "type",
    "press",
    "pressOn",
    "focus",
    "count",
    "isVisible",
    "isEditable",
    "isFocused",
    "innerText",
    "innerHTML",
    "getAttribute",
    "evaluate",
    "evaluateAll",
    "screenshot",
    "setViewport",
    "storageState",
    "dialogs",
];

/// Node program hosting the browser. The launch configuration arrives as
/// JSON in `argv[2]`.
pub const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require(require.resolve('playwright', { paths: [process.cwd()] }));

const config = JSON.parse(process.argv[2]);
const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const toFunction = (source) => new Function('return (' + source + ');')();

(async () => {
  const browser = await playwright[config.browser].launch({ headless: config.headless });
  const contextOptions = { viewport: config.viewport, baseURL: config.baseUrl };
  if (config.storageState) {
    contextOptions.storageState = config.storageState;
  }
  const context = await browser.newContext(contextOptions);
  context.setDefaultTimeout(config.defaultTimeoutMs);
  const page = await context.newPage();
  const dialogs = [];
  page.on('dialog', (d) => {
    dialogs.push(d.message());
    d.dismiss().catch(() => {});
  });

  const handlers = {
    goto: (a) => page.goto(a.url, { waitUntil: a.waitUntil }).then(() => null),
    waitForLoadState: (a) => page.waitForLoadState(a.state, { timeout: a.timeoutMs }),
    waitForSelector: (a) => page.waitForSelector(a.selector, { timeout: a.timeoutMs }).then(() => null),
    click: (a) => page.locator(a.selector).click({ timeout: a.timeoutMs }),
    fill: (a) => page.locator(a.selector).fill(a.value),
    clear: (a) => page.locator(a.selector).clear(),
    type: (a) => page.keyboard.type(a.text),
    press: (a) => page.keyboard.press(a.key),
    pressOn: (a) => page.locator(a.selector).press(a.key),
    focus: (a) => page.locator(a.selector).focus(),
    count: (a) => page.locator(a.selector).count(),
    isVisible: (a) => page.locator(a.selector).first().isVisible(),
    isEditable: (a) => page.locator(a.selector).isEditable(),
    isFocused: (a) => page.locator(a.selector).evaluate((el) => el === document.activeElement),
    innerText: (a) => page.locator(a.selector).innerText(),
    innerHTML: (a) => page.locator(a.selector).innerHTML(),
    getAttribute: (a) => page.locator(a.selector).getAttribute(a.name),
    evaluate: (a) => page.locator(a.selector).evaluate(toFunction(a.script), a.arg),
    evaluateAll: (a) => page.locator(a.selector).evaluateAll(toFunction(a.script), a.arg),
    screenshot: (a) => page.screenshot({ path: a.path, fullPage: a.fullPage }).then(() => a.path),
    setViewport: (a) => page.setViewportSize({ width: a.width, height: a.height }),
    storageState: (a) => context.storageState({ path: a.path }).then(() => null),
    dialogs: (a) => Promise.resolve(dialogs.slice()),
  };

  reply({ id: 0, ok: true, value: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (e) {
      reply({ id: null, ok: false, error: 'bad request: ' + e.message });
      continue;
    }
    if (req.cmd === 'close') {
      reply({ id: req.id, ok: true, value: null });
      break;
    }
    const handler = handlers[req.cmd];
    if (!handler) {
      reply({ id: req.id, ok: false, error: 'unknown command: ' + req.cmd });
      continue;
    }
    try {
      const value = await handler(req.args || {});
      reply({ id: req.id, ok: true, value: value === undefined ? null : value });
    } catch (e) {
      reply({ id: req.id, ok: false, error: e.message });
    }
  }

  await context.close();
  await browser.close();
})().catch((e) => {
  process.stderr.write('bridge failed: ' + (e && e.stack ? e.stack : e) + '\n');
  process.exit(1);
});
"#;

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    cmd: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchConfig<'a> {
    browser: &'static str,
    headless: bool,
    viewport: Viewport,
    base_url: &'a str,
    storage_state: Option<PathBuf>,
    default_timeout_ms: u64,
}

struct BridgeIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A live browser context driven through the bridge process
pub struct PlaywrightSession {
    io: Mutex<BridgeIo>,
    next_id: AtomicU64,
    screenshot_dir: PathBuf,
    request_timeout: Duration,
    /// Holds the bridge script for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    /// Launch a browser context for one scenario
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.project_dir).await?;
        std::fs::create_dir_all(&config.screenshot_dir)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let launch = LaunchConfig {
            browser: config.browser.as_str(),
            headless: config.headless,
            viewport: config.viewport,
            base_url: &config.base_url,
            storage_state: config.storage_state.as_deref().map(absolute),
            default_timeout_ms: config.default_timeout.as_millis() as u64,
        };

        debug!("Launching Playwright bridge: {}", script_path.display());
        let mut child = Command::new("node")
            .arg(&script_path)
            .arg(serde_json::to_string(&launch)?)
            .current_dir(&config.project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("Failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;

        let session = Self {
            io: Mutex::new(BridgeIo {
                child,
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            next_id: AtomicU64::new(1),
            screenshot_dir: config.screenshot_dir,
            request_timeout: config.request_timeout,
            _script_dir: script_dir,
        };

        {
            let mut io = session.io.lock().await;
            tokio::time::timeout(config.default_timeout * 2, read_response(&mut io.stdout, 0))
                .await
                .map_err(|_| E2eError::Timeout("Playwright browser launch".to_string()))??;
        }

        info!(
            "Playwright {} session ready ({}x{})",
            config.browser.as_str(),
            config.viewport.width,
            config.viewport.height
        );
        Ok(session)
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed(project_dir: &Path) -> E2eResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Directory screenshots are written to
    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    /// Send one command and wait for its response
    pub async fn call(&self, cmd: &str, args: Value) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&BridgeRequest { id, cmd, args })?;
        let start = Instant::now();

        let mut io = self.io.lock().await;
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.write_all(b"\n").await?;
        io.stdin.flush().await?;

        let result = tokio::time::timeout(self.request_timeout, read_response(&mut io.stdout, id))
            .await
            .map_err(|_| E2eError::Timeout(format!("bridge response to {cmd}")))?;

        debug!("{} -> {} ms", cmd, start.elapsed().as_millis());
        result.map_err(|e| match e {
            E2eError::Playwright(reason) => E2eError::StepFailed {
                step: cmd.to_string(),
                reason,
            },
            other => other,
        })
    }

    async fn call_as<T: DeserializeOwned>(&self, cmd: &str, args: Value) -> E2eResult<T> {
        let value = self.call(cmd, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Read stdout lines until the response for `id` arrives
async fn read_response(stdout: &mut Lines<BufReader<ChildStdout>>, id: u64) -> E2eResult<Value> {
    loop {
        let line = stdout
            .next_line()
            .await?
            .ok_or_else(|| E2eError::Bridge("bridge process exited".to_string()))?;

        let response: BridgeResponse = match serde_json::from_str(&line) {
            Ok(response) => response,
            Err(_) => {
                debug!("[bridge] {}", line);
                continue;
            }
        };

        match response.id {
            Some(rid) if rid == id => {}
            None if !response.ok => {
                return Err(E2eError::Bridge(response.error.unwrap_or_default()));
            }
            _ => {
                warn!("Discarding stale bridge response: {}", line);
                continue;
            }
        }

        return if response.ok {
            Ok(response.value)
        } else {
            Err(E2eError::Playwright(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        };
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[async_trait]
impl BrowserDriver for PlaywrightSession {
    async fn goto(&self, url: &str, wait_until: LoadState) -> E2eResult<()> {
        self.call("goto", json!({ "url": url, "waitUntil": wait_until.as_str() }))
            .await?;
        Ok(())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> E2eResult<()> {
        self.call(
            "waitForLoadState",
            json!({ "state": state.as_str(), "timeoutMs": millis(timeout) }),
        )
        .await?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.call(
            "waitForSelector",
            json!({ "selector": selector, "timeoutMs": millis(timeout) }),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.call(
            "click",
            json!({ "selector": selector, "timeoutMs": millis(timeout) }),
        )
        .await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.call("fill", json!({ "selector": selector, "value": value }))
            .await?;
        Ok(())
    }

    async fn clear(&self, selector: &str) -> E2eResult<()> {
        self.call("clear", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> E2eResult<()> {
        self.call("type", json!({ "text": text })).await?;
        Ok(())
    }

    async fn press(&self, key: &str) -> E2eResult<()> {
        self.call("press", json!({ "key": key })).await?;
        Ok(())
    }

    async fn press_on(&self, selector: &str, key: &str) -> E2eResult<()> {
        self.call("pressOn", json!({ "selector": selector, "key": key }))
            .await?;
        Ok(())
    }

    async fn focus(&self, selector: &str) -> E2eResult<()> {
        self.call("focus", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        self.call_as("count", json!({ "selector": selector })).await
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        self.call_as("isVisible", json!({ "selector": selector })).await
    }

    async fn is_editable(&self, selector: &str) -> E2eResult<bool> {
        self.call_as("isEditable", json!({ "selector": selector })).await
    }

    async fn is_focused(&self, selector: &str) -> E2eResult<bool> {
        self.call_as("isFocused", json!({ "selector": selector })).await
    }

    async fn inner_text(&self, selector: &str) -> E2eResult<String> {
        self.call_as("innerText", json!({ "selector": selector })).await
    }

    async fn inner_html(&self, selector: &str) -> E2eResult<String> {
        self.call_as("innerHTML", json!({ "selector": selector })).await
    }

    async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        self.call_as("getAttribute", json!({ "selector": selector, "name": name }))
            .await
    }

    async fn evaluate(&self, selector: &str, script: &str, arg: Value) -> E2eResult<Value> {
        self.call(
            "evaluate",
            json!({ "selector": selector, "script": script, "arg": arg }),
        )
        .await
    }

    async fn evaluate_all(&self, selector: &str, script: &str, arg: Value) -> E2eResult<Value> {
        self.call(
            "evaluateAll",
            json!({ "selector": selector, "script": script, "arg": arg }),
        )
        .await
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<PathBuf> {
        let path = absolute(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call(
            "screenshot",
            json!({ "path": path, "fullPage": full_page }),
        )
        .await?;
        Ok(path)
    }

    async fn set_viewport(&self, viewport: Viewport) -> E2eResult<()> {
        self.call(
            "setViewport",
            json!({ "width": viewport.width, "height": viewport.height }),
        )
        .await?;
        Ok(())
    }

    async fn save_storage_state(&self, path: &Path) -> E2eResult<()> {
        let path = absolute(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call("storageState", json!({ "path": path })).await?;
        Ok(())
    }

    async fn dialogs(&self) -> E2eResult<Vec<String>> {
        self.call_as("dialogs", Value::Null).await
    }

    async fn close(&self) -> E2eResult<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&BridgeRequest {
            id,
            cmd: "close",
            args: Value::Null,
        })?;

        let mut io = self.io.lock().await;
        if io.stdin.write_all(format!("{line}\n").as_bytes()).await.is_ok() {
            let _ = io.stdin.flush().await;
        }

        match tokio::time::timeout(Duration::from_secs(5), io.child.wait()).await {
            Ok(Ok(status)) => {
                debug!("Playwright bridge exited with {}", status);
                return Ok(());
            }
            Ok(Err(e)) => warn!("Waiting for Playwright bridge failed: {}", e),
            Err(_) => warn!("Playwright bridge did not exit after close"),
        }

        // Try graceful shutdown before killing
        #[cfg(unix)]
        if let Some(pid) = io.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }

        let _ = io.child.kill().await;
        Ok(())
    }
}
