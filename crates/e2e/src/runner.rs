//! Test runner: global login setup, per-scenario browser sessions and reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use chatqa_common::AiResponseValidator;

use crate::config::SuiteConfig;
use crate::driver::BrowserDriver;
use crate::ensure;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::Fixtures;
use crate::pages::{ChatPage, LoginPage};
use crate::playwright::{PlaywrightConfig, PlaywrightSession};
use crate::preflight::wait_until_reachable;
use crate::scenarios::{Annotation, Attachment, Scenario, ScenarioContext, ScenarioFlow, Suite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub title: String,
    pub suite: Suite,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    /// Failure message, or the reason for a skip
    pub error: Option<String>,
    pub annotations: Vec<Annotation>,
    pub attachments: Vec<Attachment>,
}

impl ScenarioResult {
    fn new(scenario: Scenario, status: ScenarioStatus, duration: Duration) -> Self {
        Self {
            name: scenario.name().to_string(),
            title: scenario.title().to_string(),
            suite: scenario.suite(),
            status,
            duration_ms: duration.as_millis() as u64,
            error: None,
            annotations: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// A scenario that could not even get a browser
    fn harness_failure(scenario: Scenario, error: &E2eError, duration: Duration) -> Self {
        let mut result = Self::new(scenario, ScenarioStatus::Failed, duration);
        result.error = Some(error.to_string());
        result
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl TestSuiteResult {
    pub fn from_results(
        started_at: DateTime<Utc>,
        duration: Duration,
        results: Vec<ScenarioResult>,
    ) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            total: results.len(),
            passed: count(ScenarioStatus::Passed),
            failed: count(ScenarioStatus::Failed),
            skipped: count(ScenarioStatus::Skipped),
            duration_ms: duration.as_millis() as u64,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Hex sha256 of a file
pub fn sha256_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub playwright: PlaywrightConfig,
    pub output_dir: PathBuf,
    /// Reuse an existing storage state instead of logging in first
    pub skip_setup: bool,
    /// How long to wait for the chatbot to answer HTTP at all
    pub preflight_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            playwright: PlaywrightConfig::default(),
            output_dir: PathBuf::from("test-results"),
            skip_setup: false,
            preflight_timeout: Duration::from_secs(30),
        }
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,
    suite: SuiteConfig,
    fixtures: Fixtures,
    validator: Option<AiResponseValidator>,
    setup_done: bool,
}

impl TestRunner {
    pub fn new(config: RunnerConfig, suite: SuiteConfig, fixtures: Fixtures) -> Self {
        Self {
            config,
            suite,
            fixtures,
            validator: None,
            setup_done: false,
        }
    }

    /// Grader for the quality scenarios; they are skipped without one
    pub fn with_validator(mut self, validator: Option<AiResponseValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    fn session_config(&self, with_storage_state: bool) -> PlaywrightConfig {
        let mut config = self.config.playwright.clone();
        config.base_url = self.suite.chatbot_url.clone();
        config.screenshot_dir = self.config.output_dir.join("screenshots");
        config.storage_state = with_storage_state.then(|| self.suite.storage_state_path.clone());
        config
    }

    /// Log in once and save the browser state for the logged-in suites
    pub async fn global_setup(&mut self) -> E2eResult<()> {
        if self.setup_done {
            return Ok(());
        }
        let state_path = self.suite.storage_state_path.clone();
        if self.config.skip_setup {
            if !state_path.exists() {
                warn!(
                    "Skipping login setup but {} does not exist",
                    state_path.display()
                );
            }
            self.setup_done = true;
            return Ok(());
        }

        info!("Global setup running...");
        wait_until_reachable(&self.suite.chatbot_url, self.config.preflight_timeout).await?;

        let session = PlaywrightSession::launch(self.session_config(false)).await?;
        let driver: Arc<dyn BrowserDriver> = Arc::new(session);
        let result = self.login_and_save(driver.clone(), &state_path).await;
        if let Err(e) = driver.close().await {
            warn!("Closing setup browser failed: {}", e);
        }
        result?;

        info!("Global setup completed, state saved to {}", state_path.display());
        self.setup_done = true;
        Ok(())
    }

    async fn login_and_save(
        &self,
        driver: Arc<dyn BrowserDriver>,
        state_path: &Path,
    ) -> E2eResult<()> {
        let login = LoginPage::new(driver.clone(), &self.suite.chatbot_url);
        let chat = ChatPage::new(driver.clone());
        let credentials = &self.suite.credentials;

        login.goto().await?;
        login.click_login_with_email().await?;
        login.login(&credentials.email, &credentials.password).await?;

        let visible = match chat.is_welcome_text_displayed().await {
            Ok(visible) => visible,
            Err(e) => {
                debug!("Welcome text did not show: {}", e);
                false
            }
        };
        ensure!(visible, "login during setup did not reach the chat page");
        driver.save_storage_state(state_path).await
    }

    /// Run every scenario
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        self.run_scenarios(&Scenario::ALL).await
    }

    /// Run the scenarios of one suite
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let scenarios = Scenario::tagged(tag);
        if scenarios.is_empty() {
            return Err(E2eError::StepFailed {
                step: "select scenarios".to_string(),
                reason: format!("no scenarios tagged {tag:?}"),
            });
        }
        self.run_scenarios(&scenarios).await
    }

    /// Run a specific scenario by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<ScenarioResult> {
        let scenario = Scenario::find(name).ok_or_else(|| E2eError::StepFailed {
            step: "select scenarios".to_string(),
            reason: format!("Test not found: {name}"),
        })?;
        if scenario.suite().uses_storage_state() {
            self.global_setup().await?;
        }
        Ok(self.run_scenario(scenario).await)
    }

    /// Run a list of scenarios in order
    pub async fn run_scenarios(&mut self, scenarios: &[Scenario]) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        if scenarios.iter().any(|s| s.suite().uses_storage_state()) {
            self.global_setup().await?;
        }

        info!("Running {} scenario(s)...", scenarios.len());
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run_scenario(*scenario).await);
        }

        let suite = TestSuiteResult::from_results(started_at, start.elapsed(), results);
        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );
        Ok(suite)
    }

    /// Run one scenario in its own browser session
    pub async fn run_scenario(&self, scenario: Scenario) -> ScenarioResult {
        let start = Instant::now();
        let config = self.session_config(scenario.suite().uses_storage_state());
        let session = match PlaywrightSession::launch(config).await {
            Ok(session) => session,
            Err(e) => {
                error!("✗ {} - {}", scenario.name(), e);
                return ScenarioResult::harness_failure(scenario, &e, start.elapsed());
            }
        };

        let driver: Arc<dyn BrowserDriver> = Arc::new(session);
        let result = self.execute(scenario, driver.clone()).await;
        if let Err(e) = driver.close().await {
            warn!("Closing browser for {} failed: {}", scenario.name(), e);
        }
        result
    }

    /// Run a scenario body against an already open browser.
    /// A failure leaves a full-page screenshot in the output directory.
    pub async fn execute(
        &self,
        scenario: Scenario,
        driver: Arc<dyn BrowserDriver>,
    ) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name());

        let mut ctx = ScenarioContext {
            login: LoginPage::new(driver.clone(), &self.suite.chatbot_url),
            chat: ChatPage::new(driver.clone()),
            fixtures: &self.fixtures,
            config: &self.suite,
            validator: self.validator.as_ref(),
            artifacts_dir: &self.config.output_dir,
            annotations: Vec::new(),
            attachments: Vec::new(),
        };
        let outcome = scenario.run(&mut ctx).await;
        let ScenarioContext {
            annotations,
            mut attachments,
            ..
        } = ctx;

        let (status, message) = match outcome {
            Ok(ScenarioFlow::Completed) => (ScenarioStatus::Passed, None),
            Ok(ScenarioFlow::Skipped(reason)) => (ScenarioStatus::Skipped, Some(reason)),
            Err(e) => {
                let path = self
                    .config
                    .output_dir
                    .join("screenshots")
                    .join(format!("{}-failure.png", scenario.name()));
                match self.capture_failure(driver.as_ref(), &path).await {
                    Ok(attachment) => attachments.push(attachment),
                    Err(shot) => warn!("No failure screenshot for {}: {}", scenario.name(), shot),
                }
                (ScenarioStatus::Failed, Some(e.to_string()))
            }
        };

        let mut result = ScenarioResult::new(scenario, status, start.elapsed());
        match status {
            ScenarioStatus::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
            ScenarioStatus::Skipped => info!(
                "- {} skipped: {}",
                result.name,
                message.as_deref().unwrap_or_default()
            ),
            ScenarioStatus::Failed => error!(
                "✗ {} - {}",
                result.name,
                message.as_deref().unwrap_or("unknown error")
            ),
        }
        result.error = message;
        result.annotations = annotations;
        result.attachments = attachments;
        result
    }

    async fn capture_failure(&self, driver: &dyn BrowserDriver, path: &Path) -> E2eResult<Attachment> {
        let saved = driver.screenshot(path, true).await?;
        Ok(Attachment {
            name: "failure-screenshot".to_string(),
            sha256: sha256_file(&saved)?,
            path: saved,
        })
    }

    /// Write results as pretty JSON to `<output>/test-results.json`
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
