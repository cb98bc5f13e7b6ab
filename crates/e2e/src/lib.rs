//! chatqa E2E suite
//!
//! Drives the chatbot UI in a real browser and checks its behaviour:
//! - Logs in once and shares the saved browser state between scenarios
//! - Controls Playwright through a Node bridge speaking line-delimited JSON
//! - Waits for streamed answers with the completion detector
//! - Grades answer quality with the LLM validator when a key is configured
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── global_setup() -> storage state                      │
//! │    ├── PlaywrightSession::launch() per scenario             │
//! │    ├── execute(scenario, driver) -> ScenarioResult          │
//! │    └── write_results() -> test-results.json                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenarios (chatbot, gpt_response, login, security)         │
//! │    ├── LoginPage / ChatPage over dyn BrowserDriver          │
//! │    ├── CompletionDetector (chatqa-common)                   │
//! │    └── AiResponseValidator (chatqa-common)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod fixtures;
pub mod pages;
pub mod playwright;
pub mod preflight;
pub mod runner;
pub mod scenarios;

pub use config::SuiteConfig;
pub use driver::{BrowserDriver, LoadState};
pub use error::{E2eError, E2eResult};
pub use fixtures::Fixtures;
pub use pages::{ChatPage, LoginPage};
pub use runner::{RunnerConfig, ScenarioResult, ScenarioStatus, TestRunner, TestSuiteResult};
pub use scenarios::{Scenario, Suite};
