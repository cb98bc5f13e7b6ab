//! chatqa Common Library
//!
//! The logic at the heart of the chatbot test suite, independent of any
//! browser automation product:
//!
//! - [`detector`]: polls a rendered transcript until the latest answer has
//!   finished streaming
//! - [`validator`]: LLM-as-judge grading with a fixed rubric and a sentinel
//!   verdict for grader failures
//! - [`gemini`]: the Gemini backend for the grader
//! - [`markup`]: checks over rendered text and HTML

pub mod detector;
pub mod error;
pub mod gemini;
pub mod markup;
pub mod poll;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use detector::{ChatSurface, CompletionDetector, TranscriptReader};
pub use error::{Error, Result};
pub use gemini::GeminiClient;
pub use poll::{poll_until, RetryPolicy, WaitOutcome};
pub use types::*;
pub use validator::{
    build_evaluation_prompt, parse_verdict, AiResponseValidator, Generator, ScoreDetails,
    ValidationOutcome, Verdict,
};

/// chatqa version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
