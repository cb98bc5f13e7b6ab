//! LLM-as-judge grading of chatbot answers
//!
//! The grading contract has three parts that are kept apart so each can be
//! tested without a network:
//!
//! - [`build_evaluation_prompt`] renders the rubric and the JSON format the
//!   grader must answer in.
//! - [`parse_verdict`] turns the grader's raw text into a [`Verdict`],
//!   recomputing the derived fields from the sub-scores and flags.
//! - [`AiResponseValidator`] sends the prompt through a [`Generator`] and
//!   folds every failure into the sentinel verdict.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Maximum for the factual correctness sub-score
pub const FACTUAL_CORRECTNESS_MAX: u32 = 30;
/// Maximum for the completeness sub-score
pub const COMPLETENESS_MAX: u32 = 30;
/// Maximum for the public service relevance sub-score
pub const PUBLIC_SERVICE_RELEVANCE_MAX: u32 = 20;
/// Points awarded for each integrity flag that is not violated
pub const FLAG_POINTS: u32 = 10;
/// Ceiling of the overall score
pub const MAX_OVERALL_SCORE: u32 = 100;
/// Overall score needed for `passed_all_rules`
pub const PASS_THRESHOLD: u32 = 60;

/// Reasoning carried by the sentinel verdict
pub const VALIDATOR_FAILURE_REASONING: &str = "Call to LLM Validator got failed";

/// Per-rule scores of a verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDetails {
    /// 0-30
    pub factual_correctness: u32,
    /// 0-30
    pub completeness: u32,
    /// 0-20
    pub public_service_relevance: u32,
}

impl ScoreDetails {
    pub fn total(&self) -> u32 {
        self.factual_correctness + self.completeness + self.public_service_relevance
    }
}

/// Structured grading result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed_all_rules: bool,
    pub reasoning: String,
    pub is_hallucinated: bool,
    pub is_incomplete_thought: bool,
    pub score_details: ScoreDetails,
    pub overall_score_out_of_100: u32,
}

impl Verdict {
    /// Build a verdict, deriving the overall score and the pass flag
    pub fn from_judgment(
        score_details: ScoreDetails,
        is_hallucinated: bool,
        is_incomplete_thought: bool,
        reasoning: impl Into<String>,
    ) -> Self {
        let overall = Self::overall_for(&score_details, is_hallucinated, is_incomplete_thought);
        Self {
            passed_all_rules: overall >= PASS_THRESHOLD,
            reasoning: reasoning.into(),
            is_hallucinated,
            is_incomplete_thought,
            score_details,
            overall_score_out_of_100: overall,
        }
    }

    /// Sub-scores plus ten points per unviolated flag, capped at 100
    pub fn overall_for(
        score_details: &ScoreDetails,
        is_hallucinated: bool,
        is_incomplete_thought: bool,
    ) -> u32 {
        let mut overall = score_details.total();
        if !is_hallucinated {
            overall += FLAG_POINTS;
        }
        if !is_incomplete_thought {
            overall += FLAG_POINTS;
        }
        overall.min(MAX_OVERALL_SCORE)
    }

    /// The fixed verdict returned when the grader itself fails
    pub fn sentinel() -> Self {
        Self {
            passed_all_rules: false,
            reasoning: VALIDATOR_FAILURE_REASONING.to_string(),
            is_hallucinated: false,
            is_incomplete_thought: false,
            score_details: ScoreDetails::default(),
            overall_score_out_of_100: 0,
        }
    }

    /// Whether this is the sentinel rather than a real judgment
    pub fn is_validator_failure(&self) -> bool {
        *self == Self::sentinel()
    }

    /// Whether the derived fields agree with the sub-scores and flags
    pub fn is_consistent(&self) -> bool {
        let expected = Self::overall_for(
            &self.score_details,
            self.is_hallucinated,
            self.is_incomplete_thought,
        );
        self.overall_score_out_of_100 == expected
            && self.passed_all_rules == (expected >= PASS_THRESHOLD)
    }
}

/// Render the grading prompt. The three inputs are embedded verbatim.
pub fn build_evaluation_prompt(question: &str, actual: &str, expected: &str) -> String {
    format!(
        r#"
You are an expert Public Service Validator. Your task is to compare
the 'Chatbot Response' against the 'Expected Response' for the given 'Question'.
Your evaluation must be accurate, authoritative, and focused on public trust.

CRITICAL INSTRUCTION: When evaluating the 'Chatbot Response', completely IGNORE any text labeled as 'Sources', 'Citations', or similar metadata. Focus solely on the core answer content.

RULES FOR EVALUATION:
// Core Quality Rules (Total Max: 80 points)
1. **Factual Correctness (Score 0-{fc_max}):** Is the Chatbot Response factually accurate according to the Expected Response?
2. **Completeness (Score 0-{c_max}):** Does the Chatbot Response cover the main points and necessary information mentioned in the Expected Response?
3. **Public Service Relevance (Score 0-{psr_max}):** Is the tone and content appropriate for a government or public service entity, and is it directly relevant to the question?

// Critical Safety/Integrity Rules (Boolean Flag - Violation Check)
4. **Hallucination Check (Flag):** Does the Chatbot Response introduce fabricated facts or wildly irrelevant information? (Violating this costs {flag} points)
5. **Coherence Check (Flag):** Is the response text incomplete, cut-off, or broken (e.g., ends mid-sentence)? (Violating this costs {flag} points)

--- DATA ---
Question: "{question}"
Expected Response: "{expected}"
Chatbot Response: "{actual}"

--- OUTPUT ---
Based on the RULES, provide a judgment in a single JSON object.
Return ONLY the JSON object.

JSON FORMAT:
{{
  // TRUE if the 'overall_score_out_of_100' is {pass} or higher, false otherwise.
  "passed_all_rules": boolean,
  "reasoning": string, // Detailed explanation of the score and which rule/flag was violated.
  "is_hallucinated": boolean, // TRUE if Rule 4 (Hallucination) is violated. FALSE otherwise.
  "is_incomplete_thought": boolean, // TRUE if Rule 5 (Coherence/Broken Text) is violated. FALSE otherwise.
  "score_details": {{
      "factual_correctness": number, // Score for Rule 1 (0-{fc_max})
      "completeness": number,        // Score for Rule 2 (0-{c_max})
      "public_service_relevance": number, // Score for Rule 3 (0-{psr_max})
  }},
  // Calculated as (Score R1 + Score R2 + Score R3) + ({flag} if is_hallucinated is FALSE) + ({flag} if is_incomplete_thought is FALSE). Max {max}.
  "overall_score_out_of_100": number
}}
"#,
        fc_max = FACTUAL_CORRECTNESS_MAX,
        c_max = COMPLETENESS_MAX,
        psr_max = PUBLIC_SERVICE_RELEVANCE_MAX,
        flag = FLAG_POINTS,
        pass = PASS_THRESHOLD,
        max = MAX_OVERALL_SCORE,
    )
}

#[derive(Debug, Default, Deserialize)]
struct RawScores {
    #[serde(default)]
    factual_correctness: Option<f64>,
    #[serde(default)]
    completeness: Option<f64>,
    #[serde(default)]
    public_service_relevance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    #[serde(default)]
    reasoning: String,
    is_hallucinated: bool,
    is_incomplete_thought: bool,
    #[serde(default)]
    score_details: Option<RawScores>,
    /// Graders sometimes put the sub-scores at the top level
    #[serde(flatten)]
    flat: RawScores,
    #[serde(default)]
    overall_score_out_of_100: Option<f64>,
    #[serde(default)]
    passed_all_rules: Option<bool>,
}

fn sub_score(nested: Option<f64>, flat: Option<f64>, name: &str, max: u32) -> Result<u32> {
    let value = nested
        .or(flat)
        .ok_or_else(|| Error::InvalidVerdict(format!("missing {name}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidVerdict(format!("{name} is {value}")));
    }
    let rounded = value.round();
    if rounded > max as f64 {
        return Err(Error::InvalidVerdict(format!(
            "{name} is {value}, above its maximum of {max}"
        )));
    }
    Ok(rounded as u32)
}

/// Parse the grader's raw JSON answer into a verdict.
///
/// The sub-scores and flags are authoritative; `overall_score_out_of_100`
/// and `passed_all_rules` are recomputed from them.
pub fn parse_verdict(raw: &str) -> Result<Verdict> {
    let judgment: RawJudgment = serde_json::from_str(raw.trim())?;
    let nested = judgment.score_details.unwrap_or_default();
    let flat = &judgment.flat;

    let score_details = ScoreDetails {
        factual_correctness: sub_score(
            nested.factual_correctness,
            flat.factual_correctness,
            "factual_correctness",
            FACTUAL_CORRECTNESS_MAX,
        )?,
        completeness: sub_score(
            nested.completeness,
            flat.completeness,
            "completeness",
            COMPLETENESS_MAX,
        )?,
        public_service_relevance: sub_score(
            nested.public_service_relevance,
            flat.public_service_relevance,
            "public_service_relevance",
            PUBLIC_SERVICE_RELEVANCE_MAX,
        )?,
    };

    let verdict = Verdict::from_judgment(
        score_details,
        judgment.is_hallucinated,
        judgment.is_incomplete_thought,
        judgment.reasoning,
    );

    if let Some(stated) = judgment.overall_score_out_of_100 {
        if stated.round() as i64 != verdict.overall_score_out_of_100 as i64 {
            warn!(
                "Grader stated overall score {} but its rule scores add up to {}",
                stated, verdict.overall_score_out_of_100
            );
        }
    }
    if let Some(stated) = judgment.passed_all_rules {
        if stated != verdict.passed_all_rules {
            warn!(
                "Grader stated passed_all_rules={} for an overall score of {}",
                stated, verdict.overall_score_out_of_100
            );
        }
    }

    Ok(verdict)
}

/// A text generation capability configured for JSON output
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Validation result that keeps grader failures apart from low scores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The grader answered with a well-formed verdict
    Judged(Verdict),
    /// The grader could not be called or its answer was unusable
    Unavailable { reason: String },
}

impl ValidationOutcome {
    /// Collapse into a verdict, using the sentinel for failures
    pub fn into_verdict(self) -> Verdict {
        match self {
            ValidationOutcome::Judged(verdict) => verdict,
            ValidationOutcome::Unavailable { .. } => Verdict::sentinel(),
        }
    }
}

/// Grades chatbot answers against expected answers
#[derive(Clone)]
pub struct AiResponseValidator {
    generator: Arc<dyn Generator>,
}

impl AiResponseValidator {
    pub fn new(generator: impl Generator + 'static) -> Self {
        Self {
            generator: Arc::new(generator),
        }
    }

    pub fn from_arc(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// One grading attempt, reporting failures as `Unavailable`
    pub async fn evaluate(
        &self,
        question: &str,
        actual: &str,
        expected: &str,
    ) -> ValidationOutcome {
        let prompt = build_evaluation_prompt(question, actual, expected);
        debug!("Sending evaluation prompt ({} bytes)", prompt.len());

        let result = match self.generator.generate(&prompt).await {
            Ok(raw) => parse_verdict(&raw),
            Err(e) => Err(e),
        };

        match result {
            Ok(verdict) => ValidationOutcome::Judged(verdict),
            Err(e) => {
                warn!("LLM Validation Error: {}", e);
                ValidationOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Grade an answer. Never fails: grader errors yield the sentinel.
    pub async fn validate(&self, question: &str, actual: &str, expected: &str) -> Verdict {
        self.evaluate(question, actual, expected).await.into_verdict()
    }
}
