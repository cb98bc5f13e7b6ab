//! Scenario data: queries, expected answers and UI expectations
//!
//! Two documents live in the fixtures directory, each as JSON or YAML:
//! `queries.{json,yaml,yml}` and `generic_data.{json,yaml,yml}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chatqa_common::markup::escape_html;
use chatqa_common::{AppLanguage, TextDirection, Viewport};

use crate::error::{E2eError, E2eResult};

/// Queries for one language
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleQueries {
    pub test_query: Option<String>,
    pub simple_query: Option<String>,
    pub public_service_query_one: Option<String>,
    pub public_service_expected_response_one: Option<String>,
    pub public_service_query_two: Option<String>,
    pub public_service_expected_response_two: Option<String>,
    pub malicious_query: Option<String>,
    pub ignore_instructions_query: Option<String>,
    pub fallback_query: Option<String>,
    /// Any of these, case-insensitively, marks a fallback answer
    pub expected_fallback_response: Vec<String>,
}

/// A query paired with the answer a grader should expect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedQuery<'a> {
    pub query: &'a str,
    pub expected: &'a str,
}

fn require<'a>(value: &'a Option<String>, locale: &str, field: &str) -> E2eResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| E2eError::FixtureParse(format!("missing queries.{locale}.{field}")))
}

macro_rules! required_query {
    ($($name:ident),+ $(,)?) => {
        $(
            pub fn $name(&self) -> E2eResult<&'a str> {
                let queries: &'a LocaleQueries = self.queries;
                require(&queries.$name, self.locale, stringify!($name))
            }
        )+
    };
}

/// Queries of one language with lookups that fail on missing entries
#[derive(Debug, Clone, Copy)]
pub struct Locale<'a> {
    locale: &'static str,
    queries: &'a LocaleQueries,
}

impl<'a> Locale<'a> {
    required_query!(
        test_query,
        simple_query,
        malicious_query,
        ignore_instructions_query,
        fallback_query,
    );

    pub fn public_service_one(&self) -> E2eResult<GradedQuery<'a>> {
        let queries: &'a LocaleQueries = self.queries;
        Ok(GradedQuery {
            query: require(
                &queries.public_service_query_one,
                self.locale,
                "public_service_query_one",
            )?,
            expected: require(
                &queries.public_service_expected_response_one,
                self.locale,
                "public_service_expected_response_one",
            )?,
        })
    }

    pub fn public_service_two(&self) -> E2eResult<GradedQuery<'a>> {
        let queries: &'a LocaleQueries = self.queries;
        Ok(GradedQuery {
            query: require(
                &queries.public_service_query_two,
                self.locale,
                "public_service_query_two",
            )?,
            expected: require(
                &queries.public_service_expected_response_two,
                self.locale,
                "public_service_expected_response_two",
            )?,
        })
    }

    pub fn expected_fallback_response(&self) -> E2eResult<&'a [String]> {
        let queries: &'a LocaleQueries = self.queries;
        if queries.expected_fallback_response.is_empty() {
            return Err(E2eError::FixtureParse(format!(
                "missing queries.{}.expected_fallback_response",
                self.locale
            )));
        }
        Ok(&queries.expected_fallback_response)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Queries {
    #[serde(default)]
    pub english: LocaleQueries,
    #[serde(default)]
    pub arabic: LocaleQueries,
}

impl Queries {
    pub fn english(&self) -> Locale<'_> {
        Locale {
            locale: "english",
            queries: &self.english,
        }
    }

    pub fn arabic(&self) -> Locale<'_> {
        Locale {
            locale: "arabic",
            queries: &self.arabic,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewports {
    pub mobile: Viewport,
    pub desktop: Viewport,
}

impl Default for Viewports {
    fn default() -> Self {
        Self {
            mobile: Viewport {
                width: 375,
                height: 667,
            },
            desktop: Viewport {
                width: 1440,
                height: 900,
            },
        }
    }
}

/// Expected `dir` of an answer, by app language and query language
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExpectedDirections {
    pub english_app_english_query: TextDirection,
    pub english_app_arabic_query: TextDirection,
    pub arabic_app_english_query: TextDirection,
    pub arabic_app_arabic_query: TextDirection,
}

impl Default for ExpectedDirections {
    fn default() -> Self {
        Self {
            english_app_english_query: TextDirection::Ltr,
            english_app_arabic_query: TextDirection::Rtl,
            arabic_app_english_query: TextDirection::Ltr,
            arabic_app_arabic_query: TextDirection::Rtl,
        }
    }
}

impl ExpectedDirections {
    pub fn for_pair(&self, app: AppLanguage, query: AppLanguage) -> TextDirection {
        match (app, query) {
            (AppLanguage::English, AppLanguage::English) => self.english_app_english_query,
            (AppLanguage::English, AppLanguage::Arabic) => self.english_app_arabic_query,
            (AppLanguage::Arabic, AppLanguage::English) => self.arabic_app_english_query,
            (AppLanguage::Arabic, AppLanguage::Arabic) => self.arabic_app_arabic_query,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericData {
    #[serde(default)]
    pub viewports: Viewports,
    #[serde(default)]
    pub text_directions: ExpectedDirections,
    /// Raw tag that must never reach the markup unescaped
    pub script_tag: String,
    /// Entity-encoded form expected in the markup; derived when absent
    #[serde(default)]
    pub sanitised_script_tag: Option<String>,
}

impl GenericData {
    pub fn sanitised_script_tag(&self) -> String {
        self.sanitised_script_tag
            .clone()
            .unwrap_or_else(|| escape_html(&self.script_tag))
    }
}

/// All fixture documents
#[derive(Debug, Clone)]
pub struct Fixtures {
    pub queries: Queries,
    pub generic: GenericData,
}

impl Fixtures {
    /// Load `queries` and `generic_data` from a directory
    pub fn load(dir: &Path) -> E2eResult<Self> {
        let queries = find_document(dir, "queries")?;
        let generic = find_document(dir, "generic_data")?;
        Ok(Self {
            queries: parse_document(&queries)?,
            generic: parse_document(&generic)?,
        })
    }
}

fn find_document(dir: &Path, stem: &str) -> E2eResult<PathBuf> {
    walkdir::WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .find(|path| {
            path.file_stem().map(|s| s == stem).unwrap_or(false)
                && path
                    .extension()
                    .map(|ext| ext == "json" || ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
        })
        .ok_or_else(|| {
            E2eError::FixtureParse(format!("no {stem}.json or {stem}.yaml in {}", dir.display()))
        })
}

/// Parse a JSON or YAML document by extension
pub fn parse_document<T: DeserializeOwned>(path: &Path) -> E2eResult<T> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    let parsed = if is_json {
        serde_json::from_str(&content).map_err(E2eError::from)
    } else {
        serde_yaml::from_str(&content).map_err(E2eError::from)
    };
    parsed.map_err(|e| E2eError::FixtureParse(format!("{}: {}", path.display(), e)))
}
