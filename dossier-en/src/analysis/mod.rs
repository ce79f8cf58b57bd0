//! Analysis adapter boundary
//!
//! The orchestrator hands a consolidated evidence bundle plus an
//! instruction tag across this boundary and receives structured output
//! back. The adapter must return structured JSON (explicit lists, tagged
//! sections); prose is only accepted for the free-text instructions, and a
//! response that fails to parse becomes a `ParseFailure` marker the
//! orchestrator records on the block, never an error that crosses the
//! core's boundary.

mod llm_client;

pub use llm_client::{LlmAnalysisClient, LlmError};

use crate::types::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// What kind of analysis is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisInstruction {
    /// Extract an explicit list of competitor names
    CompetitorScan,
    /// SWOT sections
    Swot,
    /// Overall sentiment with rationale
    Sentiment,
    /// Biography for a person/politician
    Biography,
    /// Final free-text synthesis over the full report
    Synthesis,
}

impl AnalysisInstruction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisInstruction::CompetitorScan => "competitor_scan",
            AnalysisInstruction::Swot => "swot",
            AnalysisInstruction::Sentiment => "sentiment",
            AnalysisInstruction::Biography => "biography",
            AnalysisInstruction::Synthesis => "synthesis",
        }
    }
}

/// Consolidated evidence handed to the adapter
///
/// Sections hold merged, ranked, deduplicated material keyed by block name
/// ("profile", "news", "competitors", ...). The adapter never sees raw
/// provider payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub subject: String,
    pub entity_kind: EntityKind,
    pub sections: BTreeMap<String, serde_json::Value>,
}

impl EvidenceBundle {
    pub fn new(subject: impl Into<String>, entity_kind: EntityKind) -> Self {
        Self {
            subject: subject.into(),
            entity_kind,
            sections: BTreeMap::new(),
        }
    }

    pub fn with_section(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.sections.insert(name.into(), value);
        self
    }
}

/// Structured analysis output
///
/// `ParseFailure` is data, not an error: the orchestrator records it as a
/// block error marker and the run continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutput {
    Competitors {
        names: Vec<String>,
    },
    Swot {
        strengths: Vec<String>,
        weaknesses: Vec<String>,
        opportunities: Vec<String>,
        threats: Vec<String>,
    },
    Sentiment {
        label: String,
        score: f64,
        rationale: String,
    },
    Text {
        content: String,
    },
    ParseFailure {
        error: String,
        raw: String,
    },
}

/// Adapter-level transport errors
///
/// Only transport/credential problems surface here; malformed output is
/// represented as `AnalysisOutput::ParseFailure`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Auth failure: {0}")]
    Auth(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),
}

/// Boundary trait: evidence in, structured output back
#[async_trait::async_trait]
pub trait AnalysisAdapter: Send + Sync {
    /// Adapter name for provenance and logging
    fn name(&self) -> &'static str;

    async fn analyze(
        &self,
        bundle: &EvidenceBundle,
        instruction: AnalysisInstruction,
    ) -> Result<AnalysisOutput, AnalysisError>;
}

/// Parse raw adapter text into the structured output for an instruction
///
/// Total: any malformed response becomes a `ParseFailure` marker carrying
/// the raw text for diagnostics.
pub fn parse_analysis_output(instruction: AnalysisInstruction, raw: &str) -> AnalysisOutput {
    let stripped = strip_code_fences(raw);

    let parsed: Result<serde_json::Value, _> = serde_json::from_str(stripped);
    let value = match parsed {
        Ok(value) => value,
        Err(e) => {
            // Free-text instructions accept prose as-is
            if matches!(instruction, AnalysisInstruction::Synthesis) {
                return AnalysisOutput::Text {
                    content: stripped.to_string(),
                };
            }
            return AnalysisOutput::ParseFailure {
                error: format!("invalid JSON: {}", e),
                raw: raw.to_string(),
            };
        }
    };

    let result = match instruction {
        AnalysisInstruction::CompetitorScan => value
            .get("competitors")
            .or_else(|| value.get("names"))
            .and_then(|v| v.as_array())
            .map(|array| AnalysisOutput::Competitors {
                names: array
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            }),
        AnalysisInstruction::Swot => {
            let section = |key: &str| -> Option<Vec<String>> {
                value.get(key).and_then(|v| v.as_array()).map(|array| {
                    array
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(|s| s.to_string())
                        .collect()
                })
            };
            match (
                section("strengths"),
                section("weaknesses"),
                section("opportunities"),
                section("threats"),
            ) {
                (Some(strengths), Some(weaknesses), Some(opportunities), Some(threats)) => {
                    Some(AnalysisOutput::Swot {
                        strengths,
                        weaknesses,
                        opportunities,
                        threats,
                    })
                }
                _ => None,
            }
        }
        AnalysisInstruction::Sentiment => {
            let label = value.get("label").and_then(|v| v.as_str());
            let score = value.get("score").and_then(|v| v.as_f64());
            match (label, score) {
                (Some(label), Some(score)) => Some(AnalysisOutput::Sentiment {
                    label: label.to_string(),
                    score,
                    rationale: value
                        .get("rationale")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                }),
                _ => None,
            }
        }
        AnalysisInstruction::Biography | AnalysisInstruction::Synthesis => value
            .get("content")
            .or_else(|| value.get("text"))
            .and_then(|v| v.as_str())
            .map(|content| AnalysisOutput::Text {
                content: content.to_string(),
            }),
    };

    result.unwrap_or_else(|| AnalysisOutput::ParseFailure {
        error: format!(
            "JSON did not match the {} output shape",
            instruction.as_str()
        ),
        raw: raw.to_string(),
    })
}

/// Strip a Markdown code fence wrapper if the model added one
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
