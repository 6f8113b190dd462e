use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contracts::{catalog, Contract};

/// The caller's upload, as received. Validated by the orchestrator before use.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub video_data_uri: String,
}

impl AnalysisRequest {
    pub fn new(video_data_uri: impl Into<String>) -> Self {
        Self { video_data_uri: video_data_uri.into() }
    }
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("video_data_uri_len", &self.video_data_uri.len())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountFeedback {
    pub number_of_baskets: u64,
    pub feedback: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameplayAnalysis {
    pub strengths: String,
    pub weaknesses: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountCommentary {
    pub number_of_baskets: u64,
    pub analysis: GameplayAnalysis,
    pub commentary: String,
}

/// Serializes to exactly the shape the model returned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    CountOnly(CountFeedback),
    WithCommentary(CountCommentary),
}

impl AnalysisResult {
    pub fn number_of_baskets(&self) -> u64 {
        match self {
            Self::CountOnly(result) => result.number_of_baskets,
            Self::WithCommentary(result) => result.number_of_baskets,
        }
    }

    pub fn feedback(&self) -> Option<&str> {
        match self {
            Self::CountOnly(result) => Some(&result.feedback),
            Self::WithCommentary(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachRequest {
    pub number_of_baskets: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachFeedback {
    pub feedback: String,
}

/// Which output contract (and prompt) a video analysis runs with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisVariant {
    /// Count plus model-authored feedback.
    Feedback,
    /// Count plus feedback produced by the `provideFeedback` capability.
    ToolFeedback,
    /// Count, strengths/weaknesses and play-by-play commentary.
    #[default]
    Commentary,
}

impl AnalysisVariant {
    pub const ALL: [Self; 3] = [Self::Feedback, Self::ToolFeedback, Self::Commentary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::ToolFeedback => "tool_feedback",
            Self::Commentary => "commentary",
        }
    }

    pub fn output_contract(self) -> Contract {
        match self {
            Self::Feedback => catalog::count_with_feedback(),
            Self::ToolFeedback => catalog::count_with_tool_feedback(),
            Self::Commentary => catalog::count_with_commentary(),
        }
    }

    pub fn offers_feedback_tool(self) -> bool {
        matches!(self, Self::ToolFeedback)
    }
}

impl fmt::Display for AnalysisVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported analysis variant `{0}` (expected feedback|tool_feedback|commentary)")]
pub struct UnknownVariant(pub String);

impl FromStr for AnalysisVariant {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "feedback" => Ok(Self::Feedback),
            "tool_feedback" => Ok(Self::ToolFeedback),
            "commentary" => Ok(Self::Commentary),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        AnalysisResult, AnalysisVariant, CountCommentary, GameplayAnalysis, UnknownVariant,
    };

    #[test]
    fn commentary_result_serializes_to_wire_shape() {
        let result = AnalysisResult::WithCommentary(CountCommentary {
            number_of_baskets: 2,
            analysis: GameplayAnalysis {
                strengths: "Quick release".to_string(),
                weaknesses: "Left hand".to_string(),
            },
            commentary: "Two clean buckets.".to_string(),
        });

        assert_eq!(
            serde_json::to_value(&result).expect("serialize"),
            json!({
                "numberOfBaskets": 2,
                "analysis": { "strengths": "Quick release", "weaknesses": "Left hand" },
                "commentary": "Two clean buckets."
            })
        );
        assert_eq!(result.feedback(), None);
    }

    #[test]
    fn variant_parsing_accepts_config_spellings() {
        assert_eq!("tool-feedback".parse(), Ok(AnalysisVariant::ToolFeedback));
        assert_eq!(" Commentary ".parse(), Ok(AnalysisVariant::Commentary));
        assert!("summary".parse::<AnalysisVariant>().is_err());
        assert!(AnalysisVariant::ALL.iter().filter(|v| v.offers_feedback_tool()).count() == 1);
    }

    #[test]
    fn unknown_variant_is_a_std_error_naming_the_choices() {
        let error = "summary".parse::<AnalysisVariant>().expect_err("unknown variant");
        assert_eq!(error, UnknownVariant("summary".to_string()));

        let boxed: Box<dyn std::error::Error> = Box::new(error);
        assert_eq!(
            boxed.to_string(),
            "unsupported analysis variant `summary` (expected feedback|tool_feedback|commentary)"
        );
    }
}
