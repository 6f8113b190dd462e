//! The contracts each flow sends to, and checks against, the model.

use crate::contracts::schema::{Contract, Field, FieldKind, ObjectSchema};
use crate::feedback::TIER_MESSAGES;

pub const VIDEO_DATA_URI: &str = "videoDataUri";
pub const NUMBER_OF_BASKETS: &str = "numberOfBaskets";
pub const FEEDBACK: &str = "feedback";
pub const ANALYSIS: &str = "analysis";
pub const STRENGTHS: &str = "strengths";
pub const WEAKNESSES: &str = "weaknesses";
pub const COMMENTARY: &str = "commentary";

pub fn video_request() -> Contract {
    Contract::new(
        "video_request",
        vec![Field::required(VIDEO_DATA_URI, FieldKind::text()).describe(
            "A video of a basketball game, as a data URI that must include a MIME type and use \
             Base64 encoding. Expected format: 'data:<mimetype>;base64,<encoded_data>'",
        )],
    )
}

pub fn count_with_feedback() -> Contract {
    Contract::new(
        "count_with_feedback",
        vec![
            baskets_detected(),
            Field::required(FEEDBACK, FieldKind::text()).describe(
                "Coaching feedback on the game. When no basketball action is visible, explain \
                 why the count is zero.",
            ),
        ],
    )
}

pub fn count_with_tool_feedback() -> Contract {
    Contract::new(
        "count_with_tool_feedback",
        vec![
            baskets_detected(),
            Field::required(FEEDBACK, FieldKind::one_of(&TIER_MESSAGES))
                .describe("The feedback returned by the provideFeedback tool, copied verbatim."),
        ],
    )
}

pub fn count_with_commentary() -> Contract {
    Contract::new(
        "count_with_commentary",
        vec![
            baskets_detected(),
            Field::required(
                ANALYSIS,
                FieldKind::Object(ObjectSchema::new(vec![
                    Field::required(STRENGTHS, FieldKind::text())
                        .describe("The player's strengths based on the video."),
                    Field::required(WEAKNESSES, FieldKind::text())
                        .describe("The player's weaknesses based on the video."),
                ])),
            )
            .describe("Analysis of the gameplay."),
            Field::required(COMMENTARY, FieldKind::text()).describe(
                "A play-by-play commentary of the game as if from a sports commentator.",
            ),
        ],
    )
}

pub fn coach_request() -> Contract {
    Contract::new(
        "coach_request",
        vec![Field::required(NUMBER_OF_BASKETS, FieldKind::non_negative_integer())
            .describe("The number of baskets scored in the game.")],
    )
}

pub fn coach_feedback() -> Contract {
    Contract::new(
        "coach_feedback",
        vec![Field::required(FEEDBACK, FieldKind::text())
            .describe("The AI analysis and feedback on the game.")],
    )
}

/// Input accepted by the `provideFeedback` capability.
pub fn feedback_tool_input() -> Contract {
    Contract::new(
        "provide_feedback_input",
        vec![Field::required(NUMBER_OF_BASKETS, FieldKind::non_negative_integer())
            .describe("The number of baskets scored in the video.")],
    )
}

fn baskets_detected() -> Field {
    Field::required(NUMBER_OF_BASKETS, FieldKind::non_negative_integer())
        .describe("The number of baskets detected in the video. Zero when none are visible.")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{count_with_commentary, count_with_tool_feedback, video_request};

    #[test]
    fn commentary_contract_accepts_zero_with_explanations() {
        let value = json!({
            "numberOfBaskets": 0,
            "analysis": { "strengths": "n/a", "weaknesses": "No play visible." },
            "commentary": "The court stays empty for the whole clip."
        });
        assert!(count_with_commentary().validate(&value).is_ok());
    }

    #[test]
    fn commentary_contract_rejects_bare_zero() {
        let value = json!({ "numberOfBaskets": 0 });
        let violation = count_with_commentary().validate(&value).expect_err("bare zero");
        assert_eq!(violation.issues.len(), 2);
    }

    #[test]
    fn tool_feedback_contract_only_accepts_tier_wording() {
        let ok = json!({ "numberOfBaskets": 7, "feedback": "good effort" });
        let freeform = json!({ "numberOfBaskets": 7, "feedback": "Nice hustle!" });
        assert!(count_with_tool_feedback().validate(&ok).is_ok());
        assert!(count_with_tool_feedback().validate(&freeform).is_err());
    }

    #[test]
    fn video_request_schema_describes_data_uri_format() {
        let schema = video_request().to_json_schema();
        let description = schema["properties"]["videoDataUri"]["description"]
            .as_str()
            .unwrap_or_default();
        assert!(description.contains("data:<mimetype>;base64,<encoded_data>"));
    }
}
