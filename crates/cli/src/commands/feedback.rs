use hoops_core::FeedbackTier;
use serde_json::json;

use crate::commands::CommandResult;

/// Pure policy lookup: no config, no model.
pub fn run(number_of_baskets: u64) -> CommandResult {
    let tier = FeedbackTier::for_baskets(number_of_baskets);
    let range = tier.range();
    CommandResult::success_with(
        "feedback",
        tier.message(),
        Some(json!({
            "numberOfBaskets": number_of_baskets,
            "feedback": tier.message(),
            "tier": { "from": range.start(), "to": range.end() },
        })),
    )
}
