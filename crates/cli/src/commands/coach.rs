use hoops_core::domain::CoachRequest;

use crate::commands::{block_on, correlation_id, prepare_runtime, CommandResult, EXIT_CONFIG};

const COMMAND: &str = "coach";

pub fn run(number_of_baskets: u64) -> CommandResult {
    let (_, runtime) = match prepare_runtime(COMMAND) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let request = CoachRequest { number_of_baskets };
    let outcome = match block_on(runtime.coach(request, &correlation_id(COMMAND))) {
        Ok(outcome) => outcome,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    match outcome {
        Ok(feedback) => CommandResult::success_with(
            COMMAND,
            feedback.feedback.clone(),
            serde_json::to_value(&feedback).ok(),
        ),
        Err(error) => CommandResult::analysis_failure(COMMAND, &error),
    }
}
