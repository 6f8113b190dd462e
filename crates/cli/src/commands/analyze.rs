use std::fs;
use std::path::Path;

use hoops_core::domain::{AnalysisRequest, AnalysisVariant, MediaDataUri};
use thiserror::Error;

use crate::commands::{
    block_on, correlation_id, prepare_runtime, CommandResult, EXIT_CONFIG, EXIT_PRECHECK,
};

const COMMAND: &str = "analyze";

const VIDEO_EXTENSIONS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    ("ogv", "video/ogg"),
    ("3gp", "video/3gpp"),
];

/// Caller-side checks, made before anything reaches the orchestrator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrecheckError {
    #[error("could not read video file: {0}")]
    Unreadable(String),
    #[error("`{0}` is not a recognised video file")]
    NotVideo(String),
    #[error("video is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("video file is empty")]
    Empty,
}

pub fn run(file: &Path, variant: Option<AnalysisVariant>) -> CommandResult {
    let (config, runtime) = match prepare_runtime(COMMAND) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let video = match load_video(file, config.analysis.max_upload_bytes) {
        Ok(video) => video,
        Err(error) => {
            return CommandResult::failure(COMMAND, "precheck", error.to_string(), EXIT_PRECHECK)
        }
    };

    let variant = variant.unwrap_or(config.analysis.variant);
    let request = AnalysisRequest::new(video.to_uri());
    let outcome = match block_on(runtime.analyze_variant(request, variant, &correlation_id(COMMAND)))
    {
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
        Ok(result) => CommandResult::success_with(
            COMMAND,
            format!("analysis complete ({variant})"),
            serde_json::to_value(&result).ok(),
        ),
        Err(error) => CommandResult::analysis_failure(COMMAND, &error),
    }
}

/// Reads `path` and encodes it as a data URI, enforcing type and size limits.
pub fn load_video(path: &Path, max_bytes: u64) -> Result<MediaDataUri, PrecheckError> {
    let mime_type = video_mime_type(path)
        .ok_or_else(|| PrecheckError::NotVideo(path.display().to_string()))?;

    let size = fs::metadata(path).map_err(|error| PrecheckError::Unreadable(error.to_string()))?.len();
    if size > max_bytes {
        return Err(PrecheckError::TooLarge { size, limit: max_bytes });
    }
    if size == 0 {
        return Err(PrecheckError::Empty);
    }

    let bytes = fs::read(path).map_err(|error| PrecheckError::Unreadable(error.to_string()))?;
    MediaDataUri::encode(mime_type, &bytes).map_err(|_| PrecheckError::Empty)
}

pub fn video_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().find(|(known, _)| *known == extension).map(|(_, mime)| *mime)
}
