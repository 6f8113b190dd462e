pub mod analysis;
pub mod media;

pub use analysis::{
    AnalysisRequest, AnalysisResult, AnalysisVariant, CoachFeedback, CoachRequest,
    CountCommentary, CountFeedback, GameplayAnalysis,
};
pub use media::{MediaDataUri, MediaError};
