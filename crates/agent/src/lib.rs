//! Model orchestration for basketball video analysis.
//!
//! The orchestrator runs one call at a time through a fixed loop:
//! 1. **Input validation** against the request contract (`hoops_core::contracts`)
//! 2. **Prompt rendering** (`prompt`) with the video attached as media
//! 3. **One model round trip** through a pluggable `ModelClient` (`llm`)
//! 4. **Output validation** against the variant's output contract
//!
//! # Key Types
//!
//! - `AnalysisRuntime` - the orchestrator (see `runtime` module)
//! - `ModelClient` - pluggable trait for Gemini or a recorded fixture
//! - `ToolRegistry` - capabilities the model may call during its turn
//!
//! # Safety Principle
//!
//! The model only counts and describes. Feedback tiers are deterministic and
//! owned by `hoops_core::feedback`; anything the model returns is checked
//! against a contract before it reaches a caller.

pub mod fixture;
pub mod gemini;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use llm::{build_model_client, ModelClient, ModelError, ModelRequest};
pub use prompt::{PromptPart, PromptRenderer, RenderedPrompt};
pub use runtime::AnalysisRuntime;
pub use tools::{ProvideFeedbackTool, Tool, ToolDeclaration, ToolError, ToolRegistry};
