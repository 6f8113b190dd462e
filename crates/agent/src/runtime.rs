use std::sync::Arc;
use std::time::Instant;

use hoops_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use hoops_core::contracts::{catalog, Contract, ContractIssue, ContractViolation};
use hoops_core::domain::{
    AnalysisRequest, AnalysisResult, AnalysisVariant, CoachFeedback, CoachRequest,
    CountCommentary, CountFeedback, MediaDataUri,
};
use hoops_core::errors::{AnalysisError, InputError, OutputFailure};
use hoops_core::feedback;
use hoops_core::flows::{FlowEngine, FlowEvent, FlowState, ModelFlow};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::llm::{ModelClient, ModelRequest};
use crate::prompt::{PromptError, PromptRenderer, RenderedPrompt};
use crate::tools::{ProvideFeedbackTool, ToolRegistry};

const ACTOR: &str = "orchestrator";
const UNASSIGNED_CORRELATION: &str = "unassigned";

/// Stateless orchestrator: every call validates, renders, invokes the model
/// once and validates the answer. Nothing is carried between calls.
pub struct AnalysisRuntime {
    model: Arc<dyn ModelClient>,
    renderer: PromptRenderer,
    tools: ToolRegistry,
    audit: Arc<dyn AuditSink>,
    default_variant: AnalysisVariant,
}

impl AnalysisRuntime {
    pub fn new(model: Arc<dyn ModelClient>) -> Result<Self, PromptError> {
        Ok(Self {
            model,
            renderer: PromptRenderer::new()?,
            tools: ToolRegistry::default().with(ProvideFeedbackTool),
            audit: Arc::new(TracingAuditSink),
            default_variant: AnalysisVariant::default(),
        })
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_default_variant(mut self, variant: AnalysisVariant) -> Self {
        self.default_variant = variant;
        self
    }

    pub fn default_variant(&self) -> AnalysisVariant {
        self.default_variant
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Analyzes `request` with the configured default variant.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_variant(request, self.default_variant, UNASSIGNED_CORRELATION).await
    }

    pub async fn analyze_variant(
        &self,
        request: AnalysisRequest,
        variant: AnalysisVariant,
        correlation_id: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut run = FlowRun::start(
            ModelFlow::video_analysis(),
            self.audit.as_ref(),
            AuditContext::for_call(correlation_id, ACTOR),
            variant.as_str(),
        );

        let video = match accept_video(request) {
            Ok(video) => {
                tracing::info!(
                    event_name = "analysis.request_accepted",
                    correlation_id = %run.context.correlation_id,
                    analysis_id = %run.context.analysis_id,
                    variant = %variant,
                    mime_type = video.mime_type(),
                    payload_len = video.payload_len(),
                    "analysis request accepted"
                );
                run.advance(FlowEvent::InputAccepted);
                video
            }
            Err(error) => return Err(run.reject_input(error)),
        };

        let contract = variant.output_contract();
        let tools = if variant.offers_feedback_tool() {
            self.tools.clone()
        } else {
            ToolRegistry::default()
        };
        let feedback_tool = variant.offers_feedback_tool().then_some(ProvideFeedbackTool::NAME);
        let prompt = self
            .renderer
            .render_video(variant, &video, &contract, feedback_tool)
            .map_err(|error| run.render_failed(error))?;

        match variant {
            AnalysisVariant::Commentary => self
                .complete::<CountCommentary>(&mut run, prompt, contract, tools, |_| Ok(()))
                .await
                .map(AnalysisResult::WithCommentary),
            AnalysisVariant::Feedback => self
                .complete::<CountFeedback>(&mut run, prompt, contract, tools, |_| Ok(()))
                .await
                .map(AnalysisResult::CountOnly),
            AnalysisVariant::ToolFeedback => self
                .complete::<CountFeedback>(&mut run, prompt, contract, tools, tier_consistency)
                .await
                .map(AnalysisResult::CountOnly),
        }
    }

    /// Model-authored coaching text for an already known basket count.
    pub async fn coach(
        &self,
        request: CoachRequest,
        correlation_id: &str,
    ) -> Result<CoachFeedback, AnalysisError> {
        let mut run = FlowRun::start(
            ModelFlow::coach_feedback(),
            self.audit.as_ref(),
            AuditContext::for_call(correlation_id, ACTOR),
            "coach",
        );

        let input = match serde_json::to_value(&request) {
            Ok(input) => input,
            Err(error) => {
                let violation = ContractViolation::single(
                    catalog::coach_request().name,
                    ContractIssue::Undecodable { message: error.to_string() },
                );
                return Err(run.reject_input(InputError::Contract(violation)));
            }
        };
        if let Err(violation) = catalog::coach_request().validate(&input) {
            return Err(run.reject_input(InputError::Contract(violation)));
        }
        run.advance(FlowEvent::InputAccepted);

        let contract = catalog::coach_feedback();
        let prompt = self
            .renderer
            .render_coach(request.number_of_baskets, &contract)
            .map_err(|error| run.render_failed(error))?;

        self.complete::<CoachFeedback>(&mut run, prompt, contract, ToolRegistry::default(), |_| {
            Ok(())
        })
        .await
    }

    /// The deterministic tier for `number_of_baskets`. Never calls the model.
    pub fn feedback_for(&self, number_of_baskets: u64) -> &'static str {
        feedback::feedback_for(number_of_baskets)
    }

    async fn complete<T>(
        &self,
        run: &mut FlowRun<'_>,
        prompt: RenderedPrompt,
        contract: Contract,
        tools: ToolRegistry,
        check: impl FnOnce(&T) -> Result<(), ContractIssue>,
    ) -> Result<T, AnalysisError>
    where
        T: DeserializeOwned,
    {
        let request = ModelRequest { prompt, output_contract: contract, tools };
        let started = Instant::now();
        tracing::info!(
            event_name = "analysis.model_invoked",
            correlation_id = %run.context.correlation_id,
            analysis_id = %run.context.analysis_id,
            variant = run.label,
            model = self.model.name(),
            tools = request.tools.len(),
            "invoking model"
        );

        let output = match self.model.generate(&request).await {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!(
                    event_name = "analysis.model_unavailable",
                    correlation_id = %run.context.correlation_id,
                    analysis_id = %run.context.analysis_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %error,
                    "model call failed"
                );
                run.emit(
                    AuditEvent::new(
                        &run.context,
                        "model.unavailable",
                        AuditCategory::Model,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", error.to_string()),
                );
                run.advance(FlowEvent::ModelUnreachable);
                return Err(AnalysisError::ModelUnavailable(error.to_string()));
            }
        };

        tracing::info!(
            event_name = "analysis.model_responded",
            correlation_id = %run.context.correlation_id,
            analysis_id = %run.context.analysis_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            empty = output.is_none(),
            "model responded"
        );
        run.emit(
            AuditEvent::new(&run.context, "model.responded", AuditCategory::Model, AuditOutcome::Success)
                .with_metadata("model", self.model.name()),
        );
        run.advance(FlowEvent::ModelResponded);

        let value = match output {
            Some(value) if !value.is_null() => value,
            _ => return Err(run.reject_output(OutputFailure::Empty)),
        };

        let contract = &request.output_contract;
        if let Err(violation) = contract.validate(&value) {
            return Err(run.reject_output(OutputFailure::Contract(violation)));
        }
        let typed = match serde_json::from_value::<T>(value) {
            Ok(typed) => typed,
            Err(error) => {
                let issue = ContractIssue::Undecodable { message: error.to_string() };
                let violation = ContractViolation::single(contract.name, issue);
                return Err(run.reject_output(OutputFailure::Contract(violation)));
            }
        };
        if let Err(issue) = check(&typed) {
            let violation = ContractViolation::single(contract.name, issue);
            return Err(run.reject_output(OutputFailure::Contract(violation)));
        }

        tracing::info!(
            event_name = "analysis.output_accepted",
            correlation_id = %run.context.correlation_id,
            analysis_id = %run.context.analysis_id,
            variant = run.label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model output accepted"
        );
        run.advance(FlowEvent::OutputAccepted);
        Ok(typed)
    }
}

impl std::fmt::Debug for AnalysisRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisRuntime")
            .field("model", &self.model.name())
            .field("tools", &self.tools)
            .field("default_variant", &self.default_variant)
            .finish()
    }
}

/// Tool-sourced feedback must be the policy's tier for the returned count.
fn tier_consistency(result: &CountFeedback) -> Result<(), ContractIssue> {
    let expected = feedback::feedback_for(result.number_of_baskets);
    if result.feedback == expected {
        Ok(())
    } else {
        Err(ContractIssue::Inconsistent {
            path: catalog::FEEDBACK.to_string(),
            expected: expected.to_string(),
            found: result.feedback.clone(),
        })
    }
}

fn accept_video(request: AnalysisRequest) -> Result<MediaDataUri, InputError> {
    let mut input = Map::new();
    input.insert(catalog::VIDEO_DATA_URI.to_string(), Value::String(request.video_data_uri));
    let input = Value::Object(input);

    catalog::video_request().validate(&input)?;
    let raw = input.get(catalog::VIDEO_DATA_URI).and_then(Value::as_str).unwrap_or_default();
    Ok(MediaDataUri::parse(raw)?)
}

/// One call's walk through the flow state machine.
struct FlowRun<'a> {
    engine: FlowEngine<ModelFlow>,
    state: FlowState,
    audit: &'a dyn AuditSink,
    context: AuditContext,
    label: &'static str,
}

impl<'a> FlowRun<'a> {
    fn start(
        flow: ModelFlow,
        audit: &'a dyn AuditSink,
        context: AuditContext,
        label: &'static str,
    ) -> Self {
        let engine = FlowEngine::new(flow);
        let state = engine.initial_state();
        let mut run = Self { engine, state, audit, context, label };
        run.advance(FlowEvent::CallReceived);
        run
    }

    fn advance(&mut self, event: FlowEvent) {
        match self.engine.apply_with_audit(&self.state, &event, self.audit, &self.context) {
            Ok(outcome) => {
                tracing::debug!(
                    event_name = "analysis.transition",
                    analysis_id = %self.context.analysis_id,
                    from = ?outcome.from,
                    to = ?outcome.to,
                    event = ?outcome.event,
                    "flow transition"
                );
                self.state = outcome.to;
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "analysis.transition_rejected",
                    analysis_id = %self.context.analysis_id,
                    error = %error,
                    "flow transition rejected"
                );
            }
        }
    }

    fn emit(&self, event: AuditEvent) {
        self.audit.emit(event);
    }

    fn reject_input(&mut self, error: InputError) -> AnalysisError {
        tracing::warn!(
            event_name = "analysis.request_rejected",
            correlation_id = %self.context.correlation_id,
            analysis_id = %self.context.analysis_id,
            variant = self.label,
            error = %error,
            "analysis request rejected"
        );
        self.emit(
            AuditEvent::new(
                &self.context,
                "contract.input_rejected",
                AuditCategory::Contract,
                AuditOutcome::Rejected,
            )
            .with_metadata("error", error.to_string()),
        );
        self.advance(FlowEvent::InputRejected);
        AnalysisError::InvalidInput(error)
    }

    fn reject_output(&mut self, failure: OutputFailure) -> AnalysisError {
        tracing::warn!(
            event_name = "analysis.output_rejected",
            correlation_id = %self.context.correlation_id,
            analysis_id = %self.context.analysis_id,
            variant = self.label,
            error = %failure,
            "model output rejected"
        );
        self.emit(
            AuditEvent::new(
                &self.context,
                "contract.output_rejected",
                AuditCategory::Contract,
                AuditOutcome::Rejected,
            )
            .with_metadata("error", failure.to_string()),
        );
        self.advance(FlowEvent::OutputRejected);
        AnalysisError::ModelOutputInvalid(failure)
    }

    fn render_failed(&mut self, error: PromptError) -> AnalysisError {
        tracing::error!(
            event_name = "analysis.prompt_failed",
            analysis_id = %self.context.analysis_id,
            error = %error,
            "prompt rendering failed"
        );
        self.advance(FlowEvent::ModelUnreachable);
        AnalysisError::ModelUnavailable(format!("prompt rendering failed: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use hoops_core::contracts::ContractIssue;
    use hoops_core::domain::{AnalysisRequest, CountFeedback, MediaError};
    use hoops_core::errors::InputError;

    use super::{accept_video, tier_consistency};

    #[test]
    fn tool_feedback_must_match_the_tier() {
        let consistent =
            CountFeedback { number_of_baskets: 12, feedback: "excellent".to_string() };
        assert!(tier_consistency(&consistent).is_ok());

        let drifted = CountFeedback { number_of_baskets: 3, feedback: "excellent".to_string() };
        assert_eq!(
            tier_consistency(&drifted),
            Err(ContractIssue::Inconsistent {
                path: "feedback".to_string(),
                expected: "needs improvement".to_string(),
                found: "excellent".to_string(),
            })
        );
    }

    #[test]
    fn empty_upload_fails_the_request_contract() {
        let error = accept_video(AnalysisRequest::new("")).expect_err("empty uri");
        assert!(matches!(error, InputError::Contract(_)));
    }

    #[test]
    fn malformed_upload_fails_media_parsing() {
        let error =
            accept_video(AnalysisRequest::new("data:video/mp4;base64,")).expect_err("no payload");
        assert_eq!(error, InputError::Media(MediaError::EmptyPayload));

        let video = accept_video(AnalysisRequest::new("data:video/mp4;base64,AAAA"))
            .expect("valid upload");
        assert_eq!(video.mime_type(), "video/mp4");
    }
}
