//! Prompt rendering.
//!
//! Templates are plain tera text. Media is never inlined as text: the
//! `media(name=...)` function leaves a marker that [`PromptRenderer::render`]
//! splits out into a [`PromptPart::Media`] for the model adapter to attach.

use std::collections::HashMap;

use hoops_core::contracts::Contract;
use hoops_core::domain::{AnalysisVariant, MediaDataUri};
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

const MEDIA_MARKER_OPEN: &str = "\u{1}media:";
const MEDIA_MARKER_CLOSE: char = '\u{1}';

pub const COUNT_FEEDBACK_TEMPLATE: &str = "count_feedback.txt.tera";
pub const TOOL_FEEDBACK_TEMPLATE: &str = "tool_feedback.txt.tera";
pub const COMMENTARY_TEMPLATE: &str = "commentary.txt.tera";
pub const COACH_TEMPLATE: &str = "coach.txt.tera";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template `{name}` failed: {source}")]
    Template { name: String, source: tera::Error },
    #[error("prompt references media `{0}` that was not supplied")]
    UnknownMedia(String),
    #[error("prompt has an unterminated media marker")]
    UnterminatedMarker,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PromptPart {
    Text(String),
    Media(MediaDataUri),
}

/// Ordered text and media parts, ready for a model adapter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RenderedPrompt {
    pub parts: Vec<PromptPart>,
}

impl RenderedPrompt {
    pub fn text(value: impl Into<String>) -> Self {
        Self { parts: vec![PromptPart::Text(value.into())] }
    }

    /// Text parts joined, media shown as `[media:<mime>]`. For logs and tests.
    pub fn preview(&self) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => text.clone(),
                PromptPart::Media(media) => format!("[media:{}]", media.mime_type()),
            })
            .collect()
    }

    pub fn media(&self) -> impl Iterator<Item = &MediaDataUri> {
        self.parts.iter().filter_map(|part| match part {
            PromptPart::Media(media) => Some(media),
            PromptPart::Text(_) => None,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.register_function("media", media_marker);

        let templates = [
            (
                COUNT_FEEDBACK_TEMPLATE,
                include_str!("../../../templates/prompts/count_feedback.txt.tera"),
            ),
            (TOOL_FEEDBACK_TEMPLATE, include_str!("../../../templates/prompts/tool_feedback.txt.tera")),
            (COMMENTARY_TEMPLATE, include_str!("../../../templates/prompts/commentary.txt.tera")),
            (COACH_TEMPLATE, include_str!("../../../templates/prompts/coach.txt.tera")),
        ];
        for (name, body) in templates {
            tera.add_raw_template(name, body)
                .map_err(|source| PromptError::Template { name: name.to_string(), source })?;
        }

        Ok(Self { tera })
    }

    pub fn template_for(variant: AnalysisVariant) -> &'static str {
        match variant {
            AnalysisVariant::Feedback => COUNT_FEEDBACK_TEMPLATE,
            AnalysisVariant::ToolFeedback => TOOL_FEEDBACK_TEMPLATE,
            AnalysisVariant::Commentary => COMMENTARY_TEMPLATE,
        }
    }

    /// Renders the video prompt for `variant`, attaching `video` as media.
    pub fn render_video(
        &self,
        variant: AnalysisVariant,
        video: &MediaDataUri,
        contract: &Contract,
        feedback_tool: Option<&str>,
    ) -> Result<RenderedPrompt, PromptError> {
        let mut context = Context::new();
        context.insert("output_schema", &pretty_schema(contract));
        if let Some(tool) = feedback_tool {
            context.insert("feedback_tool", tool);
        }

        let media = HashMap::from([("video", video)]);
        self.render(Self::template_for(variant), &context, &media)
    }

    pub fn render_coach(
        &self,
        number_of_baskets: u64,
        contract: &Contract,
    ) -> Result<RenderedPrompt, PromptError> {
        let mut context = Context::new();
        context.insert("number_of_baskets", &number_of_baskets);
        context.insert("output_schema", &pretty_schema(contract));
        self.render(COACH_TEMPLATE, &context, &HashMap::new())
    }

    pub fn render(
        &self,
        template: &str,
        context: &Context,
        media: &HashMap<&str, &MediaDataUri>,
    ) -> Result<RenderedPrompt, PromptError> {
        let text = self
            .tera
            .render(template, context)
            .map_err(|source| PromptError::Template { name: template.to_string(), source })?;
        split_media(&text, media)
    }
}

fn media_marker(args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    let name = args
        .get("name")
        .and_then(tera::Value::as_str)
        .ok_or_else(|| tera::Error::msg("media() requires a string `name` argument"))?;
    Ok(tera::Value::String(format!("{MEDIA_MARKER_OPEN}{name}{MEDIA_MARKER_CLOSE}")))
}

fn split_media(
    text: &str,
    media: &HashMap<&str, &MediaDataUri>,
) -> Result<RenderedPrompt, PromptError> {
    let mut parts = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(MEDIA_MARKER_OPEN) {
        push_text(&mut parts, &rest[..start]);
        let after_open = &rest[start + MEDIA_MARKER_OPEN.len()..];
        let end = after_open.find(MEDIA_MARKER_CLOSE).ok_or(PromptError::UnterminatedMarker)?;
        let name = &after_open[..end];
        let attached =
            media.get(name).ok_or_else(|| PromptError::UnknownMedia(name.to_string()))?;
        parts.push(PromptPart::Media((*attached).clone()));
        rest = &after_open[end + MEDIA_MARKER_CLOSE.len_utf8()..];
    }
    push_text(&mut parts, rest);

    Ok(RenderedPrompt { parts })
}

fn push_text(parts: &mut Vec<PromptPart>, text: &str) {
    if !text.trim().is_empty() {
        parts.push(PromptPart::Text(text.to_string()));
    }
}

fn pretty_schema(contract: &Contract) -> String {
    let schema = contract.to_json_schema();
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use hoops_core::contracts::catalog;
    use hoops_core::domain::{AnalysisVariant, MediaDataUri};
    use tera::Context;

    use super::{PromptError, PromptPart, PromptRenderer};

    fn clip() -> MediaDataUri {
        MediaDataUri::encode("video/mp4", b"frames").expect("clip")
    }

    #[test]
    fn commentary_prompt_attaches_video_between_instructions() {
        let renderer = PromptRenderer::new().expect("templates compile");
        let contract = catalog::count_with_commentary();
        let prompt = renderer
            .render_video(AnalysisVariant::Commentary, &clip(), &contract, None)
            .expect("render");

        assert_eq!(prompt.parts.len(), 3);
        assert!(matches!(&prompt.parts[0], PromptPart::Text(text) if text.contains("Count the number of baskets")));
        assert_eq!(prompt.parts[1], PromptPart::Media(clip()));
        assert!(matches!(&prompt.parts[2], PromptPart::Text(text) if text.contains("return 0")));
        assert!(prompt.preview().contains("\"commentary\""));
        assert!(!prompt.preview().contains(clip().payload()));
    }

    #[test]
    fn every_variant_has_a_template() {
        let renderer = PromptRenderer::new().expect("templates compile");
        for variant in AnalysisVariant::ALL {
            let contract = variant.output_contract();
            let tool = variant.offers_feedback_tool().then_some("provideFeedback");
            let prompt = renderer.render_video(variant, &clip(), &contract, tool).expect("render");
            assert_eq!(prompt.media().count(), 1, "{variant} should attach the video once");
        }
    }

    #[test]
    fn tool_prompt_names_the_capability() {
        let renderer = PromptRenderer::new().expect("templates compile");
        let prompt = renderer
            .render_video(
                AnalysisVariant::ToolFeedback,
                &clip(),
                &catalog::count_with_tool_feedback(),
                Some("provideFeedback"),
            )
            .expect("render");
        assert!(prompt.preview().contains("`provideFeedback`"));
    }

    #[test]
    fn coach_prompt_inlines_the_count() {
        let renderer = PromptRenderer::new().expect("templates compile");
        let prompt = renderer.render_coach(7, &catalog::coach_feedback()).expect("render");
        assert_eq!(prompt.media().count(), 0);
        assert!(prompt.preview().contains("Number of baskets: 7"));
    }

    #[test]
    fn unknown_media_name_is_an_error() {
        let mut renderer = PromptRenderer::new().expect("templates compile");
        renderer
            .tera
            .add_raw_template("stray.txt", "look: {{ media(name=\"audio\") }}")
            .expect("template");
        let error = renderer
            .render("stray.txt", &Context::new(), &HashMap::new())
            .expect_err("audio was not supplied");
        assert!(matches!(error, PromptError::UnknownMedia(name) if name == "audio"));
    }
}
