use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CollaboratorError, PluginFailure};
use crate::evaluation::decision::CreditDecision;
use crate::evaluation::domain::RiskEvaluation;

const BASE_WORDS_PER_MINUTE: f64 = 150.0;
const PAUSE_ALLOWANCE: f64 = 1.2;

/// Spoken forms substituted before synthesis, applied in order.
const SPEECH_REPLACEMENTS: &[(&str, &str)] = &[
    ("FCRA", "Fair Credit Reporting Act"),
    ("ECOA", "Equal Credit Opportunity Act"),
    ("DTI", "debt to income"),
    ("APR", "annual percentage rate"),
    ("&", " and "),
    ("%", " percent"),
];

/// Text-to-speech backend accepting SSML.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, ssml: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Voice selection used when composing SSML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub voice_name: String,
    pub language: String,
    /// Relative speaking rate; 1.0 is the synthesizer default.
    pub speaking_rate: f64,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            voice_name: "en-US-AriaNeural".to_string(),
            language: "en-US".to_string(),
            speaking_rate: 1.0,
        }
    }
}

/// Rendered audio for a completed evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSummary {
    pub transcript: String,
    pub ssml: String,
    #[serde(skip)]
    pub audio: Vec<u8>,
    pub audio_bytes: usize,
    pub estimated_duration_secs: f64,
}

/// Output-only plugin narrating an evaluation through a speech service.
pub struct VoiceCommunicationPlugin {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: VoiceProfile,
}

impl VoiceCommunicationPlugin {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, voice: VoiceProfile) -> Self {
        Self { synthesizer, voice }
    }

    pub async fn render_summary(
        &self,
        evaluation: &RiskEvaluation,
        decision: &CreditDecision,
    ) -> Result<AudioSummary, PluginFailure> {
        let transcript = prepare_for_speech(&summary_message(evaluation, decision));
        let ssml = build_ssml(&transcript, &self.voice);
        let audio = self.synthesizer.synthesize(&ssml).await?;

        if audio.is_empty() {
            return Err(PluginFailure::InvalidResponse(
                "speech service returned no audio".to_string(),
            ));
        }

        Ok(AudioSummary {
            estimated_duration_secs: estimate_duration_secs(&transcript, self.voice.speaking_rate),
            audio_bytes: audio.len(),
            transcript,
            ssml,
            audio,
        })
    }
}

pub(crate) fn summary_message(evaluation: &RiskEvaluation, decision: &CreditDecision) -> String {
    let mut message = format!(
        "Risk assessment summary for customer {}. Overall risk level: {}. Risk score: {:.1} out of 100. {} risk factors identified.",
        evaluation.customer_id,
        evaluation.risk_level.label(),
        evaluation.overall_score,
        evaluation.factors.len(),
    );
    message.push_str(&format!(
        " Data coverage: {:.0}% of sources responded.",
        evaluation.confidence * 100.0
    ));
    message.push_str(&format!(" Decision: {}.", decision.summary()));
    message
}

pub(crate) fn prepare_for_speech(text: &str) -> String {
    let mut spoken = text.to_string();
    for (written, said) in SPEECH_REPLACEMENTS {
        spoken = spoken.replace(written, said);
    }
    spoken.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub(crate) fn build_ssml(transcript: &str, voice: &VoiceProfile) -> String {
    let body = escape_xml(transcript).replace(". ", ". <break time=\"500ms\"/> ");
    format!(
        "<speak version=\"1.0\" xml:lang=\"{lang}\"><voice name=\"{name}\"><prosody rate=\"{rate:.2}\">{body}</prosody></voice></speak>",
        lang = escape_xml(&voice.language),
        name = escape_xml(&voice.voice_name),
        rate = voice.speaking_rate,
    )
}

pub(crate) fn estimate_duration_secs(text: &str, speaking_rate: f64) -> f64 {
    let rate = if speaking_rate.is_finite() && speaking_rate > 0.0 {
        speaking_rate
    } else {
        1.0
    };
    let words = text.split_whitespace().count() as f64;
    words / (BASE_WORDS_PER_MINUTE * rate) * 60.0 * PAUSE_ALLOWANCE
}
