use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Voice;

#[derive(Deserialize, Clone, Debug)]
pub struct ConvertRequest {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "default_speaking_rate")]
    pub speaking_rate: f64,
    #[serde(default)]
    pub pitch: f64,
}

fn default_language() -> String {
    "en-GB".to_string()
}

fn default_speaking_rate() -> f64 {
    1.0
}

#[derive(Deserialize)]
pub struct VoicesQuery {
    pub language: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct LanguageInfo {
    pub code: &'static str,
    pub name: &'static str,
}

#[derive(Serialize)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageInfo>,
}

#[derive(Serialize)]
pub struct VoicesResponse {
    pub voices: BTreeMap<&'static str, &'static [Voice]>,
}

// Provider wire format for `text:synthesize`.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeRequest<'a> {
    pub input: SynthesisInput<'a>,
    pub voice: VoiceSelection<'a>,
    pub audio_config: AudioConfig,
}

#[derive(Serialize)]
pub struct SynthesisInput<'a> {
    pub text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSelection<'a> {
    pub language_code: &'a str,
    pub name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    pub audio_encoding: &'static str,
    pub speaking_rate: f64,
    pub pitch: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeResponse {
    #[serde(default)]
    pub audio_content: Option<String>,
}
