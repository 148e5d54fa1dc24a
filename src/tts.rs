use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, bail};
use axum::http::StatusCode;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    catalog::{find_language, supported_codes, Language, Voice},
    cleanup::sweep_expired_files,
    config::Config,
    error::AppError,
    models::{
        AudioConfig, ConvertRequest, SynthesisInput, SynthesizeRequest, SynthesizeResponse,
        VoiceSelection,
    },
};

const SPEAKING_RATE_RANGE: (f64, f64) = (0.25, 4.0);
const PITCH_RANGE: (f64, f64) = (-20.0, 20.0);

/// Speech synthesis backed by the Google Cloud Text-to-Speech REST API.
pub struct TtsService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    output_dir: PathBuf,
    file_expiry: chrono::Duration,
}

/// A validated synthesis request.
#[derive(Debug)]
pub struct Synthesis<'a> {
    pub text: &'a str,
    pub language: &'static Language,
    pub voice: &'static Voice,
    pub speaking_rate: f64,
    pub pitch: f64,
}

impl TtsService {
    /// Creates the output directory and clears out expired files.
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let output_dir = PathBuf::from(&cfg.output_dir);
        std::fs::create_dir_all(&output_dir)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.tts_timeout_ms))
            .build()?;

        let service = Self {
            client,
            base_url: cfg.tts_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            output_dir,
            file_expiry: chrono::Duration::hours(cfg.file_expiry_hours),
        };
        report_sweep(sweep_expired_files(&service.output_dir, service.file_expiry));
        Ok(service)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Removes expired audio files on the blocking pool.
    pub async fn sweep_expired_files(&self) -> usize {
        let dir = self.output_dir.clone();
        let max_age = self.file_expiry;
        match tokio::task::spawn_blocking(move || sweep_expired_files(&dir, max_age)).await {
            Ok(result) => report_sweep(result),
            Err(err) => {
                error!("output cleanup task failed: {err}");
                0
            }
        }
    }

    /// Synthesizes `request` to an MP3 file and returns its path.
    pub async fn synthesize(&self, request: &ConvertRequest) -> Result<PathBuf, AppError> {
        self.sweep_expired_files().await;

        let synthesis = validate(request)?;
        let audio = self.fetch_audio(&synthesis).await.map_err(|err| {
            error!("synthesis failed: {err:#}");
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to convert text to speech: {err}"),
            )
        })?;

        let path = self.output_dir.join(format!("{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&path, &audio).await?;
        debug!(
            voice = synthesis.voice.name,
            bytes = audio.len(),
            "wrote {}",
            path.display()
        );
        Ok(path)
    }

    async fn fetch_audio(&self, synthesis: &Synthesis<'_>) -> anyhow::Result<Vec<u8>> {
        let payload = SynthesizeRequest {
            input: SynthesisInput {
                text: synthesis.text,
            },
            voice: VoiceSelection {
                language_code: synthesis.language.code,
                name: synthesis.voice.name,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: synthesis.speaking_rate,
                pitch: synthesis.pitch,
            },
        };

        let response = self
            .client
            .post(format!("{}/text:synthesize", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("provider returned {status}: {body}");
        }

        let body: SynthesizeResponse = response.json().await?;
        let encoded = body
            .audio_content
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("no audio content in response"))?;
        Ok(base64::decode(encoded)?)
    }
}

fn report_sweep(result: std::io::Result<usize>) -> usize {
    match result {
        Ok(removed) => {
            if removed > 0 {
                info!("removed {removed} expired audio files");
            }
            removed
        }
        Err(err) => {
            error!("output cleanup failed: {err}");
            0
        }
    }
}

/// Checks text, language, voice and audio parameters before anything is
/// sent to the provider.
pub fn validate(request: &ConvertRequest) -> Result<Synthesis<'_>, AppError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("Text cannot be empty"));
    }

    let language = find_language(&request.language).ok_or_else(|| {
        AppError::bad_request(format!(
            "Language '{}' is not supported. Supported languages: {}",
            request.language,
            supported_codes().join(", ")
        ))
    })?;

    let voice = match request.voice.as_deref() {
        None => language.default_voice(),
        Some(name) => language.voice(name).ok_or_else(|| {
            AppError::bad_request(format!(
                "Voice '{name}' is not valid for language '{}'",
                language.code
            ))
        })?,
    };

    if !in_range(request.speaking_rate, SPEAKING_RATE_RANGE) {
        return Err(AppError::bad_request(format!(
            "speaking_rate must be between {} and {}",
            SPEAKING_RATE_RANGE.0, SPEAKING_RATE_RANGE.1
        )));
    }
    if !in_range(request.pitch, PITCH_RANGE) {
        return Err(AppError::bad_request(format!(
            "pitch must be between {} and {}",
            PITCH_RANGE.0, PITCH_RANGE.1
        )));
    }

    Ok(Synthesis {
        text: &request.text,
        language,
        voice,
        speaking_rate: request.speaking_rate,
        pitch: request.pitch,
    })
}

fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    value >= min && value <= max
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{http::Uri, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    pub(crate) const FAKE_AUDIO: &[u8] = b"ID3\x04fake-mp3-frames";

    /// Answers every request with `response` and records the path, query
    /// and JSON body of each call.
    pub(crate) async fn spawn_provider(
        status: StatusCode,
        response: Value,
    ) -> (String, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().fallback(move |uri: Uri, Json(body): Json<Value>| {
            let recorder = recorder.clone();
            let response = response.clone();
            async move {
                recorder.lock().unwrap().push(json!({
                    "path": uri.path(),
                    "query": uri.query(),
                    "body": body,
                }));
                (status, Json(response))
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1"), seen)
    }

    pub(crate) fn audio_response() -> Value {
        json!({ "audioContent": base64::encode(FAKE_AUDIO) })
    }

    fn request(text: &str, language: &str) -> ConvertRequest {
        ConvertRequest {
            text: text.to_string(),
            language: language.to_string(),
            voice: None,
            speaking_rate: 1.0,
            pitch: 0.0,
        }
    }

    #[test]
    fn rejects_blank_text() {
        let err = validate(&request("   \n", "en-GB")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Text cannot be empty");
    }

    #[test]
    fn rejects_unsupported_language() {
        let err = validate(&request("Bonjour", "fr-FR")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("fr-FR"));
        assert!(err.message.contains("en-GB, zh-CN"));
    }

    #[test]
    fn rejects_voice_from_another_language() {
        let mut req = request("Hello", "en-GB");
        req.voice = Some("cmn-CN-Standard-A".to_string());
        let err = validate(&req).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("cmn-CN-Standard-A"));
    }

    #[test]
    fn rejects_out_of_range_audio_parameters() {
        let mut req = request("Hello", "en-GB");
        req.speaking_rate = 4.5;
        assert!(validate(&req).is_err());

        let mut req = request("Hello", "en-GB");
        req.pitch = -20.5;
        assert!(validate(&req).is_err());
    }

    #[test]
    fn picks_default_voice_and_resolves_alias() {
        let req = request("你好", "zh");
        let synthesis = validate(&req).unwrap();
        assert_eq!(synthesis.language.code, "zh-CN");
        assert_eq!(synthesis.voice.name, "cmn-CN-Standard-A");
    }

    #[tokio::test]
    async fn writes_decoded_audio_and_sends_expected_payload() {
        let (base_url, seen) = spawn_provider(StatusCode::OK, audio_response()).await;
        let dir = tempfile::tempdir().unwrap();
        let service = TtsService::new(&Config::for_tests(&base_url, dir.path())).unwrap();

        let mut req = request("Hello, world!", "en");
        req.voice = Some("en-GB-Neural2-B".to_string());
        req.speaking_rate = 1.25;
        let path = service.synthesize(&req).await.unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), FAKE_AUDIO);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["path"], "/v1/text:synthesize");
        assert_eq!(seen[0]["query"], "key=test-key");
        assert_eq!(
            seen[0]["body"],
            json!({
                "input": {"text": "Hello, world!"},
                "voice": {"languageCode": "en-GB", "name": "en-GB-Neural2-B"},
                "audioConfig": {"audioEncoding": "MP3", "speakingRate": 1.25, "pitch": 0.0}
            })
        );
    }

    #[tokio::test]
    async fn synthesis_clears_expired_output_first() {
        let (base_url, _) = spawn_provider(StatusCode::OK, audio_response()).await;
        let dir = tempfile::tempdir().unwrap();
        let service = TtsService::new(&Config::for_tests(&base_url, dir.path())).unwrap();

        let stale = dir.path().join("stale.mp3");
        let file = std::fs::File::create(&stale).unwrap();
        file.set_modified(std::time::SystemTime::now() - Duration::from_secs(48 * 3600))
            .unwrap();
        drop(file);

        let fresh = service.synthesize(&request("Hello", "en-GB")).await.unwrap();

        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn provider_failure_maps_to_internal_error() {
        let (base_url, _) = spawn_provider(
            StatusCode::FORBIDDEN,
            json!({"error": {"message": "API key not valid"}}),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let service = TtsService::new(&Config::for_tests(&base_url, dir.path())).unwrap();

        let err = service.synthesize(&request("Hello", "en-GB")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.starts_with("Failed to convert text to speech:"));
        assert!(err.message.contains("API key not valid"));
    }

    #[tokio::test]
    async fn missing_audio_content_is_an_error() {
        let (base_url, _) = spawn_provider(StatusCode::OK, json!({})).await;
        let dir = tempfile::tempdir().unwrap();
        let service = TtsService::new(&Config::for_tests(&base_url, dir.path())).unwrap();

        let err = service.synthesize(&request("Hello", "en-GB")).await.unwrap_err();
        assert!(err.message.contains("no audio content"));
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_provider() {
        let (base_url, seen) = spawn_provider(StatusCode::OK, audio_response()).await;
        let dir = tempfile::tempdir().unwrap();
        let service = TtsService::new(&Config::for_tests(&base_url, dir.path())).unwrap();

        assert!(service.synthesize(&request("", "en-GB")).await.is_err());
        assert!(seen.lock().unwrap().is_empty());
    }
}
