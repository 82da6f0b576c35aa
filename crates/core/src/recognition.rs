//! Speech-recognition boundary.
//!
//! The transport to the recognition service lives behind
//! [`RecognitionBackend`]. This module owns what surrounds it: credential
//! checks at construction, language to engine mapping, and turning the
//! service's flash-recognition JSON into ordered [`SentenceRecord`]s.
//! `RecognitionService::process` never fails outward; every problem is
//! logged and reported as `None`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::ConfigError;
use crate::types::SentenceRecord;

pub const SECRET_ID_ENV: &str = "VOICEOVER_ASR_SECRET_ID";
pub const SECRET_KEY_ENV: &str = "VOICEOVER_ASR_SECRET_KEY";
pub const APP_ID_ENV: &str = "VOICEOVER_ASR_APP_ID";

/// Service credentials. All three values are required.
#[derive(Clone, PartialEq)]
pub struct RecognitionCredentials {
    pub secret_id: String,
    pub secret_key: String,
    pub app_id: String,
}

impl std::fmt::Debug for RecognitionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionCredentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("app_id", &self.app_id)
            .finish()
    }
}

impl RecognitionCredentials {
    pub fn new(
        secret_id: Option<String>,
        secret_key: Option<String>,
        app_id: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            secret_id: required(secret_id, "recognition secret id")?,
            secret_key: required(secret_key, "recognition secret key")?,
            app_id: required(app_id, "recognition app id")?,
        })
    }

    /// Read credentials from `VOICEOVER_ASR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(
            std::env::var(SECRET_ID_ENV).ok(),
            std::env::var(SECRET_KEY_ENV).ok(),
            std::env::var(APP_ID_ENV).ok(),
        )
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Parameters sent with every flash-recognition request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    pub engine_type: &'static str,
    pub voice_format: &'static str,
    pub filter_modal: u8,
    pub filter_punc: u8,
    pub filter_dirty: u8,
    pub word_info: u8,
    pub convert_num_mode: u8,
}

impl RecognitionRequest {
    pub fn for_language(language: &str) -> Self {
        Self {
            engine_type: engine_for_language(language),
            voice_format: "wav",
            filter_modal: 0,
            filter_punc: 0,
            filter_dirty: 0,
            word_info: 0,
            convert_num_mode: 1,
        }
    }
}

/// 16 kHz engine for a language tag. Unknown tags use the Chinese engine.
pub fn engine_for_language(language: &str) -> &'static str {
    match language {
        "en-US" => "16k_en",
        _ => "16k_zh",
    }
}

/// Sends audio to the recognition service and returns the raw response body.
pub trait RecognitionBackend {
    fn recognize(
        &self,
        credentials: &RecognitionCredentials,
        request: &RecognitionRequest,
        audio: &[u8],
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("audio file not found: {}", .0.display())]
    MissingAudio(PathBuf),
    #[error("failed to read audio: {0}")]
    Read(#[from] std::io::Error),
    #[error("recognition request failed: {0:#}")]
    Transport(anyhow::Error),
    #[error("recognition service returned an empty response")]
    EmptyResponse,
    #[error("recognition service returned invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("recognition response has no request_id")]
    MissingRequestId,
    #[error("recognition failed (request {request_id}, code {code}): {message}")]
    Service {
        request_id: String,
        code: i64,
        message: String,
    },
    #[error("recognition response has no flash_result")]
    MissingResult,
}

#[derive(Debug, Deserialize)]
struct FlashResponse {
    request_id: Option<String>,
    code: Option<i64>,
    message: Option<String>,
    flash_result: Option<Vec<Value>>,
}

/// Parse a flash-recognition response body into sentence records.
///
/// Channels without a `sentence_list` and sentences missing `text`,
/// `start_time` or `end_time` are skipped with a warning.
pub fn parse_flash_response(body: &str) -> Result<Vec<SentenceRecord>, RecognitionError> {
    if body.trim().is_empty() {
        return Err(RecognitionError::EmptyResponse);
    }
    let resp: FlashResponse = serde_json::from_str(body)?;

    let request_id = resp.request_id.ok_or(RecognitionError::MissingRequestId)?;
    let code = resp.code.unwrap_or(-1);
    if code != 0 {
        return Err(RecognitionError::Service {
            request_id,
            code,
            message: resp.message.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    log::debug!("Recognition request_id: {}", request_id);

    let channels = resp.flash_result.ok_or(RecognitionError::MissingResult)?;
    let mut records = Vec::new();
    for (ch, channel) in channels.iter().enumerate() {
        // TODO: skipped channels and sentences are lost silently to callers;
        // report a skip count alongside the records.
        let Some(sentences) = channel.get("sentence_list").and_then(Value::as_array) else {
            log::warn!("Channel {} has no sentence_list, skipping", ch);
            continue;
        };
        for sentence in sentences {
            match sentence_record(sentence) {
                Some(record) => records.push(record),
                None => log::warn!("Incomplete sentence in channel {}, skipping: {}", ch, sentence),
            }
        }
    }
    Ok(records)
}

fn sentence_record(sentence: &Value) -> Option<SentenceRecord> {
    Some(SentenceRecord {
        text: sentence.get("text")?.as_str()?.to_string(),
        begin_ms: sentence.get("start_time")?.as_u64()?,
        end_ms: sentence.get("end_time")?.as_u64()?,
    })
}

/// Recognition client: credentials plus a transport backend.
pub struct RecognitionService<B: RecognitionBackend> {
    credentials: RecognitionCredentials,
    backend: B,
}

impl<B: RecognitionBackend> RecognitionService<B> {
    pub fn new(credentials: RecognitionCredentials, backend: B) -> Self {
        Self {
            credentials,
            backend,
        }
    }

    /// Recognize a WAV file. `None` on any transport, decode or service error.
    pub fn process(&self, audio_file: &Path, language: &str) -> Option<Vec<SentenceRecord>> {
        match self.try_process(audio_file, language) {
            Ok(records) => {
                log::info!("Recognized {} sentences in {}", records.len(), audio_file.display());
                Some(records)
            }
            Err(e) => {
                log::warn!("Speech recognition failed: {}", e);
                None
            }
        }
    }

    fn try_process(
        &self,
        audio_file: &Path,
        language: &str,
    ) -> Result<Vec<SentenceRecord>, RecognitionError> {
        if !audio_file.is_file() {
            return Err(RecognitionError::MissingAudio(audio_file.to_path_buf()));
        }
        let audio = std::fs::read(audio_file)?;
        let request = RecognitionRequest::for_language(language);
        let body = self
            .backend
            .recognize(&self.credentials, &request, &audio)
            .map_err(RecognitionError::Transport)?;
        parse_flash_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedBackend(Result<&'static str, &'static str>);

    impl RecognitionBackend for CannedBackend {
        fn recognize(
            &self,
            _: &RecognitionCredentials,
            request: &RecognitionRequest,
            audio: &[u8],
        ) -> anyhow::Result<String> {
            assert_eq!(request.voice_format, "wav");
            assert!(!audio.is_empty());
            match self.0 {
                Ok(body) => Ok(body.to_string()),
                Err(msg) => Err(anyhow::anyhow!(msg)),
            }
        }
    }

    fn credentials() -> RecognitionCredentials {
        RecognitionCredentials::new(
            Some("id".to_string()),
            Some("key".to_string()),
            Some("app".to_string()),
        )
        .unwrap()
    }

    fn audio_fixture(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("voiceover_asr_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("speech.wav");
        std::fs::write(&path, b"RIFF....WAVE").unwrap();
        path
    }

    const OK_BODY: &str = r#"{
        "request_id": "r-1",
        "code": 0,
        "message": "success",
        "flash_result": [
            {"channel_id": 0, "sentence_list": [
                {"text": "Hello there.", "start_time": 0, "end_time": 1200},
                {"text": "General Kenobi.", "start_time": 1300, "end_time": 2500}
            ]}
        ]
    }"#;

    #[test]
    fn test_credentials_required() {
        let err = RecognitionCredentials::new(Some("id".to_string()), None, Some("app".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("secret key"));

        let err = RecognitionCredentials::new(Some(" ".to_string()), Some("k".to_string()), Some("a".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("secret id"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let printed = format!("{:?}", credentials());
        assert!(!printed.contains("\"key\""));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_engine_mapping() {
        assert_eq!(engine_for_language("zh-CN"), "16k_zh");
        assert_eq!(engine_for_language("en-US"), "16k_en");
        assert_eq!(engine_for_language("fr-FR"), "16k_zh");
        let req = RecognitionRequest::for_language("en-US");
        assert_eq!(req.engine_type, "16k_en");
        assert_eq!(req.convert_num_mode, 1);
    }

    #[test]
    fn test_parse_ok_response() {
        let records = parse_flash_response(OK_BODY).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "Hello there.");
        assert_eq!(records[1].begin_ms, 1300);
        assert_eq!(records[1].end_ms, 2500);
    }

    #[test]
    fn test_parse_skips_incomplete_channels_and_sentences() {
        let body = r#"{
            "request_id": "r-2",
            "code": 0,
            "flash_result": [
                {"channel_id": 0},
                {"channel_id": 1, "sentence_list": [
                    {"text": "kept", "start_time": 10, "end_time": 20},
                    {"text": "no timing"}
                ]}
            ]
        }"#;
        let records = parse_flash_response(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "kept");
    }

    #[test]
    fn test_parse_error_paths() {
        assert!(matches!(parse_flash_response("  "), Err(RecognitionError::EmptyResponse)));
        assert!(matches!(parse_flash_response("<html>"), Err(RecognitionError::InvalidJson(_))));
        assert!(matches!(
            parse_flash_response(r#"{"code": 0}"#),
            Err(RecognitionError::MissingRequestId)
        ));
        assert!(matches!(
            parse_flash_response(r#"{"request_id": "r", "code": 0}"#),
            Err(RecognitionError::MissingResult)
        ));
        match parse_flash_response(r#"{"request_id": "r", "code": 4002, "message": "auth failed"}"#) {
            Err(RecognitionError::Service { code, message, .. }) => {
                assert_eq!(code, 4002);
                assert_eq!(message, "auth failed");
            }
            other => panic!("unexpected: {:?}", other),
        }
        // Missing code counts as failure
        assert!(matches!(
            parse_flash_response(r#"{"request_id": "r", "flash_result": []}"#),
            Err(RecognitionError::Service { code: -1, .. })
        ));
    }

    #[test]
    fn test_process_success() {
        let audio = audio_fixture("ok");
        let service = RecognitionService::new(credentials(), CannedBackend(Ok(OK_BODY)));
        let records = service.process(&audio, "en-US").unwrap();
        assert_eq!(records.len(), 2);
        std::fs::remove_dir_all(audio.parent().unwrap()).ok();
    }

    #[test]
    fn test_process_errors_become_none() {
        let audio = audio_fixture("err");
        let transport = RecognitionService::new(credentials(), CannedBackend(Err("timeout")));
        assert!(transport.process(&audio, "zh-CN").is_none());

        let garbage = RecognitionService::new(credentials(), CannedBackend(Ok("not json")));
        assert!(garbage.process(&audio, "zh-CN").is_none());

        let missing = RecognitionService::new(credentials(), CannedBackend(Ok(OK_BODY)));
        assert!(missing.process(Path::new("/no/such/audio.wav"), "zh-CN").is_none());
        std::fs::remove_dir_all(audio.parent().unwrap()).ok();
    }
}
