//! Emotion inference.
//!
//! [`EmotionModel`] is the seam between the analyzer worker and whatever
//! actually classifies faces.  [`DeepFaceClient`] talks to a DeepFace-style
//! REST service (`deepface` `api/app.py`, or any server speaking the same
//! wire format):
//!
//! ```text
//! POST /analyze
//! {
//!   "img": "data:image/jpeg;base64,…",
//!   "actions": ["emotion"],
//!   "enforce_detection": false,
//!   "detector_backend": "opencv"
//! }
//!
//! 200 OK
//! { "results": [ { "region": {"x":..,"y":..,"w":..,"h":..},
//!                  "dominant_emotion": "happy",
//!                  "emotion": { "happy": 97.1, "sad": 0.4, … } } ] }
//! ```
//!
//! Older servers return the bare list instead of `{"results": [...]}`; both
//! are accepted.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Deserialize;
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::vision::frame::{Face, Frame, Region};

// ---------------------------------------------------------------------------
// InferenceError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("analysis request failed: {0}")]
    Request(String),

    #[error("analysis request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("analysis service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse analysis response: {0}")]
    Parse(String),

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InferenceError::Timeout
        } else {
            InferenceError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// EmotionModel trait
// ---------------------------------------------------------------------------

/// One frame in, zero or more faces out.
///
/// Finding no face is a successful, empty answer, not an error.
#[async_trait]
pub trait EmotionModel: Send + Sync {
    async fn analyze(&self, frame: &Frame) -> Result<Vec<Face>, InferenceError>;
}

// ---------------------------------------------------------------------------
// DeepFaceClient
// ---------------------------------------------------------------------------

pub struct DeepFaceClient {
    client: reqwest::Client,
    endpoint: String,
    detector_backend: String,
    enforce_detection: bool,
}

impl DeepFaceClient {
    /// Build a client from config.  The per-request timeout comes from
    /// `config.timeout_secs`.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
            detector_backend: config.detector_backend.clone(),
            enforce_detection: config.enforce_detection,
        }
    }
}

#[async_trait]
impl EmotionModel for DeepFaceClient {
    async fn analyze(&self, frame: &Frame) -> Result<Vec<Face>, InferenceError> {
        // JPEG encoding of a 640x480 frame takes a few ms; keep it off the
        // async workers.
        let image = Arc::clone(&frame.image);
        let data_uri = tokio::task::spawn_blocking(move || encode_data_uri(&image))
            .await
            .map_err(|e| InferenceError::Encode(e.to_string()))??;

        let body = serde_json::json!({
            "img":               data_uri,
            "actions":           ["emotion"],
            "enforce_detection": self.enforce_detection,
            "detector_backend":  self.detector_backend,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        parse_faces(&text)
    }
}

fn encode_data_uri(image: &RgbImage) -> Result<String, InferenceError> {
    let mut jpeg = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut jpeg, 85)
        .encode_image(image)
        .map_err(|e| InferenceError::Encode(e.to_string()))?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(jpeg.into_inner());
    Ok(format!("data:image/jpeg;base64,{b64}"))
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum AnalyzeResponse {
    Wrapped { results: Vec<RawFace> },
    Bare(Vec<RawFace>),
}

#[derive(Deserialize)]
struct RawFace {
    #[serde(default)]
    region: RawRegion,
    #[serde(default = "unknown_emotion")]
    dominant_emotion: String,
    #[serde(default)]
    emotion: BTreeMap<String, f32>,
}

#[derive(Deserialize, Default)]
struct RawRegion {
    #[serde(default)]
    x: i64,
    #[serde(default)]
    y: i64,
    #[serde(default)]
    w: i64,
    #[serde(default)]
    h: i64,
}

fn unknown_emotion() -> String {
    "unknown".into()
}

fn clamp(v: i64) -> u32 {
    v.clamp(0, u32::MAX as i64) as u32
}

/// Parse an `/analyze` response body into faces.
///
/// Negative coordinates are clamped to zero, so a degenerate detection ends
/// up with an unusable region rather than an error.
pub fn parse_faces(body: &str) -> Result<Vec<Face>, InferenceError> {
    let parsed: AnalyzeResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::Parse(e.to_string()))?;

    let raw = match parsed {
        AnalyzeResponse::Wrapped { results } => results,
        AnalyzeResponse::Bare(list) => list,
    };

    Ok(raw
        .into_iter()
        .map(|f| Face {
            region: Region::new(
                clamp(f.region.x),
                clamp(f.region.y),
                clamp(f.region.w),
                clamp(f.region.h),
            ),
            dominant_emotion: f.dominant_emotion,
            scores: f.emotion,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// ScriptedModel  (test-only)
// ---------------------------------------------------------------------------

/// Replays a fixed list of answers, one per call, then reports no faces.
#[cfg(test)]
pub struct ScriptedModel {
    script: std::sync::Mutex<std::collections::VecDeque<Result<Vec<Face>, String>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedModel {
    pub fn new(script: Vec<Result<Vec<Face>, String>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl EmotionModel for ScriptedModel {
    async fn analyze(&self, _frame: &Frame) -> Result<Vec<Face>, InferenceError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(faces)) => Ok(faces),
            Some(Err(msg)) => Err(InferenceError::Request(msg)),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_results() {
        let body = r#"{
            "results": [
                {
                    "region": {"x": 12, "y": 30, "w": 100, "h": 120},
                    "dominant_emotion": "happy",
                    "emotion": {"happy": 97.5, "sad": 0.5}
                }
            ]
        }"#;

        let faces = parse_faces(body).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].region, Region::new(12, 30, 100, 120));
        assert_eq!(faces[0].dominant_emotion, "happy");
        assert_eq!(faces[0].scores.get("happy"), Some(&97.5));
    }

    #[test]
    fn parses_bare_list() {
        let body = r#"[{"region": {"x": 0, "y": 0, "w": 5, "h": 5}, "dominant_emotion": "sad"}]"#;
        let faces = parse_faces(body).unwrap();
        assert_eq!(faces[0].dominant_emotion, "sad");
        assert!(faces[0].scores.is_empty());
    }

    #[test]
    fn negative_coordinates_clamp_to_zero() {
        let body = r#"{"results": [
            {"region": {"x": -4, "y": 2, "w": -1, "h": 9}, "dominant_emotion": "fear"}
        ]}"#;
        let faces = parse_faces(body).unwrap();
        assert_eq!(faces[0].region, Region::new(0, 2, 0, 9));
        assert!(!faces[0].region.is_usable());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let faces = parse_faces(r#"{"results": [{}]}"#).unwrap();
        assert_eq!(faces[0].dominant_emotion, "unknown");
        assert_eq!(faces[0].region, Region::default());
    }

    #[test]
    fn empty_results_mean_no_faces() {
        assert!(parse_faces(r#"{"results": []}"#).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_faces("<html>oops</html>").unwrap_err();
        assert!(matches!(err, InferenceError::Parse(_)));
    }

    #[test]
    fn data_uri_has_jpeg_prefix() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]));
        let uri = encode_data_uri(&img).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,/9j/"), "{}", &uri[..40]);
    }

    #[test]
    fn client_is_object_safe() {
        let model: Arc<dyn EmotionModel> =
            Arc::new(DeepFaceClient::from_config(&AnalysisConfig::default()));
        drop(model);
    }

    #[tokio::test]
    async fn scripted_model_replays_then_goes_quiet() {
        let model = ScriptedModel::new(vec![
            Ok(vec![Face::new(Region::new(1, 1, 2, 2), "happy")]),
            Err("boom".into()),
        ]);
        let frame = Frame::new(1, Arc::new(RgbImage::new(2, 2)));

        assert_eq!(model.analyze(&frame).await.unwrap().len(), 1);
        assert!(model.analyze(&frame).await.is_err());
        assert!(model.analyze(&frame).await.unwrap().is_empty());
        assert_eq!(model.calls(), 3);
    }
}
