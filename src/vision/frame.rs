//! Frame and analysis-result types exchanged between the display loop, the
//! emotion analyzer and the command processor.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One captured camera image, RGB8, plus its position in capture order.
///
/// The pixel buffer is behind an `Arc` so the display loop can keep drawing
/// the same image it handed to the analysis queue without copying it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Arc<RgbImage>,
    /// Monotonic capture counter, starting at 1.
    pub sequence: u64,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(sequence: u64, image: Arc<RgbImage>) -> Self {
        Self {
            image,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// ---------------------------------------------------------------------------
// Region / Face
// ---------------------------------------------------------------------------

/// Face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A zero width or height means the detector found nothing usable.
    pub fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// One detected face.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub region: Region,
    /// Highest-confidence emotion label (`"happy"`, `"sad"`, …).
    pub dominant_emotion: String,
    /// Per-emotion confidence, as reported by the model.  Empty when the
    /// model does not report scores.
    pub scores: BTreeMap<String, f32>,
}

impl Face {
    pub fn new(region: Region, dominant_emotion: impl Into<String>) -> Self {
        Self {
            region,
            dominant_emotion: dominant_emotion.into(),
            scores: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// Output of one successful emotion analysis.
///
/// Failed analyses travel through the result queues as `None`; an
/// `AnalysisResult` with no faces means the model ran and found nobody.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Sequence number of the analyzed frame.
    pub frame: u64,
    pub faces: Vec<Face>,
}

/// What the analyzer publishes per frame: `None` on inference failure.
pub type AnalysisOutcome = Option<AnalysisResult>;

impl AnalysisResult {
    pub fn new(frame: u64, faces: Vec<Face>) -> Self {
        Self { frame, faces }
    }

    /// Dominant emotion of the first reported face.
    pub fn dominant_emotion(&self) -> Option<&str> {
        self.faces.first().map(|f| f.dominant_emotion.as_str())
    }

    /// Overlay annotations for every face with a usable region.
    pub fn annotations(&self) -> impl Iterator<Item = Annotation> + '_ {
        self.faces
            .iter()
            .filter(|f| f.region.is_usable())
            .map(|f| Annotation {
                region: f.region,
                label: capitalize(&f.dominant_emotion),
            })
    }
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// A box-plus-label to draw over the live video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub region: Region,
    pub label: String,
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => "Unknown".into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_usable_requires_positive_width_and_height() {
        assert!(Region::new(0, 0, 10, 10).is_usable());
        assert!(!Region::new(5, 5, 0, 10).is_usable());
        assert!(!Region::new(5, 5, 10, 0).is_usable());
        assert!(!Region::default().is_usable());
    }

    #[test]
    fn annotations_skip_unusable_regions() {
        let result = AnalysisResult::new(
            1,
            vec![
                Face::new(Region::new(10, 20, 30, 40), "happy"),
                Face::new(Region::new(0, 0, 0, 0), "sad"),
                Face::new(Region::new(1, 1, 5, 0), "angry"),
            ],
        );

        let annotations: Vec<_> = result.annotations().collect();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].label, "Happy");
        assert_eq!(annotations[0].region, Region::new(10, 20, 30, 40));
    }

    #[test]
    fn dominant_emotion_comes_from_first_face() {
        let result = AnalysisResult::new(
            3,
            vec![
                Face::new(Region::new(0, 0, 0, 0), "neutral"),
                Face::new(Region::new(1, 1, 1, 1), "surprise"),
            ],
        );
        assert_eq!(result.dominant_emotion(), Some("neutral"));
        assert_eq!(AnalysisResult::new(4, Vec::new()).dominant_emotion(), None);
    }

    #[test]
    fn capitalize_labels() {
        assert_eq!(capitalize("happy"), "Happy");
        assert_eq!(capitalize("FEAR"), "Fear");
        assert_eq!(capitalize(""), "Unknown");
    }
}
