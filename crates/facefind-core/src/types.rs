use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one opened image.
///
/// Allocated fresh for every open, so opening the same file twice yields two
/// distinct ids. All staleness checks compare these, never image content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(u64);

impl ImageId {
    pub fn next() -> Self {
        Self(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img-{}", self.0)
    }
}

/// Face bounding box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Sex classification reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

/// Face embedding exactly as the backend produced it.
///
/// The client never interprets the embedding; it only hands it back to the
/// recognize endpoint. Older backends send a plain float array, current ones
/// send a base64-encoded `.npy` blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedding {
    Vector(Vec<f64>),
    Encoded(String),
}

impl Embedding {
    /// Vector length, when the embedding is a plain array.
    pub fn dimension(&self) -> Option<usize> {
        match self {
            Embedding::Vector(values) => Some(values.len()),
            Embedding::Encoded(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
}

/// One face found by the detect endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    pub sex: Sex,
    pub embedding: Embedding,
    /// Detector confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Five-point facial landmarks, when the backend reports them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<KeyPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

/// One localized spelling of an actor's name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorName {
    #[serde(default)]
    pub ja: Option<String>,
    #[serde(default)]
    pub ja_kana: Option<String>,
    #[serde(default)]
    pub en: Option<String>,
}

impl ActorName {
    /// First present variant, in the order ja, jaKana, en.
    pub fn label(&self) -> Option<&str> {
        self.ja
            .as_deref()
            .or(self.ja_kana.as_deref())
            .or(self.en.as_deref())
    }
}

/// A reference identity similar to the queried face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorMatch {
    pub names: Vec<ActorName>,
    /// Similarity as reported by the backend. Not clamped.
    pub similarity: f64,
    /// Externally hosted reference face image.
    pub face_image_url: Option<String>,
}

impl ActorMatch {
    /// Primary display name: the label of the first name entry that has one.
    pub fn display_name(&self) -> Option<&str> {
        self.names.iter().find_map(ActorName::label)
    }

    /// Remaining name labels after the display name, without duplicates.
    pub fn alternate_names(&self) -> Vec<&str> {
        let mut labels = self.names.iter().filter_map(ActorName::label);
        let Some(primary) = labels.next() else {
            return Vec::new();
        };

        let mut alternates: Vec<&str> = Vec::new();
        for label in labels {
            if label != primary && !alternates.contains(&label) {
                alternates.push(label);
            }
        }
        alternates
    }
}

/// Ranked matches for one face of the current detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub face_index: usize,
    pub actors: Vec<ActorMatch>,
}
