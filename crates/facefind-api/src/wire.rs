//! JSON bodies exchanged with the backend.
//!
//! Fields beyond what the client needs are optional so older and newer
//! backend versions both parse.

use facefind_core::{ActorMatch, ActorName, DetectedFace, Embedding, Recognition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Service descriptor every backend response carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computing_device: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub libraries: BTreeMap<String, String>,
}

/// `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootResponse {
    pub service: ServiceInfo,
    pub time_in_milliseconds: i64,
}

/// Request metadata echoed by `POST /detect`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRequestInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sha1: Option<String>,
    pub image_width: u32,
    pub image_height: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectPayload {
    pub faces: Vec<DetectedFace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_time_in_nanoseconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_time_in_nanoseconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_time_in_nanoseconds: Option<u64>,
}

/// `POST /detect`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub request: DetectRequestInfo,
    pub response: DetectPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_milliseconds: Option<i64>,
}

impl DetectResponse {
    pub fn new(image_width: u32, image_height: u32, faces: Vec<DetectedFace>) -> Self {
        Self {
            request: DetectRequestInfo {
                image_width,
                image_height,
                ..Default::default()
            },
            response: DetectPayload {
                faces,
                ..Default::default()
            },
            service: None,
            time_in_milliseconds: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecognizeRequest<'a> {
    pub embedding: &'a Embedding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceImage {
    pub url: String,
}

/// Reference-image catalogue entry attached to an actor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub face_image: Option<FaceImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarActor {
    pub names: Vec<ActorName>,
    pub similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fanza: Option<CatalogEntry>,
}

impl From<SimilarActor> for ActorMatch {
    fn from(actor: SimilarActor) -> Self {
        ActorMatch {
            names: actor.names,
            similarity: actor.similarity,
            face_image_url: actor.fanza.and_then(|f| f.face_image).map(|i| i.url),
        }
    }
}

impl From<ActorMatch> for SimilarActor {
    fn from(actor: ActorMatch) -> Self {
        SimilarActor {
            names: actor.names,
            similarity: actor.similarity,
            fanza: actor.face_image_url.map(|url| CatalogEntry {
                face_image: Some(FaceImage { url }),
            }),
        }
    }
}

/// `POST /recognize`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizeResponse {
    pub actors: Vec<SimilarActor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_milliseconds: Option<i64>,
}

impl RecognizeResponse {
    pub fn new(actors: Vec<ActorMatch>) -> Self {
        Self {
            actors: actors.into_iter().map(SimilarActor::from).collect(),
            service: None,
            time_in_milliseconds: None,
        }
    }

    /// Matches in backend order; the backend has already ranked them.
    pub fn into_recognition(self, face_index: usize) -> Recognition {
        Recognition {
            face_index,
            actors: self.actors.into_iter().map(ActorMatch::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facefind_core::Sex;

    #[test]
    fn test_parse_detect_response() {
        let json = r#"{
            "service": {"name": "face-detector", "version": "0.2.0",
                        "libraries": {"insightface": "0.7.3"}},
            "timeInMilliseconds": 1700000000000,
            "request": {"fileName": "face_two.jpg", "fileSize": 51234,
                        "fileSha1": "da39a3ee", "imageWidth": 800, "imageHeight": 600},
            "response": {
                "hashTimeInNanoseconds": 1000,
                "decodeTimeInNanoseconds": 2000,
                "detectionTimeInNanoseconds": 3000,
                "faces": [
                    {"boundingBox": {"x1": 1, "y1": 2, "x2": 3, "y2": 4},
                     "sex": "M", "embedding": "AAAA", "score": 0.8, "age": 40, "keyPoints": []},
                    {"boundingBox": {"x1": 5, "y1": 6, "x2": 7, "y2": 8},
                     "sex": "F", "embedding": [0.1, 0.2]}
                ]
            }
        }"#;
        let parsed: DetectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.request.image_width, 800);
        assert_eq!(parsed.request.file_sha1.as_deref(), Some("da39a3ee"));
        assert_eq!(parsed.response.faces.len(), 2);
        assert_eq!(parsed.response.faces[1].sex, Sex::Female);
        assert_eq!(parsed.service.unwrap().libraries["insightface"], "0.7.3");
    }

    #[test]
    fn test_parse_minimal_detect_response() {
        let json = r#"{"request": {"imageWidth": 10, "imageHeight": 20},
                       "response": {"faces": []}}"#;
        let parsed: DetectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.request.image_height, 20);
        assert!(parsed.response.faces.is_empty());
        assert!(parsed.service.is_none());
    }

    #[test]
    fn test_detect_response_requires_faces() {
        let json = r#"{"request": {"imageWidth": 10, "imageHeight": 20}, "response": {}}"#;
        assert!(serde_json::from_str::<DetectResponse>(json).is_err());
    }

    #[test]
    fn test_recognize_response_keeps_order_and_urls() {
        let json = r#"{"actors": [
            {"names": [{"ja": "一"}], "similarity": 0.9,
             "fanza": {"faceImage": {"url": "https://img.example/1.jpg"}}},
            {"names": [{"en": "Two", "ja": null, "jaKana": null}], "similarity": 0.95}
        ]}"#;
        let parsed: RecognizeResponse = serde_json::from_str(json).unwrap();
        let recognition = parsed.into_recognition(3);
        assert_eq!(recognition.face_index, 3);
        assert_eq!(recognition.actors[0].similarity, 0.9);
        assert_eq!(
            recognition.actors[0].face_image_url.as_deref(),
            Some("https://img.example/1.jpg")
        );
        assert_eq!(recognition.actors[1].display_name(), Some("Two"));
        assert!(recognition.actors[1].face_image_url.is_none());
    }

    #[test]
    fn test_recognize_request_body() {
        let embedding = Embedding::Vector(vec![0.5, -1.0]);
        let body = serde_json::to_value(RecognizeRequest { embedding: &embedding }).unwrap();
        assert_eq!(body, serde_json::json!({"embedding": [0.5, -1.0]}));
    }
}
