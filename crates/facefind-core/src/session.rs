//! Session state machine.
//!
//! The session owns everything derived from the currently open image:
//! its detection, the per-face recognition statuses, and the selection.
//! [`Session::apply`] is the only way state changes. It consumes one
//! [`Event`] and returns the [`Effect`]s (network requests) the caller must
//! run. Completions come back as further events tagged with the [`ImageId`]
//! they were issued for; events for an image that is no longer current are
//! dropped.

use crate::intake::UploadedImage;
use crate::selection::default_face;
use crate::types::{DetectedFace, Embedding, ImageId, Recognition};
use std::sync::Arc;

/// Recognition progress for one face of the current detection.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionStatus {
    NotRequested,
    Pending,
    Resolved(Recognition),
    Failed(String),
}

/// Faces of the current image, with one recognition status per face.
#[derive(Debug, Clone)]
pub struct Detection {
    faces: Vec<DetectedFace>,
    recognitions: Vec<RecognitionStatus>,
}

impl Detection {
    fn new(faces: Vec<DetectedFace>) -> Self {
        let recognitions = vec![RecognitionStatus::NotRequested; faces.len()];
        Self { faces, recognitions }
    }

    pub fn faces(&self) -> &[DetectedFace] {
        &self.faces
    }

    pub fn recognition(&self, face_index: usize) -> Option<&RecognitionStatus> {
        self.recognitions.get(face_index)
    }

    /// Indices of faces whose recognition is in flight.
    pub fn pending_faces(&self) -> Vec<usize> {
        self.recognitions
            .iter()
            .enumerate()
            .filter(|(_, status)| matches!(status, RecognitionStatus::Pending))
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum DetectionStatus {
    Pending,
    Ready(Detection),
    Failed(String),
}

/// Inputs to the state machine: user actions and request completions.
#[derive(Debug)]
pub enum Event {
    /// A new image replaces whatever was open before.
    ImageOpened(Arc<UploadedImage>),
    DetectionCompleted {
        image: ImageId,
        faces: Vec<DetectedFace>,
    },
    DetectionFailed {
        image: ImageId,
        reason: String,
    },
    /// The user clicked a face.
    FaceSelected(usize),
    RecognitionCompleted {
        image: ImageId,
        recognition: Recognition,
    },
    RecognitionFailed {
        image: ImageId,
        face_index: usize,
        reason: String,
    },
}

/// Requests the caller must issue on behalf of the session.
#[derive(Debug, Clone)]
pub enum Effect {
    Detect(Arc<UploadedImage>),
    Recognize {
        image: Arc<UploadedImage>,
        face_index: usize,
        embedding: Embedding,
    },
}

#[derive(Debug, Clone)]
struct Current {
    image: Arc<UploadedImage>,
    detection: DetectionStatus,
    selected: Option<usize>,
}

#[derive(Debug, Default)]
pub struct Session {
    current: Option<Current>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self) -> Option<&Arc<UploadedImage>> {
        self.current.as_ref().map(|c| &c.image)
    }

    pub fn detection_status(&self) -> Option<&DetectionStatus> {
        self.current.as_ref().map(|c| &c.detection)
    }

    /// The detection of the current image, once it has arrived.
    pub fn detection(&self) -> Option<&Detection> {
        match self.detection_status()? {
            DetectionStatus::Ready(detection) => Some(detection),
            _ => None,
        }
    }

    pub fn selected_face(&self) -> Option<usize> {
        self.current.as_ref()?.selected
    }

    /// Recognition status of the selected face.
    pub fn selected_recognition(&self) -> Option<&RecognitionStatus> {
        self.detection()?.recognition(self.selected_face()?)
    }

    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::ImageOpened(image) => {
                tracing::info!(image = %image.id, file = %image.file_name, "image opened");
                self.current = Some(Current {
                    image: Arc::clone(&image),
                    detection: DetectionStatus::Pending,
                    selected: None,
                });
                vec![Effect::Detect(image)]
            }
            Event::DetectionCompleted { image, faces } => {
                let Some(current) = self.current_for(image) else {
                    return Vec::new();
                };
                if !matches!(current.detection, DetectionStatus::Pending) {
                    tracing::debug!(%image, "detection already settled, ignoring");
                    return Vec::new();
                }

                let default = default_face(&faces);
                tracing::info!(%image, faces = faces.len(), ?default, "detection applied");
                current.detection = DetectionStatus::Ready(Detection::new(faces));
                match default {
                    Some(index) => select(current, index).into_iter().collect(),
                    None => Vec::new(),
                }
            }
            Event::DetectionFailed { image, reason } => {
                let Some(current) = self.current_for(image) else {
                    return Vec::new();
                };
                if matches!(current.detection, DetectionStatus::Pending) {
                    tracing::warn!(%image, %reason, "detection failed");
                    current.detection = DetectionStatus::Failed(reason);
                }
                Vec::new()
            }
            Event::FaceSelected(index) => match self.current.as_mut() {
                Some(current) => select(current, index).into_iter().collect(),
                None => Vec::new(),
            },
            Event::RecognitionCompleted { image, recognition } => {
                let face_index = recognition.face_index;
                if let Some(status) = self.pending_recognition(image, face_index) {
                    tracing::info!(
                        %image,
                        face = face_index,
                        actors = recognition.actors.len(),
                        "recognition applied"
                    );
                    *status = RecognitionStatus::Resolved(recognition);
                }
                Vec::new()
            }
            Event::RecognitionFailed {
                image,
                face_index,
                reason,
            } => {
                if let Some(status) = self.pending_recognition(image, face_index) {
                    tracing::warn!(%image, face = face_index, %reason, "recognition failed");
                    *status = RecognitionStatus::Failed(reason);
                }
                Vec::new()
            }
        }
    }

    fn current_for(&mut self, image: ImageId) -> Option<&mut Current> {
        match self.current.as_mut() {
            Some(current) if current.image.id == image => Some(current),
            _ => {
                tracing::debug!(%image, "dropping response for stale image");
                None
            }
        }
    }

    fn pending_recognition(
        &mut self,
        image: ImageId,
        face_index: usize,
    ) -> Option<&mut RecognitionStatus> {
        let current = self.current_for(image)?;
        let DetectionStatus::Ready(detection) = &mut current.detection else {
            return None;
        };
        detection
            .recognitions
            .get_mut(face_index)
            .filter(|status| matches!(status, RecognitionStatus::Pending))
    }
}

/// Select a face and request its recognition unless one is already pending
/// or resolved. Failed recognitions are re-issued.
fn select(current: &mut Current, index: usize) -> Option<Effect> {
    let DetectionStatus::Ready(detection) = &mut current.detection else {
        tracing::debug!(face = index, "no detection yet, ignoring selection");
        return None;
    };
    if index >= detection.faces.len() {
        tracing::debug!(face = index, faces = detection.faces.len(), "face index out of range");
        return None;
    }

    current.selected = Some(index);
    let status = &mut detection.recognitions[index];
    if matches!(status, RecognitionStatus::Pending | RecognitionStatus::Resolved(_)) {
        return None;
    }
    *status = RecognitionStatus::Pending;

    Some(Effect::Recognize {
        image: Arc::clone(&current.image),
        face_index: index,
        embedding: detection.faces[index].embedding.clone(),
    })
}
