use crate::types::{DetectedFace, Sex};

/// Face to select automatically once a detection arrives.
///
/// Female faces take priority: the first face classified `F`, in detection
/// order. `None` when there is no such face, in which case nothing is
/// selected and no recognition is started.
pub fn default_face(faces: &[DetectedFace]) -> Option<usize> {
    faces.iter().position(|face| face.sex == Sex::Female)
}
