//! Plain-text rendering of session state for the terminal.

use facefind_core::render::format_similarity;
use facefind_core::session::Detection;
use facefind_core::{DetectionStatus, Recognition, RecognitionStatus, Session};

pub fn faces_listing(detection: &Detection, selected: Option<usize>) -> String {
    if detection.faces().is_empty() {
        return "no faces detected\n".to_string();
    }

    let mut out = String::new();
    for (i, face) in detection.faces().iter().enumerate() {
        let b = &face.bounding_box;
        let marker = if selected == Some(i) { '*' } else { ' ' };
        let status = match detection.recognition(i) {
            Some(RecognitionStatus::Pending) => " searching...",
            Some(RecognitionStatus::Failed(_)) => " failed",
            _ => "",
        };
        out.push_str(&format!(
            "{marker}[{i}] {sex} ({x1:.0},{y1:.0})-({x2:.0},{y2:.0}){status}\n",
            sex = face.sex.as_str(),
            x1 = b.x1,
            y1 = b.y1,
            x2 = b.x2,
            y2 = b.y2,
        ));
    }
    out
}

pub fn matches_table(recognition: &Recognition) -> String {
    if recognition.actors.is_empty() {
        return "no similar faces found\n".to_string();
    }

    let mut out = format!("{:>3}  {:>10}  {}\n", "#", "similarity", "name");
    for (i, actor) in recognition.actors.iter().enumerate() {
        let name = actor.display_name().unwrap_or("(unknown)");
        let alternates = actor.alternate_names();
        let alternates = if alternates.is_empty() {
            String::new()
        } else {
            format!(" ({})", alternates.join(", "))
        };
        out.push_str(&format!(
            "{:>3}  {:>10}  {name}{alternates}\n",
            i + 1,
            format_similarity(actor.similarity),
        ));
    }
    out
}

/// Everything the session currently shows, in terminal form.
pub fn session_summary(session: &Session) -> String {
    let Some(image) = session.image() else {
        return "no image open\n".to_string();
    };

    let mut out = format!("{} ({}x{})\n", image.file_name, image.width, image.height);
    match session.detection_status() {
        Some(DetectionStatus::Pending) | None => out.push_str("detecting...\n"),
        Some(DetectionStatus::Failed(reason)) => {
            out.push_str(&format!("detection failed: {reason}\n"));
        }
        Some(DetectionStatus::Ready(detection)) => {
            out.push_str(&faces_listing(detection, session.selected_face()));
            match session.selected_recognition() {
                Some(RecognitionStatus::Resolved(recognition)) => {
                    out.push_str(&matches_table(recognition));
                }
                Some(RecognitionStatus::Failed(reason)) => {
                    out.push_str(&format!("recognition failed: {reason}\n"));
                }
                Some(RecognitionStatus::Pending) => out.push_str("searching...\n"),
                Some(RecognitionStatus::NotRequested) | None => {}
            }
        }
    }
    out
}
