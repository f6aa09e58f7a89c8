//! SVG/HTML views over session state.
//!
//! Every function here is pure: immutable data in, markup out. Clicks on a
//! face box surface as a `data-face-index` attribute for whatever host
//! turns them back into [`crate::session::Event::FaceSelected`].

use crate::intake::UploadedImage;
use crate::session::{DetectionStatus, RecognitionStatus, Session};
use crate::types::{ActorMatch, DetectedFace, Sex};

pub const MALE_COLOR: &str = "#0000CC";
pub const FEMALE_COLOR: &str = "#CC0000";
pub const OUTLINE_COLOR: &str = "#FFFFFF";
const SELECTED_ALPHA: &str = "CC";
const UNSELECTED_ALPHA: &str = "99";

/// Side length of the face crop shown next to each match.
pub const DEFAULT_CROP_SIZE: u32 = 200;

const LOADING_PLACEHOLDER: &str = "searching...";

pub fn sex_color(sex: Sex) -> &'static str {
    match sex {
        Sex::Male => MALE_COLOR,
        Sex::Female => FEMALE_COLOR,
    }
}

/// Similarity as a percentage with one decimal, clamped to [0, 100].
pub fn format_similarity(similarity: f64) -> String {
    let percent = if similarity.is_nan() {
        0.0
    } else {
        (similarity * 100.0).clamp(0.0, 100.0)
    };
    format!("{percent:.1}%")
}

/// Escape text for use in HTML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn bounding_box_rects(index: usize, face: &DetectedFace, selected: bool) -> String {
    let b = &face.bounding_box;
    let alpha = if selected { SELECTED_ALPHA } else { UNSELECTED_ALPHA };
    let (outline_width, stroke_width) = if selected { (5, 3) } else { (3, 1) };
    let color = sex_color(face.sex);

    format!(
        concat!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" stroke="{outline}{alpha}" stroke-width="{ow}" fill="none"/>"#,
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" stroke="{color}{alpha}" stroke-width="{sw}" fill="#FFFFFF00" style="cursor: pointer" data-face-index="{index}"/>"##,
        ),
        x = b.x1,
        y = b.y1,
        w = b.width(),
        h = b.height(),
        outline = OUTLINE_COLOR,
        alpha = alpha,
        ow = outline_width,
        color = color,
        sw = stroke_width,
        index = index,
    )
}

/// The image at native resolution with one clickable box per face.
pub fn detection_svg(image: &UploadedImage, faces: &[DetectedFace], selected: Option<usize>) -> String {
    let boxes: String = faces
        .iter()
        .enumerate()
        .map(|(i, face)| bounding_box_rects(i, face, selected == Some(i)))
        .collect();

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
            r#"<image x="0" y="0" width="{w}" height="{h}" href="{href}"/>"#,
            "{boxes}</svg>"
        ),
        w = image.width,
        h = image.height,
        href = escape(&image.data_url),
        boxes = boxes,
    )
}

/// A `width`×`height` viewport showing only the face's bounding box.
pub fn face_crop_svg(image: &UploadedImage, face: &DetectedFace, width: u32, height: u32) -> String {
    let b = &face.bounding_box;
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" viewBox="{x} {y} {bw} {bh}" width="{width}" height="{height}">"#,
            r#"<image x="0" y="0" width="{iw}" height="{ih}" href="{href}"/>"#,
            "</svg>"
        ),
        x = b.x1,
        y = b.y1,
        bw = b.width(),
        bh = b.height(),
        width = width,
        height = height,
        iw = image.width,
        ih = image.height,
        href = escape(&image.data_url),
    )
}

fn names_cell(actor: &ActorMatch) -> String {
    let primary = escape(actor.display_name().unwrap_or("(unknown)"));
    let alternates = actor.alternate_names();
    if alternates.is_empty() {
        return format!(r#"<div class="name">{primary}</div>"#);
    }

    let items: String = alternates
        .iter()
        .map(|name| format!("<li>{}</li>", escape(name)))
        .collect();
    format!(r#"<div class="name">{primary}</div><ul class="alternate-names">{items}</ul>"#)
}

fn result_row(rank: usize, crop: &str, actor: &ActorMatch) -> String {
    let thumbnail = actor
        .face_image_url
        .as_deref()
        .map(|url| format!(r#"<img src="{}" alt="">"#, escape(url)))
        .unwrap_or_default();

    format!(
        "<tr><td>{rank}</td><td>{crop}</td><td>{thumbnail}</td><td>{similarity}</td><td>{names}</td></tr>",
        similarity = format_similarity(actor.similarity),
        names = names_cell(actor),
    )
}

/// Matches for one face, or a placeholder while they are not available.
pub fn results_view(
    image: &UploadedImage,
    face: &DetectedFace,
    status: &RecognitionStatus,
    crop_size: u32,
) -> String {
    let recognition = match status {
        RecognitionStatus::Resolved(recognition) => recognition,
        RecognitionStatus::NotRequested | RecognitionStatus::Pending => {
            return format!(r#"<p class="loading">{LOADING_PLACEHOLDER}</p>"#);
        }
        RecognitionStatus::Failed(reason) => {
            return format!(r#"<p class="error">recognition failed: {}</p>"#, escape(reason));
        }
    };

    let crop = face_crop_svg(image, face, crop_size, crop_size);
    let rows: String = recognition
        .actors
        .iter()
        .enumerate()
        .map(|(i, actor)| result_row(i + 1, &crop, actor))
        .collect();

    format!(
        concat!(
            r#"<table class="results">"#,
            "<thead><tr><th>#</th><th>Face</th><th>Match</th><th>Similarity</th><th>Name</th></tr></thead>",
            "<tbody>{rows}</tbody></table>"
        ),
        rows = rows,
    )
}

/// A standalone HTML page for the whole session.
pub fn report_html(session: &Session, crop_size: u32) -> String {
    let body = match (session.image(), session.detection_status()) {
        (Some(image), Some(status)) => image_section(session, image, status, crop_size),
        _ => r#"<p class="hint">Open a JPEG image to begin.</p>"#.to_string(),
    };

    format!(
        concat!(
            "<!DOCTYPE html>\n",
            r#"<html><head><meta charset="utf-8"><title>facefind</title></head>"#,
            "<body><h1>facefind</h1>{body}</body></html>\n"
        ),
        body = body,
    )
}

fn image_section(
    session: &Session,
    image: &UploadedImage,
    status: &DetectionStatus,
    crop_size: u32,
) -> String {
    let title = format!("<h2>{}</h2>", escape(&image.file_name));
    let detection = match status {
        DetectionStatus::Pending => {
            let svg = detection_svg(image, &[], None);
            return format!(r#"{title}{svg}<p class="loading">detecting...</p>"#);
        }
        DetectionStatus::Failed(reason) => {
            return format!(r#"{title}<p class="error">detection failed: {}</p>"#, escape(reason));
        }
        DetectionStatus::Ready(detection) => detection,
    };

    let selected = session.selected_face();
    let svg = detection_svg(image, detection.faces(), selected);
    let results = match selected {
        Some(index) => {
            let face = &detection.faces()[index];
            let status = detection
                .recognition(index)
                .unwrap_or(&RecognitionStatus::NotRequested);
            results_view(image, face, status, crop_size)
        }
        None if detection.faces().is_empty() => r#"<p class="hint">No faces detected.</p>"#.to_string(),
        None => r#"<p class="hint">Select a face.</p>"#.to_string(),
    };

    let pending = pending_list(&detection.pending_faces());
    format!("{title}{svg}{pending}{results}")
}

/// One loading marker per face whose matches are still being looked up.
fn pending_list(faces: &[usize]) -> String {
    if faces.is_empty() {
        return String::new();
    }
    let items: String = faces
        .iter()
        .map(|i| format!(r#"<li data-face-index="{i}">face {i}: {LOADING_PLACEHOLDER}</li>"#))
        .collect();
    format!(r#"<ul class="pending">{items}</ul>"#)
}
