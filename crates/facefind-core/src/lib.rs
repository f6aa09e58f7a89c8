//! facefind-core: client-side model of a face lookup session.
//!
//! An image is opened, a remote backend detects its faces, one face is
//! selected (automatically or by the user) and the backend is asked for
//! similar reference faces. This crate holds the data model, the session
//! state machine and the SVG/HTML views; it performs no I/O of its own.

pub mod intake;
pub mod render;
pub mod selection;
pub mod session;
pub mod types;

pub use intake::{Intake, IntakeError, UploadedImage};
pub use session::{DetectionStatus, Effect, Event, RecognitionStatus, Session};
pub use types::{ActorMatch, ActorName, BoundingBox, DetectedFace, Embedding, ImageId, Recognition, Sex};
