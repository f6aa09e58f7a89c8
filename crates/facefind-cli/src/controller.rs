use facefind_api::Backend;
use facefind_core::{Effect, Embedding, Event, Intake, IntakeError, Session, UploadedImage};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Intake(#[from] IntakeError),
}

/// Single owner of the session.
///
/// User actions and request completions are applied one at a time on the
/// caller's task. Requests the session asks for run as spawned tasks and
/// come back through [`Controller::next_completion`] as events. Nothing is
/// ever cancelled; the session drops completions for images that are no
/// longer current.
pub struct Controller<B: Backend> {
    backend: Arc<B>,
    session: Session,
    intake: Intake,
    backend_url: String,
    tasks: JoinSet<Event>,
}

impl<B: Backend> Controller<B> {
    pub fn new(backend: Arc<B>, backend_url: impl Into<String>) -> Self {
        Self {
            backend,
            session: Session::new(),
            intake: Intake::default(),
            backend_url: backend_url.into(),
            tasks: JoinSet::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Backend for images opened from now on. Images already open keep the
    /// URL they were opened with.
    pub fn set_backend_url(&mut self, url: impl Into<String>) {
        self.backend_url = url.into();
    }

    /// Number of requests still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Open an image file. Returns `Ok(false)` when it was ignored for its type.
    pub async fn open_path(&mut self, path: &Path) -> Result<bool, ControllerError> {
        let file = read_file(path).await?;
        self.open(&file.name, &file.content_type, file.bytes)
    }

    /// Open an image from memory. Returns `Ok(false)` when it was ignored.
    pub fn open(
        &mut self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<bool, ControllerError> {
        let Some(image) = self
            .intake
            .load(file_name, content_type, bytes, &self.backend_url)?
        else {
            return Ok(false);
        };
        self.dispatch(Event::ImageOpened(Arc::new(image)));
        Ok(true)
    }

    /// The user picked a face of the current image.
    pub fn select(&mut self, face_index: usize) {
        self.dispatch(Event::FaceSelected(face_index));
    }

    /// Wait for one running request and apply its result.
    ///
    /// Returns `false` immediately when nothing is in flight.
    pub async fn next_completion(&mut self) -> bool {
        match self.tasks.join_next().await {
            None => false,
            Some(Ok(event)) => {
                self.dispatch(event);
                true
            }
            Some(Err(err)) => {
                tracing::error!(error = %err, "request task aborted");
                true
            }
        }
    }

    /// Apply completions until no request is in flight.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    fn dispatch(&mut self, event: Event) {
        for effect in self.session.apply(event) {
            self.run(effect);
        }
    }

    fn run(&mut self, effect: Effect) {
        let backend = Arc::clone(&self.backend);
        self.tasks.spawn(async move {
            match effect {
                Effect::Detect(image) => detect(backend.as_ref(), &image).await,
                Effect::Recognize {
                    image,
                    face_index,
                    embedding,
                } => recognize(backend.as_ref(), &image, face_index, &embedding).await,
            }
        });
    }
}

/// A file as the browser would hand it over: name, declared type, bytes.
struct DroppedFile {
    name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Read a file, deriving its content type from the extension the way a
/// browser fills in `File.type`.
async fn read_file(path: &Path) -> Result<DroppedFile, ControllerError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ControllerError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(DroppedFile {
        name,
        content_type,
        bytes,
    })
}

/// Read and load an image file outside of any session.
pub async fn read_image(
    intake: &Intake,
    path: &Path,
    backend_url: &str,
) -> Result<Option<UploadedImage>, ControllerError> {
    let file = read_file(path).await?;
    Ok(intake.load(&file.name, &file.content_type, file.bytes, backend_url)?)
}

async fn detect<B: Backend>(backend: &B, image: &UploadedImage) -> Event {
    match backend.detect(image).await {
        Ok(response) => {
            let echoed = (response.request.image_width, response.request.image_height);
            if echoed != (image.width, image.height) {
                tracing::warn!(
                    image = %image.id,
                    local = ?(image.width, image.height),
                    ?echoed,
                    "backend reports different image size; using local measurement"
                );
            }
            Event::DetectionCompleted {
                image: image.id,
                faces: response.response.faces,
            }
        }
        Err(err) => Event::DetectionFailed {
            image: image.id,
            reason: err.to_string(),
        },
    }
}

async fn recognize<B: Backend>(
    backend: &B,
    image: &UploadedImage,
    face_index: usize,
    embedding: &Embedding,
) -> Event {
    match backend.recognize(&image.backend_url, embedding).await {
        Ok(response) => Event::RecognitionCompleted {
            image: image.id,
            recognition: response.into_recognition(face_index),
        },
        Err(err) => Event::RecognitionFailed {
            image: image.id,
            face_index,
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use facefind_api::{ApiError, DetectResponse, RecognizeResponse, StatusCode};
    use facefind_core::{
        ActorMatch, ActorName, BoundingBox, DetectedFace, DetectionStatus, RecognitionStatus, Sex,
    };
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    fn face(sex: Sex, marker: f64) -> DetectedFace {
        DetectedFace {
            bounding_box: BoundingBox { x1: 1.0, y1: 1.0, x2: 9.0, y2: 9.0 },
            sex,
            embedding: Embedding::Vector(vec![marker]),
            score: None,
            key_points: Vec::new(),
            age: None,
        }
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 90, 90]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    /// In-memory backend: faces per file name, optional gates that hold a
    /// detect response until released, and a log of recognize calls.
    #[derive(Default)]
    struct FakeBackend {
        faces: HashMap<String, Vec<DetectedFace>>,
        gates: HashMap<String, Arc<Semaphore>>,
        failing_recognize: bool,
        detect_calls: Mutex<Vec<String>>,
        recognize_calls: Mutex<Vec<(String, Embedding)>>,
    }

    impl FakeBackend {
        fn with_faces(mut self, file_name: &str, faces: Vec<DetectedFace>) -> Self {
            self.faces.insert(file_name.to_string(), faces);
            self
        }

        fn with_gate(mut self, file_name: &str) -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            self.gates.insert(file_name.to_string(), Arc::clone(&gate));
            (self, gate)
        }

        fn detect_count(&self) -> usize {
            self.detect_calls.lock().unwrap().len()
        }

        fn recognize_log(&self) -> Vec<(String, Embedding)> {
            self.recognize_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn detect(&self, image: &UploadedImage) -> Result<DetectResponse, ApiError> {
            self.detect_calls.lock().unwrap().push(image.file_name.clone());
            if let Some(gate) = self.gates.get(&image.file_name) {
                let _permit = gate.acquire().await.unwrap();
            }
            let faces = self.faces.get(&image.file_name).cloned().unwrap_or_default();
            Ok(DetectResponse::new(image.width, image.height, faces))
        }

        async fn recognize(
            &self,
            base_url: &str,
            embedding: &Embedding,
        ) -> Result<RecognizeResponse, ApiError> {
            self.recognize_calls
                .lock()
                .unwrap()
                .push((base_url.to_string(), embedding.clone()));
            if self.failing_recognize {
                return Err(ApiError::UnexpectedStatus {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: "index offline".into(),
                });
            }
            Ok(RecognizeResponse::new(vec![ActorMatch {
                names: vec![ActorName { en: Some("Match".into()), ..Default::default() }],
                similarity: 0.873,
                face_image_url: None,
            }]))
        }
    }

    #[tokio::test]
    async fn test_pipeline_auto_selects_first_female() {
        let backend = Arc::new(FakeBackend::default().with_faces(
            "face_two.jpg",
            vec![face(Sex::Male, 0.0), face(Sex::Female, 1.0)],
        ));
        let mut controller = Controller::new(Arc::clone(&backend), "http://localhost:8001");

        assert!(controller.open("face_two.jpg", "image/jpeg", jpeg(80, 60)).unwrap());
        controller.settle().await;

        let session = controller.session();
        assert_eq!(session.selected_face(), Some(1));
        assert_eq!(
            backend.recognize_log(),
            vec![("http://localhost:8001".to_string(), Embedding::Vector(vec![1.0]))]
        );
        let Some(RecognitionStatus::Resolved(recognition)) = session.selected_recognition() else {
            panic!("recognition should be resolved");
        };
        assert_eq!(recognition.actors[0].similarity, 0.873);
    }

    #[tokio::test]
    async fn test_non_jpeg_makes_no_request() {
        let backend = Arc::new(FakeBackend::default());
        let mut controller = Controller::new(Arc::clone(&backend), "http://localhost:8001");

        assert!(!controller.open("face.png", "image/png", jpeg(8, 8)).unwrap());
        assert!(!controller.open("notes.txt", "text/plain", b"hi".to_vec()).unwrap());
        assert_eq!(controller.in_flight(), 0);
        controller.settle().await;

        assert!(controller.session().image().is_none());
        assert_eq!(backend.detect_count(), 0);
    }

    #[tokio::test]
    async fn test_no_female_no_recognize() {
        let backend = Arc::new(
            FakeBackend::default().with_faces("men.jpg", vec![face(Sex::Male, 0.0)]),
        );
        let mut controller = Controller::new(Arc::clone(&backend), "http://b");
        controller.open("men.jpg", "image/jpeg", jpeg(8, 8)).unwrap();
        controller.settle().await;

        assert_eq!(controller.session().selected_face(), None);
        assert!(backend.recognize_log().is_empty());
    }

    #[tokio::test]
    async fn test_reselect_issues_one_recognize() {
        let backend = Arc::new(FakeBackend::default().with_faces(
            "pair.jpg",
            vec![face(Sex::Male, 0.0), face(Sex::Male, 1.0)],
        ));
        let mut controller = Controller::new(Arc::clone(&backend), "http://b");
        controller.open("pair.jpg", "image/jpeg", jpeg(8, 8)).unwrap();
        controller.settle().await;

        controller.select(0);
        controller.select(0);
        controller.settle().await;
        controller.select(1);
        controller.select(0);
        controller.settle().await;

        let targets: Vec<Embedding> = backend.recognize_log().into_iter().map(|(_, e)| e).collect();
        assert_eq!(
            targets,
            vec![Embedding::Vector(vec![0.0]), Embedding::Vector(vec![1.0])]
        );
    }

    #[tokio::test]
    async fn test_stale_detection_discarded() {
        let (fake, gate) = FakeBackend::default()
            .with_faces("a.jpg", vec![face(Sex::Female, 10.0)])
            .with_faces("b.jpg", vec![face(Sex::Male, 20.0), face(Sex::Female, 21.0)])
            .with_gate("a.jpg");
        let backend = Arc::new(fake);
        let mut controller = Controller::new(Arc::clone(&backend), "http://b");

        controller.open("a.jpg", "image/jpeg", jpeg(8, 8)).unwrap();
        controller.open("b.jpg", "image/jpeg", jpeg(8, 8)).unwrap();

        // B's detection, then B's recognition. A is still held.
        assert!(controller.next_completion().await);
        assert!(controller.next_completion().await);
        assert_eq!(controller.in_flight(), 1);

        gate.add_permits(1);
        controller.settle().await;

        let session = controller.session();
        assert_eq!(session.image().unwrap().file_name, "b.jpg");
        assert_eq!(session.detection().unwrap().faces().len(), 2);
        assert_eq!(session.selected_face(), Some(1));
        assert!(matches!(session.selected_recognition(), Some(RecognitionStatus::Resolved(_))));
        assert_eq!(
            backend.recognize_log(),
            vec![("http://b".to_string(), Embedding::Vector(vec![21.0]))]
        );
    }

    #[tokio::test]
    async fn test_backend_url_captured_at_open() {
        let backend = Arc::new(
            FakeBackend::default().with_faces("f.jpg", vec![face(Sex::Male, 0.0)]),
        );
        let mut controller = Controller::new(Arc::clone(&backend), "http://first");
        controller.open("f.jpg", "image/jpeg", jpeg(8, 8)).unwrap();
        controller.settle().await;

        controller.set_backend_url("http://second");
        controller.select(0);
        controller.settle().await;

        assert_eq!(backend.recognize_log()[0].0, "http://first");
        assert_eq!(controller.backend_url(), "http://second");
    }

    #[tokio::test]
    async fn test_recognize_failure_leaves_visible_state() {
        let backend = Arc::new(FakeBackend {
            failing_recognize: true,
            ..FakeBackend::default().with_faces("f.jpg", vec![face(Sex::Female, 0.0)])
        });
        let mut controller = Controller::new(Arc::clone(&backend), "http://b");
        controller.open("f.jpg", "image/jpeg", jpeg(8, 8)).unwrap();
        controller.settle().await;

        assert!(matches!(
            controller.session().selected_recognition(),
            Some(RecognitionStatus::Failed(reason)) if reason.contains("index offline")
        ));
        assert!(matches!(
            controller.session().detection_status(),
            Some(DetectionStatus::Ready(_))
        ));
    }

    #[tokio::test]
    async fn test_undecodable_jpeg_leaves_session_unchanged() {
        let backend = Arc::new(FakeBackend::default().with_faces(
            "face_two.jpg",
            vec![face(Sex::Male, 0.0), face(Sex::Female, 1.0)],
        ));
        let mut controller = Controller::new(Arc::clone(&backend), "http://localhost:8001");
        assert!(controller.open("face_two.jpg", "image/jpeg", jpeg(80, 60)).unwrap());
        controller.settle().await;

        let before_id = controller.session().image().unwrap().id;
        let before_selected = controller.session().selected_face();
        let before_recognition = controller.session().selected_recognition().cloned();

        let err = controller
            .open("broken.jpg", "image/jpeg", b"not a jpeg at all".to_vec())
            .unwrap_err();
        assert!(matches!(err, ControllerError::Intake(_)), "got {err:?}");

        assert_eq!(controller.in_flight(), 0);
        assert_eq!(backend.detect_count(), 1);
        assert_eq!(backend.recognize_log().len(), 1);
        let session = controller.session();
        assert_eq!(session.image().unwrap().id, before_id);
        assert_eq!(session.image().unwrap().file_name, "face_two.jpg");
        assert!(matches!(session.detection_status(), Some(DetectionStatus::Ready(_))));
        assert_eq!(session.detection().unwrap().faces().len(), 2);
        assert_eq!(session.selected_face(), before_selected);
        assert_eq!(session.selected_recognition().cloned(), before_recognition);
        assert!(matches!(before_recognition, Some(RecognitionStatus::Resolved(_))));
    }

    #[tokio::test]
    async fn test_open_path_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("face_two.jpg");
        let png = dir.path().join("face_two.png");
        std::fs::write(&jpg, jpeg(16, 12)).unwrap();
        std::fs::write(&png, jpeg(16, 12)).unwrap();

        let backend = Arc::new(FakeBackend::default());
        let mut controller = Controller::new(Arc::clone(&backend), "http://b");

        assert!(!controller.open_path(&png).await.unwrap());
        assert!(controller.open_path(&jpg).await.unwrap());
        let image = controller.session().image().unwrap();
        assert_eq!(image.file_name, "face_two.jpg");
        assert_eq!((image.width, image.height), (16, 12));

        let missing = controller.open_path(&dir.path().join("missing.jpg")).await;
        assert!(matches!(missing, Err(ControllerError::Read { .. })));
    }
}
