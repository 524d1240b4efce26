use std::path::Path;

use super::preprocess::{preprocess_image, ImageTensor};
use super::{ClassificationError, ClassificationResult};
use crate::config::TriageConfig;

/// Anything that can turn an image file into a label + confidence.
///
/// The orchestrator depends on this seam only, so tests can count calls.
pub trait ImageClassifier {
    fn classify(&self, image_path: &Path) -> Result<ClassificationResult, ClassificationError>;
}

/// The network behind the worker: standardized tensor in, P(PNEUMONIA) out.
pub trait ClassificationModel {
    fn predict(&self, input: &ImageTensor) -> Result<f64, ClassificationError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Preprocessing + model. Decode failures never reach the model.
pub struct ClassificationWorker {
    model: Box<dyn ClassificationModel + Send + Sync>,
}

impl ClassificationWorker {
    pub fn new(model: Box<dyn ClassificationModel + Send + Sync>) -> Self {
        Self { model }
    }

    pub fn model_description(&self) -> String {
        self.model.describe()
    }
}

impl ImageClassifier for ClassificationWorker {
    fn classify(&self, image_path: &Path) -> Result<ClassificationResult, ClassificationError> {
        let tensor = preprocess_image(image_path)?;
        let confidence = self.model.predict(&tensor)?;

        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(ClassificationError::Inference(format!(
                "model returned {confidence}, expected a probability"
            )));
        }

        let result = ClassificationResult::from_probability(confidence);
        tracing::info!(
            path = %image_path.display(),
            label = %result.label,
            confidence,
            "Image classified"
        );
        Ok(result)
    }
}

/// Build the production worker from configuration.
///
/// A missing artifact does not fail startup: the worker answers every
/// request with `ModelUnavailable` instead.
#[cfg(feature = "onnx-classifier")]
pub fn build_classifier(config: &TriageConfig) -> ClassificationWorker {
    match onnx::OnnxModel::load(&config.model_path) {
        Ok(model) => ClassificationWorker::new(Box::new(model)),
        Err(e) => {
            tracing::warn!(error = %e, "Classifier model not loaded");
            ClassificationWorker::new(Box::new(UnavailableModel::new(e.to_string())))
        }
    }
}

/// Build the production worker from configuration.
///
/// Without the ONNX backend every request answers `ModelUnavailable`.
#[cfg(not(feature = "onnx-classifier"))]
pub fn build_classifier(config: &TriageConfig) -> ClassificationWorker {
    tracing::warn!(
        model_path = %config.model_path.display(),
        "Built without the onnx-classifier feature; classification disabled"
    );
    ClassificationWorker::new(Box::new(UnavailableModel::new(
        "built without the onnx-classifier feature",
    )))
}

/// Stand-in used when no model could be loaded.
pub struct UnavailableModel {
    reason: String,
}

impl UnavailableModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ClassificationModel for UnavailableModel {
    fn predict(&self, _input: &ImageTensor) -> Result<f64, ClassificationError> {
        Err(ClassificationError::ModelUnavailable(self.reason.clone()))
    }

    fn describe(&self) -> String {
        format!("unavailable ({})", self.reason)
    }
}

/// Fixed-output model for demos and tests. Produces the same probability
/// for every image.
pub struct StaticModel {
    confidence: f64,
}

impl StaticModel {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }
}

impl ClassificationModel for StaticModel {
    fn predict(&self, input: &ImageTensor) -> Result<f64, ClassificationError> {
        if input.is_empty() {
            return Err(ClassificationError::Inference("empty input tensor".into()));
        }
        Ok(self.confidence)
    }

    fn describe(&self) -> String {
        format!("static ({:.3})", self.confidence)
    }
}

// ═══════════════════════════════════════════════════════════
// ONNX backend (`onnx-classifier` feature)
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-classifier")]
mod onnx {
    use super::{ClassificationError, ClassificationModel, ImageTensor};
    use ort::session::Session;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Binary chest X-ray classifier exported to ONNX.
    ///
    /// Input `[1, 224, 224, 3]` float32, output `[1, 1]` sigmoid probability.
    /// Uses interior mutability (Mutex) because ort::Session::run requires `&mut self`.
    pub struct OnnxModel {
        session: Mutex<Session>,
        path: PathBuf,
    }

    impl OnnxModel {
        pub fn load(model_path: &Path) -> Result<Self, ClassificationError> {
            if !model_path.is_file() {
                return Err(ClassificationError::ModelUnavailable(format!(
                    "model artifact not found at {}",
                    model_path.display()
                )));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| ClassificationError::ModelUnavailable(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| ClassificationError::ModelUnavailable(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e: ort::Error| {
                    ClassificationError::ModelUnavailable(format!("ONNX load failed: {e}"))
                })?;

            tracing::info!("ONNX classifier loaded from {}", model_path.display());

            Ok(Self {
                session: Mutex::new(session),
                path: model_path.to_path_buf(),
            })
        }
    }

    impl ClassificationModel for OnnxModel {
        fn predict(&self, input: &ImageTensor) -> Result<f64, ClassificationError> {
            use ort::value::TensorRef;

            let [n, h, w, c] = input.shape;
            let array = ndarray::Array4::from_shape_vec((n, h, w, c), input.data.clone())
                .map_err(|e| ClassificationError::Inference(e.to_string()))?;
            let tensor = TensorRef::from_array_view(&array)
                .map_err(|e| ClassificationError::Inference(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| ClassificationError::ModelUnavailable("session lock poisoned".into()))?;

            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| ClassificationError::Inference(format!("ONNX inference failed: {e}")))?;

            let (_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| ClassificationError::Inference(format!("Output extraction: {e}")))?;

            data.first()
                .map(|&p| p as f64)
                .ok_or_else(|| ClassificationError::Inference("empty model output".into()))
        }

        fn describe(&self) -> String {
            format!("onnx ({})", self.path.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Classification;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingModel {
        calls: Arc<AtomicUsize>,
        output: f64,
    }

    impl ClassificationModel for CountingModel {
        fn predict(&self, _input: &ImageTensor) -> Result<f64, ClassificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output)
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    fn write_scan(dir: &Path) -> PathBuf {
        let path = dir.join("chest.png");
        RgbImage::from_fn(96, 96, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, 90]))
            .save(&path)
            .unwrap();
        path
    }

    fn counting_worker(output: f64) -> (ClassificationWorker, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let worker = ClassificationWorker::new(Box::new(CountingModel {
            calls: calls.clone(),
            output,
        }));
        (worker, calls)
    }

    #[test]
    fn classifies_with_model_probability() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scan(dir.path());
        let worker = ClassificationWorker::new(Box::new(StaticModel::new(0.82)));
        let result = worker.classify(&path).unwrap();
        assert_eq!(result.label, Classification::Pneumonia);
        assert!((result.confidence - 0.82).abs() < 1e-12);
    }

    #[test]
    fn missing_image_never_reaches_model() {
        let (worker, calls) = counting_worker(0.9);
        let err = worker.classify(Path::new("/nope/chest.png")).unwrap_err();
        assert!(matches!(err, ClassificationError::ImageNotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn undecodable_image_never_reaches_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0x00, 0x01]).unwrap();
        let (worker, calls) = counting_worker(0.9);
        let err = worker.classify(&path).unwrap_err();
        assert!(matches!(err, ClassificationError::ImageDecode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unavailable_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scan(dir.path());
        let worker = ClassificationWorker::new(Box::new(UnavailableModel::new("no artifact")));
        let err = worker.classify(&path).unwrap_err();
        assert!(matches!(err, ClassificationError::ModelUnavailable(_)));
    }

    #[test]
    fn out_of_range_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scan(dir.path());
        let (worker, calls) = counting_worker(1.7);
        let err = worker.classify(&path).unwrap_err();
        assert!(matches!(err, ClassificationError::Inference(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[cfg(not(feature = "onnx-classifier"))]
    #[test]
    fn default_build_has_no_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = TriageConfig::with_data_dir(dir.path());
        let worker = build_classifier(&config);
        assert!(worker.model_description().starts_with("unavailable"));
    }
}
