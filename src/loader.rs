//! One-time model loading.
//!
//! A [`ModelStore`] is built once at startup and handed to every request by
//! reference. The first successful [`ModelStore::ensure_loaded`] reads the
//! classifier artifact and label mapping from disk; every later call returns
//! the same shared [`LoadedModel`] without I/O.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use tracing::{info, warn};

use crate::activation::activation::ActivationFunction;
use crate::classifier::Classifier;
use crate::error::{ServeError, ServeResult};
use crate::labels::LabelMapping;
use crate::network::{InputType, Network};
use crate::preprocess::{INPUT_LEN, INPUT_SIZE};

/// A classifier paired with the labels for its outputs.
pub struct LoadedModel {
    classifier: Box<dyn Classifier>,
    labels: LabelMapping,
}

impl LoadedModel {
    /// Pairs a classifier with its label mapping.
    ///
    /// Fails if the classifier does not take a 160×160 RGB image or if its
    /// output width differs from the number of labels.
    pub fn new(classifier: impl Classifier + 'static, labels: LabelMapping) -> ServeResult<LoadedModel> {
        if classifier.input_len() != INPUT_LEN {
            return Err(ServeError::ModelLoad(format!(
                "classifier takes {} inputs, expected {} ({}x{}x3)",
                classifier.input_len(), INPUT_LEN, INPUT_SIZE, INPUT_SIZE
            )));
        }
        if classifier.output_len() != labels.len() {
            return Err(ServeError::ModelLoad(format!(
                "classifier has {} outputs but the label mapping has {} entries",
                classifier.output_len(), labels.len()
            )));
        }
        Ok(LoadedModel { classifier: Box::new(classifier), labels })
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }
}

/// Filesystem locations of the two artifacts.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub model: PathBuf,
    pub labels: PathBuf,
}

/// Process-wide owner of the loaded model.
pub struct ModelStore {
    paths: Option<ModelPaths>,
    loaded: OnceLock<Arc<LoadedModel>>,
    // Serializes the slow path so concurrent first callers load only once.
    load_lock: Mutex<()>,
    loads: AtomicUsize,
}

impl ModelStore {
    /// A store that loads lazily from `model_path` and `labels_path`.
    pub fn new(model_path: impl Into<PathBuf>, labels_path: impl Into<PathBuf>) -> ModelStore {
        ModelStore {
            paths: Some(ModelPaths { model: model_path.into(), labels: labels_path.into() }),
            loaded: OnceLock::new(),
            load_lock: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    /// A store that already holds `model` and never touches the filesystem.
    pub fn preloaded(model: LoadedModel) -> ModelStore {
        let loaded = OnceLock::new();
        let _ = loaded.set(Arc::new(model));
        ModelStore {
            paths: None,
            loaded,
            load_lock: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn paths(&self) -> Option<&ModelPaths> {
        self.paths.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Number of disk loads performed so far (0 or 1 once loaded).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    /// Returns the loaded model, reading it from disk on first use.
    ///
    /// A failed load is not remembered; the next call tries again.
    pub fn ensure_loaded(&self) -> ServeResult<Arc<LoadedModel>> {
        if let Some(model) = self.loaded.get() {
            return Ok(Arc::clone(model));
        }

        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = self.loaded.get() {
            return Ok(Arc::clone(model));
        }

        let paths = self.paths.as_ref()
            .ok_or_else(|| ServeError::ModelLoad("no model paths configured".into()))?;
        let model = match load_from_disk(&paths.model, &paths.labels) {
            Ok(m) => Arc::new(m),
            Err(e) => {
                warn!(error = %e, "model load failed");
                return Err(e);
            }
        };
        self.loads.fetch_add(1, Ordering::AcqRel);
        let _ = self.loaded.set(Arc::clone(&model));
        Ok(model)
    }
}

fn load_from_disk(model_path: &Path, labels_path: &Path) -> ServeResult<LoadedModel> {
    let started = Instant::now();
    info!(path = %model_path.display(), "loading classifier artifact");
    let network = Network::load_json(model_path)?;

    // Confidences are served as-is, so the head must already be a distribution.
    let head = network.layers.last().map(|l| &l.activator);
    if head != Some(&ActivationFunction::Softmax) {
        return Err(ServeError::ModelLoad(format!(
            "output layer must use Softmax, found {:?}",
            head
        )));
    }

    if let Some(declared) = network.metadata.as_ref().and_then(|m| m.input_type.as_ref()) {
        let expected = InputType::ImageRgb { width: INPUT_SIZE, height: INPUT_SIZE };
        if *declared != expected {
            return Err(ServeError::ModelLoad(format!(
                "model declares input {:?}, expected {:?}",
                declared, expected
            )));
        }
    }

    info!(path = %labels_path.display(), "loading class mapping");
    let labels = LabelMapping::load_json(labels_path)?;

    let layers = network.layers.len();
    let model = LoadedModel::new(network, labels)?;
    info!(
        classes = model.labels().len(),
        layers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "model loaded"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::dense::Layer;
    use crate::math::matrix::Matrix;
    use crate::network::ModelMetadata;

    fn softmax_net(classes: usize) -> Network {
        Network {
            layers: vec![Layer::from_parts(
                Matrix::zeros(INPUT_LEN, classes),
                Matrix::zeros(1, classes),
                ActivationFunction::Softmax,
            )],
            metadata: None,
        }
    }

    fn write_artifacts(dir: &Path, net: &Network, labels: &str) -> (PathBuf, PathBuf) {
        let model = dir.join("model.json");
        let mapping = dir.join("class_mapping.json");
        net.save_json(&model).unwrap();
        std::fs::write(&mapping, labels).unwrap();
        (model, mapping)
    }

    #[test]
    fn loads_once_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let (m, l) = write_artifacts(dir.path(), &softmax_net(2), r#"{"0":"oak","1":"pine"}"#);
        let store = ModelStore::new(m, l);
        assert!(!store.is_loaded());

        let first = store.ensure_loaded().unwrap();
        let second = store.ensure_loaded().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.load_count(), 1);
        assert!(store.is_loaded());
    }

    #[test]
    fn cached_model_survives_file_removal() {
        let dir = tempfile::tempdir().unwrap();
        let (m, l) = write_artifacts(dir.path(), &softmax_net(2), r#"{"0":"oak","1":"pine"}"#);
        let store = ModelStore::new(&m, &l);
        store.ensure_loaded().unwrap();
        std::fs::remove_file(&m).unwrap();
        std::fs::remove_file(&l).unwrap();
        assert!(store.ensure_loaded().is_ok());
    }

    #[test]
    fn concurrent_first_calls_load_once() {
        let dir = tempfile::tempdir().unwrap();
        let (m, l) = write_artifacts(dir.path(), &softmax_net(3), r#"{"0":"a","1":"b","2":"c"}"#);
        let store = Arc::new(ModelStore::new(m, l));

        let handles: Vec<_> = (0..8).map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.ensure_loaded().unwrap())
        }).collect();
        let models: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(store.load_count(), 1);
        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn missing_model_fails_then_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.json");
        let mapping = dir.path().join("class_mapping.json");
        std::fs::write(&mapping, r#"{"0":"oak"}"#).unwrap();
        let store = ModelStore::new(&model, &mapping);

        assert!(matches!(store.ensure_loaded(), Err(ServeError::ModelLoad(_))));
        assert!(!store.is_loaded());

        softmax_net(1).save_json(&model).unwrap();
        assert!(store.ensure_loaded().is_ok());
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn label_count_must_match_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let (m, l) = write_artifacts(dir.path(), &softmax_net(3), r#"{"0":"oak","1":"pine"}"#);
        let err = ModelStore::new(m, l).ensure_loaded().err().unwrap();
        assert!(err.to_string().contains("3 outputs"), "{err}");
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let net = Network {
            layers: vec![Layer::from_parts(Matrix::zeros(10, 1), Matrix::zeros(1, 1), ActivationFunction::Softmax)],
            metadata: None,
        };
        let (m, l) = write_artifacts(dir.path(), &net, r#"{"0":"oak"}"#);
        assert!(matches!(ModelStore::new(m, l).ensure_loaded(), Err(ServeError::ModelLoad(_))));
    }

    #[test]
    fn declared_grayscale_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let net = softmax_net(1).with_metadata(ModelMetadata {
            input_type: Some(InputType::ImageGrayscale { width: 160, height: 160 }),
            ..Default::default()
        });
        let (m, l) = write_artifacts(dir.path(), &net, r#"{"0":"oak"}"#);
        assert!(matches!(ModelStore::new(m, l).ensure_loaded(), Err(ServeError::ModelLoad(_))));
    }

    #[test]
    fn non_softmax_head_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let net = Network {
            layers: vec![Layer::from_parts(
                Matrix::zeros(INPUT_LEN, 3),
                Matrix::from_data(vec![vec![5.0, 5.0, 5.0]]),
                ActivationFunction::Sigmoid,
            )],
            metadata: None,
        };
        let (m, l) = write_artifacts(dir.path(), &net, r#"{"0":"oak","1":"pine","2":"maple"}"#);
        let store = ModelStore::new(m, l);
        let err = store.ensure_loaded().err().unwrap();
        assert!(matches!(err, ServeError::ModelLoad(_)));
        assert!(err.to_string().contains("Softmax"), "{err}");
        assert!(!store.is_loaded());
    }

    #[test]
    fn preloaded_store_never_reads_disk() {
        let labels = LabelMapping::from_names(["oak"]).unwrap();
        let store = ModelStore::preloaded(LoadedModel::new(softmax_net(1), labels).unwrap());
        assert!(store.is_loaded());
        assert!(store.ensure_loaded().is_ok());
        assert_eq!(store.load_count(), 0);
    }
}
