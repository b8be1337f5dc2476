use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ServeError, ServeResult};
use crate::labels::LabelMapping;
use crate::loader::{LoadedModel, ModelStore};
use crate::preprocess::{preprocess, ImageTensor};

/// Number of entries in the `top3` view.
pub const TOP_K: usize = 3;

/// Timed-out inference workers allowed to keep running before new requests
/// are refused outright.
pub const MAX_STRAGGLERS: usize = 4;

/// One (label, confidence) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassScore {
    pub class_name: String,
    pub confidence: f64,
}

/// Ranked classifier output for a single image.
///
/// `all_probabilities` is in label-index order; `top3` is the first
/// `min(3, N)` entries of the same pairs sorted by descending confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub class_name: String,
    pub confidence: f64,
    pub top3: Vec<ClassScore>,
    pub all_probabilities: Vec<ClassScore>,
}

impl PredictionResult {
    /// Pairs `probabilities[i]` with label `i` and ranks them.
    ///
    /// Equal confidences keep their index order (the sort is stable).
    pub fn from_probabilities(probabilities: &[f64], labels: &LabelMapping) -> ServeResult<PredictionResult> {
        if probabilities.len() != labels.len() {
            return Err(ServeError::Prediction(format!(
                "classifier returned {} probabilities for {} labels",
                probabilities.len(), labels.len()
            )));
        }
        if let Some(i) = probabilities.iter().position(|p| !p.is_finite()) {
            return Err(ServeError::Prediction(format!(
                "classifier returned a non-finite probability for class {}", i
            )));
        }

        let all_probabilities: Vec<ClassScore> = labels.names().iter()
            .zip(probabilities)
            .map(|(name, &confidence)| ClassScore { class_name: name.clone(), confidence })
            .collect();

        let mut ranked = all_probabilities.clone();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked.truncate(TOP_K);

        let best = ranked.first()
            .cloned()
            .ok_or_else(|| ServeError::Prediction("classifier returned no probabilities".into()))?;

        Ok(PredictionResult {
            class_name: best.class_name,
            confidence: best.confidence,
            top3: ranked,
            all_probabilities,
        })
    }
}

/// Turns uploaded image bytes into a ranked prediction.
pub struct PredictionService {
    store: Arc<ModelStore>,
    timeout: Option<Duration>,
    // Workers whose caller gave up on them but which have not returned yet.
    stragglers: Arc<AtomicUsize>,
    late: Arc<AtomicUsize>,
}

impl PredictionService {
    pub fn new(store: Arc<ModelStore>) -> PredictionService {
        PredictionService {
            store,
            timeout: None,
            stragglers: Arc::new(AtomicUsize::new(0)),
            late: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bounds each inference call; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> PredictionService {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Timed-out inference workers that are still running.
    pub fn stragglers(&self) -> usize {
        self.stragglers.load(Ordering::Acquire)
    }

    /// Timed-out inference workers that have since finished.
    pub fn late_inferences(&self) -> usize {
        self.late.load(Ordering::Acquire)
    }

    /// Decode → RGB → 160×160 → [0, 1] → classify → rank.
    pub fn predict(&self, image_bytes: &[u8]) -> ServeResult<PredictionResult> {
        let started = Instant::now();
        let model = self.store.ensure_loaded()?;
        let tensor = preprocess(image_bytes)?;
        let probabilities = self.run_inference(&model, tensor)?;
        let result = PredictionResult::from_probabilities(&probabilities, model.labels())?;
        debug!(
            class = %result.class_name,
            confidence = result.confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prediction complete"
        );
        Ok(result)
    }

    fn run_inference(&self, model: &Arc<LoadedModel>, tensor: ImageTensor) -> ServeResult<Vec<f64>> {
        let Some(timeout) = self.timeout else {
            return infer_single(model, &tensor);
        };

        let millis = timeout.as_millis() as u64;
        let stranded = self.stragglers.load(Ordering::Acquire);
        if stranded >= MAX_STRAGGLERS {
            warn!(stragglers = stranded, "refusing inference while timed-out workers are still running");
            return Err(ServeError::InferenceTimeout { millis });
        }

        let (tx, rx) = mpsc::channel();
        // Set by whichever side finishes first: the worker with a result or
        // the caller giving up. The loser does the straggler bookkeeping.
        let settled = Arc::new(AtomicBool::new(false));
        let worker_settled = Arc::clone(&settled);
        let worker_model = Arc::clone(model);
        let stragglers = Arc::clone(&self.stragglers);
        let late = Arc::clone(&self.late);
        let started = Instant::now();
        thread::Builder::new()
            .name("inference".into())
            .spawn(move || {
                let _ = tx.send(infer_single(&worker_model, &tensor));
                if worker_settled.swap(true, Ordering::AcqRel) {
                    stragglers.fetch_sub(1, Ordering::AcqRel);
                    late.fetch_add(1, Ordering::AcqRel);
                    warn!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        budget_ms = millis,
                        "inference finished after its caller timed out"
                    );
                }
            })
            .map_err(|e| ServeError::Prediction(format!("cannot start inference worker: {}", e)))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.stragglers.fetch_add(1, Ordering::AcqRel);
                if settled.swap(true, Ordering::AcqRel) {
                    // The worker finished in the meantime; its result is queued.
                    self.stragglers.fetch_sub(1, Ordering::AcqRel);
                    return rx.recv().unwrap_or_else(|_| {
                        Err(ServeError::Prediction("inference worker panicked".into()))
                    });
                }
                Err(ServeError::InferenceTimeout { millis })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(ServeError::Prediction("inference worker panicked".into()))
            }
        }
    }
}

/// Feeds the one image in `tensor` to the classifier; the batch dimension
/// is dropped from the result.
fn infer_single(model: &LoadedModel, tensor: &ImageTensor) -> ServeResult<Vec<f64>> {
    if tensor.batch_size() != 1 {
        return Err(ServeError::Prediction(format!(
            "expected a batch of 1 image, got {}", tensor.batch_size()
        )));
    }
    let sample = tensor.sample(0)
        .ok_or_else(|| ServeError::Prediction("preprocessed tensor is truncated".into()))?;
    model.classifier().classify(sample)
}
