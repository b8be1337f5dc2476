use std::io::Cursor;
use std::sync::Arc;

use ferrite_classify::{
    Classifier, LabelMapping, LoadedModel, ModelStore, PredictionService, ServeResult, ServerConfig,
    INPUT_LEN,
};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

use crate::state::{AppState, SharedState};

pub const BOUNDARY: &str = "----ferriteTestBoundary";

/// Returns the same distribution for every input.
pub struct FixedClassifier(pub Vec<f64>);

impl Classifier for FixedClassifier {
    fn input_len(&self) -> usize {
        INPUT_LEN
    }

    fn output_len(&self) -> usize {
        self.0.len()
    }

    fn classify(&self, _input: &[f64]) -> ServeResult<Vec<f64>> {
        Ok(self.0.clone())
    }
}

struct PanickingClassifier;

impl Classifier for PanickingClassifier {
    fn input_len(&self) -> usize {
        INPUT_LEN
    }

    fn output_len(&self) -> usize {
        1
    }

    fn classify(&self, _input: &[f64]) -> ServeResult<Vec<f64>> {
        panic!("classifier exploded")
    }
}

fn state_for(classifier: impl Classifier + 'static, labels: &[&str]) -> SharedState {
    let labels = LabelMapping::from_names(labels.iter().copied()).unwrap();
    let store = ModelStore::preloaded(LoadedModel::new(classifier, labels).unwrap());
    Arc::new(AppState {
        service: PredictionService::new(Arc::new(store)),
        config: ServerConfig::default(),
    })
}

pub fn state_with_probabilities(probabilities: Vec<f64>, labels: &[&str]) -> SharedState {
    state_for(FixedClassifier(probabilities), labels)
}

pub fn state_with_panicking_classifier() -> SharedState {
    state_for(PanickingClassifier, &["oak"])
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

/// Builds a multipart/form-data body delimited by `BOUNDARY`.
/// Each entry is (field name, filename, bytes); `None` filename makes a text field.
pub fn multipart_body(fields: &[(&str, Option<&str>, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match filename {
            Some(f) => format!("Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n", name, f),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", name),
        };
        body.extend_from_slice(disposition.as_bytes());
        if filename.is_some() {
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
