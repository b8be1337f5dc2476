use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::error::{ServeError, ServeResult};

/// Index → class-name lookup produced at training time.
///
/// On disk this is a JSON object keyed by stringified indices:
/// `{"0": "oak", "1": "pine", "2": "maple"}`. Keys must cover `0..N`
/// with no gaps, so the mapping is stored as a dense `Vec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelMapping {
    names: Vec<String>,
}

impl LabelMapping {
    /// Builds a mapping whose class `i` is `names[i]`.
    pub fn from_names<I, S>(names: I) -> ServeResult<LabelMapping>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ServeError::ModelLoad("label mapping is empty".into()));
        }
        if let Some(i) = names.iter().position(|n| n.trim().is_empty()) {
            return Err(ServeError::ModelLoad(format!("label {} has an empty name", i)));
        }
        Ok(LabelMapping { names })
    }

    /// Parses the side-car JSON object.
    pub fn from_json_str(json: &str) -> ServeResult<LabelMapping> {
        let raw: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| ServeError::ModelLoad(format!("malformed label mapping: {}", e)))?;

        let mut slots: Vec<Option<String>> = vec![None; raw.len()];
        for (key, name) in raw {
            let index = parse_index(&key)
                .ok_or_else(|| ServeError::ModelLoad(format!("label key {:?} is not a class index", key)))?;
            match slots.get_mut(index) {
                Some(slot) => *slot = Some(name),
                None => {
                    return Err(ServeError::ModelLoad(format!(
                        "label index {} is out of range for {} classes (indices must be contiguous from 0)",
                        index, slots.len()
                    )))
                }
            }
        }
        // Every key is distinct and in range, so every slot is filled.
        LabelMapping::from_names(slots.into_iter().flatten())
    }

    pub fn load_json(path: impl AsRef<Path>) -> ServeResult<LabelMapping> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ServeError::ModelLoad(format!("cannot read {}: {}", path.display(), e)))?;
        LabelMapping::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Accepts only the canonical decimal form (`"7"`, not `"07"` or `"+7"`).
fn parse_index(key: &str) -> Option<usize> {
    let index: usize = key.parse().ok()?;
    (index.to_string() == key).then_some(index)
}
