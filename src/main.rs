// Offline classifier: runs one image file through the same pipeline the
// server uses and prints the ranked result.
//
//   cargo run --bin ferrite-classify -- leaf.jpg [--model PATH] [--labels PATH]
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use ferrite_classify::config::{DEFAULT_LABELS_PATH, DEFAULT_MODEL_PATH};
use ferrite_classify::{logging, ModelStore, PredictionService};
use tracing::error;

struct Args {
    image: PathBuf,
    model: PathBuf,
    labels: PathBuf,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut image = None;
    let mut model = PathBuf::from(DEFAULT_MODEL_PATH);
    let mut labels = PathBuf::from(DEFAULT_LABELS_PATH);

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--model" => model = argv.next().ok_or("--model needs a path")?.into(),
            "--labels" => labels = argv.next().ok_or("--labels needs a path")?.into(),
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            path if image.is_none() => image = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument {}", extra)),
        }
    }

    let image = image.ok_or("missing image path")?;
    Ok(Args { image, model, labels })
}

fn main() -> ExitCode {
    logging::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("usage: ferrite-classify <image> [--model PATH] [--labels PATH]");
            return ExitCode::from(2);
        }
    };

    let store = Arc::new(ModelStore::new(&args.model, &args.labels));
    let service = PredictionService::new(Arc::clone(&store));

    let labels = match store.ensure_loaded() {
        Ok(model) => model.labels().names().to_vec(),
        Err(e) => {
            error!(error = %e, "cannot load model");
            return ExitCode::FAILURE;
        }
    };
    println!("Loaded class names: {:?}", labels);

    let bytes = match std::fs::read(&args.image) {
        Ok(b) => b,
        Err(e) => {
            error!(path = %args.image.display(), error = %e, "cannot read image");
            return ExitCode::FAILURE;
        }
    };

    let result = match service.predict(&bytes) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "prediction failed");
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("Top {} predictions", result.top3.len());
    for (rank, score) in result.top3.iter().enumerate() {
        println!("{}. {} - {:.2}% confidence", rank + 1, score.class_name, score.confidence * 100.0);
    }
    println!();
    println!("Best prediction: {}", result.class_name);
    println!("Confidence: {:.2}%", result.confidence * 100.0);
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn image_only_uses_default_paths() {
        let a = args(&["leaf.jpg"]).unwrap();
        assert_eq!(a.image, PathBuf::from("leaf.jpg"));
        assert_eq!(a.model, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(a.labels, PathBuf::from(DEFAULT_LABELS_PATH));
    }

    #[test]
    fn flags_in_any_position() {
        let a = args(&["--model", "m.json", "leaf.jpg", "--labels", "l.json"]).unwrap();
        assert_eq!(a.model, PathBuf::from("m.json"));
        assert_eq!(a.labels, PathBuf::from("l.json"));
        assert_eq!(a.image, PathBuf::from("leaf.jpg"));
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.jpg", "b.jpg"]).is_err());
        assert!(args(&["a.jpg", "--model"]).is_err());
        assert!(args(&["--verbose", "a.jpg"]).is_err());
    }
}
