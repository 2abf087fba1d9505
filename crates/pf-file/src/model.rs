//! Neural amp model files

use std::path::Path;
use std::sync::Arc;

use pf_dsp::neural::{LstmModel, LstmModelFile};

use crate::error::{FileError, FileResult};

/// Parse and validate an LSTM weights file
pub fn load_lstm_model<P: AsRef<Path>>(path: P) -> FileResult<Arc<LstmModel>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FileError::NotFound(path.display().to_string()));
    }
    let json = std::fs::read_to_string(path)?;
    let model = parse_lstm_model(&json).inspect_err(|e| {
        log::warn!("Rejected model {}: {e}", path.display());
    })?;
    log::info!(
        "Loaded model '{}' from {} (hidden {}, inputs {})",
        model.name(),
        path.display(),
        model.hidden_size(),
        model.input_size()
    );
    Ok(model)
}

/// Parse weights from a JSON string
pub fn parse_lstm_model(json: &str) -> FileResult<Arc<LstmModel>> {
    let file: LstmModelFile = serde_json::from_str(json)?;
    let model = LstmModel::from_file(file)?;
    Ok(Arc::new(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_model() {
        let json = r#"{
            "input_size": 1,
            "hidden_size": 1,
            "weight_ih": [[0.1], [0.2], [0.3], [0.4]],
            "weight_hh": [[0.0], [0.0], [0.0], [0.0]],
            "bias": [0.0, 0.0, 0.0, 0.0],
            "dense_weight": [1.0]
        }"#;
        let model = parse_lstm_model(json).unwrap();
        assert_eq!(model.hidden_size(), 1);
        assert_eq!(model.sample_rate(), 0.0);
    }

    #[test]
    fn test_shape_errors_surface_as_model_error() {
        let json = r#"{
            "input_size": 1,
            "hidden_size": 2,
            "weight_ih": [[0.1]],
            "weight_hh": [[0.0, 0.0]],
            "bias": [0.0],
            "dense_weight": [1.0, 1.0]
        }"#;
        assert!(matches!(parse_lstm_model(json), Err(FileError::Model(_))));
        assert!(matches!(parse_lstm_model("[]"), Err(FileError::JsonError(_))));
    }
}
