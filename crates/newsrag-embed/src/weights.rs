use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use tracing::debug;

/// Loads `model.safetensors` when present, else `pytorch_model.bin`.
pub fn load_var_builder(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let pickle = model_dir.join("pytorch_model.bin");
    let weights: HashMap<String, Tensor> = if safetensors.exists() {
        debug!(path = %safetensors.display(), "loading safetensors weights");
        candle_core::safetensors::load(&safetensors, device)?
    } else if pickle.exists() {
        debug!(path = %pickle.display(), "loading pickle weights");
        candle_core::pickle::read_all(&pickle)?.into_iter().collect()
    } else {
        return Err(anyhow!("No model weights found in {}", model_dir.display()));
    };
    Ok(VarBuilder::from_tensors(weights, DType::F32, device))
}

pub fn read_config<T: serde::de::DeserializeOwned>(model_dir: &Path) -> Result<T> {
    let path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&raw)?)
}
