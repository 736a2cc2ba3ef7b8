//! Cross-encoder reranking model.
//!
//! XLM-RoBERTa with a single-logit classification head (bge-reranker
//! family). Relevance is the sigmoid of the logit, so scores fall in
//! `(0, 1)` and compare across queries.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Result};
use candle_core::Device;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaForSequenceClassification};
use tokenizers::Tokenizer;
use tracing::info;

use newsrag_core::traits::{CrossEncoder, CrossEncoderLoader};

use crate::device::select_device;
use crate::tokenize::{load_tokenizer, tokenize_pairs};
use crate::weights::{load_var_builder, read_config};

pub struct CandleCrossEncoder {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
}

impl CandleCrossEncoder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        if !model_dir.exists() {
            return Err(anyhow!("Reranker model directory {} does not exist", model_dir.display()));
        }
        let started = Instant::now();
        let device = select_device();
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let config: XLMRobertaConfig = read_config(model_dir)?;
        let vb = load_var_builder(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &config, vb)?;
        info!(
            model_dir = %model_dir.display(),
            elapsed_ms = newsrag_core::timing::elapsed_ms(started),
            "cross-encoder loaded"
        );
        Ok(Self { model, tokenizer, device })
    }
}

impl CrossEncoder for CandleCrossEncoder {
    fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let (input_ids, attention_mask) = tokenize_pairs(&self.tokenizer, pairs, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let logits = self.model.forward(&input_ids, &attention_mask, &token_type_ids)?;
        let scores = candle_nn::ops::sigmoid(&logits)?.flatten_all()?.to_device(&Device::Cpu)?.to_vec1::<f32>()?;
        if scores.len() != pairs.len() {
            return Err(anyhow!("cross-encoder returned {} scores for {} pairs", scores.len(), pairs.len()));
        }
        Ok(scores)
    }
}

/// Loads a [`CandleCrossEncoder`] from a model directory on first use.
pub struct ModelDirLoader {
    model_dir: PathBuf,
    max_len: usize,
}

impl ModelDirLoader {
    pub fn new(model_dir: impl Into<PathBuf>, max_len: usize) -> Self {
        Self { model_dir: model_dir.into(), max_len }
    }
}

impl CrossEncoderLoader for ModelDirLoader {
    fn load(&self) -> Result<Box<dyn CrossEncoder>> {
        Ok(Box::new(CandleCrossEncoder::load(&self.model_dir, self.max_len)?))
    }
}
