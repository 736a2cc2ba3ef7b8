use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Result};
use candle_core::Device;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use newsrag_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{load_tokenizer, tokenize_texts};
use crate::weights::{load_var_builder, read_config};

const BATCH_SIZE: usize = 16;

/// BGE-M3 style dense embedder: XLM-RoBERTa encoder, masked mean pooling,
/// L2 normalization.
pub struct LocalEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
}

impl LocalEmbedder {
    /// Expects `tokenizer.json`, `config.json` and weights in `model_dir`.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        if !model_dir.exists() {
            return Err(anyhow!("Embedding model directory {} does not exist", model_dir.display()));
        }
        let started = Instant::now();
        let device = select_device();
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let config: XLMRobertaConfig = read_config(model_dir)?;
        let dim = config.hidden_size;
        let vb = load_var_builder(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(
            model_dir = %model_dir.display(),
            dim,
            elapsed_ms = newsrag_core::timing::elapsed_ms(started),
            "embedding model loaded"
        );
        Ok(Self { model, tokenizer, device, dim, max_len })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_texts(&self.tokenizer, texts, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

impl Embedder for LocalEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let started = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            out.extend(self.embed_chunk(chunk)?);
        }
        debug!(texts = texts.len(), elapsed_ms = newsrag_core::timing::elapsed_ms(started), "embedded batch");
        Ok(out)
    }
}
