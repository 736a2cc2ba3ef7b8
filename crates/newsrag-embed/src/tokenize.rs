use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer, TruncationParams, TruncationStrategy};

/// XLM-RoBERTa `<pad>` id.
pub const PAD_ID: u32 = 1;

/// Caps every encoding (single text or pair) at `max_len` tokens.
pub fn configure_truncation(tokenizer: &mut Tokenizer, max_len: usize) -> Result<()> {
    let params = TruncationParams {
        max_length: max_len,
        strategy: TruncationStrategy::LongestFirst,
        ..TruncationParams::default()
    };
    tokenizer
        .with_truncation(Some(params))
        .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
    Ok(())
}

pub fn load_tokenizer(path: &std::path::Path, max_len: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    configure_truncation(&mut tokenizer, max_len)?;
    Ok(tokenizer)
}

/// Right-pads id/mask rows to the longest row. Returns flat ids, flat mask
/// and the padded width.
pub fn pad_rows(rows: &[(Vec<u32>, Vec<u32>)]) -> (Vec<u32>, Vec<u32>, usize) {
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0);
    let mut ids = Vec::with_capacity(rows.len() * width);
    let mut mask = Vec::with_capacity(rows.len() * width);
    for (row_ids, row_mask) in rows {
        let pad = width - row_ids.len();
        ids.extend_from_slice(row_ids);
        ids.extend(std::iter::repeat(PAD_ID).take(pad));
        mask.extend_from_slice(row_mask);
        mask.extend(std::iter::repeat(0).take(pad));
    }
    (ids, mask, width)
}

fn to_tensors(encodings: &[Encoding], device: &Device) -> Result<(Tensor, Tensor)> {
    let rows: Vec<(Vec<u32>, Vec<u32>)> = encodings
        .iter()
        .map(|e| (e.get_ids().to_vec(), e.get_attention_mask().to_vec()))
        .collect();
    let (ids, mask, width) = pad_rows(&rows);
    let input_ids = Tensor::from_vec(ids, (rows.len(), width), device)?;
    let attention_mask = Tensor::from_vec(mask, (rows.len(), width), device)?;
    Ok((input_ids, attention_mask))
}

/// `[B, T]` input ids and attention mask for a batch of texts.
pub fn tokenize_texts(tokenizer: &Tokenizer, texts: &[String], device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = texts
        .iter()
        .map(|t| tokenizer.encode(t.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e)))
        .collect::<Result<Vec<_>>>()?;
    to_tensors(&encodings, device)
}

/// `[B, T]` input ids and attention mask for `(query, passage)` pairs.
pub fn tokenize_pairs(tokenizer: &Tokenizer, pairs: &[(String, String)], device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = pairs
        .iter()
        .map(|(q, p)| {
            tokenizer
                .encode((q.as_str(), p.as_str()), true)
                .map_err(|e| anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;
    to_tensors(&encodings, device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_longest() {
        let rows = vec![(vec![0, 5, 2], vec![1, 1, 1]), (vec![0, 2], vec![1, 1])];
        let (ids, mask, width) = pad_rows(&rows);
        assert_eq!(width, 3);
        assert_eq!(ids, vec![0, 5, 2, 0, 2, PAD_ID]);
        assert_eq!(mask, vec![1, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn empty_batch_has_zero_width() {
        let (ids, mask, width) = pad_rows(&[]);
        assert!(ids.is_empty() && mask.is_empty());
        assert_eq!(width, 0);
    }
}
