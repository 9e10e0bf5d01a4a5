//! Greedy CTC decoding of a `[timesteps, vocab]` logit tensor into
//! `(text, confidence)`, per the blank-collapse rules of the recognition
//! model's output.

use speedreader_common::{Result, SpeedReaderError, TensorBuffer};

/// Index 0 is always the CTC blank token.
pub const BLANK_INDEX: usize = 0;

/// Greedy-decodes a `[timesteps, vocab_size]` logit tensor.
///
/// `dictionary` maps 1-based vocabulary indices to characters; index 0 (the
/// blank) is never looked up. Returns the decoded, whitespace-trimmed string
/// and its confidence, the geometric mean of the per-timestep softmax
/// probability of the retained symbols. An all-blank input yields `("", 0)`.
pub fn greedy_decode(logits: &TensorBuffer, dictionary: &[String]) -> Result<(String, f64)> {
    let shape = logits.shape();
    if shape.len() != 2 {
        return Err(SpeedReaderError::preprocessing(format!(
            "CTC decode expects a [timesteps, vocab] tensor, got shape {:?}",
            shape
        )));
    }
    let timesteps = shape[0];
    let vocab_size = shape[1];
    let data = logits.data();

    let mut retained_indices: Vec<usize> = Vec::new();
    let mut retained_probs: Vec<f64> = Vec::new();
    let mut prev_raw_index: Option<usize> = None;

    for t in 0..timesteps {
        let row = &data[t * vocab_size..(t + 1) * vocab_size];
        let (argmax_idx, _) = argmax(row);
        let prob = softmax_prob(row, argmax_idx);

        let is_repeat = prev_raw_index == Some(argmax_idx);
        if argmax_idx != BLANK_INDEX && !is_repeat {
            retained_indices.push(argmax_idx);
            retained_probs.push(prob);
        }
        prev_raw_index = Some(argmax_idx);
    }

    if retained_indices.is_empty() {
        return Ok((String::new(), 0.0));
    }

    let text: String = retained_indices
        .iter()
        .filter_map(|&idx| dictionary.get(idx - 1))
        .map(|s| s.as_str())
        .collect();

    let log_sum: f64 = retained_probs
        .iter()
        .map(|&p| p.max(f64::MIN_POSITIVE).ln())
        .sum();
    let confidence = (log_sum / retained_probs.len() as f64).exp();

    Ok((text.trim().to_string(), confidence))
}

fn argmax(row: &[f32]) -> (usize, f32) {
    let mut best_idx = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = i;
        }
    }
    (best_idx, best_val)
}

fn softmax_prob(row: &[f32], index: usize) -> f64 {
    let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max) as f64;
    let sum: f64 = row.iter().map(|&v| (v as f64 - max).exp()).sum();
    if sum <= 0.0 {
        return 0.0;
    }
    ((row[index] as f64 - max).exp()) / sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn all_blank_yields_empty_zero_confidence() {
        let logits = TensorBuffer::new(
            vec![10.0, 0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0],
            vec![2, 4],
        )
        .unwrap();
        let (text, confidence) = greedy_decode(&logits, &dictionary()).unwrap();
        assert_eq!(text, "");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn collapses_repeats_but_not_across_blank() {
        // vocab = [blank, a, b, c]; sequence: a a blank a b b -> "aab"
        let rows: Vec<[f32; 4]> = vec![
            [0.0, 10.0, 0.0, 0.0], // a
            [0.0, 10.0, 0.0, 0.0], // a (repeat, collapsed)
            [10.0, 0.0, 0.0, 0.0], // blank
            [0.0, 10.0, 0.0, 0.0], // a (kept: blank broke the repeat run)
            [0.0, 0.0, 10.0, 0.0], // b
            [0.0, 0.0, 10.0, 0.0], // b (repeat, collapsed)
        ];
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let logits = TensorBuffer::new(flat, vec![6, 4]).unwrap();
        let (text, confidence) = greedy_decode(&logits, &dictionary()).unwrap();
        assert_eq!(text, "aab");
        assert!(confidence > 0.9);
    }

    #[test]
    fn rejects_non_2d_shape() {
        let logits = TensorBuffer::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2, 1]).unwrap();
        assert!(greedy_decode(&logits, &dictionary()).is_err());
    }
}
