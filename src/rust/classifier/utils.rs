use ndarray::{Array1, ArrayView1};

/// Softmax over a vector of logits, shifted by the max for numerical stability.
///
/// Positive infinities share all of the mass between them. Callers are
/// expected to reject NaN logits before getting here.
pub fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
    if max == f32::INFINITY {
        let count = logits.iter().filter(|&&x| x == f32::INFINITY).count() as f32;
        return logits.mapv(|x| if x == f32::INFINITY { 1.0 / count } else { 0.0 });
    }
    if max == f32::NEG_INFINITY {
        // empty, or every logit is -inf
        return Array1::from_elem(logits.len(), 1.0 / logits.len().max(1) as f32);
    }
    let exps = logits.mapv(|x| (x - max).exp());
    let sum = exps.sum();
    exps / sum
}

/// Index of the largest value. Ties resolve to the earliest index.
pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate() {
        if value > values[best] {
            best = i;
        }
    }
    best
}
