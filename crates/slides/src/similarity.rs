use std::collections::HashSet;

/// Whitespace-delimited token set. Case and punctuation are kept as-is.
pub fn tokens(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

/// Token overlap normalised by the smaller set, as a percentage.
///
/// `100 * |A ∩ B| / min(|A|, |B|)`; `0.0` when either text has no tokens.
pub fn subset_similarity(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    let overlap = a.intersection(&b).count();
    100.0 * overlap as f64 / smaller as f64
}
