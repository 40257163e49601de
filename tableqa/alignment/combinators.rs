/// Average of both directions of a directional score.
///
/// `symmetric(f, a, b) == symmetric(f, b, a)` exactly, since the two terms are
/// the same pair of floats added in either order.
pub fn symmetric<F>(score: F, a: &str, b: &str) -> f64
where
    F: Fn(&str, &str) -> f64,
{
    (score(a, b) + score(b, a)) / 2.0
}

/// Best score of `a` against any candidate; `None` when there are no candidates.
pub fn max_over<F, S>(score: F, a: &str, candidates: &[S]) -> Option<f64>
where
    F: Fn(&str, &str) -> f64,
    S: AsRef<str>,
{
    candidates
        .iter()
        .map(|candidate| score(a, candidate.as_ref()))
        .reduce(f64::max)
}
