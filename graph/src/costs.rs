//! Turns per-edge boundary probabilities into signed multicut costs.
//!
//! Sign convention: positive cost favors merging the two regions, negative
//! cost favors keeping them separate. A probability near 1 means "likely a
//! real boundary" and therefore maps to a negative, repulsive cost.

use common::EPSILON;

/// Log-odds transform: `log((1 - p) / p) + log((1 - beta) / beta)`.
///
/// `beta` is the boundary bias: 0.5 is neutral, smaller values shift the
/// balance towards splitting.
pub fn probs_to_costs(probabilities: &[f64], beta: f64) -> Vec<f64> {
    assert!(beta > 0.0 && beta < 1.0, "beta must be in (0, 1)");
    let bias = ((1.0 - beta) / beta).ln();
    probabilities
        .iter()
        .map(|&p| {
            let p = p.clamp(EPSILON, 1.0 - EPSILON);
            ((1.0 - p) / p).ln() + bias
        })
        .collect()
}

/// Like [`probs_to_costs`], additionally scaling each cost by its edge size
/// relative to the largest edge, so long boundaries weigh more.
pub fn probs_to_costs_weighted(
    probabilities: &[f64],
    beta: f64,
    edge_sizes: &[f64],
) -> Vec<f64> {
    assert_eq!(
        probabilities.len(),
        edge_sizes.len(),
        "one edge size per probability"
    );
    let max_size = edge_sizes.iter().copied().fold(f64::MIN, f64::max);
    let costs = probs_to_costs(probabilities, beta);
    if max_size <= 0.0 {
        return costs;
    }
    costs
        .iter()
        .zip(edge_sizes)
        .map(|(&cost, &size)| cost * (size / max_size))
        .collect()
}
