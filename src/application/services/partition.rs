//! Greedy longest-processing-time balanced number partitioning.
//!
//! Grounded on `cmd_queue/util/util_algo.py::balanced_number_partitioning`
//! (there implemented against a numpy array; reimplemented here with a
//! plain `Vec` and a sort, since there is no numerical-array crate in the
//! dependency stack this domain needs).

/// Greedily distributes `items` (given as `(index, weight)` pairs, weight
/// descending not required — this sorts internally) across `num_parts`
/// bins so the largest bin's total weight is minimized. Returns, for each
/// bin, the original indices assigned to it.
pub fn balanced_number_partitioning(weights: &[f64], num_parts: usize) -> Vec<Vec<usize>> {
    if num_parts == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| weights[b].partial_cmp(&weights[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut bins = vec![Vec::new(); num_parts];
    let mut bin_sums = vec![0.0f64; num_parts];

    for item_index in order {
        let bin_index = bin_sums
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .expect("num_parts > 0");
        bins[bin_index].push(item_index);
        bin_sums[bin_index] += weights[item_index];
    }

    bins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributes_heaviest_items_first() {
        let weights = [1.0, 3.0, 29.0, 22.0, 4.0, 5.0, 9.0];
        let bins = balanced_number_partitioning(&weights, 3);
        assert_eq!(bins.len(), 3);
        let total: usize = bins.iter().map(|b| b.len()).sum();
        assert_eq!(total, weights.len());
        // heaviest item (index 2, weight 29) gets its own bin first
        assert!(bins.iter().any(|b| b.first() == Some(&2)));
    }

    #[test]
    fn single_bin_gets_everything() {
        let weights = [1.0, 2.0, 3.0];
        let bins = balanced_number_partitioning(&weights, 1);
        assert_eq!(bins[0].len(), 3);
    }

    #[test]
    fn balances_equal_weight_items_evenly() {
        let weights = [1.0; 6];
        let bins = balanced_number_partitioning(&weights, 2);
        assert_eq!(bins[0].len(), 3);
        assert_eq!(bins[1].len(), 3);
    }
}
