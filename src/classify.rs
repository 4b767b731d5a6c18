use crate::thresholds::ThresholdSet;

/// Map a calibrated value to a state index: the first state, in fixed order,
/// whose upper bound is `>= value` (an unbounded state matches everything).
/// A value above every configured bound lands in the last state, the ceiling.
pub fn classify(value: f64, thresholds: &ThresholdSet) -> usize {
    for (index, bound) in thresholds.bounds().iter().enumerate() {
        match bound {
            None => return index,
            Some(upper) if *upper >= value => return index,
            Some(_) => {}
        }
    }
    thresholds.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(bounds: &[Option<f64>]) -> ThresholdSet {
        ThresholdSet::new(bounds.to_vec())
    }

    #[test]
    fn first_matching_bound_wins() {
        let set = thresholds(&[Some(10.0), Some(20.0), Some(30.0), None]);
        assert_eq!(classify(5.0, &set), 0);
        assert_eq!(classify(10.0, &set), 0); // inclusive upper bound
        assert_eq!(classify(15.0, &set), 1);
        assert_eq!(classify(25.0, &set), 2);
        assert_eq!(classify(35.0, &set), 3);
    }

    #[test]
    fn value_above_all_bounds_lands_in_ceiling() {
        let set = thresholds(&[Some(10.0), Some(20.0), Some(30.0)]);
        assert_eq!(classify(99.0, &set), 2);
    }

    #[test]
    fn unbounded_state_absorbs_everything_past_it() {
        // no threshold configured for the middle state
        let set = thresholds(&[Some(10.0), None, Some(30.0)]);
        assert_eq!(classify(5.0, &set), 0);
        assert_eq!(classify(15.0, &set), 1);
        assert_eq!(classify(95.0, &set), 1);
    }

    #[test]
    fn monotonic_over_ascending_bounds() {
        let set = thresholds(&[Some(10.0), Some(20.0), Some(30.0), None]);
        let mut last_index = 0;
        for step in 0..500 {
            let value = -10.0 + step as f64 * 0.1;
            let index = classify(value, &set);
            assert!(index >= last_index, "classification regressed at {value}");
            last_index = index;
        }
    }
}
