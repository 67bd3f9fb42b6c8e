use nalgebra::Point2;

/// The two index-aligned point sets the engine carries through a clip.
///
/// `reference` holds each point's position in the first frame and `tracked`
/// its latest position. Both only ever shrink, and always by the same
/// indices, so index `i` names the same physical point for the whole clip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeaturePointStore {
    tracked: Vec<Point2<f32>>,
    reference: Vec<Point2<f32>>,
}

impl FeaturePointStore {
    pub fn new(points: Vec<Point2<f32>>) -> Self {
        Self {
            reference: points.clone(),
            tracked: points,
        }
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn tracked(&self) -> &[Point2<f32>] {
        &self.tracked
    }

    pub fn reference(&self) -> &[Point2<f32>] {
        &self.reference
    }

    /// Keep the points whose `status` is set, moving them to `positions`.
    ///
    /// Returns `false` and leaves the store untouched when either slice is
    /// not index-aligned with the current point set.
    pub fn advance(&mut self, positions: &[Point2<f32>], status: &[bool]) -> bool {
        if positions.len() != self.tracked.len() || status.len() != self.tracked.len() {
            return false;
        }
        self.tracked = positions
            .iter()
            .zip(status)
            .filter_map(|(p, &ok)| ok.then_some(*p))
            .collect();
        let mut keep = status.iter();
        self.reference.retain(|_| keep.next().copied().unwrap_or(false));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(n: usize) -> Vec<Point2<f32>> {
        (0..n).map(|i| Point2::new(i as f32, 10.0 * i as f32)).collect()
    }

    #[test]
    fn advance_drops_the_same_indices_from_both_sets() {
        let mut store = FeaturePointStore::new(pts(5));
        let moved: Vec<_> = pts(5).iter().map(|p| Point2::new(p.x + 0.5, p.y)).collect();
        assert!(store.advance(&moved, &[true, false, true, false, true]));
        assert_eq!(store.len(), 3);
        assert_eq!(store.tracked(), &[moved[0], moved[2], moved[4]]);
        assert_eq!(store.reference(), &[pts(5)[0], pts(5)[2], pts(5)[4]]);
    }

    #[test]
    fn misaligned_input_leaves_store_untouched() {
        let mut store = FeaturePointStore::new(pts(4));
        assert!(!store.advance(&pts(3), &[true; 3]));
        assert!(!store.advance(&pts(4), &[true; 5]));
        assert_eq!(store, FeaturePointStore::new(pts(4)));
    }

    #[test]
    fn can_shrink_to_nothing() {
        let mut store = FeaturePointStore::new(pts(2));
        assert!(store.advance(&pts(2), &[false, false]));
        assert!(store.is_empty());
        assert!(store.reference().is_empty());
    }
}
