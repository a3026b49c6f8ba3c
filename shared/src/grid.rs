//! Coordinate math for the chunked tile grid.

use glam::IVec2;

/// Chunk position containing the given world position.
///
/// Uses euclidean division so negative world coordinates map to negative
/// chunk positions instead of rounding toward zero.
pub fn chunk_at(position: IVec2, chunk_size: IVec2) -> IVec2 {
    IVec2::new(
        position.x.div_euclid(chunk_size.x),
        position.y.div_euclid(chunk_size.y),
    )
}

/// Position of a world cell relative to its chunk origin. Always in
/// `0..chunk_size` on both axes.
pub fn local_in_chunk(position: IVec2, chunk_size: IVec2) -> IVec2 {
    IVec2::new(
        position.x.rem_euclid(chunk_size.x),
        position.y.rem_euclid(chunk_size.y),
    )
}

/// World position of a chunk's bottom-left cell.
pub fn chunk_origin(chunk_position: IVec2, chunk_size: IVec2) -> IVec2 {
    chunk_position * chunk_size
}

/// Inclusive axis-aligned cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: IVec2,
    pub max: IVec2,
}

impl Bounds {
    pub fn point(position: IVec2) -> Self {
        Self {
            min: position,
            max: position,
        }
    }

    pub fn include(&mut self, position: IVec2) {
        self.min = self.min.min(position);
        self.max = self.max.max(position);
    }

    pub fn contains(&self, position: IVec2) -> bool {
        position.x >= self.min.x
            && position.x <= self.max.x
            && position.y >= self.min.y
            && position.y <= self.max.y
    }

    /// Cell count per axis, `max - min + 1`.
    pub fn size(&self) -> IVec2 {
        self.max - self.min + IVec2::ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_at_positive_coordinates() {
        let size = IVec2::new(16, 16);
        assert_eq!(chunk_at(IVec2::new(0, 0), size), IVec2::new(0, 0));
        assert_eq!(chunk_at(IVec2::new(15, 15), size), IVec2::new(0, 0));
        assert_eq!(chunk_at(IVec2::new(16, 0), size), IVec2::new(1, 0));
        assert_eq!(chunk_at(IVec2::new(40, 33), size), IVec2::new(2, 2));
    }

    #[test]
    fn test_chunk_at_negative_coordinates() {
        let size = IVec2::new(16, 16);
        assert_eq!(chunk_at(IVec2::new(-1, -1), size), IVec2::new(-1, -1));
        assert_eq!(chunk_at(IVec2::new(-16, -16), size), IVec2::new(-1, -1));
        assert_eq!(chunk_at(IVec2::new(-17, 5), size), IVec2::new(-2, 0));
    }

    #[test]
    fn test_local_in_chunk_wraps_negatives() {
        let size = IVec2::new(16, 16);
        assert_eq!(local_in_chunk(IVec2::new(5, 12), size), IVec2::new(5, 12));
        assert_eq!(local_in_chunk(IVec2::new(-1, -16), size), IVec2::new(15, 0));
        assert_eq!(local_in_chunk(IVec2::new(-17, 33), size), IVec2::new(15, 1));
    }

    #[test]
    fn test_chunk_origin_round_trips() {
        let size = IVec2::new(16, 8);
        for pos in [
            IVec2::new(0, 0),
            IVec2::new(31, 7),
            IVec2::new(-1, -1),
            IVec2::new(-33, 20),
        ] {
            let origin = chunk_origin(chunk_at(pos, size), size);
            let local = local_in_chunk(pos, size);
            assert_eq!(origin + local, pos);
        }
    }

    #[test]
    fn test_bounds_include_and_contains() {
        let mut bounds = Bounds::point(IVec2::new(3, 3));
        bounds.include(IVec2::new(-2, 7));
        bounds.include(IVec2::new(5, -1));

        assert_eq!(bounds.min, IVec2::new(-2, -1));
        assert_eq!(bounds.max, IVec2::new(5, 7));
        assert_eq!(bounds.size(), IVec2::new(8, 9));
        assert!(bounds.contains(IVec2::new(0, 0)));
        assert!(bounds.contains(IVec2::new(-2, 7)));
        assert!(!bounds.contains(IVec2::new(6, 0)));
    }
}
