/// Pixels covered by one kernel invocation, in luma pixels of the full image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub width: usize,
    pub height: usize,
}

impl Footprint {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    fn max(self, other: Footprint) -> Footprint {
        Footprint {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}

/// 2D dispatch grid, number of invocations per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    pub x: usize,
    pub y: usize,
}

impl WorkSize {
    /// Grid covering a `width` x `height` image when every invocation reads `read` and writes `write`.
    ///
    /// The larger footprint on each axis decides the grid, which covers the whole image with at most one
    /// partially used invocation per axis.
    ///
    /// # Panics
    ///
    /// If any footprint dimension is zero
    pub fn compute(width: usize, height: usize, read: Footprint, write: Footprint) -> Self {
        let footprint = read.max(write);

        assert!(
            footprint.width > 0 && footprint.height > 0,
            "footprint must not be empty"
        );

        Self {
            x: width.div_ceil(footprint.width),
            y: height.div_ceil(footprint.height),
        }
    }

    pub fn invocations(&self) -> usize {
        self.x * self.y
    }

    pub fn is_empty(&self) -> bool {
        self.invocations() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_group_is_covered() {
        let fp = Footprint::new(12, 1);
        let ws = WorkSize::compute(70, 64, fp, fp);

        assert_eq!(ws, WorkSize { x: 6, y: 64 });
    }

    #[test]
    fn exact_division() {
        let fp = Footprint::new(6, 2);

        assert_eq!(WorkSize::compute(72, 64, fp, fp), WorkSize { x: 12, y: 32 });
    }

    #[test]
    fn larger_footprint_binds() {
        let ws = WorkSize::compute(64, 64, Footprint::new(6, 2), Footprint::new(12, 4));

        assert_eq!(ws, WorkSize { x: 6, y: 16 });
    }

    #[test]
    fn covers_with_minimal_excess() {
        for dim in 1..500 {
            for fp in 1..=16 {
                let f = Footprint::new(fp, fp);
                let ws = WorkSize::compute(dim, dim, f, f);

                assert!(ws.x * fp >= dim);
                assert!((ws.x - 1) * fp < dim);
                assert_eq!(ws.x, ws.y);
            }
        }
    }

    #[test]
    #[should_panic]
    fn empty_footprint_panics() {
        let f = Footprint::new(0, 1);
        WorkSize::compute(10, 10, f, f);
    }
}
