//! Annulus offset table for ring-shaped neighborhoods
//!
//! Circular neighborhoods on a square grid are approximated by concentric
//! rings (annuli) of integer offsets. The table is independent of any
//! raster content and can be shared across invocations.

/// Precomputed (d_col, d_row) offsets for concentric annuli.
///
/// Ring `r` holds every integer offset whose Euclidean distance from the
/// center lies in `(r-1, r]`, so the rings partition the covered disc
/// without gaps or duplicates. Offsets are stored flat with one cumulative
/// start index per ring.
#[derive(Debug, Clone)]
pub struct AnnulusTable {
    offsets: Vec<(isize, isize)>,
    /// `range_start[r]` = number of offsets through ring `r`; `range_start[0] = 0`
    range_start: Vec<usize>,
}

impl AnnulusTable {
    /// Default maximum ring radius used by the representativeness engine
    pub const DEFAULT_MAX_RADIUS: usize = 12;

    /// Build the offset table for rings `1..=max_radius`
    pub fn new(max_radius: usize) -> Self {
        let mut offsets = Vec::new();
        let mut range_start = Vec::with_capacity(max_radius + 1);
        range_start.push(0);

        for k in 1..=max_radius as isize {
            let lower = (k - 1) * (k - 1);
            let upper = k * k;

            for dr in -k..=k {
                for dc in -k..=k {
                    let d = dr * dr + dc * dc;
                    // Strict lower bound: boundary cells belong to the
                    // smaller ring only.
                    if d > lower && d <= upper {
                        offsets.push((dc, dr));
                    }
                }
            }

            range_start.push(offsets.len());
        }

        Self {
            offsets,
            range_start,
        }
    }

    /// Number of rings in the table
    pub fn max_radius(&self) -> usize {
        self.range_start.len() - 1
    }

    /// The (d_col, d_row) offsets of ring `radius` (1-based)
    pub fn ring(&self, radius: usize) -> &[(isize, isize)] {
        &self.offsets[self.range_start[radius - 1]..self.range_start[radius]]
    }

    /// All offsets through the outermost ring
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }
}

impl Default for AnnulusTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ring_one_is_rook_neighbors() {
        let table = AnnulusTable::new(3);
        let ring: HashSet<_> = table.ring(1).iter().copied().collect();

        let expected: HashSet<_> = [(1, 0), (-1, 0), (0, 1), (0, -1)].into_iter().collect();
        assert_eq!(ring, expected);
    }

    #[test]
    fn test_band_membership() {
        let table = AnnulusTable::new(12);

        for k in 1..=12usize {
            let lower = ((k - 1) * (k - 1)) as isize;
            let upper = (k * k) as isize;
            for &(dc, dr) in table.ring(k) {
                let d = dc * dc + dr * dr;
                assert!(
                    d > lower && d <= upper,
                    "offset ({dc},{dr}) outside ring {k}: d²={d}"
                );
            }
        }
    }

    #[test]
    fn test_rings_partition_without_duplicates() {
        let table = AnnulusTable::new(12);

        let unique: HashSet<_> = table.offsets().iter().copied().collect();
        assert_eq!(unique.len(), table.offsets().len(), "duplicate offsets");

        // Every non-center offset within the disc of radius 12 is covered.
        let mut expected = 0usize;
        for dr in -12isize..=12 {
            for dc in -12isize..=12 {
                let d = dr * dr + dc * dc;
                if d > 0 && d <= 144 {
                    expected += 1;
                }
            }
        }
        assert_eq!(table.offsets().len(), expected);
    }

    #[test]
    fn test_every_ring_nonempty() {
        let table = AnnulusTable::new(12);
        assert_eq!(table.max_radius(), 12);
        for k in 1..=12usize {
            assert!(!table.ring(k).is_empty(), "ring {k} empty");
        }
    }
}
