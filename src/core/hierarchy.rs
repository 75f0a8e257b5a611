//! Nested hierarchies of mesh levels.

use std::ops::Index;

use nalgebra::RealField;

use super::mesh::MeshLevel;

/// An ordered sequence of nested [`MeshLevel`]s spanning levels
/// `kcoarse..=kfine`, coarsest first, with a fixed refinement factor of 2
/// between consecutive levels.
///
/// The hierarchy is pure geometry and is created once per solver
/// configuration; it carries no per-solve state, so the same instance can
/// back repeated or independent solves. Positions are relative: index 0 is
/// the coarsest level of the hierarchy, `len() - 1` the finest, regardless
/// of the global level indices spanned.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshHierarchy<T: RealField + Copy> {
    levels: Vec<MeshLevel<T>>,
}

impl<T: RealField + Copy> MeshHierarchy<T> {
    /// Creates the hierarchy of levels `kcoarse..=kfine`.
    ///
    /// # Panics
    ///
    /// Panics if `kfine <= kcoarse`; a hierarchy has at least two levels.
    pub fn new(kcoarse: usize, kfine: usize) -> Self {
        assert!(kfine > kcoarse, "fine level must be above the coarse level");

        Self {
            levels: (kcoarse..=kfine).map(MeshLevel::new).collect(),
        }
    }

    /// Gets the number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// A hierarchy is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Gets the level at given position, 0 being the coarsest.
    pub fn level(&self, j: usize) -> &MeshLevel<T> {
        &self.levels[j]
    }

    /// Gets the coarsest level.
    pub fn coarsest(&self) -> &MeshLevel<T> {
        &self.levels[0]
    }

    /// Gets the finest level.
    pub fn finest(&self) -> &MeshLevel<T> {
        &self.levels[self.levels.len() - 1]
    }

    /// Iterates over the levels from coarsest to finest.
    pub fn iter(&self) -> impl Iterator<Item = &MeshLevel<T>> {
        self.levels.iter()
    }
}

impl<T: RealField + Copy> Index<usize> for MeshHierarchy<T> {
    type Output = MeshLevel<T>;

    fn index(&self, j: usize) -> &Self::Output {
        &self.levels[j]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    #[test]
    fn levels_are_nested_with_factor_two() {
        let hierarchy = MeshHierarchy::<f64>::new(1, 5);
        assert_eq!(hierarchy.len(), 5);

        for j in 1..hierarchy.len() {
            let coarse = hierarchy.level(j - 1);
            let fine = hierarchy.level(j);
            assert_eq!(fine.subintervals(), 2 * coarse.subintervals());
            assert_abs_diff_eq!(fine.spacing(), 0.5 * coarse.spacing());
        }

        assert_eq!(hierarchy.coarsest().level(), 1);
        assert_eq!(hierarchy.finest().level(), 5);
    }

    #[test]
    #[should_panic(expected = "fine level must be above")]
    fn rejects_degenerate_range() {
        MeshHierarchy::<f64>::new(3, 3);
    }
}
