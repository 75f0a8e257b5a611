//! Nodal lower-bound sets for obstacle problems.

use nalgebra::{
    convert,
    storage::{Storage, StorageMut},
    Dyn, OVector, RealField, Vector,
};
use num_traits::Zero;

use super::mesh::MeshLevel;

/// A lower-bound constraint set over the nodes of one mesh level: the
/// admissible vectors are those with `v[p] >= lower[p]` at every node.
///
/// This is the discrete obstacle of a variational inequality. The type
/// provides projections onto the admissible set and the defect obstacle of
/// an iterate, the two operations the constraint-decomposition solver and
/// its driver need.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle<T: RealField + Copy> {
    lower: OVector<T, Dyn>,
}

impl<T: RealField + Copy> Obstacle<T> {
    /// Creates the obstacle from given nodal lower bounds.
    pub fn new(lower: OVector<T, Dyn>) -> Self {
        assert!(lower.len() > 0, "empty obstacle");

        Self { lower }
    }

    /// Creates the obstacle by sampling a bound function at the nodes of a
    /// mesh level.
    pub fn sampled<F>(mesh: &MeshLevel<T>, phi: F) -> Self
    where
        F: Fn(T) -> T,
    {
        Self::new(mesh.coordinates().map(phi))
    }

    /// Gets the number of nodes the obstacle constrains.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// Determines whether the obstacle constrains no nodes. Always false by
    /// construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Gets the nodal lower bounds.
    pub fn values(&self) -> &OVector<T, Dyn> {
        &self.lower
    }

    /// Projects given vector onto the admissible set, clamping every value
    /// from below. Returns true if any value had to be clamped.
    pub fn project<S>(&self, v: &mut Vector<T, Dyn, S>) -> bool
    where
        S: StorageMut<T, Dyn>,
    {
        let mut clamped = false;

        v.iter_mut().zip(self.lower.iter()).for_each(|(vp, lp)| {
            if &*vp < lp {
                *vp = *lp;
                clamped = true;
            }
        });

        clamped
    }

    /// Projects given vector onto the admissible set at one node. Returns
    /// true if the value had to be clamped.
    pub fn project_in<S>(&self, v: &mut Vector<T, Dyn, S>, p: usize) -> bool
    where
        S: StorageMut<T, Dyn>,
    {
        if v[p] < self.lower[p] {
            v[p] = self.lower[p];
            true
        } else {
            false
        }
    }

    /// Determines whether given vector is admissible within tolerance `tol`,
    /// i.e. `v[p] >= lower[p] - tol` everywhere.
    pub fn is_feasible<S>(&self, v: &Vector<T, Dyn, S>, tol: T) -> bool
    where
        S: Storage<T, Dyn>,
    {
        v.iter()
            .zip(self.lower.iter())
            .all(|(vp, lp)| *vp >= *lp - tol)
    }

    /// Builds the feasible initial iterate `max(lower, 0)`, the zero vector
    /// pushed up wherever the obstacle is positive.
    pub fn feasible_start(&self) -> OVector<T, Dyn> {
        self.lower.map(|lp| lp.max(T::zero()))
    }

    /// Computes the defect obstacle `lower - u` of an iterate `u`: the
    /// remaining slack an additive correction to `u` must respect. For a
    /// feasible iterate the defect is nonpositive.
    pub fn defect<S>(&self, u: &Vector<T, Dyn, S>) -> OVector<T, Dyn>
    where
        S: Storage<T, Dyn>,
    {
        &self.lower - u
    }
}

/// Pointwise feasibility tolerance: a value this far below its bound is
/// attributed to round-off, anything worse counts as an infeasibility.
pub fn feasibility_tolerance<T: RealField + Copy>() -> T {
    convert(1.0e-10)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    #[test]
    fn project_clamps_from_below() {
        let obstacle = Obstacle::new(dvector![0.0, 1.0, -1.0]);

        let mut v = dvector![0.5, 0.5, 0.5];
        assert!(obstacle.project(&mut v));
        assert_eq!(v, dvector![0.5, 1.0, 0.5]);
        assert!(!obstacle.project(&mut v));

        let mut w = dvector![0.0, 2.0, -0.5];
        assert!(!obstacle.project_in(&mut w, 1));
        w[2] = -2.0;
        assert!(obstacle.project_in(&mut w, 2));
        assert_abs_diff_eq!(w[2], -1.0);
    }

    #[test]
    fn feasible_start_is_admissible() {
        let mesh = MeshLevel::<f64>::new(2);
        let obstacle = Obstacle::sampled(&mesh, |x| 8.0 * x * (1.0 - x) - 1.0);

        let u = obstacle.feasible_start();
        assert!(obstacle.is_feasible(&u, 0.0));
        assert!(u.iter().all(|&up| up >= 0.0));
    }

    #[test]
    fn defect_of_feasible_iterate_is_nonpositive() {
        let mesh = MeshLevel::<f64>::new(3);
        let obstacle = Obstacle::sampled(&mesh, |x| x * (1.0 - x) - 1.0);

        let chi = obstacle.defect(&obstacle.feasible_start());
        assert!(chi.iter().all(|&c| c <= 0.0));
    }
}
