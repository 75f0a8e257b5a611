//! Mesh levels for the unit interval and the transfer operators between them.

use nalgebra::{convert, storage::Storage, DimName, Dyn, OVector, RealField, Vector, U1};
use num_traits::Zero;
use thiserror::Error;

/// Error from a mesh operation whose input violates the level's contracts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    /// The vector length does not match the node count expected by the
    /// operation.
    #[error("vector has length {len} (expected {expected})")]
    LengthMismatch {
        /// Expected node count.
        expected: usize,
        /// Actual length of the passed vector.
        len: usize,
    },
    /// The operation needs a neighboring level that does not exist, such as
    /// restricting below the coarsest mesh.
    #[error("level {level} has no mesh to transfer to")]
    LevelRange {
        /// The offending level index.
        level: usize,
    },
}

/// One discretization level of the interval [0, 1].
///
/// `MeshLevel::new(k)` has `m = 2^(k+1)` equal subintervals of length
/// `h = 1/m` and `m + 1` nodes indexed `0, ..., m`:
///
/// ```text
/// *---*---*---*---*---*---*
/// 0   1   2     ...  m-1  m
/// ```
///
/// Nodes `1, ..., m-1` are interior. `MeshLevel::new(0)` is a coarse mesh
/// with one interior node. A level provides the vector-space primitives for
/// grid functions sampled at its nodes (zero vectors, L² norms, coordinates,
/// linear functionals) and the transfer operators to and from the
/// next-coarser level: prolongation of functions, canonical restriction of
/// linear functionals, full-weighting restriction of vectors, and monotone
/// restriction of defect obstacles (formula (4.22) in Gräser & Kornhuber
/// 2009).
///
/// The mesh geometry is immutable. Per-solve state (defect obstacles, work
/// units) lives with the cycle engines, not here, so one level can back any
/// number of independent solves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshLevel<T: RealField + Copy> {
    k: usize,
    m: usize,
    h: T,
}

impl<T: RealField + Copy> MeshLevel<T> {
    /// Creates the mesh level with given index.
    pub fn new(k: usize) -> Self {
        assert!(k < usize::BITS as usize - 1, "level index too large");

        let m = 1usize << (k + 1);

        Self {
            k,
            m,
            h: convert(1.0 / m as f64),
        }
    }

    /// Gets the level index.
    pub fn level(&self) -> usize {
        self.k
    }

    /// Gets the number of subintervals `m = 2^(k+1)`.
    pub fn subintervals(&self) -> usize {
        self.m
    }

    /// Gets the node count `m + 1`, including both boundary nodes.
    pub fn nodes(&self) -> usize {
        self.m + 1
    }

    /// Gets the grid spacing `h = 1/m`.
    pub fn spacing(&self) -> T {
        self.h
    }

    /// Allocates a zero vector sized to this level.
    pub fn zeros(&self) -> OVector<T, Dyn> {
        OVector::from_element_generic(Dyn(self.m + 1), U1::name(), T::zero())
    }

    /// Generates the vector of node coordinates, uniformly spaced from 0 to
    /// 1 including both boundary nodes.
    pub fn coordinates(&self) -> OVector<T, Dyn> {
        let h = self.h;
        OVector::from_iterator_generic(
            Dyn(self.m + 1),
            U1::name(),
            (0..=self.m).map(|p| convert::<_, T>(p as f64) * h),
        )
    }

    /// L²[0, 1] norm of a grid function, computed with the trapezoid rule.
    pub fn l2norm<S>(&self, v: &Vector<T, Dyn, S>) -> Result<T, MeshError>
    where
        S: Storage<T, Dyn>,
    {
        self.check_len(v.len())?;

        let half: T = convert(0.5);
        let mut sum = half * (v[0] * v[0] + v[self.m] * v[self.m]);
        for p in 1..self.m {
            sum += v[p] * v[p];
        }

        Ok((self.h * sum).sqrt())
    }

    /// Represents the linear functional which is the L² inner product with a
    /// grid function `f`: `ell[p] = <f, psi_p> ~ h f[p]` at interior nodes
    /// and zero at the boundary.
    pub fn functional<S>(&self, f: &Vector<T, Dyn, S>) -> OVector<T, Dyn>
    where
        S: Storage<T, Dyn>,
    {
        assert!(f.len() == self.nodes(), "sample vector of wrong length");

        let mut ell = self.zeros();
        for p in 1..self.m {
            ell[p] = self.h * f[p];
        }

        ell
    }

    /// Prolongs a vector from the next-coarser level onto this level using
    /// linear interpolation.
    pub fn prolong<S>(&self, v: &Vector<T, Dyn, S>) -> Result<OVector<T, Dyn>, MeshError>
    where
        S: Storage<T, Dyn>,
    {
        let mc = self.coarser_subintervals()?;
        check(mc + 1, v.len())?;

        let half: T = convert(0.5);
        let mut y = self.zeros();
        for q in 0..mc {
            y[2 * q] = v[q];
            y[2 * q + 1] = half * (v[q] + v[q + 1]);
        }
        y[self.m] = v[mc];

        Ok(y)
    }

    /// Restricts a linear functional on this level to the next-coarser level
    /// using canonical restriction, the exact adjoint of [`MeshLevel::prolong`]
    /// under the discrete duality pairing. Boundary values of the result are
    /// zero.
    pub fn restrict_functional<S>(&self, v: &Vector<T, Dyn, S>) -> Result<OVector<T, Dyn>, MeshError>
    where
        S: Storage<T, Dyn>,
    {
        let mc = self.coarser_subintervals()?;
        self.check_len(v.len())?;

        let half: T = convert(0.5);
        let mut y = OVector::from_element_generic(Dyn(mc + 1), U1::name(), T::zero());
        for q in 1..mc {
            y[q] = half * v[2 * q - 1] + v[2 * q] + half * v[2 * q + 1];
        }

        Ok(y)
    }

    /// Restricts an ordinary vector on this level to the next-coarser level
    /// by full weighting. The stencil weights are those of
    /// [`MeshLevel::restrict_functional`] scaled to preserve constants, but
    /// the two operators act on different spaces: this one maps primal
    /// vectors, not functionals. Boundary values of the result are forced to
    /// zero.
    pub fn restrict_vector<S>(&self, v: &Vector<T, Dyn, S>) -> Result<OVector<T, Dyn>, MeshError>
    where
        S: Storage<T, Dyn>,
    {
        let mc = self.coarser_subintervals()?;
        self.check_len(v.len())?;

        let half: T = convert(0.5);
        let quarter: T = convert(0.25);
        let mut y = OVector::from_element_generic(Dyn(mc + 1), U1::name(), T::zero());
        for q in 1..mc {
            y[q] = quarter * (v[2 * q - 1] + v[2 * q + 1]) + half * v[2 * q];
        }

        Ok(y)
    }

    /// Restricts a vector on this level to the next-coarser level by taking,
    /// at each coarse node, the maximum over the 2-3 fine values that map to
    /// it. A nonlinear operation used exclusively for defect obstacles: the
    /// maximum is the least-restrictive coarse bound that a prolonged coarse
    /// correction cannot push below any fine bound, since interpolated values
    /// are convex combinations of their coarse sources.
    pub fn monotone_restrict<S>(&self, v: &Vector<T, Dyn, S>) -> Result<OVector<T, Dyn>, MeshError>
    where
        S: Storage<T, Dyn>,
    {
        let mc = self.coarser_subintervals()?;
        self.check_len(v.len())?;

        let mut y = OVector::from_element_generic(Dyn(mc + 1), U1::name(), T::zero());
        y[0] = v[0].max(v[1]);
        for q in 1..mc {
            y[q] = v[2 * q - 1].max(v[2 * q]).max(v[2 * q + 1]);
        }
        y[mc] = v[self.m - 1].max(v[self.m]);

        Ok(y)
    }

    fn coarser_subintervals(&self) -> Result<usize, MeshError> {
        if self.k == 0 {
            Err(MeshError::LevelRange { level: self.k })
        } else {
            Ok(self.m / 2)
        }
    }

    pub(crate) fn check_len(&self, len: usize) -> Result<(), MeshError> {
        check(self.nodes(), len)
    }
}

fn check(expected: usize, len: usize) -> Result<(), MeshError> {
    if len == expected {
        Ok(())
    } else {
        Err(MeshError::LengthMismatch { expected, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::DVector;

    fn sampled(mesh: &MeshLevel<f64>, f: impl Fn(f64) -> f64) -> DVector<f64> {
        mesh.coordinates().map(f)
    }

    #[test]
    fn geometry() {
        let coarse = MeshLevel::<f64>::new(0);
        assert_eq!(coarse.subintervals(), 2);
        assert_eq!(coarse.nodes(), 3);
        assert_abs_diff_eq!(coarse.spacing(), 0.5);

        let fine = MeshLevel::<f64>::new(3);
        assert_eq!(fine.subintervals(), 16);
        assert_abs_diff_eq!(fine.spacing(), 1.0 / 16.0);

        let xx = fine.coordinates();
        assert_abs_diff_eq!(xx[0], 0.0);
        assert_abs_diff_eq!(xx[8], 0.5);
        assert_abs_diff_eq!(xx[16], 1.0);
    }

    #[test]
    fn l2norm_of_constant_is_one() {
        for k in 0..5 {
            let mesh = MeshLevel::<f64>::new(k);
            let ones = DVector::from_element(mesh.nodes(), 1.0);
            assert_abs_diff_eq!(mesh.l2norm(&ones).unwrap(), 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn l2norm_checks_length() {
        let mesh = MeshLevel::<f64>::new(2);
        let v = DVector::from_element(4, 1.0);
        assert_eq!(
            mesh.l2norm(&v),
            Err(MeshError::LengthMismatch {
                expected: 9,
                len: 4
            })
        );
    }

    #[test]
    fn prolong_preserves_linear_functions() {
        let mesh = MeshLevel::<f64>::new(3);
        let coarse = MeshLevel::<f64>::new(2);
        let v = sampled(&coarse, |x| 2.0 * x - 0.5);
        let y = mesh.prolong(&v).unwrap();
        let exact = sampled(&mesh, |x| 2.0 * x - 0.5);
        assert_abs_diff_eq!(mesh.l2norm(&(y - exact)).unwrap(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn prolong_fails_on_coarsest() {
        let mesh = MeshLevel::<f64>::new(0);
        let v = DVector::from_element(2, 0.0);
        assert_eq!(mesh.prolong(&v), Err(MeshError::LevelRange { level: 0 }));
    }

    #[test]
    fn restriction_checks_length() {
        let mesh = MeshLevel::<f64>::new(2);
        let v = DVector::from_element(3, 1.0);
        assert!(matches!(
            mesh.restrict_functional(&v),
            Err(MeshError::LengthMismatch { expected: 9, len: 3 })
        ));
        assert!(matches!(
            mesh.restrict_vector(&v),
            Err(MeshError::LengthMismatch { .. })
        ));
        assert!(matches!(
            mesh.monotone_restrict(&v),
            Err(MeshError::LengthMismatch { .. })
        ));
    }

    // Prolonging a constant and canonically restricting its functional
    // reproduces the coarse functional of the same constant.
    #[test]
    fn constant_consistency() {
        for k in 1..6 {
            let mesh = MeshLevel::<f64>::new(k);
            let coarse = MeshLevel::<f64>::new(k - 1);

            let c = DVector::from_element(coarse.nodes(), 3.25);
            let up = mesh.prolong(&c).unwrap();
            assert!(up.iter().all(|&y| (y - 3.25).abs() < 1e-14));

            let down = mesh.restrict_functional(&mesh.functional(&up)).unwrap();
            let expected = coarse.functional(&c);
            assert_abs_diff_eq!(
                coarse.l2norm(&(down - expected)).unwrap(),
                0.0,
                epsilon = 1e-14
            );
        }
    }

    // <R'v, u> on the coarse level equals <v, Pu> on the fine level for
    // functions u vanishing at the boundary.
    #[test]
    fn canonical_restriction_is_adjoint_of_prolongation() {
        for k in 1..6 {
            let mesh = MeshLevel::<f64>::new(k);
            let coarse = MeshLevel::<f64>::new(k - 1);

            let u = sampled(&coarse, |x| (std::f64::consts::PI * x).sin() * (0.3 + x));
            let v = sampled(&mesh, |x| (3.0 * x - 1.0) * (x * x + 0.1));

            let lhs = mesh.restrict_functional(&v).unwrap().dot(&u);
            let rhs = v.dot(&mesh.prolong(&u).unwrap());

            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
        }
    }

    #[test]
    fn monotone_restriction_dominates_contributing_values() {
        let mesh = MeshLevel::<f64>::new(3);
        let m = mesh.subintervals();
        let v = sampled(&mesh, |x| (13.0 * x).sin() - x * x);

        let y = mesh.monotone_restrict(&v).unwrap();
        let mc = m / 2;

        assert_eq!(y.len(), mc + 1);
        for q in 0..=mc {
            let lo = (2 * q).saturating_sub(1);
            let hi = (2 * q + 1).min(m);
            let max = (lo..=hi).map(|p| v[p]).fold(f64::NEG_INFINITY, f64::max);
            assert_abs_diff_eq!(y[q], max);
            for p in lo..=hi {
                assert!(y[q] >= v[p]);
            }
        }
    }

    #[test]
    fn full_weighting_preserves_interior_constants() {
        let mesh = MeshLevel::<f64>::new(3);
        let v = DVector::from_element(mesh.nodes(), 2.0);
        let y = mesh.restrict_vector(&v).unwrap();

        let mc = mesh.subintervals() / 2;
        assert_abs_diff_eq!(y[0], 0.0);
        assert_abs_diff_eq!(y[mc], 0.0);
        for q in 1..mc {
            assert_abs_diff_eq!(y[q], 2.0, epsilon = 1e-14);
        }
    }
}
