//! Abstractions for defining the boundary-value problems the cycle engines
//! solve.
//!
//! A problem is any type implementing [`Problem`] plus one of the two
//! engine-facing traits: [`System`] for unconstrained nonlinear problems
//! solved by full approximation storage cycles, or [`ConstrainedSystem`] for
//! obstacle problems solved by constraint-decomposition cycles. The traits
//! carry everything problem-specific: the discrete operator, the pointwise
//! relaxation, the source term, the obstacle and the exact solution when one
//! is known. The mesh and cycle machinery stays problem-agnostic.

use nalgebra::{
    convert,
    storage::{Storage, StorageMut},
    Dyn, OVector, RealField, Vector,
};
use num_traits::Zero;

use super::mesh::MeshLevel;
use super::obstacle::feasibility_tolerance;

/// The base trait for [`System`] and [`ConstrainedSystem`].
pub trait Problem {
    /// Type of the scalar, usually f64 or f32.
    type Field: RealField + Copy;

    /// Evaluates the source term `f(x)` of the governing equation
    /// `-u'' = f` (possibly perturbed by a nonlinear term, see
    /// [`System::eval`]).
    fn source(&self, x: Self::Field) -> Self::Field;

    /// Evaluates the exact solution at `x` if one is known, for error
    /// monitoring and manufactured-solution runs. Together with
    /// [`Problem::source`] this forms the manufactured-solution pair. If not
    /// overridden, no exact solution is available.
    fn exact(&self, x: Self::Field) -> Option<Self::Field> {
        let _ = x;
        None
    }
}

/// The trait for unconstrained nonlinear problems, consumed by the
/// [FAS cycle engine](crate::cycle::Fas).
pub trait System: Problem {
    /// Evaluates the discrete nonlinear operator `F(u)` on a mesh with
    /// spacing `h`, writing the result into `fu`. The value at both boundary
    /// nodes is zero by convention, so that `ell - F(u)` is a residual
    /// functional vanishing on the boundary.
    fn eval<Su, Sf>(
        &self,
        h: Self::Field,
        u: &Vector<Self::Field, Dyn, Su>,
        fu: &mut Vector<Self::Field, Dyn, Sf>,
    ) where
        Su: Storage<Self::Field, Dyn>,
        Sf: StorageMut<Self::Field, Dyn>;

    /// Updates the single node `p` of `u` in place by an approximate
    /// pointwise solve of the stencil equation `F(u)[p] = ell[p]`, using
    /// `iters` Newton (or fixed-point) iterations. Called in index order,
    /// forward or backward, to constitute one nonlinear Gauss-Seidel sweep.
    fn relax_point<Su, Sl>(
        &self,
        h: Self::Field,
        u: &mut Vector<Self::Field, Dyn, Su>,
        ell: &Vector<Self::Field, Dyn, Sl>,
        p: usize,
        iters: usize,
    ) where
        Su: StorageMut<Self::Field, Dyn>,
        Sl: Storage<Self::Field, Dyn>;
}

/// The trait for bound-constrained (obstacle) problems, consumed by the
/// [constraint-decomposition cycle engine](crate::cycle::Tai).
pub trait ConstrainedSystem: Problem {
    /// Evaluates the obstacle `phi(x)`; admissible solutions satisfy
    /// `u >= phi` everywhere.
    fn obstacle(&self, x: Self::Field) -> Self::Field;

    /// Computes the residual functional `ell - a(u, .)` of the governing
    /// bilinear form on given mesh. Zero at the boundary nodes.
    fn residual<Su, Sl>(
        &self,
        mesh: &MeshLevel<Self::Field>,
        u: &Vector<Self::Field, Dyn, Su>,
        ell: &Vector<Self::Field, Dyn, Sl>,
    ) -> OVector<Self::Field, Dyn>
    where
        Su: Storage<Self::Field, Dyn>,
        Sl: Storage<Self::Field, Dyn>;

    /// Does one in-place projected Gauss-Seidel sweep over the interior
    /// nodes of `v`, in forward or backward order. Each pointwise update
    /// solves the unconstrained stencil equation, relaxed by factor `omega`,
    /// and clamps the result from below by `phi`. Returns the number of
    /// nodes found infeasible beyond the floating tolerance before their
    /// update; those are repaired, counted and reported, never fatal.
    fn projected_sweep<Sv, Sl, Sp>(
        &self,
        mesh: &MeshLevel<Self::Field>,
        v: &mut Vector<Self::Field, Dyn, Sv>,
        ell: &Vector<Self::Field, Dyn, Sl>,
        phi: &Vector<Self::Field, Dyn, Sp>,
        omega: Self::Field,
        forward: bool,
    ) -> usize
    where
        Sv: StorageMut<Self::Field, Dyn>,
        Sl: Storage<Self::Field, Dyn>,
        Sp: Storage<Self::Field, Dyn>;

    /// Computes the residual clamped to nonnegative values wherever `u` is
    /// within tolerance of the obstacle. Where the constraint is active the
    /// raw residual may be significantly negative without meaning anything
    /// for convergence; the norm of this inactive residual is the quantity
    /// to monitor. Diagnostic only.
    fn inactive_residual<Su, Sl, Sp>(
        &self,
        mesh: &MeshLevel<Self::Field>,
        u: &Vector<Self::Field, Dyn, Su>,
        ell: &Vector<Self::Field, Dyn, Sl>,
        phi: &Vector<Self::Field, Dyn, Sp>,
    ) -> OVector<Self::Field, Dyn>
    where
        Su: Storage<Self::Field, Dyn>,
        Sl: Storage<Self::Field, Dyn>,
        Sp: Storage<Self::Field, Dyn>,
    {
        let tol: Self::Field = feasibility_tolerance();
        let mut r = self.residual(mesh, u, ell);

        for p in 0..r.len() {
            if u[p] < phi[p] + tol && r[p] < Self::Field::zero() {
                r[p] = Self::Field::zero();
            }
        }

        r
    }
}

/// Linear-Poisson residual `r[p] = ell[p] - (2u[p] - u[p-1] - u[p+1]) / h`
/// at interior nodes, zero at the boundary. Shared by constrained-system
/// implementations whose governing operator is `-u''`.
pub fn poisson_residual<T, Su, Sl>(
    mesh: &MeshLevel<T>,
    u: &Vector<T, Dyn, Su>,
    ell: &Vector<T, Dyn, Sl>,
) -> OVector<T, Dyn>
where
    T: RealField + Copy,
    Su: Storage<T, Dyn>,
    Sl: Storage<T, Dyn>,
{
    let h = mesh.spacing();
    let two: T = convert(2.0);

    let mut r = mesh.zeros();
    for p in 1..mesh.subintervals() {
        r[p] = ell[p] - (two * u[p] - u[p - 1] - u[p + 1]) / h;
    }

    r
}
