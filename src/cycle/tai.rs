//! Multilevel constraint decomposition cycles for obstacle problems.
//!
//! The method of Tai decomposes the defect obstacle of a variational
//! inequality across the mesh hierarchy: at each level the monotone
//! restriction of the remaining slack is delegated to the coarser levels,
//! and projected Gauss-Seidel (PGS) smoothing solves the level's share of
//! the bound-constrained correction problem. For zero up sweeps this is
//! Alg. 4.7 in Gräser & Kornhuber, implemented recursively. The resulting
//! correction keeps a feasible iterate feasible, because prolonged coarse
//! corrections respect the bounds the monotone restriction summarized.
//!
//! Pointwise feasibility violations beyond the floating tolerance are
//! repaired, counted and returned, never fatal; with relaxation factor
//! `omega <= 1` and zero up sweeps the count is zero in exact arithmetic,
//! so a nonzero count there indicates a bug on the caller's side.
//!
//! # References
//!
//! \[1\] [Rate of convergence for some constraint decomposition methods for
//! nonlinear variational
//! inequalities](https://link.springer.com/article/10.1007/s002110200404)
//!
//! \[2\] [Multigrid methods for obstacle
//! problems](https://www.global-sci.org/jcm/volumes/v27n1/pdf/271-1.pdf)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, Dyn, OVector};

use crate::core::{ConstrainedSystem, MeshError, MeshHierarchy, MeshLevel, Problem};

use super::work::WorkUnits;

/// Options for the [`Tai`] cycle engine.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct TaiOptions<P: Problem> {
    /// PGS sweeps before the coarse-level correction. Default: `1`.
    down: usize,
    /// PGS sweeps after the coarse-level correction. When nonzero, the
    /// local obstacle is halved so the two smoothing passes split it
    /// symmetrically. Default: `0`.
    up: usize,
    /// PGS sweeps constituting the inexact solve on the coarsest level.
    /// Default: `1`.
    coarse: usize,
    /// Runs every sweep once forward and once backward, cancelling the
    /// directional bias of Gauss-Seidel. Default: `false`.
    symmetric: bool,
    /// Relaxation factor applied to every pointwise update, giving
    /// projected SOR for values other than one. Default: `1.0`.
    omega: P::Field,
    /// Relaxation factor used on the coarsest level only. Default: `1.0`.
    coarsest_omega: P::Field,
}

impl<P: Problem> Default for TaiOptions<P> {
    fn default() -> Self {
        Self {
            down: 1,
            up: 0,
            coarse: 1,
            symmetric: false,
            omega: convert(1.0),
            coarsest_omega: convert(1.0),
        }
    }
}

/// Constraint-decomposition cycle engine. See [module](self) documentation
/// for more details.
///
/// The engine owns the mesh hierarchy and accumulates work units across
/// cycles; [`Tai::reset`] clears the accumulators for a fresh solve. The
/// defect obstacle is threaded through the recursion as an explicit
/// parameter, so nothing level-scoped survives a cycle.
pub struct Tai<'a, P: ConstrainedSystem> {
    problem: &'a P,
    hierarchy: MeshHierarchy<P::Field>,
    options: TaiOptions<P>,
    wu: WorkUnits,
}

impl<'a, P: ConstrainedSystem> Tai<'a, P> {
    /// Initializes the engine with default options.
    pub fn new(problem: &'a P, hierarchy: MeshHierarchy<P::Field>) -> Self {
        Self::with_options(problem, hierarchy, TaiOptions::default())
    }

    /// Initializes the engine with given options.
    ///
    /// # Panics
    ///
    /// Panics if the options specify zero down or coarse sweeps.
    pub fn with_options(
        problem: &'a P,
        hierarchy: MeshHierarchy<P::Field>,
        options: TaiOptions<P>,
    ) -> Self {
        assert!(options.down >= 1, "at least one down sweep is required");
        assert!(options.coarse >= 1, "at least one coarse sweep is required");

        let levels = hierarchy.len();

        Self {
            problem,
            hierarchy,
            options,
            wu: WorkUnits::new(levels),
        }
    }

    /// Gets the mesh hierarchy.
    pub fn hierarchy(&self) -> &MeshHierarchy<P::Field> {
        &self.hierarchy
    }

    /// Resets the accumulated work units for a fresh solve.
    pub fn reset(&mut self) {
        self.wu.reset();
    }

    /// Gets the accumulated work units, one unit being one full PGS sweep
    /// on the corresponding level.
    pub fn work_units(&self) -> &WorkUnits {
        &self.wu
    }

    /// Sums the per-level work units weighted by `2^-(distance from the
    /// finest level)`.
    pub fn total_work_units(&self) -> f64 {
        self.wu.total()
    }

    /// Applies one constraint-decomposition V-cycle on level `j`, solving
    /// for a correction `v >= chi` to the defect-constrained problem with
    /// residual functional `ell`. Returns the correction together with the
    /// number of pointwise feasibility repairs.
    ///
    /// On the coarsest level this degenerates to PGS sweeps against `chi`
    /// itself, an inexact direct solve.
    pub fn vcycle(
        &mut self,
        j: usize,
        ell: &OVector<P::Field, Dyn>,
        chi: &OVector<P::Field, Dyn>,
    ) -> Result<(OVector<P::Field, Dyn>, usize), MeshError> {
        let mesh = *self.level(j)?;
        mesh.check_len(ell.len())?;
        mesh.check_len(chi.len())?;

        let mut v = mesh.zeros();

        // Coarsest-level solve: PGS sweeps against the whole defect.
        if j == 0 {
            debug!(
                "coarsest: {} sweeps over m={} nodes",
                self.options.coarse,
                mesh.subintervals()
            );
            let infeasible = self.smooth(
                self.options.coarse,
                &mesh,
                0,
                &mut v,
                ell,
                chi,
                self.options.coarsest_omega,
            );
            return Ok((v, infeasible));
        }

        // Monotone restriction decomposes the defect obstacle; this level
        // smooths only against the change in the defect, so no slack is
        // allocated twice.
        let chi_coarse = mesh.monotone_restrict(chi)?;
        let mut phi = chi - mesh.prolong(&chi_coarse)?;
        if self.options.up > 0 {
            let half: P::Field = convert(0.5);
            phi *= half;
        }

        debug!(
            "level {}: {} sweeps over m={} nodes",
            j,
            self.options.down,
            mesh.subintervals()
        );
        let mut infeasible = self.smooth(
            self.options.down,
            &mesh,
            j,
            &mut v,
            ell,
            &phi,
            self.options.omega,
        );

        // Update and canonically restrict the residual, then recurse.
        let r = self.problem.residual(&mesh, &v, ell);
        let ell_coarse = mesh.restrict_functional(&r)?;
        let (v_coarse, coarse_infeasible) = self.vcycle(j - 1, &ell_coarse, &chi_coarse)?;

        v += mesh.prolong(&v_coarse)?;
        infeasible += coarse_infeasible;

        if self.options.up > 0 {
            debug!(
                "level {}: {} up sweeps over m={} nodes",
                j,
                self.options.up,
                mesh.subintervals()
            );
            infeasible += self.smooth(
                self.options.up,
                &mesh,
                j,
                &mut v,
                ell,
                &phi,
                self.options.omega,
            );
        }

        Ok((v, infeasible))
    }

    #[allow(clippy::too_many_arguments)]
    fn smooth(
        &mut self,
        sweeps: usize,
        mesh: &MeshLevel<P::Field>,
        j: usize,
        v: &mut OVector<P::Field, Dyn>,
        ell: &OVector<P::Field, Dyn>,
        phi: &OVector<P::Field, Dyn>,
        omega: P::Field,
    ) -> usize {
        let mut infeasible = 0;

        for _ in 0..sweeps {
            infeasible += self.problem.projected_sweep(mesh, v, ell, phi, omega, true);
            if self.options.symmetric {
                infeasible += self
                    .problem
                    .projected_sweep(mesh, v, ell, phi, omega, false);
            }
        }

        let per_sweep = if self.options.symmetric { 2.0 } else { 1.0 };
        self.wu.add(j, sweeps as f64 * per_sweep);

        infeasible
    }

    fn level(&self, j: usize) -> Result<&MeshLevel<P::Field>, MeshError> {
        if j < self.hierarchy.len() {
            Ok(self.hierarchy.level(j))
        } else {
            Err(MeshError::LevelRange { level: j })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::DVector;

    use crate::core::Obstacle;
    use crate::testing::{ObstacleKind, PoissonObstacle};

    #[test]
    fn zero_residual_and_slack_defect_give_zero_correction() {
        let f = PoissonObstacle::new(ObstacleKind::Low);
        let mut tai = Tai::new(&f, MeshHierarchy::new(0, 3));
        let top = tai.hierarchy().len() - 1;
        let mesh = *tai.hierarchy().finest();

        let ell = mesh.zeros();
        let chi = Obstacle::sampled(&mesh, |x| f.obstacle(x)).defect(&mesh.zeros());

        let (v, infeasible) = tai.vcycle(top, &ell, &chi).unwrap();

        assert_eq!(infeasible, 0);
        assert_abs_diff_eq!(mesh.l2norm(&v).unwrap(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn positive_defect_is_repaired_and_counted() {
        let f = PoissonObstacle::new(ObstacleKind::Low);
        let mut tai = Tai::new(&f, MeshHierarchy::new(0, 2));
        let top = tai.hierarchy().len() - 1;
        let mesh = *tai.hierarchy().finest();

        // A positive defect means the current iterate is below the
        // obstacle; the coarsest solve has to climb up to it.
        let ell = mesh.zeros();
        let chi = DVector::from_element(mesh.nodes(), 0.5);

        let (v, infeasible) = tai.vcycle(top, &ell, &chi).unwrap();

        assert!(infeasible > 0);
        let mid = mesh.subintervals() / 2;
        assert!(v[mid] >= 0.5 - 1e-10);
    }

    #[test]
    fn rejects_mismatched_defect_length() {
        let f = PoissonObstacle::new(ObstacleKind::Low);
        let mut tai = Tai::new(&f, MeshHierarchy::new(0, 2));
        let mesh = *tai.hierarchy().finest();

        let ell = mesh.zeros();
        let chi = DVector::from_element(3, 0.0);
        assert!(matches!(
            tai.vcycle(2, &ell, &chi),
            Err(MeshError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn work_units_count_sweeps_per_level() {
        let f = PoissonObstacle::new(ObstacleKind::IceLike);
        let mut options = TaiOptions::default();
        options.set_down(2).set_up(0).set_coarse(3).set_symmetric(true);
        let mut tai = Tai::with_options(&f, MeshHierarchy::new(0, 2), options);
        let mesh = *tai.hierarchy().finest();

        let ell = mesh.zeros();
        let chi = Obstacle::sampled(&mesh, |x| f.obstacle(x)).defect(&mesh.zeros());
        tai.vcycle(2, &ell, &chi).unwrap();

        // Symmetric sweeps double every count.
        assert_eq!(tai.work_units().per_level(), &[6.0, 4.0, 4.0]);
    }
}
