//! Full approximation storage (FAS) multigrid cycles.
//!
//! The [full approximation
//! storage](https://en.wikipedia.org/wiki/Multigrid_method#Nonlinear_multigrid)
//! scheme extends geometric multigrid to nonlinear operators: instead of
//! transferring corrections between levels, every level solves for a full
//! approximation of the solution, and the coarse right-hand side
//!
//! ```text
//! ell_coarse = R'(ell - F(u)) + F_coarse(R u)
//! ```
//!
//! makes the coarse problem consistent with the fine nonlinear residual.
//! [`Fas`] implements the recursive V-cycle and the nested-iteration F-cycle
//! driven by nonlinear Gauss-Seidel (NGS) smoothing, with the pointwise
//! relaxation delegated to the [`System`] implementation.
//!
//! # References
//!
//! \[1\] [Multi-Level Adaptive Solutions to Boundary-Value
//! Problems](https://www.ams.org/journals/mcom/1977-31-138/S0025-5718-1977-0431719-X/)
//!
//! \[2\] [A Multigrid Tutorial, Second
//! Edition](https://epubs.siam.org/doi/book/10.1137/1.9780898719505)
//!
//! \[3\] [PETSc for Partial Differential
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611976311)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{Dyn, OVector};

use crate::core::{MeshError, MeshHierarchy, MeshLevel, System};

use super::work::WorkUnits;

/// Options for the [`Fas`] cycle engine.
#[derive(Debug, Clone, Copy, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct FasOptions {
    /// NGS sweeps constituting the inexact solve on the coarsest level.
    /// Default: `1`.
    coarse: usize,
    /// NGS sweeps before the coarse-grid correction. Default: `1`.
    down: usize,
    /// NGS sweeps after the coarse-grid correction, applied in backward
    /// order to cancel the directional bias of the down sweeps. Default:
    /// `1`.
    up: usize,
    /// Newton iterations per pointwise relaxation. Default: `2`.
    newton_iters: usize,
}

impl Default for FasOptions {
    fn default() -> Self {
        Self {
            coarse: 1,
            down: 1,
            up: 1,
            newton_iters: 2,
        }
    }
}

/// FAS cycle engine. See [module](self) documentation for more details.
///
/// The engine owns the mesh hierarchy and accumulates per-level work units
/// across cycles; [`Fas::reset`] clears the accumulators so the engine can
/// run a fresh, independent solve.
pub struct Fas<'a, P: System> {
    problem: &'a P,
    hierarchy: MeshHierarchy<P::Field>,
    options: FasOptions,
    wu: WorkUnits,
}

impl<'a, P: System> Fas<'a, P> {
    /// Initializes the engine with default options.
    pub fn new(problem: &'a P, hierarchy: MeshHierarchy<P::Field>) -> Self {
        Self::with_options(problem, hierarchy, FasOptions::default())
    }

    /// Initializes the engine with given options.
    pub fn with_options(
        problem: &'a P,
        hierarchy: MeshHierarchy<P::Field>,
        options: FasOptions,
    ) -> Self {
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

    /// Gets the accumulated work units, one unit being one full NGS sweep
    /// on the corresponding level.
    pub fn work_units(&self) -> &WorkUnits {
        &self.wu
    }

    /// Sums the per-level work units weighted by `2^-(distance from the
    /// finest level)`, since a sweep on a level touches half as many
    /// unknowns as one on the next-finer level.
    pub fn total_work_units(&self) -> f64 {
        self.wu.total()
    }

    /// Builds the right-hand-side functional on level `j` from the problem
    /// source term.
    pub fn rhs(&self, j: usize) -> OVector<P::Field, Dyn> {
        let mesh = self.hierarchy.level(j);
        let g = mesh.coordinates().map(|x| self.problem.source(x));
        mesh.functional(&g)
    }

    /// Computes the L² norm of the residual `ell - F(u)` on level `j`.
    pub fn residual_norm(
        &self,
        j: usize,
        u: &OVector<P::Field, Dyn>,
        ell: &OVector<P::Field, Dyn>,
    ) -> Result<P::Field, MeshError> {
        let mesh = self.level(j)?;
        mesh.check_len(u.len())?;
        mesh.check_len(ell.len())?;

        let mut fu = mesh.zeros();
        self.problem.eval(mesh.spacing(), u, &mut fu);

        mesh.l2norm(&(ell - fu))
    }

    /// Applies one FAS V-cycle for levels `j` down to the coarsest, acting
    /// in place on the iterate `u` with right-hand-side functional `ell`.
    ///
    /// On the coarsest level this degenerates to the inexact coarse solve.
    pub fn vcycle(
        &mut self,
        j: usize,
        u: &mut OVector<P::Field, Dyn>,
        ell: &OVector<P::Field, Dyn>,
    ) -> Result<(), MeshError> {
        let mesh = *self.level(j)?;
        mesh.check_len(u.len())?;
        mesh.check_len(ell.len())?;

        if j == 0 {
            self.coarse_solve(u, ell);
            return Ok(());
        }

        // Smooth: forward NGS sweeps on this level.
        for _ in 0..self.options.down {
            self.sweep(&mesh, u, ell, true);
        }
        self.wu.add(j, self.options.down as f64);

        // Restrict using  ell_coarse = R'(ell - F(u)) + F_coarse(R u).
        let coarse_mesh = *self.hierarchy.level(j - 1);
        let mut fu = mesh.zeros();
        self.problem.eval(mesh.spacing(), u, &mut fu);
        let rfine = ell - fu;

        let ru = mesh.restrict_vector(u)?;
        let mut ell_coarse = mesh.restrict_functional(&rfine)?;
        let mut fru = coarse_mesh.zeros();
        self.problem.eval(coarse_mesh.spacing(), &ru, &mut fru);
        ell_coarse += fru;

        // Recurse and correct by the prolonged update  u += P(u_coarse - R u).
        let mut u_coarse = ru.clone();
        self.vcycle(j - 1, &mut u_coarse, &ell_coarse)?;
        let du = u_coarse - ru;
        debug!(
            "level {}: coarse update norm {}",
            j,
            coarse_mesh.l2norm(&du)?
        );
        *u += mesh.prolong(&du)?;

        // Smooth: backward NGS sweeps on this level.
        for _ in 0..self.options.up {
            self.sweep(&mesh, u, ell, false);
        }
        self.wu.add(j, self.options.up as f64);

        Ok(())
    }

    /// Runs the nested-iteration F-cycle over the whole hierarchy and
    /// returns the finest-level solution.
    ///
    /// Starting from an inexact solve on the coarsest level, each finer
    /// level obtains its initial iterate by prolongation, optionally
    /// `enhanced` by NGS corrections restricted to the newly introduced
    /// odd-indexed nodes (half a work unit), and is then improved by one
    /// V-cycle per intermediate level and `cycles` V-cycles on the finest.
    /// Right-hand sides are rebuilt on every level from the problem source
    /// term, never transferred.
    pub fn fcycle(
        &mut self,
        cycles: usize,
        enhanced: bool,
    ) -> Result<OVector<P::Field, Dyn>, MeshError> {
        let mut u = self.hierarchy.coarsest().zeros();
        let mut ell = self.rhs(0);

        debug!(
            "fcycle level 0: residual norm {}",
            self.residual_norm(0, &u, &ell)?
        );
        self.coarse_solve(&mut u, &ell);

        for j in 1..self.hierarchy.len() {
            ell = self.rhs(j);
            u = if enhanced {
                let up = self.enhanced_prolong(j, &u, &ell)?;
                self.wu.add(j, 0.5);
                up
            } else {
                self.hierarchy.level(j).prolong(&u)?
            };

            let count = if j + 1 == self.hierarchy.len() {
                cycles
            } else {
                1
            };
            for _ in 0..count {
                debug!(
                    "fcycle level {}: residual norm {}",
                    j,
                    self.residual_norm(j, &u, &ell)?
                );
                self.vcycle(j, &mut u, &ell)?;
            }
        }

        Ok(u)
    }

    // Inexact coarsest-level solve by NGS sweeps, in place on u.
    fn coarse_solve(&mut self, u: &mut OVector<P::Field, Dyn>, ell: &OVector<P::Field, Dyn>) {
        let mesh = *self.hierarchy.coarsest();
        for _ in 0..self.options.coarse {
            self.sweep(&mesh, u, ell, true);
        }
        self.wu.add(0, self.options.coarse as f64);
    }

    // One NGS sweep over the interior nodes in the given order.
    fn sweep(
        &self,
        mesh: &MeshLevel<P::Field>,
        u: &mut OVector<P::Field, Dyn>,
        ell: &OVector<P::Field, Dyn>,
        forward: bool,
    ) {
        let h = mesh.spacing();
        let iters = self.options.newton_iters;
        let m = mesh.subintervals();

        if forward {
            for p in 1..m {
                self.problem.relax_point(h, u, ell, p, iters);
            }
        } else {
            for p in (1..m).rev() {
                self.problem.relax_point(h, u, ell, p, iters);
            }
        }
    }

    // Enhanced prolongation for the F-cycle: linear interpolation followed
    // by pointwise NGS at the odd-indexed nodes only.
    fn enhanced_prolong(
        &self,
        j: usize,
        u: &OVector<P::Field, Dyn>,
        ell: &OVector<P::Field, Dyn>,
    ) -> Result<OVector<P::Field, Dyn>, MeshError> {
        let mesh = self.hierarchy.level(j);
        let mut y = mesh.prolong(u)?;

        for p in (1..mesh.subintervals()).step_by(2) {
            self.problem
                .relax_point(mesh.spacing(), &mut y, ell, p, self.options.newton_iters);
        }

        Ok(y)
    }

    fn level(&self, j: usize) -> Result<&MeshLevel<P::Field>, MeshError> {
        if j < self.hierarchy.len() {
            Ok(self.hierarchy.level(j))
        } else {
            Err(MeshError::LevelRange { level: j })
        }
    }
}
