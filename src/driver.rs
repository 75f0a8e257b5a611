//! High-level API for running multigrid solves.
//!
//! This module contains "drivers" that own the mesh hierarchy, the iterate
//! and the right-hand-side data, and provide a simple API to run the cycle
//! iteration until a stopping criterion is reached. [`FasDriver`] runs FAS
//! V-cycles (or an F-cycle) for an unconstrained nonlinear [`System`];
//! [`TaiDriver`] runs constraint-decomposition V-cycles for a
//! [`ConstrainedSystem`], keeping the iterate feasible throughout.
//!
//! The simplest way of using a driver is to initialize it with the
//! defaults and iterate until the residual norm has dropped enough:
//!
//! ```rust
//! use firn::nalgebra as na;
//! use firn::{FasDriver, Problem, System};
//! use na::storage::{Storage, StorageMut};
//! use na::{Dyn, Vector};
//! #
//! # struct Membrane;
//! #
//! # impl Problem for Membrane {
//! #     type Field = f64;
//! #
//! #     fn source(&self, _x: f64) -> f64 {
//! #         -2.0
//! #     }
//! # }
//! #
//! # impl System for Membrane {
//! #     fn eval<Su, Sf>(&self, h: f64, u: &Vector<f64, Dyn, Su>, fu: &mut Vector<f64, Dyn, Sf>)
//! #     where
//! #         Su: Storage<f64, Dyn>,
//! #         Sf: StorageMut<f64, Dyn>,
//! #     {
//! #         let m = u.len() - 1;
//! #         fu[0] = 0.0;
//! #         fu[m] = 0.0;
//! #         for p in 1..m {
//! #             fu[p] = (2.0 * u[p] - u[p - 1] - u[p + 1]) / h;
//! #         }
//! #     }
//! #
//! #     fn relax_point<Su, Sl>(
//! #         &self,
//! #         h: f64,
//! #         u: &mut Vector<f64, Dyn, Su>,
//! #         ell: &Vector<f64, Dyn, Sl>,
//! #         p: usize,
//! #         _iters: usize,
//! #     ) where
//! #         Su: StorageMut<f64, Dyn>,
//! #         Sl: Storage<f64, Dyn>,
//! #     {
//! #         u[p] = 0.5 * (h * ell[p] + u[p - 1] + u[p + 1]);
//! #     }
//! # }
//!
//! let f = Membrane;
//!
//! let mut driver = FasDriver::builder(&f).with_levels(0, 4).build();
//!
//! let r0 = driver.residual_norm().expect("conforming mesh data");
//! let (_, norm) = driver
//!     .find(|state| state.norm() <= 1e-3 * r0 || state.iter() >= 100)
//!     .expect("driver encountered an error");
//!
//! assert!(norm <= 1e-3 * r0);
//! ```
//!
//! If you need more control over the iteration process, you can do the
//! cycles manually with [`FasDriver::next`], or start from a nested
//! iteration with [`FasDriver::fcycle`]. The stopping criterion is always
//! evaluated by the caller, only at cycle boundaries.

use nalgebra::{DimName, Dyn, OVector, U1};

use crate::core::{ConstrainedSystem, MeshError, MeshHierarchy, Obstacle, Problem, System};
use crate::cycle::{Fas, FasOptions, Tai, TaiOptions};
use crate::monitor::ObstacleMonitor;

/// Builder for the [`FasDriver`].
pub struct FasDriverBuilder<'a, P: System> {
    problem: &'a P,
    kcoarse: usize,
    kfine: usize,
    options: FasOptions,
    initial: Option<Vec<P::Field>>,
}

impl<'a, P: System> FasDriverBuilder<'a, P> {
    fn new(problem: &'a P) -> Self {
        Self {
            problem,
            kcoarse: 0,
            kfine: 3,
            options: FasOptions::default(),
            initial: None,
        }
    }

    /// Sets the coarse and fine mesh levels spanned by the hierarchy.
    pub fn with_levels(mut self, kcoarse: usize, kfine: usize) -> Self {
        self.kcoarse = kcoarse;
        self.kfine = kfine;
        self
    }

    /// Sets the cycle options.
    pub fn with_options(mut self, options: FasOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the initial iterate on the finest level from which the cycles
    /// start. The default is the zero vector.
    pub fn with_initial(mut self, initial: Vec<P::Field>) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Builds the [`FasDriver`].
    pub fn build(self) -> FasDriver<'a, P> {
        let hierarchy = MeshHierarchy::new(self.kcoarse, self.kfine);
        let engine = Fas::with_options(self.problem, hierarchy, self.options);

        let top = engine.hierarchy().len() - 1;
        let mesh = *engine.hierarchy().finest();
        let ell = engine.rhs(top);

        let u = match self.initial {
            Some(values) => {
                assert!(
                    values.len() == mesh.nodes(),
                    "initial iterate of wrong length"
                );
                OVector::from_vec_generic(Dyn(values.len()), U1::name(), values)
            }
            None => mesh.zeros(),
        };

        FasDriver {
            problem: self.problem,
            engine,
            u,
            ell,
            top,
        }
    }
}

/// The driver for solving an unconstrained nonlinear problem by FAS
/// multigrid cycles.
///
/// For default settings, use [`FasDriver::new`]. For more flexibility, use
/// [`FasDriver::builder`]. For the usage of the driver, see [module](self)
/// documentation.
pub struct FasDriver<'a, P: System> {
    problem: &'a P,
    engine: Fas<'a, P>,
    u: OVector<P::Field, Dyn>,
    ell: OVector<P::Field, Dyn>,
    top: usize,
}

impl<'a, P: System> FasDriver<'a, P> {
    /// Returns the builder for specifying additional settings.
    pub fn builder(problem: &'a P) -> FasDriverBuilder<'a, P> {
        FasDriverBuilder::new(problem)
    }

    /// Initializes the driver with the default settings.
    pub fn new(problem: &'a P) -> Self {
        FasDriver::builder(problem).build()
    }

    /// Returns reference to the current iterate on the finest level.
    pub fn x(&self) -> &[P::Field] {
        self.u.as_slice()
    }

    /// Returns the mesh hierarchy.
    pub fn hierarchy(&self) -> &MeshHierarchy<P::Field> {
        self.engine.hierarchy()
    }

    /// Computes the L² norm of the current finest-level residual.
    pub fn residual_norm(&self) -> Result<P::Field, MeshError> {
        self.engine.residual_norm(self.top, &self.u, &self.ell)
    }

    /// Computes the L² norm of the error against the exact solution, if the
    /// problem knows one.
    pub fn error_norm(&self) -> Result<Option<P::Field>, MeshError> {
        error_norm(self.problem, self.engine.hierarchy(), &self.u)
    }

    /// Returns the total weighted work units spent so far.
    pub fn work_units(&self) -> f64 {
        self.engine.total_work_units()
    }

    /// Does one V-cycle, returning the norm of the residual in case of no
    /// error.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<P::Field, MeshError> {
        self.engine.vcycle(self.top, &mut self.u, &self.ell)?;
        self.residual_norm()
    }

    /// Replaces the iterate by the result of a nested-iteration F-cycle
    /// with `cycles` V-cycles on the finest level, returning the norm of
    /// the residual. See [`Fas::fcycle`].
    pub fn fcycle(&mut self, cycles: usize, enhanced: bool) -> Result<P::Field, MeshError> {
        self.u = self.engine.fcycle(cycles, enhanced)?;
        self.residual_norm()
    }

    /// Runs V-cycles until given stopping criterion is satisfied.
    pub fn find<C>(&mut self, stop: C) -> Result<(&[P::Field], P::Field), MeshError>
    where
        C: Fn(FasIterState<'_, P>) -> bool,
    {
        let mut iter = 0;

        loop {
            let norm = self.next()?;

            let state = FasIterState {
                x: &self.u,
                norm,
                work_units: self.engine.total_work_units(),
                iter,
            };

            if stop(state) {
                return Ok((self.u.as_slice(), norm));
            }

            iter += 1;
        }
    }
}

/// State of the current FAS iteration.
pub struct FasIterState<'a, P: Problem> {
    x: &'a OVector<P::Field, Dyn>,
    norm: P::Field,
    work_units: f64,
    iter: usize,
}

impl<'a, P: Problem> FasIterState<'a, P> {
    /// Returns reference to the current iterate.
    pub fn x(&self) -> &[P::Field] {
        self.x.as_slice()
    }

    /// Returns the norm of the current residual.
    pub fn norm(&self) -> P::Field {
        self.norm
    }

    /// Returns the total weighted work units spent so far.
    pub fn work_units(&self) -> f64 {
        self.work_units
    }

    /// Returns the current iteration number.
    pub fn iter(&self) -> usize {
        self.iter
    }
}

/// Builder for the [`TaiDriver`].
pub struct TaiDriverBuilder<'a, P: ConstrainedSystem> {
    problem: &'a P,
    kcoarse: usize,
    kfine: usize,
    options: TaiOptions<P>,
}

impl<'a, P: ConstrainedSystem> TaiDriverBuilder<'a, P> {
    fn new(problem: &'a P) -> Self {
        Self {
            problem,
            kcoarse: 0,
            kfine: 3,
            options: TaiOptions::default(),
        }
    }

    /// Sets the coarse and fine mesh levels spanned by the hierarchy.
    pub fn with_levels(mut self, kcoarse: usize, kfine: usize) -> Self {
        self.kcoarse = kcoarse;
        self.kfine = kfine;
        self
    }

    /// Sets the cycle options.
    pub fn with_options(mut self, options: TaiOptions<P>) -> Self {
        self.options = options;
        self
    }

    /// Builds the [`TaiDriver`].
    pub fn build(self) -> TaiDriver<'a, P> {
        let hierarchy = MeshHierarchy::new(self.kcoarse, self.kfine);
        let engine = Tai::with_options(self.problem, hierarchy, self.options);

        let top = engine.hierarchy().len() - 1;
        let mesh = *engine.hierarchy().finest();

        let obstacle = Obstacle::sampled(&mesh, |x| self.problem.obstacle(x));
        let ell = mesh.functional(&mesh.coordinates().map(|x| self.problem.source(x)));
        let u = obstacle.feasible_start();

        TaiDriver {
            problem: self.problem,
            engine,
            obstacle,
            u,
            ell,
            top,
            infeasible: 0,
        }
    }
}

/// The driver for solving an obstacle problem by constraint-decomposition
/// multigrid cycles.
///
/// The initial iterate is the feasible vector `max(phi, 0)`; every cycle
/// solves for a correction to the defect-constrained problem and keeps the
/// iterate feasible. For default settings, use [`TaiDriver::new`]. For more
/// flexibility, use [`TaiDriver::builder`]. For the usage of the driver,
/// see [module](self) documentation.
pub struct TaiDriver<'a, P: ConstrainedSystem> {
    problem: &'a P,
    engine: Tai<'a, P>,
    obstacle: Obstacle<P::Field>,
    u: OVector<P::Field, Dyn>,
    ell: OVector<P::Field, Dyn>,
    top: usize,
    infeasible: usize,
}

impl<'a, P: ConstrainedSystem> TaiDriver<'a, P> {
    /// Returns the builder for specifying additional settings.
    pub fn builder(problem: &'a P) -> TaiDriverBuilder<'a, P> {
        TaiDriverBuilder::new(problem)
    }

    /// Initializes the driver with the default settings.
    pub fn new(problem: &'a P) -> Self {
        TaiDriver::builder(problem).build()
    }

    /// Returns reference to the current iterate on the finest level.
    pub fn x(&self) -> &[P::Field] {
        self.u.as_slice()
    }

    /// Returns the mesh hierarchy.
    pub fn hierarchy(&self) -> &MeshHierarchy<P::Field> {
        self.engine.hierarchy()
    }

    /// Returns the discrete obstacle on the finest level.
    pub fn obstacle(&self) -> &Obstacle<P::Field> {
        &self.obstacle
    }

    /// Returns the number of pointwise feasibility repairs accumulated over
    /// all cycles so far. Nonzero counts under `omega <= 1` and zero up
    /// sweeps indicate a bug.
    pub fn infeasible(&self) -> usize {
        self.infeasible
    }

    /// Returns the total weighted work units spent so far.
    pub fn work_units(&self) -> f64 {
        self.engine.total_work_units()
    }

    /// Computes the L² norm of the current inactive residual, the quantity
    /// whose reduction measures convergence of a constrained solve.
    pub fn residual_norm(&self) -> Result<P::Field, MeshError> {
        let mesh = self.engine.hierarchy().finest();
        let monitor = ObstacleMonitor::new(self.problem, mesh);
        let (rnorm, _) =
            monitor.inactive_residual_and_error(&self.u, &self.ell, self.obstacle.values(), None)?;
        Ok(rnorm)
    }

    /// Computes the L² norm of the error against the exact solution, if the
    /// problem knows one.
    pub fn error_norm(&self) -> Result<Option<P::Field>, MeshError> {
        error_norm(self.problem, self.engine.hierarchy(), &self.u)
    }

    /// Does one constraint-decomposition V-cycle, returning the norm of the
    /// inactive residual in case of no error.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<P::Field, MeshError> {
        let mesh = *self.engine.hierarchy().finest();

        // The defect obstacle and the base residual of the correction
        // problem are rebuilt from the current iterate every cycle.
        let chi = self.obstacle.defect(&self.u);
        let rhs = self.problem.residual(&mesh, &self.u, &self.ell);

        let (v, infeasible) = self.engine.vcycle(self.top, &rhs, &chi)?;
        self.u += v;
        self.infeasible += infeasible;

        self.residual_norm()
    }

    /// Runs V-cycles until given stopping criterion is satisfied.
    pub fn find<C>(&mut self, stop: C) -> Result<(&[P::Field], P::Field), MeshError>
    where
        C: Fn(TaiIterState<'_, P>) -> bool,
    {
        let mut iter = 0;

        loop {
            let norm = self.next()?;

            let state = TaiIterState {
                x: &self.u,
                norm,
                work_units: self.engine.total_work_units(),
                infeasible: self.infeasible,
                iter,
            };

            if stop(state) {
                return Ok((self.u.as_slice(), norm));
            }

            iter += 1;
        }
    }
}

/// State of the current constraint-decomposition iteration.
pub struct TaiIterState<'a, P: Problem> {
    x: &'a OVector<P::Field, Dyn>,
    norm: P::Field,
    work_units: f64,
    infeasible: usize,
    iter: usize,
}

impl<'a, P: Problem> TaiIterState<'a, P> {
    /// Returns reference to the current iterate.
    pub fn x(&self) -> &[P::Field] {
        self.x.as_slice()
    }

    /// Returns the norm of the current inactive residual.
    pub fn norm(&self) -> P::Field {
        self.norm
    }

    /// Returns the total weighted work units spent so far.
    pub fn work_units(&self) -> f64 {
        self.work_units
    }

    /// Returns the accumulated count of pointwise feasibility repairs.
    pub fn infeasible(&self) -> usize {
        self.infeasible
    }

    /// Returns the current iteration number.
    pub fn iter(&self) -> usize {
        self.iter
    }
}

fn error_norm<P: Problem>(
    problem: &P,
    hierarchy: &MeshHierarchy<P::Field>,
    u: &OVector<P::Field, Dyn>,
) -> Result<Option<P::Field>, MeshError> {
    let mesh = hierarchy.finest();
    let xx = mesh.coordinates();

    let mut uex = mesh.zeros();
    for (p, &x) in xx.iter().enumerate() {
        match problem.exact(x) {
            Some(value) => uex[p] = value,
            None => return Ok(None),
        }
    }

    Ok(Some(mesh.l2norm(&(u - uex))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cycle::{FasOptions, TaiOptions};
    use crate::testing::{Bratu, ObstacleKind, Parabola, PoissonObstacle};

    #[test]
    fn fas_basic_use_case() {
        let f = Parabola::new();
        let mut driver = FasDriver::builder(&f).with_levels(0, 5).build();

        let r0 = driver.residual_norm().unwrap();
        let (_, norm) = driver
            .find(|state| state.norm() <= 1e-3 * r0 || state.iter() >= 50)
            .unwrap();

        assert!(norm <= 1e-3 * r0);
        assert!(driver.error_norm().unwrap().unwrap() < 1e-3);
        assert!(driver.work_units() > 0.0);
    }

    #[test]
    fn fas_nested_iteration() {
        let f = Bratu::new(1.0);
        let mut driver = FasDriver::builder(&f).with_levels(0, 6).build();

        let norm = driver.fcycle(2, true).unwrap();
        assert!(norm.is_finite());
        assert!(driver.error_norm().unwrap().unwrap() < 0.05);
    }

    #[test]
    fn fas_initial_iterate() {
        let f = Parabola::new();
        let mesh_nodes = 2usize.pow(3) + 1;
        let x0 = vec![0.25; mesh_nodes];

        let driver = FasDriver::builder(&f)
            .with_levels(0, 2)
            .with_initial(x0.clone())
            .build();

        assert_eq!(driver.x(), &x0);
    }

    #[test]
    #[should_panic(expected = "wrong length")]
    fn fas_rejects_misfit_initial_iterate() {
        let f = Parabola::new();
        FasDriver::builder(&f)
            .with_levels(0, 2)
            .with_initial(vec![0.0; 4])
            .build();
    }

    #[test]
    fn tai_inactive_obstacle_reduces_to_poisson() {
        let f = PoissonObstacle::new(ObstacleKind::Low);
        let mut driver = TaiDriver::builder(&f).with_levels(0, 6).build();

        let r0 = driver.residual_norm().unwrap();
        let (_, norm) = driver
            .find(|state| state.norm() <= 1e-3 * r0 || state.iter() >= 100)
            .unwrap();

        assert!(norm <= 1e-3 * r0);
        assert_eq!(driver.infeasible(), 0);
        assert!(driver.error_norm().unwrap().unwrap() < 1e-2);
    }

    #[test]
    fn tai_icelike_converges_to_exact_contact_solution() {
        let f = PoissonObstacle::new(ObstacleKind::IceLike);
        let mut driver = TaiDriver::builder(&f).with_levels(0, 6).build();

        let r0 = driver.residual_norm().unwrap();
        let (_, norm) = driver
            .find(|state| state.norm() <= 1e-3 * r0 || state.iter() >= 100)
            .unwrap();

        assert!(norm <= 1e-3 * r0);
        assert_eq!(driver.infeasible(), 0);
        assert!(driver.error_norm().unwrap().unwrap() < 0.05);

        // The iterate never leaves the admissible set.
        let feasible = driver
            .x()
            .iter()
            .zip(driver.obstacle().values().iter())
            .all(|(u, phi)| u >= &(phi - 1e-10));
        assert!(feasible);
    }

    #[test]
    fn tai_symmetric_projected_sor() {
        let f = PoissonObstacle::new(ObstacleKind::Parabola);
        let mut options = TaiOptions::default();
        options
            .set_up(1)
            .set_symmetric(true)
            .set_omega(1.5)
            .set_coarsest_omega(1.0);
        let mut driver = TaiDriver::builder(&f)
            .with_levels(0, 5)
            .with_options(options)
            .build();

        let r0 = driver.residual_norm().unwrap();
        let (_, norm) = driver
            .find(|state| state.norm() <= 1e-3 * r0 || state.iter() >= 100)
            .unwrap();

        assert!(norm <= 1e-3 * r0);
        assert!(driver.error_norm().unwrap().unwrap() < 0.05);
    }

    #[test]
    fn tai_perturbed_obstacle_has_no_exact_solution() {
        let f = PoissonObstacle::new(ObstacleKind::IceLike).with_perturbation(7, 10, 1.0);
        let mut driver = TaiDriver::builder(&f).with_levels(0, 5).build();

        assert!(driver.error_norm().unwrap().is_none());

        let r0 = driver.residual_norm().unwrap();
        let (_, norm) = driver
            .find(|state| state.norm() <= 1e-2 * r0 || state.iter() >= 100)
            .unwrap();
        assert!(norm <= 1e-2 * r0);
    }

    #[test]
    fn fas_custom_options() {
        let f = Parabola::new();
        let mut options = FasOptions::default();
        options.set_down(2).set_up(2).set_coarse(3);
        let mut driver = FasDriver::builder(&f)
            .with_levels(0, 4)
            .with_options(options)
            .build();

        let r0 = driver.residual_norm().unwrap();
        let norm = driver.next().unwrap();
        assert!(norm < r0);
    }
}
