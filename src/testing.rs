//! Testing problems and utilities useful for benchmarking, debugging and
//! smoke testing.
//!
//! [`Bratu`] and [`Parabola`] implement [`System`] for the FAS cycles;
//! [`PoissonObstacle`] implements [`ConstrainedSystem`] with a projected
//! Gauss-Seidel smoother for the constraint-decomposition cycles. The
//! obstacle variants are one tagged enum, [`ObstacleKind`], selected at
//! construction time.
//!
//! # References
//!
//! \[1\] [Multigrid methods for obstacle
//! problems](https://www.global-sci.org/jcm/volumes/v27n1/pdf/271-1.pdf)
//!
//! \[2\] [PETSc for Partial Differential
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611976311)

#![allow(unused)]

use std::f64::consts::PI;

use log::warn;
use nalgebra::{
    storage::{Storage, StorageMut},
    Dyn, OVector, Vector,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::core::{
    feasibility_tolerance, poisson_residual, ConstrainedSystem, MeshLevel, Problem, System,
};

/// The Liouville-Bratu problem `-u'' - lam e^u = g` on [0, 1] with zero
/// boundary values and the manufactured solution `u = sin(3 pi x)`, the
/// source `g` chosen to match. The pointwise relaxation is a Newton
/// iteration on the single stencil equation.
#[derive(Debug, Clone, Copy)]
pub struct Bratu {
    lam: f64,
}

impl Bratu {
    /// Initializes the problem with given continuation parameter.
    ///
    /// The parameter **must** be subcritical; above the critical value
    /// (about 3.513830719 in one dimension) the problem has no solution.
    pub fn new(lam: f64) -> Self {
        assert!(lam < 3.513830719, "supercritical lambda");
        Self { lam }
    }

    /// Gets the continuation parameter.
    pub fn lambda(&self) -> f64 {
        self.lam
    }
}

impl Default for Bratu {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Problem for Bratu {
    type Field = f64;

    fn source(&self, x: f64) -> f64 {
        let u = (3.0 * PI * x).sin();
        9.0 * PI * PI * u - self.lam * u.exp()
    }

    fn exact(&self, x: f64) -> Option<f64> {
        Some((3.0 * PI * x).sin())
    }
}

impl System for Bratu {
    fn eval<Su, Sf>(&self, h: f64, u: &Vector<f64, Dyn, Su>, fu: &mut Vector<f64, Dyn, Sf>)
    where
        Su: Storage<f64, Dyn>,
        Sf: StorageMut<f64, Dyn>,
    {
        let m = u.len() - 1;

        fu[0] = 0.0;
        fu[m] = 0.0;
        for p in 1..m {
            fu[p] = (2.0 * u[p] - u[p - 1] - u[p + 1]) / h - h * self.lam * u[p].exp();
        }
    }

    fn relax_point<Su, Sl>(
        &self,
        h: f64,
        u: &mut Vector<f64, Dyn, Su>,
        ell: &Vector<f64, Dyn, Sl>,
        p: usize,
        iters: usize,
    ) where
        Su: StorageMut<f64, Dyn>,
        Sl: Storage<f64, Dyn>,
    {
        for _ in 0..iters {
            let t = h * self.lam * u[p].exp();
            let f = (2.0 * u[p] - u[p - 1] - u[p + 1]) / h - t - ell[p];
            let df = 2.0 / h - t;
            u[p] -= f / df;
        }
    }
}

/// The linear Poisson problem `-u'' = -2` on [0, 1] with zero boundary
/// values and the exact solution `u = x(x - 1)`, which the standard second
/// difference reproduces exactly at the nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parabola;

impl Parabola {
    /// Initializes the problem.
    pub fn new() -> Self {
        Self
    }
}

impl Problem for Parabola {
    type Field = f64;

    fn source(&self, _x: f64) -> f64 {
        -2.0
    }

    fn exact(&self, x: f64) -> Option<f64> {
        Some(x * (x - 1.0))
    }
}

impl System for Parabola {
    fn eval<Su, Sf>(&self, h: f64, u: &Vector<f64, Dyn, Su>, fu: &mut Vector<f64, Dyn, Sf>)
    where
        Su: Storage<f64, Dyn>,
        Sf: StorageMut<f64, Dyn>,
    {
        let m = u.len() - 1;

        fu[0] = 0.0;
        fu[m] = 0.0;
        for p in 1..m {
            fu[p] = (2.0 * u[p] - u[p - 1] - u[p + 1]) / h;
        }
    }

    fn relax_point<Su, Sl>(
        &self,
        h: f64,
        u: &mut Vector<f64, Dyn, Su>,
        ell: &Vector<f64, Dyn, Sl>,
        p: usize,
        _iters: usize,
    ) where
        Su: StorageMut<f64, Dyn>,
        Sl: Storage<f64, Dyn>,
    {
        // The stencil equation is linear, one step solves it exactly.
        u[p] = 0.5 * (h * ell[p] + u[p - 1] + u[p + 1]);
    }
}

/// Choice of obstacle and source for [`PoissonObstacle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObstacleKind {
    /// Obstacle `phi = x(1 - x)` with the piecewise source -16/8, shaped
    /// like an ice sheet over a bed; the exact solution has contact
    /// regions [0, 0.1] and [0.9, 1].
    IceLike,
    /// Obstacle `phi = 8x(1 - x) - 1` with source -2; the exact solution
    /// leaves the obstacle at x = 1/3 and x = 2/3.
    Parabola,
    /// Obstacle `phi = x(1 - x) - 1` lying strictly below the unconstrained
    /// solution `u = x(x - 1)` of `-u'' = -2`, so the constraint is never
    /// active.
    Low,
}

#[derive(Debug, Clone)]
struct ObstaclePerturbation {
    coeffs: Vec<f64>,
    scale: f64,
}

/// The classical obstacle problem for the Poisson equation `-u'' = f` on
/// [0, 1] with zero boundary values: find the admissible `u >= phi`
/// satisfying the associated variational inequality. The smoother is
/// projected Gauss-Seidel, optionally relaxed into projected SOR.
///
/// The obstacle can be perturbed by a smooth random sum of sinusoid modes
/// with normally distributed coefficients, seeded for repeatability; the
/// exact solution is then no longer known.
#[derive(Debug, Clone)]
pub struct PoissonObstacle {
    kind: ObstacleKind,
    fscale: f64,
    perturbation: Option<ObstaclePerturbation>,
}

impl PoissonObstacle {
    /// Initializes the problem of given kind.
    pub fn new(kind: ObstacleKind) -> Self {
        Self::with_fscale(kind, 1.0)
    }

    /// Initializes the problem with the source term multiplied by `fscale`.
    /// The exact solutions hold only for the unit scaling.
    pub fn with_fscale(kind: ObstacleKind, fscale: f64) -> Self {
        assert!(fscale > 0.0, "fscale must be positive");

        Self {
            kind,
            fscale,
            perturbation: None,
        }
    }

    /// Perturbs the obstacle by `modes` sinusoid modes with seeded random
    /// coefficients. The perturbation vanishes at both boundary points.
    pub fn with_perturbation(mut self, seed: u64, modes: usize, scale: f64) -> Self {
        assert!(modes > 0, "at least one perturbation mode is required");

        let mut rng = StdRng::seed_from_u64(seed);
        let coeffs = (0..modes)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect();

        self.perturbation = Some(ObstaclePerturbation { coeffs, scale });
        self
    }

    /// Gets the obstacle kind.
    pub fn kind(&self) -> ObstacleKind {
        self.kind
    }

    /// Determines whether the exact solution is known for this
    /// configuration.
    pub fn exact_available(&self) -> bool {
        self.perturbation.is_none() && self.fscale == 1.0
    }

    fn perturb(&self, x: f64) -> f64 {
        match &self.perturbation {
            None => 0.0,
            Some(perturbation) => {
                let sum: f64 = perturbation
                    .coeffs
                    .iter()
                    .enumerate()
                    .map(|(j, c)| {
                        let k = (j + 1) as f64;
                        c * (k * PI * x).sin() / (k * k)
                    })
                    .sum();
                0.03 * perturbation.scale * sum
            }
        }
    }

    fn pgs_point<Sv, Sl, Sp>(
        &self,
        h: f64,
        v: &mut Vector<f64, Dyn, Sv>,
        ell: &Vector<f64, Dyn, Sl>,
        phi: &Vector<f64, Dyn, Sp>,
        omega: f64,
        p: usize,
    ) -> bool
    where
        Sv: StorageMut<f64, Dyn>,
        Sl: Storage<f64, Dyn>,
        Sp: Storage<f64, Dyn>,
    {
        let repaired = if v[p] < phi[p] - feasibility_tolerance::<f64>() {
            warn!(
                "repairing infeasible value {} below bound {} at node {}",
                v[p], phi[p], p
            );
            v[p] = phi[p];
            true
        } else {
            false
        };

        let c = omega * (0.5 * (h * ell[p] + v[p - 1] + v[p + 1]) - v[p]);
        v[p] = (v[p] + c).max(phi[p]);

        repaired
    }
}

impl Problem for PoissonObstacle {
    type Field = f64;

    fn source(&self, x: f64) -> f64 {
        let f = match self.kind {
            ObstacleKind::IceLike => {
                if !(0.2..=0.8).contains(&x) {
                    -16.0
                } else {
                    8.0
                }
            }
            ObstacleKind::Parabola | ObstacleKind::Low => -2.0,
        };

        self.fscale * f
    }

    fn exact(&self, x: f64) -> Option<f64> {
        if !self.exact_available() {
            return None;
        }

        let u = match self.kind {
            ObstacleKind::IceLike => {
                if x > 0.2 && x < 0.8 {
                    -4.0 * x * x + 4.0 * x - 0.39
                } else if x > 0.1 && x <= 0.2 {
                    8.0 * x * x - 0.8 * x + 0.09
                } else if x >= 0.8 && x < 0.9 {
                    let y = 1.0 - x;
                    8.0 * y * y - 0.8 * y + 0.09
                } else {
                    // Contact regions at both margins.
                    x * (1.0 - x)
                }
            }
            ObstacleKind::Parabola => {
                let a = 1.0 / 3.0;
                if x < a {
                    x * (x - 18.0 * a + 8.0)
                } else if x > 1.0 - a {
                    (1.0 - x) * ((1.0 - x) - 18.0 * a + 8.0)
                } else {
                    8.0 * x * (1.0 - x) - 1.0
                }
            }
            ObstacleKind::Low => x * (x - 1.0),
        };

        Some(u)
    }
}

impl ConstrainedSystem for PoissonObstacle {
    fn obstacle(&self, x: f64) -> f64 {
        let base = match self.kind {
            ObstacleKind::IceLike => x * (1.0 - x),
            ObstacleKind::Parabola => 8.0 * x * (1.0 - x) - 1.0,
            ObstacleKind::Low => x * (1.0 - x) - 1.0,
        };

        base + self.perturb(x)
    }

    fn residual<Su, Sl>(
        &self,
        mesh: &MeshLevel<f64>,
        u: &Vector<f64, Dyn, Su>,
        ell: &Vector<f64, Dyn, Sl>,
    ) -> OVector<f64, Dyn>
    where
        Su: Storage<f64, Dyn>,
        Sl: Storage<f64, Dyn>,
    {
        poisson_residual(mesh, u, ell)
    }

    fn projected_sweep<Sv, Sl, Sp>(
        &self,
        mesh: &MeshLevel<f64>,
        v: &mut Vector<f64, Dyn, Sv>,
        ell: &Vector<f64, Dyn, Sl>,
        phi: &Vector<f64, Dyn, Sp>,
        omega: f64,
        forward: bool,
    ) -> usize
    where
        Sv: StorageMut<f64, Dyn>,
        Sl: Storage<f64, Dyn>,
        Sp: Storage<f64, Dyn>,
    {
        let h = mesh.spacing();
        let m = mesh.subintervals();
        let mut infeasible = 0;

        if forward {
            for p in 1..m {
                if self.pgs_point(h, v, ell, phi, omega, p) {
                    infeasible += 1;
                }
            }
        } else {
            for p in (1..m).rev() {
                if self.pgs_point(h, v, ell, phi, omega, p) {
                    infeasible += 1;
                }
            }
        }

        infeasible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use crate::core::MeshLevel;

    #[test]
    fn bratu_manufactured_solution_matches_source() {
        let f = Bratu::new(1.5);
        let mesh = MeshLevel::<f64>::new(6);

        let uex = mesh.coordinates().map(|x| f.exact(x).unwrap());
        let ell = mesh.functional(&mesh.coordinates().map(|x| f.source(x)));

        let mut fu = mesh.zeros();
        f.eval(mesh.spacing(), &uex, &mut fu);

        let r = mesh.l2norm(&(ell - fu)).unwrap();
        assert!(r < 1e-3, "discretization residual {} too large", r);
    }

    #[test]
    #[should_panic(expected = "supercritical")]
    fn bratu_rejects_supercritical_lambda() {
        Bratu::new(4.0);
    }

    #[test]
    fn parabola_solution_solves_the_stencil_exactly() {
        let f = Parabola::new();
        let mesh = MeshLevel::<f64>::new(4);

        let uex = mesh.coordinates().map(|x| f.exact(x).unwrap());
        let ell = mesh.functional(&mesh.coordinates().map(|x| f.source(x)));

        let mut fu = mesh.zeros();
        f.eval(mesh.spacing(), &uex, &mut fu);

        assert_abs_diff_eq!(mesh.l2norm(&(ell - fu)).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn icelike_exact_is_continuous_and_admissible() {
        let f = PoissonObstacle::new(ObstacleKind::IceLike);

        for x in [0.1, 0.2, 0.8, 0.9] {
            let below = f.exact(x - 1e-9).unwrap();
            let above = f.exact(x + 1e-9).unwrap();
            assert_relative_eq!(below, above, epsilon = 1e-6);
        }

        let mesh = MeshLevel::<f64>::new(7);
        for &x in mesh.coordinates().iter() {
            assert!(f.exact(x).unwrap() >= f.obstacle(x) - 1e-12);
        }
    }

    #[test]
    fn parabola_obstacle_exact_touches_at_one_third() {
        let f = PoissonObstacle::new(ObstacleKind::Parabola);

        let a = 1.0 / 3.0;
        assert_relative_eq!(f.exact(a).unwrap(), f.obstacle(a), epsilon = 1e-12);

        let mesh = MeshLevel::<f64>::new(7);
        for &x in mesh.coordinates().iter() {
            assert!(f.exact(x).unwrap() >= f.obstacle(x) - 1e-12);
        }
    }

    #[test]
    fn low_obstacle_is_never_active() {
        let f = PoissonObstacle::new(ObstacleKind::Low);

        let mesh = MeshLevel::<f64>::new(6);
        for &x in mesh.coordinates().iter() {
            assert!(f.exact(x).unwrap() > f.obstacle(x) + 0.4);
        }
    }

    #[test]
    fn perturbation_is_reproducible_and_vanishes_at_boundary() {
        let f = PoissonObstacle::new(ObstacleKind::IceLike).with_perturbation(1, 30, 1.0);
        let g = PoissonObstacle::new(ObstacleKind::IceLike).with_perturbation(1, 30, 1.0);
        let other = PoissonObstacle::new(ObstacleKind::IceLike).with_perturbation(2, 30, 1.0);

        assert!(!f.exact_available());
        assert_abs_diff_eq!(f.obstacle(0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.obstacle(1.0), 0.0, epsilon = 1e-12);

        assert_abs_diff_eq!(f.obstacle(0.37), g.obstacle(0.37));
        assert!((f.obstacle(0.37) - other.obstacle(0.37)).abs() > 1e-12);
    }

    #[test]
    fn fscale_scales_the_source_only() {
        let f = PoissonObstacle::with_fscale(ObstacleKind::Low, 3.0);
        assert_abs_diff_eq!(f.source(0.5), -6.0);
        assert!(!f.exact_available());
        assert_abs_diff_eq!(
            f.obstacle(0.25),
            PoissonObstacle::new(ObstacleKind::Low).obstacle(0.25)
        );
    }
}
