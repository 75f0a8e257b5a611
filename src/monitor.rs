//! Convergence diagnostics for obstacle problems.
//!
//! Monitoring has no effect on the iteration; it reports through the `log`
//! facade and returns the norms for the caller's stopping logic.

use log::debug;
use nalgebra::{Dyn, OVector};

use crate::core::{ConstrainedSystem, MeshError, MeshLevel};

/// Measures the progress of an obstacle-problem solve on one mesh level.
///
/// Where the constraint is active the raw residual is meaningless for
/// convergence, so the monitored quantity is the norm of the inactive
/// residual (see [`ConstrainedSystem::inactive_residual`]), optionally
/// alongside the numerical error against a known exact solution.
pub struct ObstacleMonitor<'a, P: ConstrainedSystem> {
    problem: &'a P,
    mesh: &'a MeshLevel<P::Field>,
}

impl<'a, P: ConstrainedSystem> ObstacleMonitor<'a, P> {
    /// Creates the monitor for given problem and mesh level.
    pub fn new(problem: &'a P, mesh: &'a MeshLevel<P::Field>) -> Self {
        Self { problem, mesh }
    }

    /// Computes the L² norm of the inactive residual of `u` and, when an
    /// exact solution is provided, the L² norm of the error `u - exact`.
    pub fn inactive_residual_and_error(
        &self,
        u: &OVector<P::Field, Dyn>,
        ell: &OVector<P::Field, Dyn>,
        phi: &OVector<P::Field, Dyn>,
        exact: Option<&OVector<P::Field, Dyn>>,
    ) -> Result<(P::Field, Option<P::Field>), MeshError> {
        self.mesh.check_len(u.len())?;
        self.mesh.check_len(ell.len())?;
        self.mesh.check_len(phi.len())?;

        let r = self.problem.inactive_residual(self.mesh, u, ell, phi);
        let rnorm = self.mesh.l2norm(&r)?;

        let enorm = match exact {
            Some(uex) => Some(self.mesh.l2norm(&(u - uex))?),
            None => None,
        };

        match enorm {
            Some(enorm) => debug!(
                "inactive residual norm {}, error norm {}",
                rnorm, enorm
            ),
            None => debug!("inactive residual norm {}", rnorm),
        }

        Ok((rnorm, enorm))
    }
}
