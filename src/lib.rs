#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Firn
//!
//! A pure Rust implementation of geometric multigrid methods for nonlinear
//! and obstacle (variational inequality) problems in one dimension.
//!
//! This library solves elliptic boundary-value problems on [0, 1] over a
//! hierarchy of nested meshes connected by prolongation and restriction
//! operators. Two recursive cycle engines drive the solves: a full
//! approximation storage (FAS) scheme for unconstrained nonlinear problems,
//! and the constraint decomposition method of Tai for problems with a
//! pointwise lower bound (an obstacle). Both achieve the hallmark of
//! multigrid, convergence in a number of work units independent of the mesh
//! resolution, and both delegate everything problem-specific to a trait the
//! user implements.
//!
//! ## Algorithms
//!
//! * [FAS](cycle::fas) -- nonlinear V-cycles and nested-iteration F-cycles
//!   with nonlinear Gauss-Seidel smoothing; use for smooth nonlinear
//!   problems without constraints.
//! * [Tai](cycle::tai) -- multilevel constraint-decomposition V-cycles with
//!   projected Gauss-Seidel smoothing; use for obstacle problems, where the
//!   defect obstacle is decomposed across levels by monotone restriction so
//!   every iterate stays feasible.
//!
//! ## Problem
//!
//! An unconstrained problem is any type implementing [`System`] (an
//! obstacle problem implements [`ConstrainedSystem`] instead). The
//! implementation provides the discrete nonlinear operator and one
//! pointwise relaxation step; the library never needs a Jacobian matrix or
//! an assembled linear system.
//!
//! ```rust
//! use firn::nalgebra as na;
//! use firn::{Problem, System};
//! use na::storage::{Storage, StorageMut};
//! use na::{Dyn, Vector};
//!
//! // A problem is represented by a type. This one is the Liouville-Bratu
//! // equation -u'' - lam e^u = 1 with zero boundary values.
//! struct Bratu {
//!     lam: f64,
//! }
//!
//! impl Problem for Bratu {
//!     // The numeric type. Usually f64 or f32.
//!     type Field = f64;
//!
//!     // The source term of the equation.
//!     fn source(&self, _x: f64) -> f64 {
//!         1.0
//!     }
//! }
//!
//! impl System for Bratu {
//!     // Evaluate the discrete operator at all nodes, zero on the boundary.
//!     fn eval<Su, Sf>(&self, h: f64, u: &Vector<f64, Dyn, Su>, fu: &mut Vector<f64, Dyn, Sf>)
//!     where
//!         Su: Storage<f64, Dyn>,
//!         Sf: StorageMut<f64, Dyn>,
//!     {
//!         let m = u.len() - 1;
//!         fu[0] = 0.0;
//!         fu[m] = 0.0;
//!         for p in 1..m {
//!             fu[p] = (2.0 * u[p] - u[p - 1] - u[p + 1]) / h - h * self.lam * u[p].exp();
//!         }
//!     }
//!
//!     // One pointwise nonlinear Gauss-Seidel update: a few Newton steps
//!     // on the single stencil equation at node p.
//!     fn relax_point<Su, Sl>(
//!         &self,
//!         h: f64,
//!         u: &mut Vector<f64, Dyn, Su>,
//!         ell: &Vector<f64, Dyn, Sl>,
//!         p: usize,
//!         iters: usize,
//!     ) where
//!         Su: StorageMut<f64, Dyn>,
//!         Sl: Storage<f64, Dyn>,
//!     {
//!         for _ in 0..iters {
//!             let t = h * self.lam * u[p].exp();
//!             let f = (2.0 * u[p] - u[p - 1] - u[p + 1]) / h - t - ell[p];
//!             u[p] -= f / (2.0 / h - t);
//!         }
//!     }
//! }
//! ```
//!
//! ## Solving
//!
//! When you have your problem available, you can use the [`FasDriver`] (or
//! the [`TaiDriver`] for obstacle problems) to run the cycle iteration
//! until a stopping criterion is reached.
//!
//! ```rust
//! use firn::FasDriver;
//! # use firn::nalgebra as na;
//! # use firn::{Problem, System};
//! # use na::storage::{Storage, StorageMut};
//! # use na::{Dyn, Vector};
//! #
//! # struct Bratu {
//! #     lam: f64,
//! # }
//! #
//! # impl Problem for Bratu {
//! #     type Field = f64;
//! #
//! #     fn source(&self, _x: f64) -> f64 {
//! #         1.0
//! #     }
//! # }
//! #
//! # impl System for Bratu {
//! #     fn eval<Su, Sf>(&self, h: f64, u: &Vector<f64, Dyn, Su>, fu: &mut Vector<f64, Dyn, Sf>)
//! #     where
//! #         Su: Storage<f64, Dyn>,
//! #         Sf: StorageMut<f64, Dyn>,
//! #     {
//! #         let m = u.len() - 1;
//! #         fu[0] = 0.0;
//! #         fu[m] = 0.0;
//! #         for p in 1..m {
//! #             fu[p] = (2.0 * u[p] - u[p - 1] - u[p + 1]) / h - h * self.lam * u[p].exp();
//! #         }
//! #     }
//! #
//! #     fn relax_point<Su, Sl>(
//! #         &self,
//! #         h: f64,
//! #         u: &mut Vector<f64, Dyn, Su>,
//! #         ell: &Vector<f64, Dyn, Sl>,
//! #         p: usize,
//! #         iters: usize,
//! #     ) where
//! #         Su: StorageMut<f64, Dyn>,
//! #         Sl: Storage<f64, Dyn>,
//! #     {
//! #         for _ in 0..iters {
//! #             let t = h * self.lam * u[p].exp();
//! #             let f = (2.0 * u[p] - u[p - 1] - u[p + 1]) / h - t - ell[p];
//! #             u[p] -= f / (2.0 / h - t);
//! #         }
//! #     }
//! # }
//!
//! let f = Bratu { lam: 1.0 };
//!
//! let mut driver = FasDriver::builder(&f).with_levels(0, 6).build();
//!
//! let r0 = driver.residual_norm().expect("conforming mesh data");
//! let (_, norm) = driver
//!     .find(|state| state.norm() <= 1e-6 * r0 || state.iter() >= 100)
//!     .expect("driver encountered an error");
//!
//! assert!(norm <= 1e-6 * r0);
//! ```
//!
//! If you need full control over the data flowing between levels, use the
//! cycle engines in [cycle](crate::cycle) and the transfer operators on
//! [`MeshLevel`] directly.
//!
//! ## License
//!
//! Licensed under MIT.

pub mod cycle;
pub mod driver;
pub mod monitor;

mod core;

pub use core::*;
pub use driver::{FasDriver, TaiDriver};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
