//! The multigrid cycle engines.
//!
//! [`Fas`](fas::Fas) runs full approximation storage V- and F-cycles for
//! unconstrained nonlinear problems; [`Tai`](tai::Tai) runs multilevel
//! constraint-decomposition V-cycles for obstacle problems. Both share the
//! mesh-transfer layer in [core](crate::core) and the [`WorkUnits`]
//! accounting.

pub mod fas;
pub mod tai;

mod work;

pub use fas::{Fas, FasOptions};
pub use tai::{Tai, TaiOptions};
pub use work::WorkUnits;
