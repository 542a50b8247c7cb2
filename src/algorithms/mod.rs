//! Optimization algorithms: advantage estimation, the Gaussian action
//! distribution, and the trust-region step solver.

pub mod gae;
pub mod gaussian;
pub mod trust_region;
