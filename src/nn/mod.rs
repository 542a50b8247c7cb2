//! Function approximators and parameter-space utilities.
//!
//! The trust-region solver treats the policy as a flat parameter vector;
//! [`params`] provides the read/write/gradient bridging between burn
//! modules and that flat view.

pub mod mlp;
pub mod params;
pub mod policy;
pub mod value;

pub use mlp::{Mlp, MlpConfig};
pub use params::{collect_grads, flatten_params, param_count, write_flat_params};
pub use policy::{StochasticPolicy, StochasticPolicyConfig};
pub use value::{ValueFunction, ValueFunctionConfig};
