//! # Rebalancing
//!
//! The third vault operation. Anyone may call it — a rebalance can only
//! move the vault toward its policy target, so permissioning it would
//! add nothing but a liveness dependency on one operator. Callers are
//! paid a share of the profit their call realizes (see [`incentive`]),
//! which is what keeps keepers showing up.
//!
//! The split of responsibilities:
//!
//! - [`policy`] decides the target allocation (pure, versioned);
//! - [`engine`] executes the difference between observed and target
//!   state against the venue adapters and registers the realized
//!   profit or loss into the exchange rate;
//! - [`incentive`] sizes and settles the caller's reward.

pub mod engine;
pub mod incentive;
pub mod policy;

pub use engine::{RebalanceEngine, RebalanceReport};
pub use incentive::{incentive_for, IncentivePayout};
pub use policy::{LeveragedPolicy, RebalancePolicy, SupplyOnlyPolicy};
