#![deny(missing_docs)]

//! Reference energy models implementing [`sgc_core::EnergyModel`].
//!
//! These are deliberately small: a nearest-neighbour lattice gas with named
//! coefficients and a flat model whose energy ignores the configuration.
//! Production runs plug a cluster-expansion evaluator into the same trait.

/// Configuration-independent energy model.
pub mod flat;
/// Nearest-neighbour lattice gas.
pub mod pair;
/// Periodic lattice geometries.
pub mod shape;

pub use flat::{FlatModel, FLAT_ENERGY_COEFFICIENT};
pub use pair::{singlet_name, PairLatticeModel, CONSTANT_COEFFICIENT, PAIR_COEFFICIENT};
pub use shape::LatticeShape;
