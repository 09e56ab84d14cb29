//! Signal-processing building blocks shared by the simulation engine.

pub mod decimator;

pub use decimator::Decimator;
