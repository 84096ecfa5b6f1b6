pub mod backend;
pub mod breakdown;
pub mod data;

pub use backend::{EnergyApi, HttpEnergyApi};
pub use breakdown::compute_breakdown;
pub use data::{BatchData, DataClient, PollSnapshot};
