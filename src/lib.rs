pub mod analysis;
pub mod checkpoint;
pub mod error;
pub mod network;
pub mod neuron;
pub mod params;
pub mod spike_record;
pub mod synapse;
pub mod telemetry;
pub mod trainer;
mod types;
mod util;
