use serde::{Deserialize, Serialize};

/// Per-neuron log of spike timestamps. Append-only during a trial, cleared
/// between trials. Owned by the network substrate; the analysis functions
/// only read snapshots of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeRecord {
    times: Vec<Vec<f64>>,
}

impl SpikeRecord {
    pub fn new(num_neurons: usize) -> Self {
        Self {
            times: vec![Vec::new(); num_neurons],
        }
    }

    pub fn num_neurons(&self) -> usize {
        self.times.len()
    }

    pub fn push(&mut self, neuron_id: usize, t: f64) {
        self.times[neuron_id].push(t);
    }

    pub fn times(&self, neuron_id: usize) -> &[f64] {
        &self.times[neuron_id]
    }

    pub fn clear(&mut self) {
        for times in &mut self.times {
            times.clear();
        }
    }

    pub fn total_spikes(&self) -> usize {
        self.times.iter().map(Vec::len).sum()
    }
}
