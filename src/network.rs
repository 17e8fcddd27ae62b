//! Two-layer fully connected network substrate. Input spikes and forced
//! output spikes are scheduled ahead of time and processed strictly in
//! timestamp order within `advance`, so plasticity updates for any given
//! synapse are applied with non-decreasing timestamps.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::neuron::Neuron;
use crate::params::{self, InitialSynWeight, NetworkParams};
use crate::spike_record::SpikeRecord;
use crate::synapse::Synapse;

/// Discrete input stimulus: (input neuron id, time offset) pairs relative
/// to the injection time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpikePattern {
    pub spikes: Vec<(usize, f64)>,
}

impl SpikePattern {
    /// Pattern spiking each of the given inputs once at a common offset.
    pub fn from_active_inputs(input_ids: &[usize], offset: f64) -> Self {
        Self {
            spikes: input_ids.iter().map(|&id| (id, offset)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spikes.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SpikeEventKind {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    InputSpike(usize),
    ForcedOutputSpike(usize),
}

#[derive(Debug, Clone, Copy)]
struct ScheduledEvent {
    t: f64,
    seq: u64,
    event: Event,
}

/// Full state of the substrate at a point in time, used for checkpoints
/// and dry-run evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub t: f64,
    pub neurons: Vec<Neuron>,
    pub synapses: Vec<Synapse>,
}

pub fn create_network(params: NetworkParams) -> Result<Network> {
    params::validate_network_params(&params)?;

    let mut rng = match params.seed_override {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let num_synapses = params.num_inputs * params.num_outputs;
    let mut synapses = Vec::with_capacity(num_synapses);

    for _ in 0..num_synapses {
        let initial_weight = match params.initial_syn_weight {
            InitialSynWeight::Randomized(max_weight) => rng.gen::<f64>() * max_weight,
            InitialSynWeight::Constant(weight) => weight,
        };
        synapses.push(Synapse::create(&params.synapse_model, initial_weight)?);
    }

    let neurons = (0..params.num_outputs)
        .map(|_| Neuron::new(&params.neuron_params))
        .collect();

    let spike_record = SpikeRecord::new(params.num_outputs);

    Ok(Network {
        params,
        t: 0.0,
        neurons,
        synapses,
        pending: Vec::new(),
        next_seq: 0,
        spike_record,
    })
}

pub struct Network {
    params: NetworkParams,
    t: f64,
    neurons: Vec<Neuron>,
    synapses: Vec<Synapse>,
    pending: Vec<ScheduledEvent>,
    next_seq: u64,
    spike_record: SpikeRecord,
}

impl Network {
    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn num_inputs(&self) -> usize {
        self.params.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.params.num_outputs
    }

    /// Schedules the pattern's input spikes relative to the current time.
    /// Nothing is scheduled if any spike in the pattern is invalid.
    pub fn inject(&mut self, pattern: &SpikePattern) -> Result<()> {
        for &(input_id, offset) in &pattern.spikes {
            if input_id >= self.params.num_inputs {
                return Err(Error::simulation(format!(
                    "invalid input neuron id: {}",
                    input_id
                )));
            }

            if offset < 0.0 {
                return Err(Error::simulation(format!(
                    "negative spike time offset: {}",
                    offset
                )));
            }
        }

        for &(input_id, offset) in &pattern.spikes {
            self.schedule(self.t + offset, Event::InputSpike(input_id));
        }

        Ok(())
    }

    /// Schedules a forced output spike: the neuron fires at the given
    /// offset regardless of its voltage.
    pub fn force_spike(&mut self, neuron_id: usize, offset: f64) -> Result<()> {
        if neuron_id >= self.params.num_outputs {
            return Err(Error::simulation(format!(
                "invalid output neuron id for forced spike: {}",
                neuron_id
            )));
        }

        if offset < 0.0 {
            return Err(Error::simulation(format!(
                "negative spike time offset: {}",
                offset
            )));
        }

        self.schedule(self.t + offset, Event::ForcedOutputSpike(neuron_id));
        Ok(())
    }

    fn schedule(&mut self, t: f64, event: Event) {
        self.pending.push(ScheduledEvent {
            t,
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
    }

    /// Advances the substrate by `duration`, processing all scheduled
    /// events with a timestamp inside the window in non-decreasing order.
    /// The spike record only covers the advanced window; events scheduled
    /// beyond it stay pending.
    pub fn advance(&mut self, duration: f64) -> Result<&SpikeRecord> {
        if duration <= 0.0 {
            return Err(Error::simulation(format!(
                "advance duration must be strictly positive, got {}",
                duration
            )));
        }

        self.spike_record.clear();

        let t_end = self.t + duration;

        // equal timestamps keep their scheduling order
        self.pending
            .sort_by(|a, b| a.t.total_cmp(&b.t).then(a.seq.cmp(&b.seq)));

        let mut remaining = Vec::new();

        for scheduled in std::mem::take(&mut self.pending) {
            if scheduled.t > t_end {
                remaining.push(scheduled);
                continue;
            }

            match scheduled.event {
                Event::InputSpike(input_id) => self.process_input_spike(input_id, scheduled.t),
                Event::ForcedOutputSpike(neuron_id) => {
                    self.neurons[neuron_id].reset(&self.params.neuron_params);
                    self.fire_output(neuron_id, scheduled.t);
                }
            }
        }

        self.pending = remaining;
        self.t = t_end;

        Ok(&self.spike_record)
    }

    /// Delivers a single spike event to one synapse, bypassing the event
    /// queue. External substrate surface; timestamps must not go backwards.
    pub fn deliver_spike_event(
        &mut self,
        input_id: usize,
        output_id: usize,
        kind: SpikeEventKind,
        t: f64,
    ) -> Result<()> {
        if input_id >= self.params.num_inputs || output_id >= self.params.num_outputs {
            return Err(Error::simulation(format!(
                "invalid synapse coordinate: ({}, {})",
                input_id, output_id
            )));
        }

        if t < self.t {
            return Err(Error::simulation(format!(
                "spike event timestamp {} precedes substrate time {}",
                t, self.t
            )));
        }

        let synapse = &mut self.synapses[input_id * self.params.num_outputs + output_id];

        match kind {
            SpikeEventKind::Pre => {
                let psp = synapse.on_pre_spike(t);
                if self.neurons[output_id].apply_current(psp, &self.params.neuron_params) {
                    self.fire_output(output_id, t);
                }
            }
            SpikeEventKind::Post => synapse.on_post_spike(t),
        }

        Ok(())
    }

    pub fn synapse_weights(&self) -> Vec<f64> {
        self.synapses.iter().map(Synapse::weight).collect()
    }

    /// Spikes recorded since the start of the current window.
    pub fn spike_record(&self) -> &SpikeRecord {
        &self.spike_record
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            t: self.t,
            neurons: self.neurons.clone(),
            synapses: self.synapses.clone(),
        }
    }

    /// Restores a previously taken snapshot. Pending events and the spike
    /// record are dropped along with the replaced state.
    pub fn restore(&mut self, snapshot: NetworkSnapshot) -> Result<()> {
        if snapshot.neurons.len() != self.neurons.len()
            || snapshot.synapses.len() != self.synapses.len()
        {
            return Err(Error::simulation(
                "network snapshot does not match network dimensions",
            ));
        }

        self.t = snapshot.t;
        self.neurons = snapshot.neurons;
        self.synapses = snapshot.synapses;
        self.pending.clear();
        self.spike_record.clear();

        Ok(())
    }

    fn process_input_spike(&mut self, input_id: usize, t: f64) {
        let num_outputs = self.params.num_outputs;
        let mut fired = Vec::new();

        for output_id in 0..num_outputs {
            let psp = self.synapses[input_id * num_outputs + output_id].on_pre_spike(t);
            if self.neurons[output_id].apply_current(psp, &self.params.neuron_params) {
                fired.push(output_id);
            }
        }

        for output_id in fired {
            self.fire_output(output_id, t);
        }
    }

    fn fire_output(&mut self, output_id: usize, t: f64) {
        self.spike_record.push(output_id, t);

        for input_id in 0..self.params.num_inputs {
            self.synapses[input_id * self.params.num_outputs + output_id].on_post_spike(t);
        }
    }
}
