use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top level configuration of a training session. Validated once by
/// [`validate_session_params`] before any trial runs; invalid values are
/// rejected as [`Error::Configuration`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    pub class_size: usize,
    pub class_amount: usize,
    /// Duration of one trial presentation in milliseconds.
    pub cycle_time: f64,
    /// Number of supervision passes applied after each trial.
    pub train_passes: usize,
    /// Minimum number of target class members expected to spike.
    pub active_threshold: usize,
    /// Maximum number of non-target class members allowed to spike.
    pub inactive_threshold: usize,
    /// Checkpoint cadence in trials. 1 means after every trial.
    pub checkpoint_every: u64,
    pub supervision: SupervisionTimes,
    pub network: NetworkParams,
}

/// Timing of the forced spikes used during a supervision pass, as offsets
/// into each half of the supervision window. Depression spikes must land
/// before the replayed input, potentiation spikes after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionTimes {
    pub depress_offset: f64,
    pub replay_offset: f64,
    pub potentiate_offset: f64,
    /// Offset of the hold spike into the second half of the window.
    pub hold_offset: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkParams {
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub neuron_params: NeuronParams,
    pub synapse_model: SynapseModel,
    pub initial_syn_weight: InitialSynWeight,
    pub seed_override: Option<u64>,
}

/// Output neurons integrate instantaneous current increments and fire when
/// the threshold is reached. Continuous membrane dynamics are delegated to
/// the simulation substrate and are out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuronParams {
    pub resting_voltage: f64,
    pub threshold_voltage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SynapseModel {
    /// Fixed per-spike current increment, no plastic state. Baseline
    /// configuration, not suited for learning.
    Static(StaticSynapseParams),
    /// Single pair of decaying traces added to the weight on each opposite
    /// event, without a causal timestamp gate. Provided for comparison.
    BasicStdp(BasicStdpParams),
    /// Pair-based STDP with eligibility traces, last-spike timestamps and a
    /// strict causal ordering gate.
    PairStdp(PairStdpParams),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSynapseParams {
    pub psp_increment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicStdpParams {
    pub tau_pre: f64,
    pub tau_post: f64,
    pub boost_pre: f64,
    pub boost_post: f64,
    pub max_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairStdpParams {
    pub tau_ltp: f64,
    pub tau_ltd: f64,
    /// Trace increment applied on a presynaptic spike.
    pub boost_ltp: f64,
    /// Trace increment applied on a postsynaptic spike. Negative by
    /// default, which makes the depression contribution lower the weight.
    pub boost_ltd: f64,
    /// Potentiation learning rate.
    pub rate_ltp: f64,
    /// Depression learning rate.
    pub rate_ltd: f64,
    pub max_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InitialSynWeight {
    /// Uniformly random in `[0, value)`.
    Randomized(f64),
    Constant(f64),
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            class_size: 5,
            class_amount: 10,
            cycle_time: 30.0,
            train_passes: 2,
            active_threshold: 2,
            inactive_threshold: 0,
            checkpoint_every: 1,
            supervision: SupervisionTimes::default(),
            network: NetworkParams::default(),
        }
    }
}

impl Default for SupervisionTimes {
    fn default() -> Self {
        Self {
            depress_offset: 10.0,
            replay_offset: 15.0,
            potentiate_offset: 20.0,
            hold_offset: 5.0,
        }
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            num_inputs: 1,
            num_outputs: 50,
            neuron_params: NeuronParams::default(),
            synapse_model: SynapseModel::PairStdp(PairStdpParams::default()),
            initial_syn_weight: InitialSynWeight::Randomized(0.4),
            seed_override: None,
        }
    }
}

impl Default for NeuronParams {
    fn default() -> Self {
        Self {
            resting_voltage: 0.0,
            threshold_voltage: 200.0,
        }
    }
}

impl Default for StaticSynapseParams {
    fn default() -> Self {
        Self {
            psp_increment: 70.0,
        }
    }
}

impl Default for BasicStdpParams {
    fn default() -> Self {
        let max_weight = 0.05;
        let boost_pre = 0.01 * max_weight;
        Self {
            tau_pre: 20.0,
            tau_post: 20.0,
            boost_pre,
            boost_post: -boost_pre * 1.05,
            max_weight,
        }
    }
}

impl Default for PairStdpParams {
    fn default() -> Self {
        Self {
            tau_ltp: 20.0,
            tau_ltd: 20.0,
            boost_ltp: 1.0,
            boost_ltd: -1.0,
            rate_ltp: 2e-2,
            rate_ltd: 2.4e-2,
            max_weight: 0.4,
        }
    }
}

impl SessionParams {
    /// Snapshot of the hyperparameters as a name to value mapping. Taken
    /// once at session start, persisted with every checkpoint and carried
    /// by the hello telemetry message. Operational knobs (checkpoint
    /// cadence, seed override) are deliberately left out.
    pub fn hyperparameters(&self) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();

        let mut put_usize = |name: &str, value: usize| {
            result.insert(name.to_string(), value.to_string());
        };

        put_usize("class_size", self.class_size);
        put_usize("class_amount", self.class_amount);
        put_usize("train_passes", self.train_passes);
        put_usize("active_threshold", self.active_threshold);
        put_usize("inactive_threshold", self.inactive_threshold);
        put_usize("num_inputs", self.network.num_inputs);
        put_usize("num_outputs", self.network.num_outputs);

        let mut put = |name: &str, value: f64| {
            result.insert(name.to_string(), value.to_string());
        };

        put("cycle_time", self.cycle_time);
        put("depress_offset", self.supervision.depress_offset);
        put("replay_offset", self.supervision.replay_offset);
        put("potentiate_offset", self.supervision.potentiate_offset);
        put("hold_offset", self.supervision.hold_offset);
        put("resting_voltage", self.network.neuron_params.resting_voltage);
        put(
            "threshold_voltage",
            self.network.neuron_params.threshold_voltage,
        );

        match &self.network.synapse_model {
            SynapseModel::Static(params) => {
                put("synapse_model", 0.0);
                put("psp_increment", params.psp_increment);
            }
            SynapseModel::BasicStdp(params) => {
                put("synapse_model", 1.0);
                put("tau_pre", params.tau_pre);
                put("tau_post", params.tau_post);
                put("boost_pre", params.boost_pre);
                put("boost_post", params.boost_post);
                put("max_weight", params.max_weight);
            }
            SynapseModel::PairStdp(params) => {
                put("synapse_model", 2.0);
                put("tau_ltp", params.tau_ltp);
                put("tau_ltd", params.tau_ltd);
                put("boost_ltp", params.boost_ltp);
                put("boost_ltd", params.boost_ltd);
                put("rate_ltp", params.rate_ltp);
                put("rate_ltd", params.rate_ltd);
                put("max_weight", params.max_weight);
            }
        }

        match self.network.initial_syn_weight {
            InitialSynWeight::Randomized(value) => put("initial_syn_weight_randomized", value),
            InitialSynWeight::Constant(value) => put("initial_syn_weight_constant", value),
        }

        result
    }
}

pub fn validate_session_params(session_params: &SessionParams) -> Result<()> {
    if session_params.class_size == 0 {
        return Err(Error::configuration("class_size must be strictly positive"));
    }

    if session_params.class_amount == 0 {
        return Err(Error::configuration(
            "class_amount must be strictly positive",
        ));
    }

    if session_params.class_size * session_params.class_amount
        != session_params.network.num_outputs
    {
        return Err(Error::configuration(format!(
            "class_size * class_amount must equal num_outputs: {} * {} != {}",
            session_params.class_size,
            session_params.class_amount,
            session_params.network.num_outputs
        )));
    }

    if session_params.cycle_time <= 0.0 {
        return Err(Error::configuration("cycle_time must be strictly positive"));
    }

    if session_params.train_passes == 0 {
        return Err(Error::configuration(
            "train_passes must be strictly positive",
        ));
    }

    if session_params.active_threshold > session_params.class_size {
        return Err(Error::configuration(
            "active_threshold must not be greater than class_size",
        ));
    }

    if session_params.inactive_threshold > session_params.class_size {
        return Err(Error::configuration(
            "inactive_threshold must not be greater than class_size",
        ));
    }

    if session_params.checkpoint_every == 0 {
        return Err(Error::configuration(
            "checkpoint_every must be strictly positive",
        ));
    }

    validate_supervision_times(&session_params.supervision, session_params.cycle_time)?;
    validate_network_params(&session_params.network)?;

    Ok(())
}

fn validate_supervision_times(supervision: &SupervisionTimes, cycle_time: f64) -> Result<()> {
    let offsets = [
        ("depress_offset", supervision.depress_offset),
        ("replay_offset", supervision.replay_offset),
        ("potentiate_offset", supervision.potentiate_offset),
        ("hold_offset", supervision.hold_offset),
    ];

    for (name, offset) in offsets {
        if offset <= 0.0 {
            return Err(Error::configuration(format!(
                "{} must be strictly positive",
                name
            )));
        }

        if offset >= cycle_time {
            return Err(Error::configuration(format!(
                "{} must be less than cycle_time",
                name
            )));
        }
    }

    if supervision.depress_offset >= supervision.replay_offset {
        return Err(Error::configuration(
            "depress_offset must be less than replay_offset",
        ));
    }

    if supervision.replay_offset >= supervision.potentiate_offset {
        return Err(Error::configuration(
            "replay_offset must be less than potentiate_offset",
        ));
    }

    Ok(())
}

pub fn validate_network_params(network_params: &NetworkParams) -> Result<()> {
    if network_params.num_inputs == 0 {
        return Err(Error::configuration("num_inputs must be strictly positive"));
    }

    if network_params.num_outputs == 0 {
        return Err(Error::configuration(
            "num_outputs must be strictly positive",
        ));
    }

    validate_neuron_params(&network_params.neuron_params)?;
    validate_synapse_model(&network_params.synapse_model)?;

    match network_params.initial_syn_weight {
        InitialSynWeight::Randomized(max_weight) => {
            if max_weight <= 0.0 {
                return Err(Error::configuration(
                    "parameter for randomized initial synaptic weight must be strictly positive",
                ));
            }
        }
        InitialSynWeight::Constant(weight) => {
            if weight < 0.0 {
                return Err(Error::configuration(
                    "parameter for constant initial synaptic weight must not be negative",
                ));
            }
        }
    }

    Ok(())
}

fn validate_neuron_params(neuron_params: &NeuronParams) -> Result<()> {
    if neuron_params.threshold_voltage <= neuron_params.resting_voltage {
        return Err(Error::configuration(
            "threshold_voltage must be greater than resting_voltage",
        ));
    }

    Ok(())
}

pub fn validate_synapse_model(synapse_model: &SynapseModel) -> Result<()> {
    match synapse_model {
        SynapseModel::Static(params) => {
            if params.psp_increment <= 0.0 {
                return Err(Error::configuration(
                    "psp_increment must be strictly positive",
                ));
            }
        }
        SynapseModel::BasicStdp(params) => {
            if params.tau_pre <= 0.0 {
                return Err(Error::configuration("tau_pre must be strictly positive"));
            }

            if params.tau_post <= 0.0 {
                return Err(Error::configuration("tau_post must be strictly positive"));
            }

            if params.max_weight <= 0.0 {
                return Err(Error::configuration("max_weight must be strictly positive"));
            }
        }
        SynapseModel::PairStdp(params) => {
            if params.tau_ltp <= 0.0 {
                return Err(Error::configuration("tau_ltp must be strictly positive"));
            }

            if params.tau_ltd <= 0.0 {
                return Err(Error::configuration("tau_ltd must be strictly positive"));
            }

            if params.rate_ltp < 0.0 {
                return Err(Error::configuration("rate_ltp must not be negative"));
            }

            if params.rate_ltd < 0.0 {
                return Err(Error::configuration("rate_ltd must not be negative"));
            }

            if params.max_weight <= 0.0 {
                return Err(Error::configuration("max_weight must be strictly positive"));
            }
        }
    }

    Ok(())
}
