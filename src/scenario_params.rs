use engram::params::SessionParams;

pub fn get_scenario_params() -> SessionParams {
    let params_yaml_str = r#"
class_size: 5
class_amount: 2
cycle_time: 30.0
train_passes: 2
active_threshold: 2
inactive_threshold: 0
checkpoint_every: 10
supervision:
  depress_offset: 10.0
  replay_offset: 15.0
  potentiate_offset: 20.0
  hold_offset: 5.0
network:
  num_inputs: 16
  num_outputs: 10
  neuron_params:
    resting_voltage: 0.0
    threshold_voltage: 2.0
  synapse_model: !PairStdp
    tau_ltp: 20.0
    tau_ltd: 20.0
    boost_ltp: 1.0
    boost_ltd: -1.0
    rate_ltp: 0.02
    rate_ltd: 0.024
    max_weight: 0.4
  initial_syn_weight: !Randomized 0.4
  seed_override: 0
"#;

    serde_yaml::from_str(params_yaml_str).unwrap()
}
