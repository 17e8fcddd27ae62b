//! Training session orchestration: repeated presentation of labeled input
//! patterns, per-class spike analysis, supervision passes, durable
//! checkpointing and best-effort telemetry.

use std::time::{SystemTime, UNIX_EPOCH};

use itertools::Itertools;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::analysis;
use crate::checkpoint::{Checkpoint, CheckpointStore, StepResult, TrainingState};
use crate::error::{Error, Result};
use crate::network::{create_network, Network, SpikePattern};
use crate::params::{self, SessionParams};
use crate::telemetry::{TelemetryMessage, TelemetrySink, TrainingPayload};
use crate::types::HashSet;

/// Result of one trial presentation.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub step: u64,
    pub predicted_class: Option<usize>,
    pub correct: bool,
    /// Number of spiking members per class group.
    pub class_counts: Vec<usize>,
}

/// Aggregate result of a test run over a set of labeled patterns.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub successes: Vec<bool>,
    pub success_count: usize,
    /// Success rate in percent.
    pub rate: f64,
}

/// Label decision policy: the class with the most spiking members wins; a
/// tie for the top count yields no prediction (and counts as incorrect).
pub fn predict_class(class_counts: &[usize]) -> Option<usize> {
    let max = *class_counts.iter().max()?;
    let mut winners = class_counts.iter().positions(|&count| count == max);

    let first = winners.next()?;
    if winners.next().is_some() {
        None
    } else {
        Some(first)
    }
}

pub struct Session {
    params: SessionParams,
    network: Network,
    state: TrainingState,
    store: CheckpointStore,
    telemetry: Option<Box<dyn TelemetrySink + Send>>,
    offline: bool,
    rng: StdRng,
}

impl Session {
    /// Validates the configuration, builds the network substrate,
    /// generates a fresh session id, snapshots the hyperparameters, emits
    /// the hello telemetry message and persists the step 0 checkpoint.
    pub fn start(
        session_params: SessionParams,
        store: CheckpointStore,
        telemetry: Option<Box<dyn TelemetrySink + Send>>,
    ) -> Result<Self> {
        params::validate_session_params(&session_params)?;

        let network = create_network(session_params.network.clone())?;
        let session_id = generate_session_id();

        let state = TrainingState {
            session_id: session_id.clone(),
            step: 0,
            hyperparameters: session_params.hyperparameters(),
            results: Vec::new(),
        };

        let rng = make_rng(session_params.network.seed_override);

        let mut session = Self {
            params: session_params,
            network,
            state,
            store,
            telemetry,
            offline: false,
            rng,
        };

        session.emit(TelemetryMessage::Hello {
            name: session.state.session_id.clone(),
            payload: session.state.hyperparameters.clone(),
        });
        session.checkpoint()?;

        info!("started session {}", session.state.session_id);
        Ok(session)
    }

    /// Restores the last persisted checkpoint of the given session. The
    /// offered parameters must snapshot to exactly the persisted
    /// hyperparameters. The hello message is not re-emitted.
    pub fn resume(
        session_id: &str,
        session_params: SessionParams,
        store: CheckpointStore,
        telemetry: Option<Box<dyn TelemetrySink + Send>>,
    ) -> Result<Self> {
        params::validate_session_params(&session_params)?;

        let checkpoint = store.load(session_id)?;
        let offered = session_params.hyperparameters();
        let persisted = &checkpoint.training_state.hyperparameters;

        if &offered != persisted {
            let detail = persisted
                .iter()
                .find(|(name, value)| offered.get(*name) != Some(*value))
                .map(|(name, value)| {
                    format!(
                        "hyperparameter '{}' persisted as {} but requested as {}",
                        name,
                        value,
                        offered
                            .get(name)
                            .map(String::as_str)
                            .unwrap_or("<absent>")
                    )
                })
                .unwrap_or_else(|| "requested hyperparameters not in persisted set".to_string());

            return Err(Error::ResumeMismatch(detail));
        }

        let mut network = create_network(session_params.network.clone())?;
        network.restore(checkpoint.network)?;

        let rng = make_rng(session_params.network.seed_override);

        let session = Self {
            params: session_params,
            network,
            state: checkpoint.training_state,
            store,
            telemetry,
            offline: false,
            rng,
        };

        info!(
            "resumed session {} at step {}",
            session.state.session_id, session.state.step
        );
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    pub fn step(&self) -> u64 {
        self.state.step
    }

    pub fn results(&self) -> &[StepResult] {
        &self.state.results
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Presents one labeled pattern, classifies the response, applies the
    /// supervision passes, records the result and checkpoints at the
    /// configured cadence. A failed trial leaves the training state and
    /// the last checkpoint untouched.
    pub fn run_trial(
        &mut self,
        pattern: &SpikePattern,
        expected_class: usize,
    ) -> Result<TrialOutcome> {
        self.validate_trial_input(pattern, expected_class)?;

        let (class_counts, spiking, non_spiking) = self.present(pattern)?;

        let predicted_class = predict_class(&class_counts);
        let correct = predicted_class == Some(expected_class);

        self.apply_supervision(pattern, expected_class, &spiking, &non_spiking)?;

        let step = self.state.step;
        let value = if correct { 1.0 } else { 0.0 };
        self.state.results.push(StepResult { step, value });
        self.state.step += 1;

        self.emit(TelemetryMessage::Training {
            name: self.state.session_id.clone(),
            payload: TrainingPayload { id: step, value },
        });

        if self.state.step % self.params.checkpoint_every == 0 {
            self.checkpoint()?;
        }

        Ok(TrialOutcome {
            step,
            predicted_class,
            correct,
            class_counts,
        })
    }

    /// Dry-run trial: presents a pattern and classifies the response, but
    /// restores the network afterwards and mutates neither the step
    /// counter nor the result log. Emits a testing telemetry message.
    pub fn evaluate(
        &mut self,
        pattern: &SpikePattern,
        expected_class: usize,
    ) -> Result<TrialOutcome> {
        self.validate_trial_input(pattern, expected_class)?;

        let snapshot = self.network.snapshot();
        let presented = self.present(pattern);
        let restore_result = self.network.restore(snapshot);
        let (class_counts, _, _) = presented?;
        restore_result?;

        let predicted_class = predict_class(&class_counts);
        let correct = predicted_class == Some(expected_class);

        self.emit(TelemetryMessage::Testing {
            name: self.state.session_id.clone(),
            payload: json!({
                "class": expected_class,
                "predicted": predicted_class,
                "success": correct,
            }),
        });

        Ok(TrialOutcome {
            step: self.state.step,
            predicted_class,
            correct,
            class_counts,
        })
    }

    /// Evaluates every labeled pattern in the test set without touching
    /// the network state.
    pub fn test_network(&mut self, test_set: &[(SpikePattern, usize)]) -> Result<TestReport> {
        let mut successes = Vec::with_capacity(test_set.len());

        for (pattern, expected_class) in test_set {
            let outcome = self.evaluate(pattern, *expected_class)?;
            successes.push(outcome.correct);
        }

        let success_count = successes.iter().filter(|&&success| success).count();
        let rate = if successes.is_empty() {
            0.0
        } else {
            success_count as f64 / successes.len() as f64 * 100.0
        };

        Ok(TestReport {
            successes,
            success_count,
            rate,
        })
    }

    /// Persists a final checkpoint and hands the permanent experiment
    /// record back to the caller. The checkpoint file is kept; use
    /// [`CheckpointStore::remove`] to clean it up explicitly.
    pub fn complete(mut self) -> Result<TrainingState> {
        self.checkpoint()?;
        info!(
            "completed session {} after {} steps",
            self.state.session_id, self.state.step
        );
        Ok(self.state)
    }

    fn validate_trial_input(&self, pattern: &SpikePattern, expected_class: usize) -> Result<()> {
        if pattern.is_empty() {
            return Err(Error::simulation("empty input pattern"));
        }

        if expected_class >= self.params.class_amount {
            return Err(Error::simulation(format!(
                "expected class {} out of range (class_amount {})",
                expected_class, self.params.class_amount
            )));
        }

        Ok(())
    }

    /// Runs the pattern through the substrate for one cycle and reduces
    /// the spike record into per-class statistics.
    #[allow(clippy::type_complexity)]
    fn present(
        &mut self,
        pattern: &SpikePattern,
    ) -> Result<(Vec<usize>, Vec<Vec<usize>>, Vec<Vec<usize>>)> {
        self.network.inject(pattern)?;

        let window_start = self.network.t();
        let window_end = window_start + self.params.cycle_time;
        let record = self.network.advance(self.params.cycle_time)?;
        let spike_counts = analysis::count_spikes(record, window_start, window_end);

        let class_counts = analysis::class_spike_counts(
            &spike_counts,
            self.params.class_size,
            self.params.class_amount,
        );
        let (spiking, non_spiking) = analysis::classify_spiking_ids(
            &spike_counts,
            self.params.class_size,
            self.params.class_amount,
        );

        debug!(
            "step {}: class spike counts [{}]",
            self.state.step,
            class_counts.iter().join(", ")
        );

        Ok((class_counts, spiking, non_spiking))
    }

    /// Marks output neurons for the supervision passes and runs them.
    ///
    /// Target class members are held active; if fewer than
    /// `active_threshold` of them spiked, randomly chosen silent members
    /// are potentiated instead. Any other class with more than
    /// `inactive_threshold` spiking members gets randomly chosen members
    /// depressed. Each pass replays the input in both halves of a
    /// `2 * cycle_time` window, with depression spikes landing before the
    /// replay and potentiation spikes after it.
    fn apply_supervision(
        &mut self,
        pattern: &SpikePattern,
        expected_class: usize,
        spiking: &[Vec<usize>],
        non_spiking: &[Vec<usize>],
    ) -> Result<()> {
        let class_size = self.params.class_size;

        let mut potentiate = Vec::new();
        let mut depress = Vec::new();
        let mut hold: HashSet<usize> = HashSet::default();

        for class_id in 0..self.params.class_amount {
            let to_global = |member: &usize| class_id * class_size + member;

            if class_id == expected_class {
                let mut hold_members: Vec<usize> =
                    (0..class_size).map(|i| class_id * class_size + i).collect();

                // the deficit never exceeds the number of silent members
                // because active_threshold <= class_size
                let deficit = self
                    .params
                    .active_threshold
                    .saturating_sub(spiking[class_id].len());
                let mut candidates: Vec<usize> =
                    non_spiking[class_id].iter().map(to_global).collect();

                for _ in 0..deficit {
                    let choice = self.rng.gen_range(0..candidates.len());
                    let neuron = candidates.swap_remove(choice);
                    hold_members.retain(|&member| member != neuron);
                    potentiate.push(neuron);
                }

                hold.extend(hold_members);
            } else {
                let excess = spiking[class_id]
                    .len()
                    .saturating_sub(self.params.inactive_threshold);
                let mut candidates: Vec<usize> = spiking[class_id].iter().map(to_global).collect();

                for _ in 0..excess {
                    let choice = self.rng.gen_range(0..candidates.len());
                    depress.push(candidates.swap_remove(choice));
                }
            }
        }

        let half = self.params.cycle_time;
        let times = &self.params.supervision;
        let replay = SpikePattern {
            spikes: pattern
                .spikes
                .iter()
                .map(|&(input_id, _)| (input_id, times.replay_offset))
                .collect(),
        };
        let replay_second_half = SpikePattern {
            spikes: pattern
                .spikes
                .iter()
                .map(|&(input_id, _)| (input_id, half + times.replay_offset))
                .collect(),
        };

        for _ in 0..self.params.train_passes {
            for &neuron in &depress {
                self.network.force_spike(neuron, times.depress_offset)?;
                self.network.force_spike(neuron, half + times.depress_offset)?;
            }

            self.network.inject(&replay)?;
            self.network.inject(&replay_second_half)?;

            for &neuron in &potentiate {
                self.network.force_spike(neuron, times.potentiate_offset)?;
                self.network
                    .force_spike(neuron, half + times.potentiate_offset)?;
            }

            for &neuron in &hold {
                self.network.force_spike(neuron, half + times.hold_offset)?;
            }

            self.network.advance(2.0 * half)?;
        }

        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        let checkpoint = Checkpoint {
            training_state: self.state.clone(),
            network: self.network.snapshot(),
        };
        self.store.save(&checkpoint)?;

        debug!(
            "persisted checkpoint for session {} at step {}",
            self.state.session_id, self.state.step
        );
        Ok(())
    }

    /// Best-effort delivery: a failure is logged and flips the session
    /// into offline mode, it never interrupts training.
    fn emit(&mut self, message: TelemetryMessage) {
        if self.offline {
            return;
        }

        if let Some(sink) = self.telemetry.as_mut() {
            if let Err(err) = sink.send(message) {
                warn!("{}; entering offline mode", err);
                self.offline = true;
            }
        }
    }
}

fn make_rng(seed_override: Option<u64>) -> StdRng {
    match seed_override {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn generate_session_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("session-{}", now.as_nanos())
}
