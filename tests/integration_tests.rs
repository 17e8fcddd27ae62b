use engram::checkpoint::CheckpointStore;
use engram::network::SpikePattern;
use engram::params::{
    InitialSynWeight, NeuronParams, PairStdpParams, SessionParams, SynapseModel,
};
use engram::telemetry::{spawn_sink, TelemetryStore};
use engram::trainer::Session;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Two classes, each mapped to its own half of a 16 channel input layer.
/// The threshold is low enough for a converged pattern to drive its class
/// members directly.
fn make_session_params() -> SessionParams {
    let mut params = SessionParams::default();
    params.class_size = 5;
    params.class_amount = 2;
    params.cycle_time = 30.0;
    params.active_threshold = 2;
    params.inactive_threshold = 0;
    params.checkpoint_every = 1;
    params.network.num_inputs = 16;
    params.network.num_outputs = 10;
    params.network.neuron_params = NeuronParams {
        resting_voltage: 0.0,
        threshold_voltage: 2.0,
    };
    params.network.synapse_model = SynapseModel::PairStdp(PairStdpParams::default());
    params.network.initial_syn_weight = InitialSynWeight::Randomized(0.4);
    params.network.seed_override = Some(7);
    params
}

fn make_pattern(class: usize, rng: &mut StdRng) -> SpikePattern {
    let base: Vec<usize> = (class * 8..class * 8 + 8).collect();
    let dropped = rng.gen_range(0..base.len());

    let active: Vec<usize> = base
        .into_iter()
        .enumerate()
        .filter(|&(i, _)| i != dropped)
        .map(|(_, id)| id)
        .collect();

    SpikePattern::from_active_inputs(&active, 1.0)
}

#[test]
fn supervised_training_learns_the_class_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoints")).unwrap();

    let mut session = Session::start(make_session_params(), store, None).unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..100 {
        let class = rng.gen_range(0..2);
        let pattern = make_pattern(class, &mut rng);
        session.run_trial(&pattern, class).unwrap();
    }

    let test_set: Vec<(SpikePattern, usize)> = (0..20)
        .map(|i| {
            let class = i % 2;
            (make_pattern(class, &mut rng), class)
        })
        .collect();

    let report = session.test_network(&test_set).unwrap();
    assert!(
        report.rate >= 80.0,
        "expected the trained network to classify held out patterns, got {}%",
        report.rate
    );

    // supervision drives the within-class weights well above the
    // untouched cross-class average
    let weights = session.network().synapse_weights();
    let mut class_0_weight_sum = 0.0;
    let mut cross_weight_sum = 0.0;
    for input in 0..8 {
        for output in 0..5 {
            class_0_weight_sum += weights[input * 10 + output];
        }
        for output in 5..10 {
            cross_weight_sum += weights[input * 10 + output];
        }
    }
    assert!(class_0_weight_sum > cross_weight_sum);
}

#[test]
fn crash_and_resume_preserves_steps_and_telemetry() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint_dir = dir.path().join("checkpoints");
    let telemetry_dir = dir.path().join("telemetry");

    let mut rng = StdRng::seed_from_u64(1);
    let session_id;

    {
        let store = CheckpointStore::new(&checkpoint_dir).unwrap();
        let telemetry_store = TelemetryStore::new(&telemetry_dir).unwrap();
        let sink = spawn_sink(telemetry_store);

        let mut session =
            Session::start(make_session_params(), store, Some(Box::new(sink))).unwrap();
        session_id = session.session_id().to_string();

        for step in 0..6 {
            let class = step % 2;
            session.run_trial(&make_pattern(class, &mut rng), class).unwrap();
        }

        // dropped without complete(), as if the process had died
    }

    let readback = TelemetryStore::new(&telemetry_dir).unwrap();
    let step_rows = readback.step_rows().unwrap();
    assert_eq!(step_rows.len(), 6);
    for (expected_step, row) in step_rows.iter().enumerate() {
        assert_eq!(row.id, session_id);
        assert_eq!(row.step, expected_step as u64);
    }

    let hyperparameter_rows = readback.hyperparameter_rows().unwrap();
    assert!(!hyperparameter_rows.is_empty());
    assert!(hyperparameter_rows
        .iter()
        .any(|row| row.parameter == "class_amount" && row.value == "2"));

    let store = CheckpointStore::new(&checkpoint_dir).unwrap();
    let telemetry_store = TelemetryStore::new(&telemetry_dir).unwrap();
    let sink = spawn_sink(telemetry_store);

    let mut session = Session::resume(
        &session_id,
        make_session_params(),
        store,
        Some(Box::new(sink)),
    )
    .unwrap();

    assert_eq!(session.step(), 6);
    assert_eq!(session.results().len(), 6);

    session.run_trial(&make_pattern(0, &mut rng), 0).unwrap();
    drop(session);

    // resuming emitted no second hello, and the step log continued where
    // it left off
    let readback = TelemetryStore::new(&telemetry_dir).unwrap();
    let hyperparameter_rows_after = readback.hyperparameter_rows().unwrap();
    assert_eq!(hyperparameter_rows_after.len(), hyperparameter_rows.len());

    let step_rows = readback.step_rows().unwrap();
    assert_eq!(step_rows.len(), 7);
    assert_eq!(step_rows[6].step, 6);
}

#[test]
fn resume_with_altered_hyperparameters_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let session_id;

    {
        let store = CheckpointStore::new(dir.path()).unwrap();
        let session = Session::start(make_session_params(), store, None).unwrap();
        session_id = session.session_id().to_string();
    }

    let mut altered = make_session_params();
    altered.cycle_time = 40.0;

    let store = CheckpointStore::new(dir.path()).unwrap();
    let result = Session::resume(&session_id, altered, store, None);

    let err = result.err().unwrap();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("cycle_time"));
}

#[test]
fn completed_session_can_be_resumed_for_further_testing() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let session_id;

    {
        let store = CheckpointStore::new(dir.path()).unwrap();
        let mut session = Session::start(make_session_params(), store, None).unwrap();
        session_id = session.session_id().to_string();

        for _ in 0..20 {
            let class = rng.gen_range(0..2);
            session.run_trial(&make_pattern(class, &mut rng), class).unwrap();
        }

        let state = session.complete().unwrap();
        assert_eq!(state.step, 20);
    }

    let store = CheckpointStore::new(dir.path()).unwrap();
    let mut session =
        Session::resume(&session_id, make_session_params(), store, None).unwrap();

    assert_eq!(session.step(), 20);

    // evaluation on the restored network mutates nothing
    let weights = session.network().synapse_weights();
    session.evaluate(&make_pattern(0, &mut rng), 0).unwrap();
    assert_eq!(session.network().synapse_weights(), weights);
    assert_eq!(session.step(), 20);
}
