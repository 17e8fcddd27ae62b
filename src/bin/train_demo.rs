use std::env;
use std::fs;

use engram::checkpoint::CheckpointStore;
use engram::network::SpikePattern;
use engram::telemetry::{spawn_sink, TelemetryStore};
use engram::trainer::Session;
use rand::{rngs::StdRng, Rng, SeedableRng};

#[path = "../scenario_params.rs"]
mod scenario_params;

/// Each class activates its own half of the input layer, with one of the
/// active inputs randomly dropped per trial as noise.
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

fn main() {
    let params = scenario_params::get_scenario_params();
    let class_amount = params.class_amount;

    let work_dir = env::temp_dir().join("engram-train-demo");
    fs::create_dir_all(&work_dir).unwrap();

    let store = CheckpointStore::new(work_dir.join("checkpoints")).unwrap();
    let telemetry_store = TelemetryStore::new(work_dir.join("telemetry")).unwrap();
    let sink = spawn_sink(telemetry_store);

    let mut session = Session::start(params, store, Some(Box::new(sink))).unwrap();
    eprintln!("session: {}", session.session_id());

    let mut rng = StdRng::seed_from_u64(42);
    let num_trials = 200;
    let mut correct_count = 0usize;

    for _ in 0..num_trials {
        let class = rng.gen_range(0..class_amount);
        let pattern = make_pattern(class, &mut rng);
        let outcome = session.run_trial(&pattern, class).unwrap();

        if outcome.correct {
            correct_count += 1;
        }
    }

    eprintln!(
        "training accuracy: {:.1}% over {} trials",
        correct_count as f64 / num_trials as f64 * 100.0,
        num_trials
    );

    let test_set: Vec<(SpikePattern, usize)> = (0..50)
        .map(|i| {
            let class = i % class_amount;
            (make_pattern(class, &mut rng), class)
        })
        .collect();

    let report = session.test_network(&test_set).unwrap();
    eprintln!(
        "test success rate: {:.1}% ({}/{})",
        report.rate,
        report.success_count,
        report.successes.len()
    );

    let state = session.complete().unwrap();
    eprintln!("completed after {} steps", state.step);
    eprintln!("artifacts under {}", work_dir.display());
}
