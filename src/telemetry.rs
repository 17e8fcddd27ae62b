//! Telemetry wire protocol and sink. Messages are JSON objects with a
//! `type` discriminator and a type-specific payload; every message is
//! answered with an acknowledgment echo (at most one answer per message,
//! no retry or ordering guarantee beyond the channel itself).
//!
//! The sink persists two logical tables as JSON-lines files:
//! hyperparameters, keyed by (id, parameter), and the step log, keyed by
//! (id, step). Testing payloads have no durable schema and are only
//! logged.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TelemetryMessage {
    Hello {
        name: String,
        payload: BTreeMap<String, String>,
    },
    Training {
        name: String,
        payload: TrainingPayload,
    },
    Testing {
        name: String,
        payload: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPayload {
    pub id: u64,
    pub value: f64,
}

/// Acknowledgment echo sent back for every absorbed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "answer")]
pub struct Answer {
    pub payload: Value,
}

/// Injected telemetry capability. Delivery is best effort: a failed send
/// is reported as [`Error::TelemetryDelivery`] and must never interrupt
/// training.
pub trait TelemetrySink {
    fn send(&mut self, message: TelemetryMessage) -> Result<()>;

    /// Acknowledgments received so far, for liveness detection.
    fn drain_acks(&mut self) -> Vec<Answer> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterRow {
    pub id: String,
    pub parameter: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRow {
    pub id: String,
    pub step: u64,
    pub value: f64,
}

pub struct TelemetryStore {
    dir: PathBuf,
}

impl TelemetryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Persists one message and returns its acknowledgment. Persistence
    /// failures degrade to a negative acknowledgment.
    pub fn absorb(&self, message: &TelemetryMessage) -> Answer {
        let result = self.persist(message);

        if let Err(err) = result {
            warn!("failed to persist telemetry message: {}", err);
            return Answer {
                payload: Value::Bool(false),
            };
        }

        match message {
            TelemetryMessage::Hello { name, .. } => Answer {
                payload: Value::String(name.clone()),
            },
            _ => Answer {
                payload: Value::Bool(true),
            },
        }
    }

    fn persist(&self, message: &TelemetryMessage) -> Result<()> {
        match message {
            TelemetryMessage::Hello { name, payload } => {
                for (parameter, value) in payload {
                    self.append(
                        "hyperparameters.jsonl",
                        &HyperparameterRow {
                            id: name.clone(),
                            parameter: parameter.clone(),
                            value: value.clone(),
                        },
                    )?;
                }
            }
            TelemetryMessage::Training { name, payload } => {
                self.append(
                    "step_log.jsonl",
                    &StepRow {
                        id: name.clone(),
                        step: payload.id,
                        value: payload.value,
                    },
                )?;
            }
            TelemetryMessage::Testing { name, payload } => {
                debug!("testing telemetry from {}: {}", name, payload);
            }
        }

        Ok(())
    }

    pub fn hyperparameter_rows(&self) -> Result<Vec<HyperparameterRow>> {
        self.read_rows("hyperparameters.jsonl")
    }

    pub fn step_rows(&self) -> Result<Vec<StepRow>> {
        self.read_rows("step_log.jsonl")
    }

    fn append<T: Serialize>(&self, file_name: &str, row: &T) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file_name))?;

        writeln!(file, "{}", serde_json::to_string(row)?)?;
        Ok(())
    }

    fn read_rows<T: for<'de> Deserialize<'de>>(&self, file_name: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file_name);

        if !path.exists() {
            return Ok(Vec::new());
        }

        fs::read_to_string(path)?
            .lines()
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }
}

/// Handle to a sink running on its own thread. Messages travel over an
/// ordered channel, acknowledgments come back on a second one; the sender
/// never blocks on them. Dropping the handle closes the channel and joins
/// the sink thread.
pub struct TelemetryClient {
    message_tx: Option<Sender<TelemetryMessage>>,
    answer_rx: Receiver<Answer>,
    join_handle: Option<JoinHandle<()>>,
}

pub fn spawn_sink(store: TelemetryStore) -> TelemetryClient {
    let (message_tx, message_rx) = channel::<TelemetryMessage>();
    let (answer_tx, answer_rx) = channel();

    let join_handle = thread::spawn(move || {
        while let Ok(message) = message_rx.recv() {
            let answer = store.absorb(&message);
            answer_tx.send(answer).ok();
        }
    });

    TelemetryClient {
        message_tx: Some(message_tx),
        answer_rx,
        join_handle: Some(join_handle),
    }
}

impl TelemetrySink for TelemetryClient {
    fn send(&mut self, message: TelemetryMessage) -> Result<()> {
        self.message_tx
            .as_ref()
            .ok_or_else(|| Error::TelemetryDelivery("telemetry channel closed".to_string()))?
            .send(message)
            .map_err(|_| Error::TelemetryDelivery("telemetry channel closed".to_string()))
    }

    fn drain_acks(&mut self) -> Vec<Answer> {
        self.answer_rx.try_iter().collect()
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        drop(self.message_tx.take()); // signals the sink thread to exit the loop

        if let Some(join_handle) = self.join_handle.take() {
            join_handle.join().ok();
        }
    }
}
