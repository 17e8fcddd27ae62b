use serde::{Deserialize, Serialize};

use crate::params::NeuronParams;

/// Output layer unit. Integrates instantaneous current increments and
/// fires once the threshold voltage is reached; voltage resets to the
/// resting value on fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neuron {
    pub voltage: f64,
}

impl Neuron {
    pub fn new(neuron_params: &NeuronParams) -> Self {
        Self {
            voltage: neuron_params.resting_voltage,
        }
    }

    /// Applies a current increment and reports whether the neuron fired.
    pub fn apply_current(&mut self, delta: f64, neuron_params: &NeuronParams) -> bool {
        self.voltage += delta;

        if self.voltage >= neuron_params.threshold_voltage {
            self.reset(neuron_params);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self, neuron_params: &NeuronParams) {
        self.voltage = neuron_params.resting_voltage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    const NEURON_PARAMS: NeuronParams = NeuronParams {
        resting_voltage: 0.0,
        threshold_voltage: 200.0,
    };

    #[test]
    fn integrates_below_threshold() {
        let mut sut = Neuron::new(&NEURON_PARAMS);
        assert!(!sut.apply_current(70.0, &NEURON_PARAMS));
        assert!(!sut.apply_current(70.0, &NEURON_PARAMS));
        assert_approx_eq!(f64, sut.voltage, 140.0);
    }

    #[test]
    fn fires_and_resets_at_threshold() {
        let mut sut = Neuron::new(&NEURON_PARAMS);
        assert!(!sut.apply_current(70.0, &NEURON_PARAMS));
        assert!(!sut.apply_current(70.0, &NEURON_PARAMS));
        assert!(sut.apply_current(70.0, &NEURON_PARAMS));
        assert_approx_eq!(f64, sut.voltage, 0.0);
    }
}
