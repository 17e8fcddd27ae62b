//! Per-synapse plasticity state machines. Spike events are delivered by
//! the network substrate in non-decreasing timestamp order; for a given
//! synapse, events of one kind must carry strictly increasing timestamps.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::{
    self, BasicStdpParams, PairStdpParams, StaticSynapseParams, SynapseModel,
};
use crate::util::get_decay_factor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Synapse {
    Static(StaticSynapse),
    BasicStdp(BasicStdpSynapse),
    PairStdp(PairStdpSynapse),
}

impl Synapse {
    /// Builds a synapse for the given model. Invalid plasticity constants
    /// are rejected here, before any event is processed.
    pub fn create(model: &SynapseModel, initial_weight: f64) -> Result<Self> {
        params::validate_synapse_model(model)?;

        let synapse = match model {
            SynapseModel::Static(params) => Synapse::Static(StaticSynapse {
                params: params.clone(),
            }),
            SynapseModel::BasicStdp(params) => Synapse::BasicStdp(BasicStdpSynapse {
                weight: initial_weight.clamp(0.0, params.max_weight),
                a_pre: 0.0,
                a_post: 0.0,
                last_t: 0.0,
                t_pre_last: None,
                t_post_last: None,
                params: params.clone(),
            }),
            SynapseModel::PairStdp(params) => Synapse::PairStdp(PairStdpSynapse {
                weight: initial_weight.clamp(0.0, params.max_weight),
                t_pre_last: None,
                t_post_last: None,
                trace_pre: 0.0,
                trace_post: 0.0,
                params: params.clone(),
            }),
        };

        Ok(synapse)
    }

    /// Processes a presynaptic spike at time `t` and returns the
    /// instantaneous postsynaptic current increment.
    pub fn on_pre_spike(&mut self, t: f64) -> f64 {
        match self {
            Synapse::Static(synapse) => synapse.params.psp_increment,
            Synapse::BasicStdp(synapse) => synapse.on_pre_spike(t),
            Synapse::PairStdp(synapse) => synapse.on_pre_spike(t),
        }
    }

    /// Processes a postsynaptic spike at time `t`.
    pub fn on_post_spike(&mut self, t: f64) {
        match self {
            Synapse::Static(_) => {}
            Synapse::BasicStdp(synapse) => synapse.on_post_spike(t),
            Synapse::PairStdp(synapse) => synapse.on_post_spike(t),
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Synapse::Static(synapse) => synapse.params.psp_increment,
            Synapse::BasicStdp(synapse) => synapse.weight,
            Synapse::PairStdp(synapse) => synapse.weight,
        }
    }
}

/// Fixed connectivity, fixed per-spike current increment, no plastic state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSynapse {
    params: StaticSynapseParams,
}

/// Single decaying trace pair, directly added to the weight on each
/// opposite event. No causal timestamp gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicStdpSynapse {
    pub weight: f64,
    a_pre: f64,
    a_post: f64,
    last_t: f64,
    t_pre_last: Option<f64>,
    t_post_last: Option<f64>,
    params: BasicStdpParams,
}

impl BasicStdpSynapse {
    fn on_pre_spike(&mut self, t: f64) -> f64 {
        // replayed or out-of-order event, must not double-apply
        if self.t_pre_last.map_or(false, |last| t <= last) {
            return 0.0;
        }

        let psp = self.weight;
        self.decay_traces(t);
        self.t_pre_last = Some(t);
        self.a_pre += self.params.boost_pre;
        self.weight = (self.weight + self.a_post).clamp(0.0, self.params.max_weight);
        psp
    }

    fn on_post_spike(&mut self, t: f64) {
        if self.t_post_last.map_or(false, |last| t <= last) {
            return;
        }

        self.decay_traces(t);
        self.t_post_last = Some(t);
        self.a_post += self.params.boost_post;
        self.weight = (self.weight + self.a_pre).clamp(0.0, self.params.max_weight);
    }

    fn decay_traces(&mut self, t: f64) {
        self.a_pre *= get_decay_factor(t, self.last_t, self.params.tau_pre);
        self.a_post *= get_decay_factor(t, self.last_t, self.params.tau_post);
        self.last_t = t;
    }
}

/// Pair-based STDP with eligibility traces and a strict causal ordering
/// gate: a weight change only uses a partner spike that occurred at or
/// after time zero and strictly before the triggering event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairStdpSynapse {
    pub weight: f64,
    t_pre_last: Option<f64>,
    t_post_last: Option<f64>,
    trace_pre: f64,
    trace_post: f64,
    params: PairStdpParams,
}

impl PairStdpSynapse {
    fn on_pre_spike(&mut self, t: f64) -> f64 {
        // replayed or out-of-order event, must not double-apply
        if self.t_pre_last.map_or(false, |last| t <= last) {
            return 0.0;
        }

        let psp = self.weight;

        // first event convention: no backward decay before the first
        // recorded spike
        let decay_from = self.t_pre_last.unwrap_or(t);
        self.trace_pre = self.trace_pre * get_decay_factor(t, decay_from, self.params.tau_ltp)
            + self.params.boost_ltp;
        self.t_pre_last = Some(t);

        let depression = match self.t_post_last {
            Some(t_post) if (0.0..t).contains(&t_post) => {
                self.params.rate_ltd
                    * self.trace_post
                    * get_decay_factor(t, t_post, self.params.tau_ltd)
            }
            _ => 0.0,
        };

        self.weight = (self.weight + depression).clamp(0.0, self.params.max_weight);

        psp
    }

    fn on_post_spike(&mut self, t: f64) {
        if self.t_post_last.map_or(false, |last| t <= last) {
            return;
        }

        let decay_from = self.t_post_last.unwrap_or(t);
        self.trace_post = self.trace_post * get_decay_factor(t, decay_from, self.params.tau_ltd)
            + self.params.boost_ltd;
        self.t_post_last = Some(t);

        let potentiation = match self.t_pre_last {
            Some(t_pre) if (0.0..t).contains(&t_pre) => {
                self.params.rate_ltp
                    * self.trace_pre
                    * get_decay_factor(t, t_pre, self.params.tau_ltp)
            }
            _ => 0.0,
        };

        self.weight = (self.weight + potentiation).clamp(0.0, self.params.max_weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SynapseModel;
    use float_cmp::assert_approx_eq;

    const PAIR_PARAMS: PairStdpParams = PairStdpParams {
        tau_ltp: 20.0,
        tau_ltd: 20.0,
        boost_ltp: 1.0,
        boost_ltd: -1.0,
        rate_ltp: 2e-2,
        rate_ltd: 2.4e-2,
        max_weight: 0.4,
    };

    fn make_pair_synapse(initial_weight: f64) -> Synapse {
        Synapse::create(&SynapseModel::PairStdp(PAIR_PARAMS), initial_weight).unwrap()
    }

    fn pair_state(synapse: &Synapse) -> &PairStdpSynapse {
        match synapse {
            Synapse::PairStdp(state) => state,
            _ => panic!("expected pair stdp synapse"),
        }
    }

    #[test]
    fn invalid_constants_rejected_at_construction() {
        let model = SynapseModel::PairStdp(PairStdpParams {
            tau_ltp: 0.0,
            ..PAIR_PARAMS
        });
        let result = Synapse::create(&model, 0.2);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid configuration: tau_ltp must be strictly positive"
        );
    }

    #[test]
    fn pre_spike_delivers_weight_as_psp() {
        let mut sut = make_pair_synapse(0.2);
        assert_approx_eq!(f64, sut.on_pre_spike(5.0), 0.2);
    }

    #[test]
    fn pre_spike_without_prior_post_leaves_weight_unchanged() {
        let mut sut = make_pair_synapse(0.2);
        sut.on_pre_spike(5.0);

        let state = pair_state(&sut);
        assert_approx_eq!(f64, state.weight, 0.2);
        // first event: decay factor is 1, trace holds exactly one boost
        assert_approx_eq!(f64, state.trace_pre, 1.0);
        assert_eq!(state.t_pre_last, Some(5.0));
        assert_eq!(state.t_post_last, None);
    }

    #[test]
    fn post_after_pre_potentiates() {
        let mut sut = make_pair_synapse(0.2);
        sut.on_pre_spike(5.0);
        sut.on_post_spike(15.0);

        let expected = 0.2 + 2e-2 * 1.0 * (-10.0f64 / 20.0).exp();
        assert_approx_eq!(f64, sut.weight(), expected);
    }

    #[test]
    fn pre_after_post_depresses() {
        let mut sut = make_pair_synapse(0.2);
        sut.on_post_spike(5.0);
        sut.on_pre_spike(15.0);

        // trace_post is -1 after one boost, so the contribution is negative
        let expected = 0.2 + 2.4e-2 * (-1.0) * (-10.0f64 / 20.0).exp();
        assert_approx_eq!(f64, sut.weight(), expected);
    }

    #[test]
    fn trace_decays_between_events_of_same_kind() {
        let mut sut = make_pair_synapse(0.2);
        sut.on_pre_spike(5.0);
        sut.on_pre_spike(25.0);

        let state = pair_state(&sut);
        let expected_trace = 1.0 * (-20.0f64 / 20.0).exp() + 1.0;
        assert_approx_eq!(f64, state.trace_pre, expected_trace);
        assert_eq!(state.t_pre_last, Some(25.0));
    }

    #[test]
    fn weight_is_clamped_to_floor() {
        let mut sut = make_pair_synapse(0.01);

        for k in 0..20 {
            let t = k as f64 * 2.0;
            sut.on_post_spike(t);
            sut.on_pre_spike(t + 1.0);
        }

        let weight = sut.weight();
        assert!((0.0..=PAIR_PARAMS.max_weight).contains(&weight));
        assert_approx_eq!(f64, weight, 0.0);
    }

    #[test]
    fn weight_is_clamped_to_ceiling() {
        let mut sut = make_pair_synapse(0.39);

        // pairs spaced far apart, so the depression trace from the
        // previous post has decayed away by the time the next pre lands
        // and each pair nets potentiation
        for k in 0..20 {
            let t = k as f64 * 200.0;
            sut.on_pre_spike(t);
            sut.on_post_spike(t + 1.0);
        }

        let weight = sut.weight();
        assert!((0.0..=PAIR_PARAMS.max_weight).contains(&weight));
        assert_approx_eq!(f64, weight, PAIR_PARAMS.max_weight);
    }

    #[test]
    fn tight_alternation_with_stronger_depression_rate_nets_depression() {
        let mut sut = make_pair_synapse(0.39);

        for k in 0..20 {
            let t = k as f64 * 2.0;
            sut.on_pre_spike(t);
            sut.on_post_spike(t + 1.0);
        }

        let weight = sut.weight();
        assert!((0.0..=PAIR_PARAMS.max_weight).contains(&weight));
        assert!(weight < 0.39);
    }

    #[test]
    fn weight_stays_bounded_under_interleaved_events() {
        let mut sut = make_pair_synapse(0.2);

        let events = [
            (1.0, true),
            (1.5, false),
            (2.0, true),
            (6.0, false),
            (6.5, false),
            (7.0, true),
            (30.0, true),
            (31.0, false),
        ];

        for (t, is_pre) in events {
            if is_pre {
                sut.on_pre_spike(t);
            } else {
                sut.on_post_spike(t);
            }
            assert!((0.0..=PAIR_PARAMS.max_weight).contains(&sut.weight()));
        }
    }

    #[test]
    fn duplicate_pre_timestamp_is_a_no_op() {
        let mut sut = make_pair_synapse(0.2);
        sut.on_pre_spike(5.0);
        sut.on_post_spike(10.0);
        let weight_after_first = sut.weight();
        let trace_after_first = pair_state(&sut).trace_pre;

        // replaying the pre event must not double-apply
        let psp = sut.on_pre_spike(5.0);
        assert_approx_eq!(f64, psp, 0.0);
        assert_approx_eq!(f64, sut.weight(), weight_after_first);
        assert_approx_eq!(f64, pair_state(&sut).trace_pre, trace_after_first);
    }

    #[test]
    fn duplicate_post_timestamp_is_a_no_op() {
        let mut sut = make_pair_synapse(0.2);
        sut.on_pre_spike(5.0);
        sut.on_post_spike(10.0);
        let weight_after_first = sut.weight();

        sut.on_post_spike(10.0);
        assert_approx_eq!(f64, sut.weight(), weight_after_first);
    }

    #[test]
    fn simultaneous_partner_spike_is_not_applicable() {
        // gate requires the partner spike strictly before the event
        let mut sut = make_pair_synapse(0.2);
        sut.on_pre_spike(5.0);
        sut.on_post_spike(5.0);
        assert_approx_eq!(f64, sut.weight(), 0.2);
    }

    #[test]
    fn static_synapse_has_no_plasticity() {
        let model = SynapseModel::Static(StaticSynapseParams {
            psp_increment: 70.0,
        });
        let mut sut = Synapse::create(&model, 0.0).unwrap();

        assert_approx_eq!(f64, sut.on_pre_spike(1.0), 70.0);
        sut.on_post_spike(2.0);
        assert_approx_eq!(f64, sut.on_pre_spike(3.0), 70.0);
    }

    #[test]
    fn basic_stdp_pre_then_post_potentiates() {
        let params = BasicStdpParams::default();
        let model = SynapseModel::BasicStdp(params.clone());
        let mut sut = Synapse::create(&model, 0.02).unwrap();

        sut.on_pre_spike(5.0);
        sut.on_post_spike(10.0);

        let expected = 0.02 + params.boost_pre * (-5.0f64 / params.tau_pre).exp();
        assert_approx_eq!(f64, sut.weight(), expected);
    }

    #[test]
    fn basic_stdp_post_then_pre_depresses() {
        let params = BasicStdpParams::default();
        let model = SynapseModel::BasicStdp(params.clone());
        let mut sut = Synapse::create(&model, 0.02).unwrap();

        sut.on_post_spike(5.0);
        let psp = sut.on_pre_spike(10.0);

        // psp uses the weight before the update
        assert_approx_eq!(f64, psp, 0.02);
        let expected = 0.02 + params.boost_post * (-5.0f64 / params.tau_post).exp();
        assert_approx_eq!(f64, sut.weight(), expected);
    }

    #[test]
    fn basic_stdp_duplicate_timestamp_is_a_no_op() {
        let params = BasicStdpParams::default();
        let model = SynapseModel::BasicStdp(params);
        let mut sut = Synapse::create(&model, 0.02).unwrap();

        sut.on_post_spike(5.0);
        sut.on_pre_spike(10.0);
        let weight_after_first = sut.weight();

        // replaying either event must not double-apply
        let psp = sut.on_pre_spike(10.0);
        assert_approx_eq!(f64, psp, 0.0);
        assert_approx_eq!(f64, sut.weight(), weight_after_first);

        sut.on_post_spike(5.0);
        assert_approx_eq!(f64, sut.weight(), weight_after_first);
    }

    #[test]
    fn basic_stdp_weight_is_clamped() {
        let params = BasicStdpParams::default();
        let model = SynapseModel::BasicStdp(params.clone());
        let mut sut = Synapse::create(&model, 0.0).unwrap();

        for k in 0..50 {
            let t = k as f64;
            sut.on_post_spike(t);
            sut.on_pre_spike(t + 0.5);
            let weight = sut.weight();
            assert!((0.0..=params.max_weight).contains(&weight));
        }
    }

    #[test]
    fn initial_weight_is_clamped_to_max() {
        let sut = make_pair_synapse(1.0);
        assert_approx_eq!(f64, sut.weight(), PAIR_PARAMS.max_weight);
    }
}
