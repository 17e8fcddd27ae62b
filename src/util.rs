/// Exponential decay factor for an event-driven trace between two event
/// times. `t` must not precede `last_t`.
pub fn get_decay_factor(t: f64, last_t: f64, tau: f64) -> f64 {
    ((last_t - t) / tau).exp()
}


#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn no_elapsed_time() {
        assert_approx_eq!(f64, get_decay_factor(5.0, 5.0, 20.0), 1.0);
    }

    #[test]
    fn decay_over_one_tau() {
        assert_approx_eq!(f64, get_decay_factor(25.0, 5.0, 20.0), (-1.0f64).exp());
    }

    #[test]
    fn decay_over_fraction_of_tau() {
        assert_approx_eq!(f64, get_decay_factor(15.0, 5.0, 20.0), (-0.5f64).exp());
    }
}
