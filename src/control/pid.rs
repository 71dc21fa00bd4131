/// Discrete PID controller turning trend deviation into an order-sizing signal
///
/// The error term is `setpoint - current`, so a price below the reference
/// produces a positive signal (buy pressure) and a price above it a negative
/// one. State carries across calls: the integral accumulates every error seen
/// and the derivative compares against the previous error. Two calls with
/// identical inputs therefore give different outputs - that is the point of
/// the controller, not a bug to paper over.
///
/// The integral is unbounded unless `with_integral_limit` is used, which
/// clamps it symmetrically to counter windup during long one-sided stretches.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    integral_limit: Option<f64>,
    integral: f64,
    prev_error: f64,
}

impl PidController {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral_limit: None,
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    /// Clamp the accumulated integral to `[-limit, limit]`
    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    /// Advance the controller one step and return the control signal
    pub fn compute(&mut self, setpoint: f64, current: f64) -> f64 {
        let error = setpoint - current;

        self.integral += error;
        if let Some(limit) = self.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }

        let derivative = error - self.prev_error;
        let signal = self.kp * error + self.ki * self.integral + self.kd * derivative;
        self.prev_error = error;

        tracing::debug!(
            "PID step: error={:.6}, integral={:.6}, derivative={:.6} -> signal={:.6}",
            error,
            self.integral,
            derivative,
            signal
        );

        signal
    }
}
