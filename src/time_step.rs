/// Description of the current time step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TimeStep {
    /// Index of the current time step.
    pub nt_cur: usize,
    /// Time at the beginning of the step.
    pub t_cur: f64,
    pub dt: f64,
}

impl TimeStep {
    pub fn new(dt: f64) -> Self {
        Self {
            nt_cur: 0,
            t_cur: 0.0,
            dt,
        }
    }

    /// Time at the end of the step, at which implicit terms are evaluated.
    pub fn t_eval(&self) -> f64 {
        self.t_cur + self.dt
    }

    /// Move to the next step.
    pub fn advance(&mut self) {
        self.t_cur += self.dt;
        self.nt_cur += 1;
    }
}
