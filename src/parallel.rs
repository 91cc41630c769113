//! Collective operations across processes.
//!
//! All processes must call the same collectives in the same order; callers therefore branch
//! on reduced values only, never on local ones.

/// Reductions across the processes sharing a distributed mesh.
pub trait Communicator: Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sum of `values` over all processes, in place.
    fn sum_in_place(&self, values: &mut [f64]);

    /// Sum of integer counters over all processes, in place.
    fn sum_counts_in_place(&self, counts: &mut [u64]);

    /// Maximum of `values` over all processes, in place.
    fn max_in_place(&self, values: &mut [f64]);

    fn sum(&self, value: f64) -> f64 {
        let mut values = [value];
        self.sum_in_place(&mut values);
        values[0]
    }

    fn max(&self, value: f64) -> f64 {
        let mut values = [value];
        self.max_in_place(&mut values);
        values[0]
    }
}

/// Communicator of a single process: every reduction is the identity.
#[derive(Debug, Copy, Clone, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sum_in_place(&self, _values: &mut [f64]) {}

    fn sum_counts_in_place(&self, _counts: &mut [u64]) {}

    fn max_in_place(&self, _values: &mut [f64]) {}
}
