use serde::{Deserialize, Serialize};

/// Thermodynamic state of a cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolidificationState {
    Solid,
    Mushy,
    Liquid,
    Eutectic,
}

impl SolidificationState {
    pub const ALL: [SolidificationState; 4] = [Self::Solid, Self::Mushy, Self::Liquid, Self::Eutectic];

    pub fn index(self) -> usize {
        match self {
            Self::Solid => 0,
            Self::Mushy => 1,
            Self::Liquid => 2,
            Self::Eutectic => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Solid => "Solid",
            Self::Mushy => "Mushy",
            Self::Liquid => "Liquid",
            Self::Eutectic => "Eutectic",
        }
    }
}

/// Number of cells in each state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct StateCounts([u64; 4]);

impl StateCounts {
    pub fn get(&self, state: SolidificationState) -> u64 {
        self.0[state.index()]
    }

    pub fn increment(&mut self, state: SolidificationState) {
        self.0[state.index()] += 1;
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.0
    }

    pub fn from_states(states: &[SolidificationState]) -> Self {
        let mut counts = Self::default();
        for &state in states {
            counts.increment(state);
        }
        counts
    }
}

/// A cellwise field with its value at the previous time step.
#[derive(Debug, Clone, PartialEq)]
pub struct CellField {
    pub val: Vec<f64>,
    pub val_pre: Vec<f64>,
}

impl CellField {
    pub fn new(n_cells: usize, value: f64) -> Self {
        Self {
            val: vec![value; n_cells],
            val_pre: vec![value; n_cells],
        }
    }

    pub fn current_to_previous(&mut self) {
        self.val_pre.copy_from_slice(&self.val);
    }
}
