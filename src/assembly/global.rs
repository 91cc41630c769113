//! Assembly of cellwise systems into global sparse systems.
use crate::connectivity::Adjacency;
use fenris_paradis::coloring::sequential_greedy_coloring;
use fenris_paradis::slice::ParallelSliceAccess;
use fenris_paradis::{DisjointSubsets, SubsetAccess};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Synchronization used when accumulating right-hand side contributions from several threads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssemblySync {
    /// A single lock guards the whole scatter loop of a cell.
    CriticalSection,
    /// Every entry is updated with an atomic add.
    #[default]
    Atomic,
}

/// Shared accumulator for global vectors (right-hand sides, source terms).
///
/// The final value of each entry is the sum of all contributions, whatever the order in which
/// threads add them (up to floating-point rounding).
#[derive(Debug)]
pub enum VectorAccumulator {
    CriticalSection(Mutex<Vec<f64>>),
    Atomic(Vec<AtomicU64>),
}

impl VectorAccumulator {
    pub fn new(sync: AssemblySync, len: usize) -> Self {
        match sync {
            AssemblySync::CriticalSection => Self::CriticalSection(Mutex::new(vec![0.0; len])),
            AssemblySync::Atomic => Self::Atomic((0..len).map(|_| AtomicU64::new(0.0f64.to_bits())).collect()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::CriticalSection(values) => values.lock().len(),
            Self::Atomic(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add `values[i]` to entry `ids[i]` for all `i`.
    pub fn add_local(&self, ids: &[usize], values: &[f64]) {
        assert_eq!(ids.len(), values.len());
        match self {
            Self::CriticalSection(global) => {
                let mut global = global.lock();
                for (&id, &v) in ids.iter().zip(values) {
                    global[id] += v;
                }
            }
            Self::Atomic(global) => {
                for (&id, &v) in ids.iter().zip(values) {
                    atomic_add(&global[id], v);
                }
            }
        }
    }

    pub fn into_vector(self) -> DVector<f64> {
        match self {
            Self::CriticalSection(values) => DVector::from_vec(values.into_inner()),
            Self::Atomic(values) => DVector::from_iterator(
                values.len(),
                values.into_iter().map(|v| f64::from_bits(v.into_inner())),
            ),
        }
    }
}

fn atomic_add(target: &AtomicU64, value: f64) {
    let mut current = target.load(Ordering::Relaxed);
    loop {
        let new = (f64::from_bits(current) + value).to_bits();
        match target.compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

/// Handle given to cellwise kernels to add their local matrix to the global matrix.
///
/// Gives mutable access to the CSR rows of the DoFs of one cell. Cells processed concurrently
/// belong to the same color and therefore never share a row.
pub struct CellMatrixScatter<'a, 'v> {
    dof_ids: &'a [usize],
    rows: SubsetAccess<'a, ParallelSliceAccess<'a, &'v mut [f64]>>,
    pattern: &'a SparsityPattern,
}

impl<'a, 'v> CellMatrixScatter<'a, 'v> {
    /// Global DoF ids of the cell, in the order of the local matrix rows.
    pub fn dof_ids(&self) -> &[usize] {
        self.dof_ids
    }

    /// Add the local matrix, whose rows and columns follow [`Self::dof_ids`].
    pub fn add_local_matrix(&mut self, local: &DMatrix<f64>) {
        let n = self.dof_ids.len();
        assert_eq!(local.nrows(), n);
        assert_eq!(local.ncols(), n);
        debug_assert_eq!(self.rows.global_indices(), self.dof_ids);
        for (i, &row) in self.dof_ids.iter().enumerate() {
            let row_values = self.rows.get_mut(i);
            add_local_row_to_csr_row(
                self.pattern.lane(row),
                row_values,
                self.dof_ids,
                local.row(i).iter().copied(),
            );
        }
    }
}

/// Add a local row to a CSR row, where `cols` are the sorted global column indices of the
/// local matrix.
fn add_local_row_to_csr_row(
    row_cols: &[usize],
    row_values: &mut [f64],
    cols: &[usize],
    local_row: impl Iterator<Item = f64>,
) {
    // Both column lists are sorted, so a single forward scan suffices
    let mut csr_col_iter = row_cols.iter().copied().enumerate();
    for (&col, value) in cols.iter().zip(local_row) {
        let (k, _) = csr_col_iter
            .find(|(_, csr_col)| *csr_col == col)
            .expect("Column index of local matrix must be in the sparsity pattern");
        row_values[k] += value;
    }
}

/// Split the values of a CSR matrix into one slice per row.
fn split_rows<'v>(row_offsets: &[usize], mut values: &'v mut [f64]) -> Vec<&'v mut [f64]> {
    let mut rows = Vec::with_capacity(row_offsets.len().saturating_sub(1));
    for lane in row_offsets.windows(2) {
        let (row, rest) = std::mem::take(&mut values).split_at_mut(lane[1] - lane[0]);
        rows.push(row);
        values = rest;
    }
    rows
}

/// Color the cells so that no two cells of the same color share a DoF.
pub fn color_cells(c2d: &Adjacency) -> Vec<DisjointSubsets> {
    sequential_greedy_coloring(c2d.lists())
}

/// Parallel assembler of cellwise matrices for DoFs attached to mesh entities
/// (one scalar DoF per entity, e.g. per edge).
///
/// Cells are colored so that no two cells of the same color share a DoF. Colors are processed
/// one after the other and the cells of a color in parallel.
#[derive(Debug, Clone)]
pub struct CsrParAssembler {
    c2d: Adjacency,
    num_dofs: usize,
    colors: Vec<DisjointSubsets>,
    pattern: SparsityPattern,
}

impl CsrParAssembler {
    /// `c2d` lists, for each cell, its DoF ids in increasing order.
    pub fn new(c2d: Adjacency, num_dofs: usize) -> eyre::Result<Self> {
        for (c, dofs) in c2d.iter().enumerate() {
            eyre::ensure!(
                dofs.windows(2).all(|w| w[0] < w[1]),
                "DoF ids of cell {c} must be strictly increasing."
            );
            eyre::ensure!(dofs.iter().all(|&d| d < num_dofs), "DoF id out of bounds in cell {c}.");
        }
        let colors = color_cells(&c2d);
        let pattern = assemble_pattern(&c2d, num_dofs)?;
        Ok(Self {
            c2d,
            num_dofs,
            colors,
            pattern,
        })
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Colors of the cells. The label of each subset is the cell index.
    pub fn colors(&self) -> &[DisjointSubsets] {
        &self.colors
    }

    pub fn pattern(&self) -> &SparsityPattern {
        &self.pattern
    }

    /// A matrix with the assembler's sparsity pattern and zero values.
    pub fn zero_matrix(&self) -> CsrMatrix<f64> {
        let nnz = self.pattern.nnz();
        CsrMatrix::try_from_pattern_and_values(self.pattern.clone(), vec![0.0; nnz])
            .expect("Pattern and value count are consistent by construction")
    }

    /// Run `cell_kernel` for every cell, in parallel, letting it add its local matrix to
    /// `matrix` through the given scatter handle.
    ///
    /// Returns the sum of the values returned by the kernel (used e.g. for reductions).
    pub fn assemble_into_csr<F>(&self, matrix: &mut CsrMatrix<f64>, cell_kernel: F) -> f64
    where
        F: Fn(usize, CellMatrixScatter) -> f64 + Sync,
    {
        assert_eq!(matrix.nrows(), self.num_dofs);
        assert_eq!(matrix.pattern(), &self.pattern, "Matrix must use the assembler's pattern");
        let (_, _, values) = matrix.csr_data_mut();
        let mut rows = split_rows(self.pattern.major_offsets(), values);

        let mut total = 0.0;
        for color in &self.colors {
            total += color
                .subsets_par_iter(rows.as_mut_slice())
                .map(|subset| {
                    let c = subset.label();
                    let scatter = CellMatrixScatter {
                        dof_ids: self.c2d.ids(c),
                        rows: subset,
                        pattern: &self.pattern,
                    };
                    cell_kernel(c, scatter)
                })
                .sum::<f64>();
        }
        total
    }
}

fn assemble_pattern(c2d: &Adjacency, num_dofs: usize) -> eyre::Result<SparsityPattern> {
    let mut coordinates: Vec<(usize, usize)> = (0..c2d.len())
        .into_par_iter()
        .with_min_len(50)
        .flat_map_iter(|c| {
            let dofs = c2d.ids(c);
            dofs.iter()
                .flat_map(move |&i| dofs.iter().map(move |&j| (i, j)))
        })
        .collect();
    coordinates.par_sort_unstable();
    coordinates.dedup();

    let mut row_offsets = Vec::with_capacity(num_dofs + 1);
    let mut col_indices = Vec::with_capacity(coordinates.len());
    row_offsets.push(0);
    let mut current_row = 0;
    for (i, j) in coordinates {
        while i > current_row {
            row_offsets.push(col_indices.len());
            current_row += 1;
        }
        col_indices.push(j);
    }
    // Fill out offsets for remaining (possibly empty) rows
    while row_offsets.len() < num_dofs + 1 {
        row_offsets.push(col_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(num_dofs, num_dofs, row_offsets, col_indices)
        .map_err(|err| eyre::eyre!("Invalid sparsity pattern: {err}"))
}
