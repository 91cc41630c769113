//! Enforcement of prescribed DoF values in a cellwise system.
//!
//! Enforcement is applied after all physical and source terms have been added to the cell
//! system, so that it overrides them.
use crate::assembly::local::{CellSystem, DofFlag};

/// Default penalization coefficient used by [`enforce_dirichlet_penalized`].
pub const DEFAULT_PENALIZATION_COEF: f64 = 1e12;

/// Algebraic enforcement of the DoFs with a value in `csys.enforced`.
///
/// For every enforced DoF `d` with value `x_d`: `rhs_i -= A_id x_d` for all other non-enforced
/// DoFs `i`, then row and column `d` are zeroed, `A_dd = 1` and `rhs_d = x_d`.
fn enforce_algebraic(csys: &mut CellSystem) {
    let CellSystem { mat, rhs, enforced, .. } = csys;
    if enforced.iter().all(Option::is_none) {
        return;
    }

    for i in (0..enforced.len()).filter(|&i| enforced[i].is_none()) {
        let correction: f64 = enforced
            .iter()
            .enumerate()
            .filter_map(|(d, x_d)| x_d.map(|x_d| mat[(i, d)] * x_d))
            .sum();
        rhs[i] -= correction;
    }

    for (d, x_d) in enforced.iter().enumerate() {
        if let Some(x_d) = *x_d {
            mat.row_mut(d).fill(0.0);
            mat.column_mut(d).fill(0.0);
            mat[(d, d)] = 1.0;
            rhs[d] = x_d;
        }
    }
}

/// Algebraic enforcement of Dirichlet DoFs using `csys.dir_values`.
///
/// Applying it twice gives the same system as applying it once.
pub fn enforce_dirichlet_algebraic(csys: &mut CellSystem) {
    if !csys.has_dirichlet {
        return;
    }
    let CellSystem {
        dof_flags,
        dir_values,
        enforced,
        ..
    } = csys;
    enforced.clear();
    enforced.extend(
        dof_flags
            .iter()
            .zip(dir_values.iter())
            .map(|(flag, &x_d)| flag.contains(DofFlag::DIRICHLET).then_some(x_d)),
    );
    enforce_algebraic(csys);
}

/// Penalized enforcement of Dirichlet DoFs: `A_dd += p` and `rhs_d += p x_d`.
pub fn enforce_dirichlet_penalized(csys: &mut CellSystem, penalization_coef: f64) {
    if !csys.has_dirichlet {
        return;
    }
    for d in 0..csys.n_dofs {
        if csys.dof_flags[d].contains(DofFlag::DIRICHLET) {
            csys.mat[(d, d)] += penalization_coef;
            csys.rhs[d] += penalization_coef * csys.dir_values[d];
        }
    }
}

/// Algebraic enforcement of internal DoFs.
///
/// `values` holds the enforced values referenced by `csys.intern_forced_ids`. DoFs carrying a
/// Dirichlet flag are never enforced here.
pub fn enforce_internal_dofs(csys: &mut CellSystem, values: &[f64]) {
    if !csys.has_internal_enforcement {
        return;
    }
    let CellSystem {
        dof_flags,
        intern_forced_ids,
        enforced,
        ..
    } = csys;
    enforced.clear();
    enforced.extend(dof_flags.iter().zip(intern_forced_ids.iter()).map(|(flag, forced)| {
        if flag.contains(DofFlag::DIRICHLET) {
            None
        } else {
            forced.map(|k| values[k])
        }
    }));
    enforce_algebraic(csys);
}
