//! Per-cell local view of a [`CdoMesh`].
use crate::mesh::{CdoMesh, CellFlag};
use nalgebra::{Point3, Vector3};
use std::ops::{BitOr, BitOrAssign};

/// Quantities requested when building a [`CellMesh`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct CellMeshFlags(u16);

impl CellMeshFlags {
    pub const NONE: CellMeshFlags = CellMeshFlags(0);
    /// Vertex ids and coordinates (and the cell bounding box).
    pub const PV: CellMeshFlags = CellMeshFlags(1 << 0);
    /// Edge centers and tangents.
    pub const PEQ: CellMeshFlags = CellMeshFlags(1 << 1);
    /// Face centers and area vectors.
    pub const PFQ: CellMeshFlags = CellMeshFlags(1 << 2);
    /// Dual face vector attached to each edge.
    pub const DEQ: CellMeshFlags = CellMeshFlags(1 << 3);
    /// Portion of the cell volume attached to each edge.
    pub const PEC: CellMeshFlags = CellMeshFlags(1 << 4);
    /// Local edge to vertex connectivity.
    pub const EV: CellMeshFlags = CellMeshFlags(1 << 5);
    /// Local face to edge connectivity.
    pub const FE: CellMeshFlags = CellMeshFlags(1 << 6);
    /// Local face to edge connectivity with orientation signs.
    pub const FES: CellMeshFlags = CellMeshFlags(1 << 7);
    /// Cell to face orientation signs.
    pub const DFQ: CellMeshFlags = CellMeshFlags(1 << 8);

    pub fn contains(self, other: CellMeshFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CellMeshFlags {
    type Output = CellMeshFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        CellMeshFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CellMeshFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Local snapshot of the topology and geometry of one cell.
///
/// Instances are meant to be reused: [`CellMesh::build`] overwrites the previous content
/// without releasing memory. Only the quantities requested through [`CellMeshFlags`] are
/// valid after a build; the cell id, center, volume, edge ids and face ids are always set.
#[derive(Debug, Clone)]
pub struct CellMesh {
    pub flag: CellMeshFlags,
    pub c_id: usize,
    pub cell_flag: CellFlag,
    pub xc: Point3<f64>,
    pub vol_c: f64,
    pub bbox: (Point3<f64>, Point3<f64>),

    pub v_ids: Vec<usize>,
    pub xv: Vec<Point3<f64>>,

    pub e_ids: Vec<usize>,
    pub e_centers: Vec<Point3<f64>>,
    pub e_tangents: Vec<Vector3<f64>>,
    pub e2v_ids: Vec<[usize; 2]>,
    pub dface: Vec<Vector3<f64>>,
    pub pvol_e: Vec<f64>,

    pub f_ids: Vec<usize>,
    pub f_sgn: Vec<i8>,
    pub f_centers: Vec<Point3<f64>>,
    pub f_vectors: Vec<Vector3<f64>>,
    /// Offsets into `f2e_ids`/`f2e_sgn` for each local face.
    pub f2e_idx: Vec<usize>,
    pub f2e_ids: Vec<usize>,
    pub f2e_sgn: Vec<i8>,
}

impl Default for CellMesh {
    fn default() -> Self {
        Self {
            flag: CellMeshFlags::NONE,
            c_id: 0,
            cell_flag: CellFlag::NONE,
            xc: Point3::origin(),
            vol_c: 0.0,
            bbox: (Point3::origin(), Point3::origin()),
            v_ids: Vec::new(),
            xv: Vec::new(),
            e_ids: Vec::new(),
            e_centers: Vec::new(),
            e_tangents: Vec::new(),
            e2v_ids: Vec::new(),
            dface: Vec::new(),
            pvol_e: Vec::new(),
            f_ids: Vec::new(),
            f_sgn: Vec::new(),
            f_centers: Vec::new(),
            f_vectors: Vec::new(),
            f2e_idx: Vec::new(),
            f2e_ids: Vec::new(),
            f2e_sgn: Vec::new(),
        }
    }
}

impl CellMesh {
    pub fn n_vc(&self) -> usize {
        self.v_ids.len()
    }

    pub fn n_ec(&self) -> usize {
        self.e_ids.len()
    }

    pub fn n_fc(&self) -> usize {
        self.f_ids.len()
    }

    /// Local edge ids of local face `f`, with their orientation in the face.
    pub fn face_edges(&self, f: usize) -> (&[usize], &[i8]) {
        let range = self.f2e_idx[f]..self.f2e_idx[f + 1];
        (&self.f2e_ids[range.clone()], &self.f2e_sgn[range])
    }

    /// Populate the view for cell `c` with the quantities requested in `flag`.
    ///
    /// # Panics
    ///
    /// Panics if `c` is not a valid cell index of `mesh`.
    pub fn build(&mut self, c: usize, flag: CellMeshFlags, mesh: &CdoMesh) {
        self.flag = flag;
        self.c_id = c;
        self.cell_flag = mesh.cell_flags()[c];
        self.xc = mesh.cell_centers()[c];
        self.vol_c = mesh.cell_volumes()[c];

        self.e_ids.clear();
        self.e_ids.extend_from_slice(mesh.cell_edges().ids(c));
        self.f_ids.clear();
        self.f_ids.extend_from_slice(mesh.cell_faces().ids(c));

        self.v_ids.clear();
        self.xv.clear();
        if flag.contains(CellMeshFlags::PV) || flag.contains(CellMeshFlags::EV) {
            self.v_ids.extend_from_slice(mesh.cell_vertices().ids(c));
        }
        if flag.contains(CellMeshFlags::PV) {
            self.xv.extend(self.v_ids.iter().map(|&v| mesh.vertices()[v]));
            let mut min = self.xc;
            let mut max = self.xc;
            for x in &self.xv {
                min = min.inf(x);
                max = max.sup(x);
            }
            self.bbox = (min, max);
        }

        self.e_centers.clear();
        self.e_tangents.clear();
        if flag.contains(CellMeshFlags::PEQ) {
            self.e_centers.extend(self.e_ids.iter().map(|&e| mesh.edge_centers()[e]));
            self.e_tangents.extend(self.e_ids.iter().map(|&e| mesh.edge_tangents()[e]));
        }

        self.e2v_ids.clear();
        if flag.contains(CellMeshFlags::EV) {
            for &e in &self.e_ids {
                let [a, b] = mesh.edge_vertices()[e];
                let local = |v: usize| {
                    self.v_ids
                        .binary_search(&v)
                        .expect("Vertices of an edge of the cell are vertices of the cell")
                };
                self.e2v_ids.push([local(a), local(b)]);
            }
        }

        self.dface.clear();
        if flag.contains(CellMeshFlags::DEQ) {
            self.dface.extend_from_slice(mesh.cell_dual_faces(c));
        }
        self.pvol_e.clear();
        if flag.contains(CellMeshFlags::PEC) {
            self.pvol_e.extend_from_slice(mesh.cell_edge_volumes(c));
        }

        self.f_sgn.clear();
        if flag.contains(CellMeshFlags::DFQ) {
            if let Some(signs) = mesh.cell_faces().signs(c) {
                self.f_sgn.extend_from_slice(signs);
            }
        }
        self.f_centers.clear();
        self.f_vectors.clear();
        if flag.contains(CellMeshFlags::PFQ) {
            self.f_centers.extend(self.f_ids.iter().map(|&f| mesh.face_centers()[f]));
            self.f_vectors.extend(self.f_ids.iter().map(|&f| mesh.face_vectors()[f]));
        }

        self.f2e_idx.clear();
        self.f2e_ids.clear();
        self.f2e_sgn.clear();
        if flag.contains(CellMeshFlags::FE) || flag.contains(CellMeshFlags::FES) {
            let f2e = mesh.face_edges();
            self.f2e_idx.push(0);
            for &f in &self.f_ids {
                for &e in f2e.ids(f) {
                    let local = self
                        .e_ids
                        .binary_search(&e)
                        .expect("Edges of a face of the cell are edges of the cell");
                    self.f2e_ids.push(local);
                }
                if flag.contains(CellMeshFlags::FES) {
                    if let Some(signs) = f2e.signs(f) {
                        self.f2e_sgn.extend_from_slice(signs);
                    }
                }
                self.f2e_idx.push(self.f2e_ids.len());
            }
        }
    }
}
