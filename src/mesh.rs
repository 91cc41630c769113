//! Polyhedral mesh with the connectivity and quantities needed by CDO schemes.
use crate::connectivity::Adjacency;
use eyre::ensure;
use fenris_nested_vec::NestedVec;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use std::cmp::{max, min};
use std::ops::{BitAnd, BitOr, BitOrAssign};

pub mod procedural;

/// Flags attached to each cell of a [`CdoMesh`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct CellFlag(u8);

impl CellFlag {
    pub const NONE: CellFlag = CellFlag(0);
    /// The cell has at least one boundary face.
    pub const BOUNDARY_BY_FACE: CellFlag = CellFlag(1 << 0);
    /// The cell touches the boundary through an edge only.
    pub const BOUNDARY_BY_EDGE: CellFlag = CellFlag(1 << 1);

    pub fn contains(self, other: CellFlag) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: CellFlag) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for CellFlag {
    type Output = CellFlag;

    fn bitor(self, rhs: Self) -> Self::Output {
        CellFlag(self.0 | rhs.0)
    }
}

impl BitOrAssign for CellFlag {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CellFlag {
    type Output = CellFlag;

    fn bitand(self, rhs: Self) -> Self::Output {
        CellFlag(self.0 & rhs.0)
    }
}

/// A polyhedral mesh with CDO connectivity and geometric quantities.
///
/// Edges are oriented from their lowest to their highest vertex index. Faces are oriented by
/// the order of their vertex loop (right-hand rule). Cells are assumed to be star-shaped with
/// respect to the average of their vertices and to have planar faces.
#[derive(Debug, Clone)]
pub struct CdoMesh {
    vertices: Vec<Point3<f64>>,
    e2v: Vec<[usize; 2]>,
    f2v: Adjacency,
    /// Face to edge incidence, signed with the orientation of the edge in the face loop.
    f2e: Adjacency,
    /// Cell to face incidence, signed `+1` when the face normal points outward.
    c2f: Adjacency,
    f2c: Adjacency,
    /// Cell to edge incidence, sorted by edge index.
    c2e: Adjacency,
    c2v: Adjacency,

    edge_centers: Vec<Point3<f64>>,
    edge_tangents: Vec<Vector3<f64>>,
    face_centers: Vec<Point3<f64>>,
    face_vectors: Vec<Vector3<f64>>,
    cell_centers: Vec<Point3<f64>>,
    cell_volumes: Vec<f64>,
    /// Dual face vectors, one per entry of `c2e`, aligned with the edge tangent.
    dual_faces: NestedVec<Vector3<f64>>,
    /// Portion of the cell volume attached to an edge, one per entry of `c2e`.
    pvol_ec: NestedVec<f64>,
    pvol_e: Vec<f64>,
    vol_tot: f64,

    boundary_faces: Vec<bool>,
    boundary_edges: Vec<bool>,
    cell_flags: Vec<CellFlag>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct UndirectedEdge {
    // Indices are always sorted, so that a <= b, for [a, b]
    indices: [usize; 2],
}

impl UndirectedEdge {
    fn new(a: usize, b: usize) -> Self {
        Self {
            indices: [min(a, b), max(a, b)],
        }
    }
}

impl CdoMesh {
    /// Build a mesh from vertices, faces given as vertex loops and cells given as face indices.
    ///
    /// Each interior face must appear exactly once in `faces` and be shared by two cells.
    pub fn from_poly_data(vertices: Vec<Point3<f64>>, faces: Adjacency, cells: Adjacency) -> eyre::Result<Self> {
        let n_vertices = vertices.len();
        let n_faces = faces.len();
        ensure!(
            faces.iter().flatten().all(|&v| v < n_vertices),
            "Vertex index out of bounds in faces description."
        );
        ensure!(
            cells.iter().flatten().all(|&f| f < n_faces),
            "Face index out of bounds in cells description."
        );
        ensure!(faces.iter().all(|f| f.len() >= 3), "Every face needs at least three vertices.");

        // Edges and face -> edge incidence
        let mut edge_map: FxHashMap<UndirectedEdge, usize> = FxHashMap::default();
        let mut e2v = Vec::new();
        let mut f2e = Adjacency::with_signs();
        for face in faces.iter() {
            let n = face.len();
            let mut e_ids = Vec::with_capacity(n);
            let mut e_sgn = Vec::with_capacity(n);
            for k in 0..n {
                let (a, b) = (face[k], face[(k + 1) % n]);
                let edge = UndirectedEdge::new(a, b);
                let e_id = *edge_map.entry(edge).or_insert_with(|| {
                    e2v.push(edge.indices);
                    e2v.len() - 1
                });
                e_ids.push(e_id);
                e_sgn.push(if a < b { 1 } else { -1 });
            }
            f2e.push(&e_ids, Some(&e_sgn));
        }
        let n_edges = e2v.len();

        let edge_centers: Vec<_> = e2v
            .iter()
            .map(|[a, b]| Point3::from((vertices[*a].coords + vertices[*b].coords) * 0.5))
            .collect();
        let edge_tangents: Vec<_> = e2v.iter().map(|[a, b]| vertices[*b] - vertices[*a]).collect();

        let (face_centers, face_vectors): (Vec<_>, Vec<_>) = faces
            .iter()
            .map(|face| compute_face_geometry(&vertices, face))
            .unzip();

        // Cells: vertices, edges, orientation, volume and center
        let mut c2f = Adjacency::with_signs();
        let mut c2e = Adjacency::new();
        let mut c2v = Adjacency::new();
        let mut cell_centers = Vec::with_capacity(cells.len());
        let mut cell_volumes = Vec::with_capacity(cells.len());
        for cell_faces in cells.iter() {
            let mut v_ids: Vec<usize> = cell_faces.iter().flat_map(|&f| faces.ids(f)).copied().collect();
            v_ids.sort_unstable();
            v_ids.dedup();
            let mut e_ids: Vec<usize> = cell_faces.iter().flat_map(|&f| f2e.ids(f)).copied().collect();
            e_ids.sort_unstable();
            e_ids.dedup();

            let x_ref = v_ids
                .iter()
                .fold(Vector3::<f64>::zeros(), |acc, &v| acc + vertices[v].coords)
                / v_ids.len() as f64;

            let mut signs = Vec::with_capacity(cell_faces.len());
            let mut volume = 0.0;
            let mut center = Vector3::zeros();
            for &f in cell_faces {
                let d = face_vectors[f].dot(&(face_centers[f].coords - x_ref));
                let sign: i8 = if d >= 0.0 { 1 } else { -1 };
                // Pyramid with apex x_ref and the face as base
                let pyramid_vol = d.abs() / 3.0;
                volume += pyramid_vol;
                center += (x_ref + (face_centers[f].coords - x_ref) * 0.75) * pyramid_vol;
                signs.push(sign);
            }
            ensure!(volume > 0.0, "Cell with non-positive volume.");

            c2f.push(cell_faces, Some(&signs));
            c2e.push(&e_ids, None);
            c2v.push(&v_ids, None);
            cell_centers.push(Point3::from(center / volume));
            cell_volumes.push(volume);
        }
        let f2c = c2f.transpose(n_faces);

        // Dual faces and edge volumes
        let mut dual_faces = NestedVec::new();
        let mut pvol_ec = NestedVec::new();
        let mut pvol_e = vec![0.0; n_edges];
        let mut cell_dual_faces = Vec::new();
        let mut cell_pvol = Vec::new();
        for c in 0..cells.len() {
            let e_ids = c2e.ids(c);
            let x_c = cell_centers[c];
            cell_dual_faces.clear();
            cell_dual_faces.resize(e_ids.len(), Vector3::zeros());
            for &f in c2f.ids(c) {
                let x_f = face_centers[f];
                for &e in f2e.ids(f) {
                    let x_e = edge_centers[e];
                    let mut tri = (x_f - x_e).cross(&(x_c - x_e)) * 0.5;
                    if tri.dot(&edge_tangents[e]) < 0.0 {
                        tri = -tri;
                    }
                    let local = e_ids
                        .binary_search(&e)
                        .expect("Edges of a face belong to the cells of the face");
                    cell_dual_faces[local] += tri;
                }
            }
            cell_pvol.clear();
            for (df, &e) in cell_dual_faces.iter().zip(e_ids) {
                let pvol = df.dot(&edge_tangents[e]) / 3.0;
                cell_pvol.push(pvol);
                pvol_e[e] += pvol;
            }
            dual_faces.push(&cell_dual_faces);
            pvol_ec.push(&cell_pvol);
        }
        let vol_tot = cell_volumes.iter().sum();

        // Boundary classification
        let boundary_faces: Vec<bool> = (0..n_faces).map(|f| f2c.count(f) <= 1).collect();
        let mut boundary_edges = vec![false; n_edges];
        for f in (0..n_faces).filter(|&f| boundary_faces[f]) {
            for &e in f2e.ids(f) {
                boundary_edges[e] = true;
            }
        }
        let cell_flags = (0..cells.len())
            .map(|c| {
                let mut flag = CellFlag::NONE;
                if c2f.ids(c).iter().any(|&f| boundary_faces[f]) {
                    flag |= CellFlag::BOUNDARY_BY_FACE;
                } else if c2e.ids(c).iter().any(|&e| boundary_edges[e]) {
                    flag |= CellFlag::BOUNDARY_BY_EDGE;
                }
                flag
            })
            .collect();

        Ok(Self {
            vertices,
            e2v,
            f2v: faces,
            f2e,
            c2f,
            f2c,
            c2e,
            c2v,
            edge_centers,
            edge_tangents,
            face_centers,
            face_vectors,
            cell_centers,
            cell_volumes,
            dual_faces,
            pvol_ec,
            pvol_e,
            vol_tot,
            boundary_faces,
            boundary_edges,
            cell_flags,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.e2v.len()
    }

    pub fn num_faces(&self) -> usize {
        self.f2v.len()
    }

    pub fn num_cells(&self) -> usize {
        self.c2f.len()
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn edge_vertices(&self) -> &[[usize; 2]] {
        &self.e2v
    }

    pub fn face_vertices(&self) -> &Adjacency {
        &self.f2v
    }

    pub fn face_edges(&self) -> &Adjacency {
        &self.f2e
    }

    pub fn cell_faces(&self) -> &Adjacency {
        &self.c2f
    }

    pub fn face_cells(&self) -> &Adjacency {
        &self.f2c
    }

    pub fn cell_edges(&self) -> &Adjacency {
        &self.c2e
    }

    pub fn cell_vertices(&self) -> &Adjacency {
        &self.c2v
    }

    pub fn edge_centers(&self) -> &[Point3<f64>] {
        &self.edge_centers
    }

    pub fn edge_tangents(&self) -> &[Vector3<f64>] {
        &self.edge_tangents
    }

    pub fn face_centers(&self) -> &[Point3<f64>] {
        &self.face_centers
    }

    /// Area-weighted face normals, oriented by the face vertex loop.
    pub fn face_vectors(&self) -> &[Vector3<f64>] {
        &self.face_vectors
    }

    pub fn cell_centers(&self) -> &[Point3<f64>] {
        &self.cell_centers
    }

    pub fn cell_volumes(&self) -> &[f64] {
        &self.cell_volumes
    }

    /// Dual face vectors of cell `c`, in the order of `cell_edges().ids(c)`.
    pub fn cell_dual_faces(&self, c: usize) -> &[Vector3<f64>] {
        self.dual_faces.get(c).expect("Cell index out of bounds")
    }

    /// Portions of the volume of cell `c` attached to its edges.
    pub fn cell_edge_volumes(&self, c: usize) -> &[f64] {
        self.pvol_ec.get(c).expect("Cell index out of bounds")
    }

    /// Volume of the dual cell attached to each edge.
    pub fn edge_volumes(&self) -> &[f64] {
        &self.pvol_e
    }

    pub fn total_volume(&self) -> f64 {
        self.vol_tot
    }

    pub fn is_boundary_face(&self, f: usize) -> bool {
        self.boundary_faces[f]
    }

    pub fn is_boundary_edge(&self, e: usize) -> bool {
        self.boundary_edges[e]
    }

    /// Indices of the faces which belong to a single cell.
    pub fn boundary_faces(&self) -> Vec<usize> {
        (0..self.num_faces()).filter(|&f| self.boundary_faces[f]).collect()
    }

    pub fn cell_flags(&self) -> &[CellFlag] {
        &self.cell_flags
    }
}

fn compute_face_geometry(vertices: &[Point3<f64>], face: &[usize]) -> (Point3<f64>, Vector3<f64>) {
    let n = face.len();
    let x_avg = face
        .iter()
        .fold(Vector3::<f64>::zeros(), |acc, &v| acc + vertices[v].coords)
        / n as f64;
    let mut vector = Vector3::zeros();
    let mut center = Vector3::zeros();
    let mut area = 0.0;
    for k in 0..n {
        let a = vertices[face[k]].coords;
        let b = vertices[face[(k + 1) % n]].coords;
        let tri = (a - x_avg).cross(&(b - x_avg)) * 0.5;
        let tri_area = tri.norm();
        vector += tri;
        center += (x_avg + a + b) * (tri_area / 3.0);
        area += tri_area;
    }
    if area > 0.0 {
        center /= area;
    } else {
        center = x_avg;
    }
    (Point3::from(center), vector)
}
