use super::diagnostics::GeomMeshDiagnostics;
use super::{BBox, Point3, Tolerance, Vec3};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeomMesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<[f64; 3]>>,
}

impl GeomMesh {
    /// Create a new mesh with positions and indices only.
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            normals: None,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions
            .iter()
            .any(|p| !p[0].is_finite() || !p[1].is_finite() || !p[2].is_finite())
    }

    /// Returns true if all vertex indices are within bounds.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len() as u32;
        self.indices.iter().all(|&i| i < n)
    }

    /// Returns true if indices represent a triangle list.
    #[must_use]
    pub fn has_triangle_indices(&self) -> bool {
        self.indices.len() % 3 == 0
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.has_triangle_indices() {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if let Some(normals) = &self.normals {
            if normals.len() != self.positions.len() {
                return Err("mesh normal buffer does not match vertex count".to_string());
            }
        }
        Ok(())
    }

    /// Axis-aligned bounds of all vertices, `None` for an empty mesh.
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        let mut iter = self.positions.iter().copied().map(Point3::from_array);
        let first = iter.next()?;
        Some(iter.fold(BBox::new(first, first), BBox::expand_point))
    }

    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            p[0] += offset.x;
            p[1] += offset.y;
            p[2] += offset.z;
        }
    }

    /// Appends `other`, offsetting its indices. Normals are kept only when both
    /// meshes carry them.
    pub fn append(&mut self, other: &GeomMesh) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.indices.extend(other.indices.iter().map(|i| i + offset));
        self.normals = match (self.normals.take(), other.normals.as_ref()) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend_from_slice(theirs);
                Some(mine)
            }
            _ => None,
        };
    }

    /// Copy with vertex normals that stay smooth across shallow edges and
    /// split where adjacent faces meet at more than `crease_deg`. With `0.0`
    /// every facet is shaded flat.
    #[must_use]
    pub fn with_crease_normals(&self, crease_deg: f64) -> Self {
        use std::collections::HashMap;

        if !self.has_valid_indices() {
            return self.clone();
        }

        let face_normals: Vec<Vec3> = self
            .indices
            .chunks_exact(3)
            .map(|tri| {
                let [a, b, c] = [tri[0], tri[1], tri[2]]
                    .map(|i| Point3::from_array(self.positions[i as usize]));
                b.sub_point(a).cross(c.sub_point(a))
            })
            .collect();

        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); self.positions.len()];
        for (face, tri) in self.indices.chunks_exact(3).enumerate() {
            for &v in tri {
                incident[v as usize].push(face);
            }
        }

        let cos_limit = crease_deg.to_radians().cos() - 1e-9;
        let mut positions = Vec::with_capacity(self.positions.len());
        let mut normals = Vec::with_capacity(self.positions.len());
        let mut indices = Vec::with_capacity(self.indices.len());
        let mut lookup: HashMap<(u32, [u64; 3]), u32> = HashMap::new();

        for (face, tri) in self.indices.chunks_exact(3).enumerate() {
            let own = face_normals[face].normalized().unwrap_or(Vec3::Z);
            for &v in tri {
                let sum = incident[v as usize]
                    .iter()
                    .map(|&other| face_normals[other])
                    .filter(|n| n.normalized().is_some_and(|unit| unit.dot(own) >= cos_limit))
                    .fold(Vec3::ZERO, |acc, n| acc + n);
                let normal = sum.normalized().unwrap_or(own).to_array();
                let index = *lookup.entry((v, normal.map(f64::to_bits))).or_insert_with(|| {
                    positions.push(self.positions[v as usize]);
                    normals.push(normal);
                    (positions.len() - 1) as u32
                });
                indices.push(index);
            }
        }

        Self {
            positions,
            indices,
            normals: Some(normals),
        }
    }

    /// Returns the position buffer as a flat slice: `[x0, y0, z0, x1, y1, z1, ...]`.
    ///
    /// This is a zero-copy view over `positions`, useful for wasm/JS adapters that
    /// expect packed numeric buffers.
    #[must_use]
    pub fn positions_flat(&self) -> &[f64] {
        flatten_f64_array_slice::<3>(&self.positions)
    }

    /// Returns the normal buffer as a flat slice when present.
    #[must_use]
    pub fn normals_flat(&self) -> Option<&[f64]> {
        self.normals.as_deref().map(flatten_f64_array_slice::<3>)
    }
}

fn flatten_f64_array_slice<const N: usize>(data: &[[f64; N]]) -> &[f64] {
    let count = data.len().checked_mul(N).unwrap_or(0);
    let ptr = data.as_ptr().cast::<f64>();
    // SAFETY: `[[f64; N]]` is stored contiguously, and we compute the element count as `len * N`.
    unsafe { std::slice::from_raw_parts(ptr, count) }
}

/// Welds, cleans and orients a raw triangle list and computes diagnostics.
pub(crate) fn finalize_mesh(
    points: Vec<Point3>,
    indices: Vec<u32>,
    tol: Tolerance,
) -> (GeomMesh, GeomMeshDiagnostics) {
    let (repaired_points, repaired_indices, welded_vertex_count) =
        weld_mesh_vertices(points, indices, tol);

    let (mut repaired_indices, degenerate_triangle_count) =
        cull_degenerate_triangles(&repaired_points, &repaired_indices, tol);

    let (open_edge_count, non_manifold_edge_count) = count_edge_topology(&repaired_indices);

    let mut warnings = Vec::new();
    if open_edge_count == 0 && non_manifold_edge_count == 0 {
        let volume = signed_volume(&repaired_points, &repaired_indices);
        if volume.is_finite() && volume < 0.0 {
            flip_all_triangles(&mut repaired_indices);
            warnings.push("mesh orientation flipped (outward)".to_string());
        }
    }
    if open_edge_count > 0 {
        warnings.push("mesh has open edges".to_string());
    }
    if non_manifold_edge_count > 0 {
        warnings.push("mesh has non-manifold edges".to_string());
    }

    let mesh = GeomMesh::new(
        repaired_points.into_iter().map(Point3::to_array).collect(),
        repaired_indices,
    );

    let diagnostics = GeomMeshDiagnostics {
        vertex_count: mesh.positions.len(),
        triangle_count: mesh.triangle_count(),
        welded_vertex_count,
        degenerate_triangle_count,
        open_edge_count,
        non_manifold_edge_count,
        warnings,
    };

    (mesh, diagnostics)
}

pub(crate) fn weld_mesh_vertices(
    points: Vec<Point3>,
    indices: Vec<u32>,
    tol: Tolerance,
) -> (Vec<Point3>, Vec<u32>, usize) {
    if !tol.eps.is_finite() || tol.eps <= 0.0 {
        return (points, indices, 0);
    }

    use std::collections::HashMap;

    let inv = 1.0 / tol.eps;

    /// Quantize a coordinate value to a grid cell index.
    /// Returns None for non-finite values (NaN/Inf) to prevent incorrect welding.
    fn quantize(value: f64, inv: f64) -> Option<i64> {
        if !value.is_finite() {
            return None;
        }
        let q = (value * inv).floor();
        Some(q.clamp(i64::MIN as f64, i64::MAX as f64) as i64)
    }

    let mut buckets: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    let mut remap: Vec<u32> = Vec::with_capacity(points.len());
    let mut out_points: Vec<Point3> = Vec::with_capacity(points.len());

    for p in points.iter().copied() {
        let key = match (quantize(p.x, inv), quantize(p.y, inv), quantize(p.z, inv)) {
            (Some(kx), Some(ky), Some(kz)) => Some((kx, ky, kz)),
            _ => None,
        };

        let found = key.and_then(|key| {
            neighbour_keys(key).find_map(|lookup| {
                buckets.get(&lookup).and_then(|candidates| {
                    candidates
                        .iter()
                        .copied()
                        .find(|&cand| tol.approx_eq_point3(out_points[cand as usize], p))
                })
            })
        });

        let out_idx = if let Some(existing) = found {
            existing
        } else {
            let new_idx = out_points.len() as u32;
            out_points.push(p);
            if let Some(key) = key {
                buckets.entry(key).or_default().push(new_idx);
            }
            new_idx
        };

        remap.push(out_idx);
    }

    let out_indices = indices
        .into_iter()
        .map(|idx| remap.get(idx as usize).copied().unwrap_or(idx))
        .collect();

    let welded = points.len().saturating_sub(out_points.len());
    (out_points, out_indices, welded)
}

fn neighbour_keys(key: (i64, i64, i64)) -> impl Iterator<Item = (i64, i64, i64)> {
    (-1i64..=1).flat_map(move |dx| {
        (-1i64..=1).flat_map(move |dy| {
            (-1i64..=1).map(move |dz| (key.0 + dx, key.1 + dy, key.2 + dz))
        })
    })
}

fn cull_degenerate_triangles(
    points: &[Point3],
    indices: &[u32],
    tol: Tolerance,
) -> (Vec<u32>, usize) {
    let mut out = Vec::with_capacity(indices.len());
    let mut removed = 0usize;

    for tri in indices.chunks_exact(3) {
        let i0 = tri[0];
        let i1 = tri[1];
        let i2 = tri[2];

        if i0 == i1 || i1 == i2 || i0 == i2 {
            removed += 1;
            continue;
        }

        let a = points.get(i0 as usize).copied();
        let b = points.get(i1 as usize).copied();
        let c = points.get(i2 as usize).copied();
        let (Some(a), Some(b), Some(c)) = (a, b, c) else {
            removed += 1;
            continue;
        };

        let ab = b.sub_point(a);
        let ac = c.sub_point(a);
        let area2 = ab.cross(ac).length_squared();
        if !area2.is_finite() || area2 <= tol.eps_squared() * tol.eps_squared() {
            removed += 1;
            continue;
        }

        out.extend_from_slice(&[i0, i1, i2]);
    }

    (out, removed)
}

fn count_edge_topology(indices: &[u32]) -> (usize, usize) {
    use std::collections::HashMap;

    let mut edge_counts: HashMap<(u32, u32), u32> = HashMap::new();

    for tri in indices.chunks_exact(3) {
        let edges = [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])];
        for (ea, eb) in edges {
            let (lo, hi) = if ea <= eb { (ea, eb) } else { (eb, ea) };
            *edge_counts.entry((lo, hi)).or_insert(0) += 1;
        }
    }

    let mut open_edge_count = 0usize;
    let mut non_manifold_edge_count = 0usize;
    for count in edge_counts.into_values() {
        if count == 1 {
            open_edge_count += 1;
        } else if count > 2 {
            non_manifold_edge_count += 1;
        }
    }

    (open_edge_count, non_manifold_edge_count)
}

fn flip_all_triangles(indices: &mut [u32]) {
    for tri in indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
}

pub(crate) fn signed_volume(points: &[Point3], indices: &[u32]) -> f64 {
    let mut volume = 0.0;
    for tri in indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            points.get(tri[0] as usize),
            points.get(tri[1] as usize),
            points.get(tri[2] as usize),
        ) else {
            continue;
        };

        volume += a.to_vec3().dot(b.to_vec3().cross(c.to_vec3()));
    }

    volume / 6.0
}
