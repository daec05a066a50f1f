//! Triangle Meshes

use crate::common::*;
use prb_core::ad::*;
use prb_core::bsdf::*;
use prb_core::error::*;
use prb_core::geometry::*;
use prb_core::interaction::*;
use prb_core::pbrt::*;
use prb_core::sampling::*;
use prb_core::shape::*;
use std::collections::HashMap;

/// An edge shared by one or two faces.
#[derive(Copy, Clone, Debug)]
struct Edge {
    /// Vertex indices.
    v: [u32; 2],

    /// Adjacent faces. The second one is `None` on the mesh boundary.
    faces: (u32, Option<u32>),
}

/// A triangle mesh with a differentiable translation. Local coordinates of a
/// face are the barycentric coordinates `(b1, b2)` of its second and third
/// vertices.
///
/// Visibility discontinuities are edges: boundary edges always, interior
/// edges where one adjacent face is front-facing and the other back-facing.
pub struct Mesh {
    /// Common shape data.
    pub data: ShapeData,

    /// Translation applied to all vertices.
    pub translation: Vector3r,

    /// Untranslated vertex positions.
    positions: Vec<Point3f>,

    /// Vertex indices of each face.
    indices: Vec<[u32; 3]>,

    /// Edge topology.
    edges: Vec<Edge>,

    /// Edges of each face: `(v0, v1)`, `(v1, v2)`, `(v2, v0)`.
    face_edges: Vec<[u32; 3]>,

    /// Distribution of faces proportional to area.
    area_distr: Distribution1D,

    /// Total surface area.
    area: Float,

    /// Distribution of edges proportional to length.
    edge_distr: Distribution1D,

    /// Total edge length.
    edge_length: Float,
}

impl Mesh {
    /// Create a new triangle mesh.
    ///
    /// * `id`        - Identifier.
    /// * `positions` - Vertex positions.
    /// * `indices`   - Vertex indices of each face.
    /// * `bsdf`      - Surface scattering model.
    pub fn new(id: &str, positions: Vec<Point3f>, indices: Vec<[u32; 3]>, bsdf: Box<dyn BSDF>) -> Result<Self> {
        if indices.is_empty() {
            return Err(Error::Config(id.to_string(), "mesh has no faces".to_string()));
        }
        if let Some(bad) = indices.iter().flatten().find(|i| **i as usize >= positions.len()) {
            return Err(Error::Config(
                id.to_string(),
                format!("vertex index {} out of range for {} vertices", bad, positions.len()),
            ));
        }

        let mut edges: Vec<Edge> = vec![];
        let mut lookup: HashMap<(u32, u32), u32> = HashMap::new();
        let mut face_edges = Vec::with_capacity(indices.len());
        for (f, tri) in indices.iter().enumerate() {
            let mut fe = [0; 3];
            for j in 0..3 {
                let (a, b) = (tri[j], tri[(j + 1) % 3]);
                let key = (a.min(b), a.max(b));
                let e = match lookup.get(&key) {
                    Some(&e) => {
                        let edge = &mut edges[e as usize];
                        if edge.faces.1.is_some() {
                            warn!("Mesh '{}' has a non-manifold edge {:?}", id, key);
                        } else {
                            edge.faces.1 = Some(f as u32);
                        }
                        e
                    }
                    None => {
                        let e = edges.len() as u32;
                        edges.push(Edge {
                            v: [a, b],
                            faces: (f as u32, None),
                        });
                        lookup.insert(key, e);
                        e
                    }
                };
                fe[j] = e;
            }
            face_edges.push(fe);
        }

        let face_areas: Vec<Float> = indices
            .iter()
            .map(|t| {
                let [p0, p1, p2] = t.map(|i| positions[i as usize]);
                0.5 * (p1 - p0).cross(&(p2 - p0)).length()
            })
            .collect();
        let edge_lengths: Vec<Float> = edges
            .iter()
            .map(|e| positions[e.v[0] as usize].distance(&positions[e.v[1] as usize]))
            .collect();
        let area = face_areas.iter().sum();
        let edge_length = edge_lengths.iter().sum();

        debug!("Mesh '{}': {} faces, {} edges", id, indices.len(), edges.len());

        Ok(Self {
            data: ShapeData::new(id, bsdf),
            translation: Vector3r::zero(),
            positions,
            indices,
            edges,
            face_edges,
            area_distr: Distribution1D::new(face_areas),
            area,
            edge_distr: Distribution1D::new(edge_lengths),
            edge_length,
        })
    }

    /// Create an axis-aligned box with outward facing triangles.
    ///
    /// * `id`   - Identifier.
    /// * `min`  - Minimum corner.
    /// * `max`  - Maximum corner.
    /// * `bsdf` - Surface scattering model.
    pub fn cuboid(id: &str, min: Point3f, max: Point3f, bsdf: Box<dyn BSDF>) -> Result<Self> {
        let positions = (0..8)
            .map(|i| {
                Point3f::new(
                    if i & 1 == 0 { min.x } else { max.x },
                    if i & 2 == 0 { min.y } else { max.y },
                    if i & 4 == 0 { min.z } else { max.z },
                )
            })
            .collect();
        let quads = [
            [0, 2, 3, 1], // -z
            [4, 5, 7, 6], // +z
            [0, 1, 5, 4], // -y
            [2, 6, 7, 3], // +y
            [0, 4, 6, 2], // -x
            [1, 3, 7, 5], // +x
        ];
        let indices = quads
            .iter()
            .flat_map(|q| [[q[0], q[1], q[2]], [q[0], q[2], q[3]]])
            .collect();
        Self::new(id, positions, indices, bsdf)
    }

    /// Returns the number of faces.
    pub fn face_count(&self) -> usize {
        self.indices.len()
    }

    /// Returns the detached world position of a vertex.
    fn vertex(&self, i: u32) -> Point3f {
        self.positions[i as usize] + self.translation.value()
    }

    /// Returns the detached world positions of a face's vertices.
    fn face_vertices(&self, face: u32) -> [Point3f; 3] {
        self.indices[face as usize].map(|i| self.vertex(i))
    }

    /// Returns the unit geometric normal of a face.
    fn face_normal(&self, face: u32) -> Normal3f {
        let [p0, p1, p2] = self.face_vertices(face);
        (p1 - p0).cross(&(p2 - p0)).normalize()
    }

    /// Returns `true` if the edge is a visibility discontinuity for segments
    /// along `d`.
    fn is_silhouette(&self, edge: &Edge, d: &Vector3f) -> bool {
        match edge.faces.1 {
            None => true,
            Some(f1) => self.face_normal(edge.faces.0).dot(d) * self.face_normal(f1).dot(d) < 0.0,
        }
    }

    /// Returns the barycentric coordinates `(b1, b2)` in face `face` of the
    /// point at fraction `f` along edge `edge`.
    fn edge_barycentrics(&self, face: u32, edge: &Edge, f: Float) -> Point2f {
        let tri = self.indices[face as usize];
        let mut w = [0.0; 3];
        for j in 0..3 {
            if tri[j] == edge.v[0] {
                w[j] += 1.0 - f;
            } else if tri[j] == edge.v[1] {
                w[j] += f;
            }
        }
        Point2f::new(w[1], w[2])
    }

    /// Builds the silhouette sample at fraction `f` along an edge.
    ///
    /// * `k`   - Edge index.
    /// * `f`   - Fraction along the edge.
    /// * `d`   - Direction of the boundary segment.
    /// * `pdf` - Sampling density.
    fn edge_sample(&self, k: usize, f: Float, d: Vector3f, pdf: Float) -> SilhouetteSample {
        let edge = self.edges[k];
        if !self.is_silhouette(&edge, &d) {
            return SilhouetteSample::default();
        }
        let (a, b) = (self.vertex(edge.v[0]), self.vertex(edge.v[1]));
        let p = lerp(f, a, b);
        let e = (b - a).normalize();
        let face = edge.faces.0;
        let [p0, p1, p2] = self.face_vertices(face);
        let centroid = (p0 + p1 + p2) / 3.0;
        let mut ss = perimeter_sample(p, e, d, &(centroid - p), pdf);
        ss.prim_index = face;
        ss.prim_uv = self.edge_barycentrics(face, &edge, f);
        ss
    }
}

impl Shape for Mesh {
    fn get_type(&self) -> &'static str {
        "mesh"
    }

    fn get_data(&self) -> &ShapeData {
        &self.data
    }

    fn get_data_mut(&mut self) -> &mut ShapeData {
        &mut self.data
    }

    fn bbox(&self) -> Bounds3f {
        (0..self.positions.len() as u32).fold(Bounds3f::EMPTY, |b, i| b.union_point(&self.vertex(i)))
    }

    fn ray_intersect_preliminary(&self, ray: &Ray) -> Option<(Float, u32, Point2f)> {
        let mut r = *ray;
        let mut hit = None;
        for face in 0..self.indices.len() as u32 {
            let [p0, p1, p2] = self.face_vertices(face);
            if let Some((t, b)) = intersect_triangle(&r, &p0, &p1, &p2) {
                r.t_max = t;
                hit = Some((t, face, b));
            }
        }
        hit
    }

    fn compute_surface_interaction(
        &self,
        ray: &Ray,
        pi: &PreliminaryIntersection,
        flags: RayFlags,
    ) -> SurfaceInteraction {
        finish_interaction(ray, pi, flags, self.eval_parameterization(pi.prim_index, &pi.prim_uv))
    }

    fn eval_parameterization(&self, prim_index: u32, prim_uv: &Point2f) -> SurfaceInteraction {
        let [p0, p1, p2] = self.indices[prim_index as usize].map(|i| self.positions[i as usize]);
        let local = p0 * (1.0 - prim_uv.x - prim_uv.y) + p1 * prim_uv.x + p2 * prim_uv.y;
        let p = self.translation + Vector3r::from(local);
        let n = Vector3r::from(self.face_normal(prim_index));
        let mut si = SurfaceInteraction::new(
            Real::from(0.0),
            p,
            n,
            Point2r::from(*prim_uv),
            Vector3r::from(p1 - p0),
            Vector3r::from(p2 - p0),
            &n,
        );
        si.prim_index = prim_index;
        si.prim_uv = *prim_uv;
        si
    }

    fn surface_area(&self) -> Float {
        self.area
    }

    fn sample_position(&self, u: &Point2f) -> PositionSample {
        let (face, _, u_remapped) = self.area_distr.sample_discrete(u.x);
        let prim_uv = uniform_sample_triangle(&Point2f::new(u_remapped, u.y));
        let si = self.eval_parameterization(face as u32, &prim_uv);
        PositionSample {
            p: si.p,
            n: si.n,
            pdf: 1.0 / self.area,
            delta: false,
            prim_index: face as u32,
            prim_uv,
        }
    }

    fn is_differentiable(&self) -> bool {
        self.translation.is_attached()
    }

    fn silhouette_discontinuity_types(&self) -> DiscontinuityFlags {
        DiscontinuityFlags::PERIMETER
    }

    /// Picks an edge proportionally to length with `u.x` (reused for the
    /// position along it) and a direction on the sphere with `(u.y, u.z)`.
    fn sample_silhouette(&self, u: &Point3f, flags: DiscontinuityFlags) -> SilhouetteSample {
        if !flags.contains(DiscontinuityFlags::PERIMETER) {
            return SilhouetteSample::default();
        }
        let (k, _, f) = self.edge_distr.sample_discrete(u.x);
        let d = uniform_sample_sphere(&Point2f::new(u.y, u.z));
        self.edge_sample(k, f, d, INV_FOUR_PI / self.edge_length)
    }

    fn invert_silhouette_sample(&self, ss: &SilhouetteSample) -> Point3f {
        let face = ss.prim_index as usize;
        let w = [1.0 - ss.prim_uv.x - ss.prim_uv.y, ss.prim_uv.x, ss.prim_uv.y];
        // The edge lies opposite the vertex with the smallest weight.
        let opposite = (0..3).fold(0, |best, j| if w[j] < w[best] { j } else { best });
        let k = self.face_edges[face][(opposite + 1) % 3] as usize;
        let edge = self.edges[k];
        let slot = self.indices[face].iter().position(|i| *i == edge.v[1]).unwrap_or(0);
        let f = clamp(w[slot], 0.0, 1.0);
        let cdf = &self.edge_distr.cdf;
        let uv = uniform_sphere_to_square(&ss.d);
        Point3f::new(
            clamp(lerp(f, cdf[k], cdf[k + 1]), 0.0, ONE_MINUS_EPSILON),
            uv.x,
            uv.y,
        )
    }

    fn precompute_silhouette(&self, viewpoint: &Point3f) -> (Vec<u32>, Vec<Float>) {
        let mut prims = vec![];
        let mut weights = vec![];
        for (k, edge) in self.edges.iter().enumerate() {
            let (a, b) = (self.vertex(edge.v[0]), self.vertex(edge.v[1]));
            if let Some(d) = view_direction(viewpoint, &lerp(0.5, a, b)) {
                if self.is_silhouette(edge, &d) {
                    prims.push(k as u32);
                    weights.push(a.distance(&b));
                }
            }
        }
        (prims, weights)
    }

    fn sample_precomputed_silhouette(&self, viewpoint: &Point3f, index: u32, u: Float) -> SilhouetteSample {
        let edge = match self.edges.get(index as usize) {
            Some(edge) => edge,
            None => return SilhouetteSample::default(),
        };
        let (a, b) = (self.vertex(edge.v[0]), self.vertex(edge.v[1]));
        match view_direction(viewpoint, &lerp(u, a, b)) {
            Some(d) => self.edge_sample(index as usize, u, d, 1.0 / a.distance(&b)),
            None => SilhouetteSample::default(),
        }
    }

    /// Chooses one of the face's silhouette edges with `u` and moves the
    /// point to the closest position on it.
    fn primitive_silhouette_projection(
        &self,
        viewpoint: &Point3f,
        si: &SurfaceInteraction,
        flags: DiscontinuityFlags,
        u: Float,
    ) -> SilhouetteSample {
        if !flags.contains(DiscontinuityFlags::PERIMETER) {
            return SilhouetteSample::default();
        }
        let p = si.p_f();
        let candidates: Vec<u32> = self.face_edges[si.prim_index as usize]
            .iter()
            .copied()
            .filter(|k| match view_direction(viewpoint, &p) {
                Some(d) => self.is_silhouette(&self.edges[*k as usize], &d),
                None => false,
            })
            .collect();
        if candidates.is_empty() {
            return SilhouetteSample::default();
        }
        let k = candidates[((u * candidates.len() as Float) as usize).min(candidates.len() - 1)];
        let edge = self.edges[k as usize];
        let (a, b) = (self.vertex(edge.v[0]), self.vertex(edge.v[1]));
        let ab = b - a;
        let f = clamp((p - a).dot(&ab) / ab.length_squared(), 0.0, 1.0);
        self.sample_precomputed_silhouette(viewpoint, k, f)
    }

    fn traverse(&mut self, cb: &mut dyn FnMut(&str, &mut Real)) {
        let id = self.data.id.clone();
        traverse_vector(&param_key(&id, "translation"), &mut self.translation, cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use materials::*;
    use prb_core::spectrum::*;
    use proptest::prelude::*;

    fn cube() -> Mesh {
        Mesh::cuboid(
            "box",
            Point3f::new(-0.5, -0.5, -0.5),
            Point3f::new(0.5, 0.5, 0.5),
            Box::new(Diffuse::new(SpectrumF::splat(0.5))),
        )
        .unwrap()
    }

    fn triangle() -> Mesh {
        Mesh::new(
            "tri",
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
            Box::new(Diffuse::new(SpectrumF::splat(0.5))),
        )
        .unwrap()
    }

    #[test]
    fn cube_topology_is_closed() {
        let m = cube();
        assert_eq!(m.face_count(), 12);
        assert_eq!(m.edges.len(), 18);
        assert!(m.edges.iter().all(|e| e.faces.1.is_some()));
        assert!(approx_eq!(f32, m.surface_area(), 6.0, epsilon = 1e-5));
        for f in 0..12 {
            let [p0, p1, p2] = m.face_vertices(f);
            let centroid = (p0 + p1 + p2) / 3.0;
            assert!(m.face_normal(f).dot(&centroid) > 0.0, "face {} points inward", f);
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let r = Mesh::new(
            "bad",
            vec![Point3f::zero()],
            vec![[0, 1, 2]],
            Box::new(Diffuse::new(SpectrumF::splat(0.5))),
        );
        assert!(matches!(r, Err(Error::Config(_, _))));
    }

    #[test]
    fn closest_face_wins() {
        let m = cube();
        let ray = Ray::new(Point3f::new(0.1, 0.2, 3.0), Vector3f::new(0.0, 0.0, -1.0));
        let (t, face, b) = m.ray_intersect_preliminary(&ray).unwrap();
        assert!(approx_eq!(f32, t, 2.5, epsilon = 1e-5));
        let si = m.eval_parameterization(face, &b);
        assert!(approx_eq!(f32, si.n_f().z, 1.0, epsilon = 1e-6));
        assert!(si.p_f().distance(&ray.at(t)) < 1e-5);
    }

    #[test]
    fn cube_silhouette_from_corner_view() {
        let m = cube();
        let vp = Point3f::new(3.0, 2.0, 4.0);
        let (prims, weights) = m.precompute_silhouette(&vp);
        // Three faces are visible; the silhouette is a hexagon of six edges.
        assert_eq!(prims.len(), 6);
        assert!(weights.iter().all(|w| approx_eq!(f32, *w, 1.0, epsilon = 1e-5)));
        for &k in &prims {
            let ss = m.sample_precomputed_silhouette(&vp, k, 0.5);
            assert!(ss.is_valid());
            assert!((ss.p - vp).dot(&ss.n).abs() < 1e-4);
            // The normal points away from the cube.
            assert!(ss.n.dot(&ss.p) > 0.0);
        }
    }

    proptest! {
        #[test]
        fn boundary_edge_samples_invert(x in 0.001f32..0.999, y in 0.01f32..0.99, z in 0.0f32..0.999) {
            let m = triangle();
            let ss = m.sample_silhouette(&Point3f::new(x, y, z), DiscontinuityFlags::ALL);
            prop_assume!(ss.is_valid());
            let u = m.invert_silhouette_sample(&ss);
            prop_assert!((u.x - x).abs() < 1e-3);
        }
    }

    #[test]
    fn edge_moves_with_translation() {
        let mut m = triangle();
        m.translation.y = Real::variable(0.0, 4);
        let vp = Point3f::new(0.3, 0.3, 2.0);
        let si = m.eval_parameterization(0, &Point2f::new(0.1, 0.2));
        let ss = m.primitive_silhouette_projection(&vp, &si, DiscontinuityFlags::ALL, 0.0);
        assert!(ss.is_valid());
        let v = m.differential_motion(&ss);
        assert_eq!(v.y.grad_at(4), 1.0);
        assert!(v.value().distance(&ss.p) < 1e-6);
    }
}
