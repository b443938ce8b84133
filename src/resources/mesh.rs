//! Mesh data structures and generation

use crate::backend::traits::*;
use crate::backend::types::*;
use glam::{Vec2, Vec3};

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub topology: PrimitiveTopology,
    pub name: String,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            name: name.to_string(),
        }
    }

    /// Calculate index count
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Calculate triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Triangle corner positions
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.vertices[tri[0] as usize].position,
                self.vertices[tri[1] as usize].position,
                self.vertices[tri[2] as usize].position,
            ]
        })
    }

    /// UV sphere centered at the origin, counter-clockwise when seen from outside
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let mut mesh = Mesh::new("sphere");
        let segments = segments.max(3);
        let rings = rings.max(2);

        let segment_angle = 2.0 * std::f32::consts::PI / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());

                mesh.vertices.push(Vertex {
                    position: normal * radius,
                    normal,
                    uv: Vec2::new(
                        segment as f32 / segments as f32,
                        ring as f32 / rings as f32,
                    ),
                });
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                mesh.indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    current + 1,
                    next + 1,
                    next,
                ]);
            }
        }

        mesh
    }
}

/// Mesh uploaded to GPU buffers
#[derive(Debug, Clone, Copy)]
pub struct GpuMesh {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub index_format: IndexFormat,
    pub topology: PrimitiveTopology,
}

impl GpuMesh {
    pub fn upload<B: GraphicsBackend>(backend: &mut B, mesh: &Mesh) -> BackendResult<Self> {
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", mesh.name)),
                size: mesh.vertex_bytes().len() as u64,
                usage: BufferUsage::VERTEX,
            },
            mesh.vertex_bytes(),
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", mesh.name)),
                size: mesh.index_bytes().len() as u64,
                usage: BufferUsage::INDEX,
            },
            mesh.index_bytes(),
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count() as u32,
            index_format: IndexFormat::Uint32,
            topology: mesh.topology,
        })
    }

    /// Bind buffers and issue one indexed draw
    pub fn draw<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.set_vertex_buffer(0, self.vertex_buffer, 0);
        backend.set_index_buffer(self.index_buffer, 0, self.index_format);
        backend.draw_indexed(0..self.index_count, 0, 0..1);
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_vertices_lie_on_radius() {
        let sphere = Mesh::sphere(1.0, 24, 16);
        for v in &sphere.vertices {
            assert!((v.position.length() - 1.0).abs() < 1e-5);
            assert!(v.normal.abs_diff_eq(v.position, 1e-5));
        }
        assert_eq!(sphere.triangle_count(), 24 * 16 * 2);
    }

    #[test]
    fn test_sphere_triangles_face_outward() {
        let sphere = Mesh::sphere(2.0, 16, 12);
        let mut checked = 0;
        for [a, b, c] in sphere.triangles() {
            let face_normal = (b - a).cross(c - a);
            // pole triangles collapse to a line
            if face_normal.length() < 1e-6 {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0, "inward face at {:?}", centroid);
            checked += 1;
        }
        assert!(checked >= 16 * 10 * 2);
    }

    #[test]
    fn test_indices_in_range() {
        let sphere = Mesh::sphere(1.0, 3, 2);
        let count = sphere.vertices.len() as u32;
        assert!(sphere.indices.iter().all(|&i| i < count));
        assert_eq!(sphere.index_bytes().len(), sphere.index_count() * 4);
        assert_eq!(sphere.vertex_bytes().len(), sphere.vertices.len() * 32);
    }
}
