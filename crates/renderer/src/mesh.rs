//! GPU mesh buffers and drawable objects.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use tracing::debug;

use viewer_resources::MeshData;
use viewer_rhi::buffer::{Buffer, BufferUsage};
use viewer_rhi::device::Device;
use viewer_rhi::vertex::Vertex;
use viewer_rhi::RhiResult;

use crate::material::MaterialHandle;

/// Interleaves parallel attribute arrays into the vertex layout the
/// pipeline consumes.
///
/// The arrays are expected to be the same length; missing normals or
/// texture coordinates should already be zero-filled by the loader.
pub fn interleave_vertices(
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    tex_coords: &[[f32; 2]],
) -> Vec<Vertex> {
    (0..positions.len())
        .map(|i| {
            Vertex::new(
                Vec3::from_array(positions[i]),
                normals
                    .get(i)
                    .copied()
                    .map(Vec3::from_array)
                    .unwrap_or(Vec3::ZERO),
                tex_coords
                    .get(i)
                    .copied()
                    .map(Vec2::from_array)
                    .unwrap_or(Vec2::ZERO),
            )
        })
        .collect()
}

/// GPU-resident mesh: vertex and index buffers plus its material handle.
pub struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    material: MaterialHandle,
}

impl GpuMesh {
    /// Uploads mesh attribute data into vertex and index buffers.
    ///
    /// 16-bit index data is widened to 32 bits so every mesh binds with a
    /// single index type.
    pub fn new(device: Arc<Device>, mesh: &MeshData, material: MaterialHandle) -> RhiResult<Self> {
        let vertices = interleave_vertices(&mesh.positions, &mesh.normals, &mesh.tex_coords);
        let indices = mesh.indices.widen();

        let vertex_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer =
            Buffer::new_with_data(device, BufferUsage::Index, bytemuck::cast_slice(&indices))?;

        debug!(
            "Uploaded mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            material,
        })
    }

    /// Returns the vertex buffer.
    #[inline]
    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    /// Returns the index buffer.
    #[inline]
    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    /// Number of indices to draw.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Handle of the material this mesh draws with.
    #[inline]
    pub fn material(&self) -> MaterialHandle {
        self.material
    }
}

/// A renderable entity: one or more GPU meshes under a shared transform.
pub struct DrawableObject {
    meshes: Vec<GpuMesh>,
    transform: Mat4,
}

impl DrawableObject {
    /// Wraps uploaded meshes with an identity transform.
    pub fn new(meshes: Vec<GpuMesh>) -> Self {
        Self {
            meshes,
            transform: Mat4::IDENTITY,
        }
    }

    /// Replaces the object's model transform.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Returns the object's model transform.
    #[inline]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Returns the object's meshes.
    #[inline]
    pub fn meshes(&self) -> &[GpuMesh] {
        &self.meshes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_parallel_arrays() {
        let positions = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let normals = [[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let tex_coords = [[0.0, 1.0], [1.0, 0.0]];

        let vertices = interleave_vertices(&positions, &normals, &tex_coords);

        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[0].position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(vertices[0].normal, Vec3::Y);
        assert_eq!(vertices[1].tex_coord, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_interleave_short_attributes_zero_filled() {
        let positions = [[1.0, 1.0, 1.0], [0.0, 0.0, 0.0]];
        let vertices = interleave_vertices(&positions, &[], &[]);

        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[0].normal, Vec3::ZERO);
        assert_eq!(vertices[1].tex_coord, Vec2::ZERO);
    }

    #[test]
    fn test_drawable_default_transform_is_identity() {
        let object = DrawableObject::new(Vec::new());
        assert_eq!(object.transform(), Mat4::IDENTITY);
    }
}
