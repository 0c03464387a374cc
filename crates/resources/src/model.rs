//! glTF model decoding.

use std::path::Path;

use tracing::{info, warn};

use crate::error::{ResourceError, ResourceResult};
use crate::material::MaterialDesc;

/// Index data as it appears in the source file.
///
/// 16-bit arrays are kept as-is until upload time so the widening step is
/// observable and testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(indices) => indices.len(),
            IndexData::U32(indices) => indices.len(),
        }
    }

    /// Returns true if there are no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widens to `u32`, preserving order.
    pub fn widen(&self) -> Vec<u32> {
        match self {
            IndexData::U16(indices) => indices.iter().map(|&i| u32::from(i)).collect(),
            IndexData::U32(indices) => indices.clone(),
        }
    }
}

/// A decoded image, always RGBA8.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One renderable primitive.
///
/// Attribute arrays are parallel; normals and texture coordinates are
/// zero-filled when the file omits them.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: Option<String>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: IndexData,
    pub material_index: Option<usize>,
}

/// Everything decoded from one model file.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    pub images: Vec<ImageData>,
    pub materials: Vec<MaterialDesc>,
}

impl ModelData {
    /// Loads and decodes a .glb or .gltf file.
    ///
    /// Non-triangle primitives, primitives without indices, and primitives
    /// with 8-bit indices are skipped with a warning; a file yielding no
    /// usable meshes is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, a
    /// primitive lacks position data, or nothing renderable remains.
    pub fn load<P: AsRef<Path>>(path: P) -> ResourceResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let (document, buffers, source_images) =
            gltf::import(path).map_err(|e| ResourceError::GltfLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let images: Vec<ImageData> = source_images.iter().map(decode_image).collect();

        let materials: Vec<MaterialDesc> = document
            .materials()
            .map(|m| MaterialDesc::from_gltf(&m))
            .collect();

        let mut meshes = Vec::new();
        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    warn!(
                        "Skipping non-triangle primitive (mode {:?}) in mesh {:?}",
                        primitive.mode(),
                        mesh.name()
                    );
                    continue;
                }

                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

                let positions: Vec<[f32; 3]> = reader
                    .read_positions()
                    .ok_or(ResourceError::NoPositionData)?
                    .collect();

                let normals: Vec<[f32; 3]> = match reader.read_normals() {
                    Some(normals) => normals.collect(),
                    None => vec![[0.0; 3]; positions.len()],
                };

                let tex_coords: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                    Some(coords) => coords.into_f32().collect(),
                    None => vec![[0.0; 2]; positions.len()],
                };

                let indices = match reader.read_indices() {
                    Some(gltf::mesh::util::ReadIndices::U16(iter)) => {
                        IndexData::U16(iter.collect())
                    }
                    Some(gltf::mesh::util::ReadIndices::U32(iter)) => {
                        IndexData::U32(iter.collect())
                    }
                    Some(gltf::mesh::util::ReadIndices::U8(_)) => {
                        warn!(
                            "Skipping primitive with unsupported 8-bit indices in mesh {:?}",
                            mesh.name()
                        );
                        continue;
                    }
                    None => {
                        warn!("Skipping unindexed primitive in mesh {:?}", mesh.name());
                        continue;
                    }
                };

                meshes.push(MeshData {
                    name: mesh.name().map(str::to_owned),
                    positions,
                    normals,
                    tex_coords,
                    indices,
                    material_index: primitive.material().index(),
                });
            }
        }

        if meshes.is_empty() {
            return Err(ResourceError::NoMeshes);
        }

        info!(
            "Loaded {}: {} meshes, {} images, {} materials",
            path.display(),
            meshes.len(),
            images.len(),
            materials.len()
        );

        Ok(Self {
            meshes,
            images,
            materials,
        })
    }
}

/// Expands a decoded glTF image to RGBA8.
fn decode_image(data: &gltf::image::Data) -> ImageData {
    use gltf::image::Format;

    let pixel_count = data.width as usize * data.height as usize;
    let pixels = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => expand_rgba(&data.pixels, pixel_count, 3),
        Format::R8G8 => expand_rgba(&data.pixels, pixel_count, 2),
        Format::R8 => expand_rgba(&data.pixels, pixel_count, 1),
        other => {
            warn!(
                "Unsupported image format {:?}, substituting opaque white",
                other
            );
            vec![255u8; pixel_count * 4]
        }
    };

    ImageData {
        pixels,
        width: data.width,
        height: data.height,
    }
}

/// Expands 1, 2, or 3 channel 8-bit pixels to RGBA8. Missing color channels
/// repeat the red channel for single-channel sources; alpha is opaque.
fn expand_rgba(src: &[u8], pixel_count: usize, channels: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixel_count * 4);
    for pixel in src.chunks_exact(channels) {
        match channels {
            1 => out.extend_from_slice(&[pixel[0], pixel[0], pixel[0], 255]),
            2 => out.extend_from_slice(&[pixel[0], pixel[1], 0, 255]),
            _ => out.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_preserves_order() {
        let indices = IndexData::U16(vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(indices.widen(), vec![0u32, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn widening_u32_is_identity() {
        let indices = IndexData::U32(vec![7, 5, 3]);
        assert_eq!(indices.widen(), vec![7u32, 5, 3]);
    }

    #[test]
    fn index_len_counts_entries() {
        assert_eq!(IndexData::U16(vec![1, 2, 3]).len(), 3);
        assert!(IndexData::U32(vec![]).is_empty());
    }

    #[test]
    fn rgb_expands_with_opaque_alpha() {
        let rgb = [10u8, 20, 30, 40, 50, 60];
        let rgba = expand_rgba(&rgb, 2, 3);
        assert_eq!(rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn grayscale_replicates_across_rgb() {
        let gray = [128u8];
        let rgba = expand_rgba(&gray, 1, 1);
        assert_eq!(rgba, vec![128, 128, 128, 255]);
    }

    #[test]
    fn missing_file_is_a_distinct_error() {
        let result = ModelData::load("definitely/not/here.glb");
        assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
    }
}
