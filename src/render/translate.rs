//! Walks the frame's tessellated draw commands and issues GPU work.
//!
//! Geometry for all meshes is already concatenated in the frame's buffers;
//! the translator replays the same order with running vertex/index offsets,
//! sets the scissor rectangle per command and binds the resolved texture.

use std::ops::Range;

use crate::render::textures::TextureRegistry;

/// Clip rectangle converted to a scissor rect clamped to the render target.
/// `None` means the draw covers no pixels and is skipped.
pub fn scissor_rect(
    clip: egui::Rect,
    target_width: u32,
    target_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let left = clip.min.x.max(0.0) as u32;
    let top = clip.min.y.max(0.0) as u32;
    let right = (clip.max.x.ceil() as u32).min(target_width);
    let bottom = (clip.max.y.ceil() as u32).min(target_height);
    if right <= left || bottom <= top {
        return None;
    }
    Some((left, top, right - left, bottom - top))
}

/// One translated draw: the index range into the frame's index buffer plus
/// the base vertex for the mesh. Offsets only grow within a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawSpan {
    pub indices: Range<u32>,
    pub base_vertex: i32,
}

/// Compute per-mesh spans for meshes concatenated in submission order.
pub fn running_spans(mesh_sizes: &[(usize, usize)]) -> Vec<DrawSpan> {
    let mut spans = Vec::with_capacity(mesh_sizes.len());
    let mut vertex_offset = 0usize;
    let mut index_offset = 0usize;
    for &(vertex_count, index_count) in mesh_sizes {
        spans.push(DrawSpan {
            indices: index_offset as u32..(index_offset + index_count) as u32,
            base_vertex: vertex_offset as i32,
        });
        vertex_offset += vertex_count;
        index_offset += index_count;
    }
    spans
}

/// Issue one indexed draw per primitive. The pass must already have the
/// pipeline, uniform bind group and vertex/index buffers bound.
pub fn translate(
    pass: &mut wgpu::RenderPass<'_>,
    registry: &TextureRegistry,
    primitives: &[egui::ClippedPrimitive],
    target_width: u32,
    target_height: u32,
) {
    let mut vertex_offset = 0usize;
    let mut index_offset = 0usize;

    for primitive in primitives {
        let egui::epaint::Primitive::Mesh(mesh) = &primitive.primitive else {
            // Paint callbacks carry no geometry and are not supported here.
            continue;
        };

        let span = DrawSpan {
            indices: index_offset as u32..(index_offset + mesh.indices.len()) as u32,
            base_vertex: vertex_offset as i32,
        };
        vertex_offset += mesh.vertices.len();
        index_offset += mesh.indices.len();

        let Some((x, y, w, h)) = scissor_rect(primitive.clip_rect, target_width, target_height)
        else {
            continue;
        };
        pass.set_scissor_rect(x, y, w, h);

        // An unknown or null texture id resolves to the font atlas; a draw
        // never fails the frame over a missing texture.
        let handle = registry.resolve_texture_id(mesh.texture_id);
        let record = registry.resolve(handle);
        pass.set_bind_group(1, &record.bind_group, &[]);

        pass.draw_indexed(span.indices, span.base_vertex, 0..1);
    }
}
