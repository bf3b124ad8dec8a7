//! Naming conventions and limits shared by guest shader generators and the host.
//!
//! The guest emits shader source that declares attributes, uniform blocks and samplers
//! under these names; the host resolves them by name after linking.

/// Prefix of per-vertex packed attributes: `packed_geometry_0`, `packed_geometry_1`, ...
pub const GEOMETRY_ATTRIB_PREFIX: &str = "packed_geometry_";

/// Prefix of per-instance packed attributes: `packed_instance_0`, `packed_instance_1`, ...
pub const INSTANCE_ATTRIB_PREFIX: &str = "packed_instance_";

/// Prefix of sampler uniforms. A texture descriptor named `image` binds to `ds_image`.
pub const TEXTURE_UNIFORM_PREFIX: &str = "ds_";

/// Float components packed into one attribute.
pub const SLOTS_PER_ATTRIB: u32 = 4;

/// Bytes per slot (one f32).
pub const SLOT_BYTES: u32 = 4;

/// Maximum color attachments per render pass.
pub const MAX_COLOR_TARGETS: usize = 4;

/// Texture slot value meaning "leave this unit alone".
pub const TEXTURE_SLOT_EMPTY: u32 = u32::MAX;

/// Number of uniform blocks a draw call may update.
pub const UNIFORM_BLOCK_COUNT: usize = 6;

/// Uniform blocks uploaded per draw, in wire order.
///
/// The wire order (const first) follows the `DrawCall` argument list; each block is
/// a flat float array uniform in the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformBlock {
    Const,
    Pass,
    View,
    Draw,
    User,
    Live,
}

impl UniformBlock {
    pub const ALL: [UniformBlock; UNIFORM_BLOCK_COUNT] = [
        UniformBlock::Const,
        UniformBlock::Pass,
        UniformBlock::View,
        UniformBlock::Draw,
        UniformBlock::User,
        UniformBlock::Live,
    ];

    /// Uniform name declared by generated shaders.
    pub const fn uniform_name(self) -> &'static str {
        match self {
            UniformBlock::Const => "const_table",
            UniformBlock::Pass => "pass_table",
            UniformBlock::View => "view_table",
            UniformBlock::Draw => "draw_table",
            UniformBlock::User => "user_table",
            UniformBlock::Live => "live_table",
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_index_matches_wire_order() {
        for (i, block) in UniformBlock::ALL.iter().enumerate() {
            assert_eq!(block.index(), i);
        }
    }

    #[test]
    fn block_names_are_distinct() {
        let mut names: Vec<_> = UniformBlock::ALL.iter().map(|b| b.uniform_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), UNIFORM_BLOCK_COUNT);
    }
}
