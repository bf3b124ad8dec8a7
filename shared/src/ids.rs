//! Resource identifiers chosen by the compute module.
//!
//! IDs are opaque to the host. The guest owns their lifetime and may reuse an ID
//! to force the host to recreate the resource behind it.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Pod, Zeroable,
            Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

resource_id!(
    /// Identifies a compiled vertex/fragment program.
    ShaderId,
    "shader"
);
resource_id!(
    /// Identifies a vertex or index buffer. Vertex and index buffers live in separate tables.
    BufferId,
    "buffer"
);
resource_id!(
    /// Identifies a vertex-array object.
    VaoId,
    "vao"
);
resource_id!(
    /// Identifies a 2D texture, uploaded or render-target.
    TextureId,
    "texture"
);
resource_id!(
    /// Identifies an off-screen render pass (framebuffer).
    PassId,
    "pass"
);
