//! Capability registry
//!
//! Maps driver-reported GL extension strings to a normalized, backend
//! independent bitmask. The mapping is a static table folded once per
//! context creation; the result is cached on the context and never changes
//! afterwards (resize and swap do not affect it).

use bitflags::bitflags;

bitflags! {
    /// Normalized renderer feature flags
    ///
    /// Backend and driver differences are flattened into these bits so upper
    /// layers can negotiate features without knowing which GL dialect is
    /// underneath.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Caps: u32 {
        /// Additional swap chains can be created for secondary windows.
        /// Always present; the context itself provides it.
        const SWAP_CHAIN = 1 << 0;
        /// BGRA8 texture uploads without swizzling
        const TEXTURE_BGRA8 = 1 << 1;
        /// S3TC/DXT compressed texture formats
        const TEXTURE_COMPRESSION_S3TC = 1 << 2;
        /// Float color texture formats
        const TEXTURE_FLOAT = 1 << 3;
        /// Half-float color texture formats
        const TEXTURE_HALF_FLOAT = 1 << 4;
        /// sRGB texture sampling
        const TEXTURE_SRGB = 1 << 5;
        /// Half-float vertex attributes
        const VERTEX_HALF_FLOAT = 1 << 6;
        /// Packed 10-10-10-2 vertex attributes
        const VERTEX_UINT10 = 1 << 7;
        /// Hardware instanced drawing
        const INSTANCING = 1 << 8;
        /// Framebuffer-to-framebuffer blit
        const FRAMEBUFFER_BLIT = 1 << 9;
        /// sRGB-correct framebuffer writes
        const FRAMEBUFFER_SRGB = 1 << 10;
        /// Multisampled framebuffers
        const MULTISAMPLE = 1 << 11;
        /// GPU timer queries
        const TIMER_QUERY = 1 << 12;
        /// Boolean occlusion queries
        const OCCLUSION_QUERY = 1 << 13;
        /// Program binary retrieval for shader caching
        const PROGRAM_BINARY = 1 << 14;
        /// Derivative functions in fragment shaders
        const DERIVATIVES = 1 << 15;
        /// Driver-reported GPU memory statistics
        const GPU_MEMORY_INFO = 1 << 16;
    }
}

/// One extension-name-to-bit entry
struct Mapping {
    name: &'static str,
    caps: Caps,
}

/// Extension names without the `GL_` prefix; several names may feed the same
/// bit since desktop, ES, and vendor variants advertise the same feature
/// under different strings.
static EXTENSION_MAP: &[Mapping] = &[
    Mapping { name: "EXT_texture_format_BGRA8888", caps: Caps::TEXTURE_BGRA8 },
    Mapping { name: "EXT_texture_compression_s3tc", caps: Caps::TEXTURE_COMPRESSION_S3TC },
    Mapping { name: "EXT_texture_compression_dxt1", caps: Caps::TEXTURE_COMPRESSION_S3TC },
    Mapping { name: "CHROMIUM_texture_compression_dxt3", caps: Caps::TEXTURE_COMPRESSION_S3TC },
    Mapping { name: "CHROMIUM_texture_compression_dxt5", caps: Caps::TEXTURE_COMPRESSION_S3TC },
    Mapping { name: "ARB_texture_float", caps: Caps::TEXTURE_FLOAT },
    Mapping { name: "OES_texture_float", caps: Caps::TEXTURE_FLOAT },
    Mapping { name: "OES_texture_half_float", caps: Caps::TEXTURE_HALF_FLOAT },
    Mapping { name: "ARB_half_float_pixel", caps: Caps::TEXTURE_HALF_FLOAT },
    Mapping { name: "EXT_texture_sRGB", caps: Caps::TEXTURE_SRGB },
    Mapping { name: "ARB_half_float_vertex", caps: Caps::VERTEX_HALF_FLOAT },
    Mapping { name: "OES_vertex_half_float", caps: Caps::VERTEX_HALF_FLOAT },
    Mapping { name: "ARB_vertex_type_2_10_10_10_rev", caps: Caps::VERTEX_UINT10 },
    Mapping { name: "OES_vertex_type_10_10_10_2", caps: Caps::VERTEX_UINT10 },
    Mapping { name: "ARB_instanced_arrays", caps: Caps::INSTANCING },
    Mapping { name: "ANGLE_instanced_arrays", caps: Caps::INSTANCING },
    Mapping { name: "EXT_instanced_arrays", caps: Caps::INSTANCING },
    Mapping { name: "EXT_framebuffer_blit", caps: Caps::FRAMEBUFFER_BLIT },
    Mapping { name: "ARB_framebuffer_sRGB", caps: Caps::FRAMEBUFFER_SRGB },
    Mapping { name: "EXT_framebuffer_sRGB", caps: Caps::FRAMEBUFFER_SRGB },
    Mapping { name: "EXT_sRGB", caps: Caps::FRAMEBUFFER_SRGB },
    Mapping { name: "ARB_multisample", caps: Caps::MULTISAMPLE },
    Mapping { name: "CHROMIUM_framebuffer_multisample", caps: Caps::MULTISAMPLE },
    Mapping { name: "EXT_multisampled_render_to_texture", caps: Caps::MULTISAMPLE },
    Mapping { name: "ARB_timer_query", caps: Caps::TIMER_QUERY },
    Mapping { name: "EXT_timer_query", caps: Caps::TIMER_QUERY },
    Mapping { name: "EXT_disjoint_timer_query", caps: Caps::TIMER_QUERY },
    Mapping { name: "EXT_occlusion_query_boolean", caps: Caps::OCCLUSION_QUERY },
    Mapping { name: "ARB_occlusion_query", caps: Caps::OCCLUSION_QUERY },
    Mapping { name: "ARB_get_program_binary", caps: Caps::PROGRAM_BINARY },
    Mapping { name: "OES_get_program_binary", caps: Caps::PROGRAM_BINARY },
    Mapping { name: "OES_standard_derivatives", caps: Caps::DERIVATIVES },
    Mapping { name: "ATI_meminfo", caps: Caps::GPU_MEMORY_INFO },
    Mapping { name: "NVX_gpu_memory_info", caps: Caps::GPU_MEMORY_INFO },
];

/// Folds driver-reported extension identifiers into a [`Caps`] bitmask
pub struct CapabilityRegistry;

impl CapabilityRegistry {
    /// Resolve a set of reported extension strings to the normalized bitmask
    ///
    /// Deterministic: the same reported set always produces the same bitmask.
    /// Names are matched with or without the `GL_` prefix, so desktop GL and
    /// browser spellings land on the same bits. Unknown extensions are
    /// ignored. The baseline [`Caps::SWAP_CHAIN`] bit is always set.
    pub fn resolve<'a, I>(reported: I) -> Caps
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut caps = Caps::SWAP_CHAIN;
        for name in reported {
            let name = name.strip_prefix("GL_").unwrap_or(name);
            for mapping in EXTENSION_MAP {
                if mapping.name == name {
                    caps |= mapping.caps;
                    log::trace!("extension {name} -> {:?}", mapping.caps);
                    break;
                }
            }
        }
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_deterministic() {
        let reported = ["GL_ARB_multisample", "GL_EXT_framebuffer_blit", "GL_ARB_timer_query"];
        let a = CapabilityRegistry::resolve(reported);
        let b = CapabilityRegistry::resolve(reported);
        assert_eq!(a, b);
        assert!(a.contains(Caps::MULTISAMPLE | Caps::FRAMEBUFFER_BLIT | Caps::TIMER_QUERY));
    }

    #[test]
    fn baseline_bit_is_always_present() {
        let caps = CapabilityRegistry::resolve([]);
        assert!(caps.contains(Caps::SWAP_CHAIN));
        assert!(!caps.is_empty());
    }

    #[test]
    fn gl_prefix_is_normalized() {
        let with_prefix = CapabilityRegistry::resolve(["GL_OES_standard_derivatives"]);
        let without_prefix = CapabilityRegistry::resolve(["OES_standard_derivatives"]);
        assert_eq!(with_prefix, without_prefix);
        assert!(with_prefix.contains(Caps::DERIVATIVES));
    }

    #[test]
    fn variant_spellings_feed_the_same_bit() {
        let desktop = CapabilityRegistry::resolve(["GL_ARB_instanced_arrays"]);
        let angle = CapabilityRegistry::resolve(["GL_ANGLE_instanced_arrays"]);
        assert_eq!(desktop, angle);
    }

    #[test]
    fn unknown_extensions_are_ignored()  {
        let caps = CapabilityRegistry::resolve(["GL_VENDOR_made_up_extension"]);
        assert_eq!(caps, Caps::SWAP_CHAIN);
    }
}
