//! CPU-side material descriptions.
//!
//! A [`MaterialDesc`] says how a surface is shaded and which images it samples.
//! Images are referenced by [`ImageId`] and may arrive after the material was
//! created; every change bumps the material's revision so the renderer knows
//! to rebuild its bind group. Slots without an image sample a fallback texture.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

/// Index of a decoded image in the scene's image table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

/// Texture channels of a [`StandardMaterial`] plus the sprite of a
/// [`PointsMaterial`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Map,
    Normal,
    Roughness,
    AmbientOcclusion,
    Sprite,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StandardMaterial {
    pub map: Option<ImageId>,
    pub normal_map: Option<ImageId>,
    pub roughness_map: Option<ImageId>,
    pub ao_map: Option<ImageId>,
    pub tint: [f32; 4],
    pub roughness: f32,
    pub ao_intensity: f32,
    pub uv_repeat: [f32; 2],
    pub uv_offset: [f32; 2],
    pub filter: TextureFilter,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            map: None,
            normal_map: None,
            roughness_map: None,
            ao_map: None,
            tint: [1.0; 4],
            roughness: 1.0,
            ao_intensity: 1.0,
            uv_repeat: [1.0, 1.0],
            uv_offset: [0.0, 0.0],
            filter: TextureFilter::Linear,
        }
    }
}

/// Clear glass that mostly reflects the light sources.
#[derive(Clone, Debug, PartialEq)]
pub struct GlassMaterial {
    pub tint: [f32; 3],
    pub opacity: f32,
    pub specular: [f32; 3],
    pub shininess: f32,
}

impl Default for GlassMaterial {
    fn default() -> Self {
        Self {
            tint: [1.0, 1.0, 1.0],
            opacity: 0.08,
            specular: hex_rgb(0xffeeff),
            shininess: 128.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProceduralKind {
    /// Noisy concentric rings, lit by the directional light.
    Wood,
    /// Animated glow drawn over everything behind it.
    Electricity,
    /// Animated static with a scrolling bar.
    LostSignal,
}

impl ProceduralKind {
    pub fn code(self) -> u32 {
        match self {
            ProceduralKind::Wood => 0,
            ProceduralKind::Electricity => 1,
            ProceduralKind::LostSignal => 2,
        }
    }
}

/// A shader-generated surface. `params` meaning depends on the kind: for wood
/// it holds scale, frequency, noise scale and ring scale.
#[derive(Clone, Debug, PartialEq)]
pub struct ProceduralMaterial {
    pub kind: ProceduralKind,
    pub color_a: [f32; 3],
    pub color_b: [f32; 3],
    pub params: [f32; 4],
}

impl ProceduralMaterial {
    pub fn wood() -> Self {
        Self {
            kind: ProceduralKind::Wood,
            color_a: hex_rgb(0x49082a),
            color_b: hex_rgb(0x540e26),
            params: [1.0, 15.3, 6.1, 1.0],
        }
    }

    pub fn electricity() -> Self {
        Self {
            kind: ProceduralKind::Electricity,
            color_a: hex_rgb(0xbbffff),
            color_b: hex_rgb(0xffeeff),
            params: [1.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn lost_signal() -> Self {
        Self {
            kind: ProceduralKind::LostSignal,
            color_a: [0.9, 0.9, 0.9],
            color_b: [0.05, 0.05, 0.1],
            params: [120.0, 0.4, 0.0, 0.0],
        }
    }
}

/// Camera-facing sprites with additive blending.
#[derive(Clone, Debug, PartialEq)]
pub struct PointsMaterial {
    pub sprite: Option<ImageId>,
    pub size: f32,
    pub alpha_test: f32,
}

impl Default for PointsMaterial {
    fn default() -> Self {
        Self {
            sprite: None,
            size: 2.0,
            alpha_test: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shading {
    Standard(StandardMaterial),
    Glass(GlassMaterial),
    Procedural(ProceduralMaterial),
    Points(PointsMaterial),
}

/// The draw pass a material is rendered in, in draw order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrawPass {
    Lit,
    Procedural,
    Points,
    Transparent,
    Overlay,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDesc {
    pub name: String,
    shading: Shading,
    revision: u64,
}

impl MaterialDesc {
    pub fn new(name: impl Into<String>, shading: Shading) -> Self {
        Self {
            name: name.into(),
            shading,
            revision: 0,
        }
    }

    pub fn standard(name: impl Into<String>, material: StandardMaterial) -> Self {
        Self::new(name, Shading::Standard(material))
    }

    pub fn shading(&self) -> &Shading {
        &self.shading
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn pass(&self) -> DrawPass {
        match &self.shading {
            Shading::Standard(_) => DrawPass::Lit,
            Shading::Glass(_) => DrawPass::Transparent,
            Shading::Procedural(p) if p.kind == ProceduralKind::Electricity => DrawPass::Overlay,
            Shading::Procedural(_) => DrawPass::Procedural,
            Shading::Points(_) => DrawPass::Points,
        }
    }

    /// Images the material samples, in slot order.
    pub fn images(&self) -> Vec<ImageId> {
        match &self.shading {
            Shading::Standard(m) => [m.map, m.normal_map, m.roughness_map, m.ao_map]
                .into_iter()
                .flatten()
                .collect(),
            Shading::Points(m) => m.sprite.into_iter().collect(),
            Shading::Glass(_) | Shading::Procedural(_) => Vec::new(),
        }
    }

    /// Puts `image` into `slot`. Returns false, leaving the material untouched,
    /// when the shading has no such slot.
    pub fn set_texture(&mut self, slot: TextureSlot, image: ImageId) -> bool {
        let target = match (&mut self.shading, slot) {
            (Shading::Standard(m), TextureSlot::Map) => &mut m.map,
            (Shading::Standard(m), TextureSlot::Normal) => &mut m.normal_map,
            (Shading::Standard(m), TextureSlot::Roughness) => &mut m.roughness_map,
            (Shading::Standard(m), TextureSlot::AmbientOcclusion) => &mut m.ao_map,
            (Shading::Points(m), TextureSlot::Sprite) => &mut m.sprite,
            _ => return false,
        };
        *target = Some(image);
        self.revision += 1;
        true
    }
}

/// Converts a `0xRRGGBB` colour to linear-ish float components.
pub fn hex_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_textures_bump_the_revision() {
        let mut ground = MaterialDesc::standard("ground", StandardMaterial::default());
        assert!(ground.images().is_empty());
        assert!(ground.set_texture(TextureSlot::Normal, ImageId(4)));
        assert!(ground.set_texture(TextureSlot::Map, ImageId(3)));
        assert_eq!(ground.revision(), 2);
        assert_eq!(ground.images(), vec![ImageId(3), ImageId(4)]);
    }

    #[test]
    fn unknown_slots_are_inert() {
        let mut glass = MaterialDesc::new("glass", Shading::Glass(GlassMaterial::default()));
        assert!(!glass.set_texture(TextureSlot::Map, ImageId(0)));
        assert_eq!(glass.revision(), 0);
        assert_eq!(glass.pass(), DrawPass::Transparent);
    }

    #[test]
    fn electricity_draws_last() {
        let electricity = MaterialDesc::new(
            "electricity",
            Shading::Procedural(ProceduralMaterial::electricity()),
        );
        let wood = MaterialDesc::new("wood", Shading::Procedural(ProceduralMaterial::wood()));
        assert!(electricity.pass() > wood.pass());
        assert_eq!(hex_rgb(0xff0080), [1.0, 0.0, 128.0 / 255.0]);
    }
}
