//! The renderable scene: meshes, placed objects, materials and background.
//!
//! The asset-loading side fills a [`Scene`]; the render core only reads it.
//! Variant renders (normals, UVs) never write to the scene. They pass a
//! [`RenderOverrides`] value alongside it instead.

use crate::mesh::{Mesh, Transform};

/// Type-safe handle to a mesh registered with [`Scene::add_mesh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

/// Ordinary surface material used by the primary and depth renders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Linear RGBA base colour.
    pub color: [f32; 4],
    /// Ambient floor added to the diffuse term.
    pub ambient: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8, 1.0],
            ambient: 0.15,
        }
    }
}

impl Material {
    pub fn color(r: f32, g: f32, b: f32) -> Self {
        Self {
            color: [r, g, b, 1.0],
            ..Default::default()
        }
    }
}

/// One placed instance of a mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneObject {
    pub mesh: MeshId,
    pub transform: Transform,
    pub material: Material,
}

/// Ordered collection of renderable objects plus a background colour.
pub struct Scene {
    meshes: Vec<Mesh>,
    pub objects: Vec<SceneObject>,
    /// Linear RGBA clear colour for the primary render.
    pub background: [f32; 4],
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            meshes: Vec::new(),
            objects: Vec::new(),
            background: [0.62, 0.66, 0.72, 1.0],
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers GPU geometry and returns its handle.
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        let id = MeshId(self.meshes.len());
        self.meshes.push(mesh);
        id
    }

    /// Places an instance of a registered mesh.
    pub fn add_object(&mut self, mesh: MeshId, transform: Transform, material: Material) -> usize {
        self.objects.push(SceneObject {
            mesh,
            transform,
            material,
        });
        self.objects.len() - 1
    }

    /// Objects whose mesh handle resolves, in draw order.
    pub fn drawable(&self) -> impl Iterator<Item = (&SceneObject, &Mesh)> {
        self.objects
            .iter()
            .filter_map(|obj| self.meshes.get(obj.mesh.0).map(|mesh| (obj, mesh)))
    }
}

/// Alternate shading program applied to every object for one render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialOverride {
    /// View-space normal encoded as `n * 0.5 + 0.5`.
    Normal,
    /// Texture coordinates as `(u, v, 0, 1)`.
    Uv,
}

/// Per-call render configuration. The scene itself is never modified.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderOverrides {
    pub material: Option<MaterialOverride>,
    pub background: Option<[f32; 4]>,
}

const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

impl RenderOverrides {
    /// Scene as authored.
    pub fn none() -> Self {
        Self::default()
    }

    /// Normal visualisation over a black background.
    pub fn normals() -> Self {
        Self {
            material: Some(MaterialOverride::Normal),
            background: Some(BLACK),
        }
    }

    /// UV visualisation over a black background.
    pub fn uvs() -> Self {
        Self {
            material: Some(MaterialOverride::Uv),
            background: Some(BLACK),
        }
    }

    /// Clear colour for a render of `scene` under these overrides.
    pub fn background_for(&self, scene: &Scene) -> [f32; 4] {
        self.background.unwrap_or(scene.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_background_without_touching_scene() {
        let scene = Scene {
            background: [0.2, 0.4, 0.6, 1.0],
            ..Scene::default()
        };

        assert_eq!(RenderOverrides::normals().background_for(&scene), BLACK);
        assert_eq!(RenderOverrides::uvs().background_for(&scene), BLACK);
        // the next plain render sees the authored background again
        assert_eq!(
            RenderOverrides::none().background_for(&scene),
            [0.2, 0.4, 0.6, 1.0]
        );
        assert_eq!(scene.background, [0.2, 0.4, 0.6, 1.0]);
    }

    #[test]
    fn override_presets_select_their_programs() {
        assert_eq!(RenderOverrides::none().material, None);
        assert_eq!(
            RenderOverrides::normals().material,
            Some(MaterialOverride::Normal)
        );
        assert_eq!(RenderOverrides::uvs().material, Some(MaterialOverride::Uv));
    }

    #[test]
    fn objects_with_unknown_meshes_are_not_drawable() {
        let mut scene = Scene::new();
        scene.add_object(MeshId(3), Transform::new(), Material::default());
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.drawable().count(), 0);
    }
}
