//! Typed scene graph shared by loaded assets and generated placeholders.
//!
//! A [`SceneAsset`] owns a tree of [`Node`]s. Every node is either a group or
//! a mesh; mesh nodes own their geometry buffers and refer to a material in the
//! asset-level material table. GPU handles are stored next to the CPU data they
//! were created from so that disposal can walk the same tree that upload did.

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::animation::AnimationClip;
use crate::render::{GeometryHandle, MaterialHandle, TextureHandle};

/// Translation / rotation / scale of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self { min: first, max: first }, |acc, point| Self {
            min: acc.min.min(point),
            max: acc.max.max(point),
        }))
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, matrix: Mat4) -> Self {
        let (min, max) = (self.min, self.max);
        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ];
        Self::from_points(corners.map(|corner| matrix.transform_point3(corner)))
            .unwrap_or(*self)
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// CPU side triangle geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions.iter().copied())
    }

    /// True when normals are missing, mismatched or contain zero vectors.
    pub fn needs_normals(&self) -> bool {
        self.normals.len() != self.positions.len()
            || self.normals.iter().any(|normal| *normal == Vec3::ZERO)
    }

    /// Replaces the normals with area weighted face normals.
    pub fn compute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for triangle in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            ];
            let (Some(&p0), Some(&p1), Some(&p2)) = (
                self.positions.get(i0),
                self.positions.get(i1),
                self.positions.get(i2),
            ) else {
                continue;
            };
            let normal = (p1 - p0).cross(p2 - p0);
            if normal.length_squared() > f32::EPSILON {
                let normal = normal.normalize();
                accum[i0] += normal;
                accum[i1] += normal;
                accum[i2] += normal;
            }
        }
        self.normals = accum.into_iter().map(Vec3::normalize_or_zero).collect();
    }
}

/// Decoded RGBA8 texture.
#[derive(Debug, PartialEq)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub gpu: Option<TextureHandle>,
}

impl TextureData {
    pub fn new(name: impl Into<String>, width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            rgba,
            gpu: None,
        }
    }
}

/// Surface description for one or more meshes.
#[derive(Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub wireframe: bool,
    /// Index into [`SceneAsset::textures`].
    pub texture: Option<usize>,
    pub gpu: Option<MaterialHandle>,
}

impl Material {
    pub fn new(name: impl Into<String>, base_color: Vec4) -> Self {
        Self {
            name: name.into(),
            base_color,
            emissive: Vec3::ZERO,
            emissive_intensity: 1.0,
            wireframe: false,
            texture: None,
            gpu: None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct MeshNode {
    pub geometry: Geometry,
    /// Index into [`SceneAsset::materials`].
    pub material: usize,
    pub gpu: Option<GeometryHandle>,
}

impl MeshNode {
    pub fn new(geometry: Geometry, material: usize) -> Self {
        Self {
            geometry,
            material,
            gpu: None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
}

/// Child-index path from a root node to one of its descendants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

#[derive(Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshNode) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            kind: NodeKind::Mesh(mesh),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn as_mesh(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    /// Visits every mesh in the subtree, parents before children.
    pub fn visit_meshes(&self, visitor: &mut dyn FnMut(&MeshNode)) {
        if let NodeKind::Mesh(mesh) = &self.kind {
            visitor(mesh);
        }
        for child in &self.children {
            child.visit_meshes(visitor);
        }
    }

    pub fn visit_meshes_mut(&mut self, visitor: &mut dyn FnMut(&mut MeshNode)) {
        if let NodeKind::Mesh(mesh) = &mut self.kind {
            visitor(mesh);
        }
        for child in &mut self.children {
            child.visit_meshes_mut(visitor);
        }
    }

    /// Visits every mesh together with its matrix relative to `parent`.
    pub fn visit_meshes_with_matrix(&self, parent: Mat4, visitor: &mut dyn FnMut(Mat4, &MeshNode)) {
        let matrix = parent * self.transform.matrix();
        if let NodeKind::Mesh(mesh) = &self.kind {
            visitor(matrix, mesh);
        }
        for child in &self.children {
            child.visit_meshes_with_matrix(matrix, visitor);
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(&mut |_| count += 1);
        count
    }

    /// Bounds of the subtree in this node's own coordinate space, i.e. with
    /// this node's transform left out.
    pub fn local_bounds(&self) -> Option<Aabb> {
        let mut bounds = self.as_mesh().and_then(|mesh| mesh.geometry.bounds());
        for child in &self.children {
            child.visit_meshes_with_matrix(Mat4::IDENTITY, &mut |matrix, mesh| {
                if let Some(mesh_bounds) = mesh.geometry.bounds() {
                    let placed = mesh_bounds.transformed(matrix);
                    bounds = Some(match bounds {
                        Some(acc) => acc.union(placed),
                        None => placed,
                    });
                }
            });
        }
        bounds
    }

    /// Bounds of the subtree in the parent's coordinate space.
    pub fn bounds(&self) -> Option<Aabb> {
        self.local_bounds()
            .map(|bounds| bounds.transformed(self.transform.matrix()))
    }

    pub fn descendant(&self, path: &NodePath) -> Option<&Node> {
        path.indices()
            .iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    pub fn descendant_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        let mut node = self;
        for &index in path.indices() {
            node = node.children.get_mut(index)?;
        }
        Some(node)
    }
}

/// Where a displayed asset came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOrigin {
    Loaded { path: String },
    Placeholder,
}

/// A loaded or generated model, ready to be normalized and attached.
#[derive(Debug)]
pub struct SceneAsset {
    pub root: Node,
    pub materials: Vec<Material>,
    pub textures: Vec<TextureData>,
    pub clips: Vec<AnimationClip>,
    pub origin: AssetOrigin,
}

impl SceneAsset {
    pub fn new(root: Node, materials: Vec<Material>, origin: AssetOrigin) -> Self {
        Self {
            root,
            materials,
            textures: Vec::new(),
            clips: Vec::new(),
            origin,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == AssetOrigin::Placeholder
    }

    /// True when any mesh, material or texture still holds a GPU handle.
    pub fn is_resident(&self) -> bool {
        let mut resident = false;
        self.root
            .visit_meshes(&mut |mesh| resident |= mesh.gpu.is_some());
        resident
            || self.materials.iter().any(|material| material.gpu.is_some())
            || self.textures.iter().any(|texture| texture.gpu.is_some())
    }
}
