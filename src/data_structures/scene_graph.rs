//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an arena owned by [`Scene`] and refer to each other through
//! [`NodeId`] handles: a node knows its parent (a non-owning back reference)
//! and owns an ordered list of named children. Only nodes carrying a
//! [`Transform2d`] take part in transform composition; any other node on the
//! way to the root is skipped.

use std::{collections::HashMap, fmt};

use anyhow::{Context, bail};
use cgmath::{ElementWise, Matrix4, SquareMatrix, Vector2, Vector4};

use crate::{
    data_structures::pose::{Pose2d, coerce_scale, normalize_degrees},
    render::Drawable,
};

/// Stable handle of a node inside a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The spatial capability of a node: its local pose and layer.
///
/// Setters return `&mut Self` so they can be chained:
/// `scene.transform_mut(id)?.set_pos(p).set_rot(90.0)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform2d {
    position: Vector2<f32>,
    rotation: f32,
    scale: Vector2<f32>,
    layer: i32,
    /// Don't inherit position from the ancestry chain.
    pub prevent_inherit_pos: bool,
    /// Don't inherit rotation from the ancestry chain.
    pub prevent_inherit_rot: bool,
    /// Don't inherit scale from the ancestry chain.
    pub prevent_inherit_scl: bool,
}

impl Transform2d {
    pub fn new(position: Vector2<f32>, rotation: f32, scale: Vector2<f32>) -> Self {
        Self {
            position,
            rotation: normalize_degrees(rotation),
            scale: coerce_scale(scale),
            layer: 0,
            prevent_inherit_pos: false,
            prevent_inherit_rot: false,
            prevent_inherit_scl: false,
        }
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn get_pos(&self) -> Vector2<f32> {
        self.position
    }

    pub fn set_pos(&mut self, position: Vector2<f32>) -> &mut Self {
        self.position = position;
        self
    }

    pub fn get_rot(&self) -> f32 {
        self.rotation
    }

    pub fn set_rot(&mut self, degrees: f32) -> &mut Self {
        self.rotation = normalize_degrees(degrees);
        self
    }

    /// Adds `degrees` to the current rotation.
    pub fn rotate(&mut self, degrees: f32) -> &mut Self {
        self.set_rot(self.rotation + degrees)
    }

    pub fn get_scl(&self) -> Vector2<f32> {
        self.scale
    }

    pub fn set_scl(&mut self, scale: Vector2<f32>) -> &mut Self {
        self.scale = coerce_scale(scale);
        self
    }

    pub fn get_layer(&self) -> i32 {
        self.layer
    }

    pub fn set_layer(&mut self, layer: i32) -> &mut Self {
        self.layer = layer;
        self
    }

    pub fn local_pose(&self) -> Pose2d {
        Pose2d {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
            z: self.layer as f32,
        }
    }

    /// `translate(pos, layer) * rotate(rot) * scale(scl)`
    pub fn get_transform(&self) -> Matrix4<f32> {
        self.local_pose().to_matrix()
    }

    /// Replaces the local pose with the decomposition of `m`.
    pub fn set_transform(&mut self, m: &Matrix4<f32>) -> &mut Self {
        let pose = Pose2d::from_matrix(m);
        self.position = pose.position;
        self.rotation = pose.rotation;
        self.scale = pose.scale;
        self.layer = pose.z.round() as i32;
        self
    }
}

impl Default for Transform2d {
    fn default() -> Self {
        Self::new(Vector2::new(0.0, 0.0), 0.0, Vector2::new(1.0, 1.0))
    }
}

impl From<Vector2<f32>> for Transform2d {
    fn from(position: Vector2<f32>) -> Self {
        Self::new(position, 0.0, Vector2::new(1.0, 1.0))
    }
}

/// A named entry in the scene tree.
#[derive(Debug)]
pub struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    spatial: Option<Transform2d>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_spatial(&self) -> Option<&Transform2d> {
        self.spatial.as_ref()
    }

    pub fn as_spatial_mut(&mut self) -> Option<&mut Transform2d> {
        self.spatial.as_mut()
    }
}

/// Owns every node and their parent/child links.
#[derive(Debug, Default)]
pub struct Scene {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    next_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parentless node. `spatial: None` creates a plain container.
    pub fn add_node(&mut self, name: impl Into<String>, spatial: Option<Transform2d>) -> NodeId {
        let id = self.alloc(name.into(), None, spatial);
        self.roots.push(id);
        id
    }

    /// Adds a node owned by `parent`. Names must be unique among siblings.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        spatial: Option<Transform2d>,
    ) -> anyhow::Result<NodeId> {
        let name = name.into();
        let parent_node = self
            .nodes
            .get(&parent)
            .with_context(|| format!("parent node {} does not exist", parent))?;
        if self.has_child_named(parent_node, &name) {
            bail!("node {} already has a child named \"{}\"", parent, name);
        }
        let id = self.alloc(name, Some(parent), spatial);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }
        Ok(id)
    }

    /// Moves `child` (and its subtree) under `parent`.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> anyhow::Result<()> {
        if parent == child {
            bail!("node {} cannot own itself", child);
        }
        let name = self
            .nodes
            .get(&child)
            .map(|n| n.name.clone())
            .with_context(|| format!("child node {} does not exist", child))?;
        let parent_node = self
            .nodes
            .get(&parent)
            .with_context(|| format!("parent node {} does not exist", parent))?;
        if self.ancestors(parent).any(|ancestor| ancestor == child) {
            bail!("attaching {} under {} would create a cycle", child, parent);
        }
        if parent_node.children.contains(&child) {
            return Ok(());
        }
        if self.has_child_named(parent_node, &name) {
            bail!("node {} already has a child named \"{}\"", parent, name);
        }

        self.detach(child);
        self.roots.retain(|&root| root != child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        Ok(())
    }

    /// Unlinks `id` from its parent, making it a root. Its local pose is kept.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|&c| c != id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        self.roots.push(id);
    }

    /// Destroys a single node. Its children lose their parent link and become
    /// roots; they are not re-parented.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        match node.parent {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children.retain(|&c| c != id);
                }
            }
            None => self.roots.retain(|&root| root != id),
        }
        for child in &node.children {
            if let Some(child_node) = self.nodes.get_mut(child) {
                child_node.parent = None;
                self.roots.push(*child);
            }
        }
        Some(node)
    }

    /// Destroys `id` together with everything it owns. Returns the removed ids.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.nodes.contains_key(&id) {
            return Vec::new();
        }
        self.detach(id);
        self.roots.retain(|&root| root != id);

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().rev());
                removed.push(current);
            }
        }
        removed
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn transform(&self, id: NodeId) -> Option<&Transform2d> {
        self.nodes.get(&id).and_then(Node::as_spatial)
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform2d> {
        self.nodes.get_mut(&id).and_then(Node::as_spatial_mut)
    }

    /// Looks up a direct child by name.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks the parent chain upwards, starting with the parent of `id`.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes.get(&id).and_then(|n| n.parent), move |current| {
            self.nodes.get(current).and_then(|n| n.parent)
        })
    }

    /// World matrix of the nearest spatial ancestors of `id` (identity at the root).
    pub fn parent_world_transform(&self, id: NodeId) -> Matrix4<f32> {
        let chain: Vec<&Transform2d> = self
            .ancestors(id)
            .filter_map(|ancestor| self.transform(ancestor))
            .collect();
        compose(chain.into_iter().rev())
    }

    pub fn parent_world_pose(&self, id: NodeId) -> Pose2d {
        Pose2d::from_matrix(&self.parent_world_transform(id))
    }

    /// Folds the local matrices of the spatial ancestry of `id`, root first.
    ///
    /// `None` if the node does not exist or has no spatial capability.
    pub fn world_transform(&self, id: NodeId) -> Option<Matrix4<f32>> {
        let own = self.transform(id)?;
        Some(compose_one(self.parent_world_transform(id), own))
    }

    /// Decomposition of [`world_transform`](Self::world_transform). Shear from
    /// non-uniform ancestor scales is not representable and gets dropped.
    pub fn world_pose(&self, id: NodeId) -> Option<Pose2d> {
        self.world_transform(id).map(|m| Pose2d::from_matrix(&m))
    }

    pub fn world_pos(&self, id: NodeId) -> Option<Vector2<f32>> {
        self.world_pose(id).map(|pose| pose.position)
    }

    pub fn world_rot(&self, id: NodeId) -> Option<f32> {
        self.world_pose(id).map(|pose| pose.rotation)
    }

    pub fn world_scl(&self, id: NodeId) -> Option<Vector2<f32>> {
        self.world_pose(id).map(|pose| pose.scale)
    }

    /// Solves the local position that puts `id` at `dest` in world space.
    /// Returns the new local position.
    pub fn set_world_pos(&mut self, id: NodeId, dest: Vector2<f32>) -> Option<Vector2<f32>> {
        let parent = self.parent_world_transform(id);
        let transform = self.transform_mut(id)?;
        let local = if transform.prevent_inherit_pos {
            dest
        } else {
            match parent.invert() {
                Some(inverse) => (inverse * Vector4::new(dest.x, dest.y, 0.0, 1.0)).truncate().truncate(),
                None => Pose2d::from_matrix(&parent).unapply(dest),
            }
        };
        transform.set_pos(local);
        Some(local)
    }

    pub fn set_world_rot(&mut self, id: NodeId, dest: f32) -> Option<f32> {
        let parent = self.parent_world_pose(id);
        let transform = self.transform_mut(id)?;
        let local = if transform.prevent_inherit_rot {
            dest
        } else {
            dest - parent.rotation
        };
        Some(transform.set_rot(local).get_rot())
    }

    pub fn set_world_scl(&mut self, id: NodeId, dest: Vector2<f32>) -> Option<Vector2<f32>> {
        let parent = self.parent_world_pose(id);
        let transform = self.transform_mut(id)?;
        let local = if transform.prevent_inherit_scl {
            dest
        } else {
            dest.div_element_wise(coerce_scale(parent.scale))
        };
        Some(transform.set_scl(local).get_scl())
    }

    /// Makes the world transform of `id` equal to `m` by solving each component.
    pub fn set_world_transform(&mut self, id: NodeId, m: &Matrix4<f32>) -> Option<Matrix4<f32>> {
        let target = Pose2d::from_matrix(m);
        let parent_z = self.parent_world_pose(id).z;
        self.set_world_scl(id, target.scale)?;
        self.set_world_rot(id, target.rotation)?;
        self.set_world_pos(id, target.position)?;
        self.transform_mut(id)?
            .set_layer((target.z - parent_z).round() as i32);
        self.world_transform(id)
    }

    /// Applies `m` on top of the local transform of `id`.
    pub fn transform_by(&mut self, id: NodeId, m: &Matrix4<f32>) -> Option<Matrix4<f32>> {
        let transform = self.transform_mut(id)?;
        let combined = m * transform.get_transform();
        Some(transform.set_transform(&combined).get_transform())
    }

    /// Every spatial node with its world matrix, ordered by layer.
    pub fn drawables(&self) -> Vec<Drawable> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        let mut drawables: Vec<Drawable> = ids
            .into_iter()
            .filter_map(|id| {
                let layer = self.transform(id)?.get_layer();
                Some(Drawable {
                    node: id,
                    transform: self.world_transform(id)?,
                    layer,
                })
            })
            .collect();
        drawables.sort_by_key(|d| d.layer);
        drawables
    }

    fn alloc(&mut self, name: String, parent: Option<NodeId>, spatial: Option<Transform2d>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                name,
                parent,
                children: Vec::new(),
                spatial,
            },
        );
        id
    }

    fn has_child_named(&self, parent: &Node, name: &str) -> bool {
        parent
            .children
            .iter()
            .any(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }
}

fn compose<'a>(chain: impl Iterator<Item = &'a Transform2d>) -> Matrix4<f32> {
    chain.fold(Matrix4::identity(), compose_one)
}

/// Composes one more level. Only a node with a prevent-inherit flag gets its
/// world matrix decomposed, patched with the flagged local component and
/// rebuilt.
fn compose_one(parent: Matrix4<f32>, transform: &Transform2d) -> Matrix4<f32> {
    let world = parent * transform.get_transform();
    if !(transform.prevent_inherit_pos || transform.prevent_inherit_rot || transform.prevent_inherit_scl) {
        return world;
    }
    let local = transform.local_pose();
    let mut pose = Pose2d::from_matrix(&world);
    if transform.prevent_inherit_pos {
        pose.position = local.position;
    }
    if transform.prevent_inherit_rot {
        pose.rotation = local.rotation;
    }
    if transform.prevent_inherit_scl {
        pose.scale = local.scale;
    }
    pose.to_matrix()
}
