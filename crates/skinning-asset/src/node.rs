use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    ops::{Index, IndexMut},
};

use glam::{Mat4, Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecomposedTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl From<DecomposedTransform> for Mat4 {
    fn from(value: DecomposedTransform) -> Self {
        Mat4::from_scale_rotation_translation(value.scale, value.rotation, value.translation)
    }
}

impl From<Mat4> for DecomposedTransform {
    fn from(value: Mat4) -> Self {
        let (scale, rotation, translation) = value.to_scale_rotation_translation();
        DecomposedTransform {
            translation,
            rotation,
            scale,
        }
    }
}

/// Local transform as it was found in an imported file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeTransform {
    Matrix(Mat4),
    Decomposed(DecomposedTransform),
}

impl From<NodeTransform> for Mat4 {
    fn from(value: NodeTransform) -> Self {
        match value {
            NodeTransform::Matrix(matrix) => matrix,
            NodeTransform::Decomposed(decomposed) => decomposed.into(),
        }
    }
}

impl From<NodeTransform> for DecomposedTransform {
    fn from(value: NodeTransform) -> Self {
        match value {
            NodeTransform::Matrix(matrix) => matrix.into(),
            NodeTransform::Decomposed(decomposed) => decomposed,
        }
    }
}

/// Handle of a node inside a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Skinning data of a bone node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bone {
    // Position in the model's skinning matrix array
    index: u32,
    // Mesh space to bone space
    offset_transform: Mat4,
}

impl Bone {
    pub fn new(index: u32, offset_transform: Mat4) -> Self {
        Self {
            index,
            offset_transform,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn offset_transform(&self) -> &Mat4 {
        &self.offset_transform
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Joint,
    Bone(Bone),
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    name: String,
    transform: Mat4,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

impl SceneNode {
    pub fn joint(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Joint,
        }
    }

    pub fn bone(name: impl Into<String>, transform: Mat4, bone: Bone) -> Self {
        Self {
            name: name.into(),
            transform,
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Bone(bone),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform from this node's space to its parent's space.
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn as_bone(&self) -> Option<&Bone> {
        match &self.kind {
            NodeKind::Bone(bone) => Some(bone),
            NodeKind::Joint => None,
        }
    }

    pub fn is_bone(&self) -> bool {
        matches!(self.kind, NodeKind::Bone(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneGraphError {
    UnknownNode(NodeId),
    AlreadyParented { child: NodeId, parent: NodeId },
    Cycle { parent: NodeId, child: NodeId },
    RootHasParent(NodeId),
}

impl Display for SceneGraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SceneGraphError::UnknownNode(id) => write!(f, "Node {} not found in scene graph", id),
            SceneGraphError::AlreadyParented { child, parent } => {
                write!(f, "Node {} is already a child of node {}", child, parent)
            }
            SceneGraphError::Cycle { parent, child } => write!(
                f,
                "Attaching node {} to node {} would create a cycle",
                child, parent
            ),
            SceneGraphError::RootHasParent(id) => {
                write!(f, "Node {} has a parent and cannot be the root", id)
            }
        }
    }
}

impl Error for SceneGraphError {}

/// Tree of named nodes, stored in an arena.
///
/// Parents own the ordered list of their children, while children only keep
/// the handle of their parent for lookup.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    root: Option<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a detached node to the arena.
    pub fn add_node(&mut self, mut node: SceneNode) -> NodeId {
        node.parent = None;
        node.children.clear();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Append `child` to the children of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneGraphError> {
        let child_node = self.node(child).ok_or(SceneGraphError::UnknownNode(child))?;
        if let Some(existing) = child_node.parent {
            return Err(SceneGraphError::AlreadyParented {
                child,
                parent: existing,
            });
        }
        if self.node(parent).is_none() {
            return Err(SceneGraphError::UnknownNode(parent));
        }
        if self.ancestors(parent).any(|ancestor| ancestor == child) {
            return Err(SceneGraphError::Cycle { parent, child });
        }
        if self.root == Some(child) {
            return Err(SceneGraphError::Cycle { parent, child });
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) -> Result<(), SceneGraphError> {
        let node = self.node(root).ok_or(SceneGraphError::UnknownNode(root))?;
        if node.parent.is_some() {
            return Err(SceneGraphError::RootHasParent(root));
        }
        self.root = Some(root);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
    }

    /// Walk from `id` (inclusive) up to the top of its tree.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            graph: self,
            next: self.node(id).map(|_| id),
        }
    }

    /// Pre-order traversal of the subtree under `start`, children in order.
    pub fn depth_first(&self, start: NodeId) -> DepthFirst<'_> {
        let stack = if self.node(start).is_some() {
            vec![start]
        } else {
            Vec::new()
        };
        DepthFirst { graph: self, stack }
    }

    /// Compose the transform from a node's space to the space of its tree's
    /// top node by walking the parent handles.
    pub fn to_root_transform(&self, id: NodeId) -> Mat4 {
        self.ancestors(id)
            .fold(Mat4::IDENTITY, |to_root, ancestor| {
                self.nodes[ancestor.0].transform * to_root
            })
    }
}

impl Index<NodeId> for SceneGraph {
    type Output = SceneNode;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index.0]
    }
}

impl IndexMut<NodeId> for SceneGraph {
    fn index_mut(&mut self, index: NodeId) -> &mut Self::Output {
        &mut self.nodes[index.0]
    }
}

pub struct Ancestors<'a> {
    graph: &'a SceneGraph,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.graph.nodes[current.0].parent;
        Some(current)
    }
}

pub struct DepthFirst<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let children = &self.graph.nodes[current.0].children;
        self.stack.extend(children.iter().rev().copied());
        Some(current)
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Quat, Vec3};

    use super::{
        Bone, DecomposedTransform, NodeTransform, SceneGraph, SceneGraphError, SceneNode,
    };

    #[test]
    fn test_node_transform_conversions() {
        let parts = DecomposedTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(0.5),
            scale: Vec3::splat(2.0),
        };
        let decomposed = NodeTransform::Decomposed(parts);
        assert_eq!(DecomposedTransform::from(decomposed), parts);

        let matrix = NodeTransform::Matrix(Mat4::from(parts));
        assert_eq!(Mat4::from(matrix), Mat4::from(decomposed));
        let recovered = DecomposedTransform::from(matrix);
        assert!(recovered.translation.abs_diff_eq(parts.translation, 1e-5));
        assert!(recovered.rotation.abs_diff_eq(parts.rotation, 1e-5));
        assert!(recovered.scale.abs_diff_eq(parts.scale, 1e-5));
    }

    fn chain() -> (SceneGraph, [super::NodeId; 3]) {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::joint(
            "root",
            Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        ));
        let arm = graph.add_node(SceneNode::joint(
            "arm",
            Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
        ));
        let hand = graph.add_node(SceneNode::bone(
            "hand",
            Mat4::from_scale(Vec3::splat(2.0)),
            Bone::new(0, Mat4::IDENTITY),
        ));
        graph.add_child(root, arm).unwrap();
        graph.add_child(arm, hand).unwrap();
        graph.set_root(root).unwrap();
        (graph, [root, arm, hand])
    }

    #[test]
    fn test_parent_and_children() {
        let (graph, [root, arm, hand]) = chain();
        assert_eq!(graph[hand].parent(), Some(arm));
        assert_eq!(graph[arm].parent(), Some(root));
        assert_eq!(graph[root].children(), &[arm]);
        assert!(graph[hand].is_bone());
        assert_eq!(graph[hand].as_bone().map(Bone::index), Some(0));
        assert!(graph[arm].as_bone().is_none());
        assert_eq!(graph.find_by_name("arm"), Some(arm));
    }

    #[test]
    fn test_reject_cycles_and_reparenting() {
        let (mut graph, [root, arm, hand]) = chain();
        assert_eq!(
            graph.add_child(hand, arm),
            Err(SceneGraphError::AlreadyParented {
                child: arm,
                parent: root
            })
        );
        assert_eq!(
            graph.add_child(hand, root),
            Err(SceneGraphError::Cycle {
                parent: hand,
                child: root
            })
        );
        assert!(graph.add_child(hand, hand).is_err());
        assert_eq!(graph.set_root(arm), Err(SceneGraphError::RootHasParent(arm)));
    }

    #[test]
    fn test_depth_first_order() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node(SceneNode::joint("root", Mat4::IDENTITY));
        let a = graph.add_node(SceneNode::joint("a", Mat4::IDENTITY));
        let b = graph.add_node(SceneNode::joint("b", Mat4::IDENTITY));
        let a1 = graph.add_node(SceneNode::joint("a1", Mat4::IDENTITY));
        graph.add_child(root, a).unwrap();
        graph.add_child(root, b).unwrap();
        graph.add_child(a, a1).unwrap();

        let order: Vec<&str> = graph
            .depth_first(root)
            .map(|id| graph[id].name())
            .collect();
        assert_eq!(order, ["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_to_root_transform() {
        let (graph, [_, _, hand]) = chain();
        let expected = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))
            * Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0))
            * Mat4::from_scale(Vec3::splat(2.0));
        assert!(graph.to_root_transform(hand).abs_diff_eq(expected, 1e-6));
        let point = graph.to_root_transform(hand).transform_point3(Vec3::X);
        assert!(point.abs_diff_eq(Vec3::new(4.0, 1.0, 0.0), 1e-6));
    }
}
