//! # Equipment Hierarchy
//!
//! Equipment forms a forest: every node has at most one parent and the
//! parent relation never contains a cycle. The tree is held as a flat arena
//! keyed by [`EquipmentId`]; parent and child relations are id pairs, never
//! references.
//!
//! ## Index
//!
//! On top of the raw parent pointers the tree keeps a denormalized
//! nested-set index: for every node reachable from a root, a
//! [`TreePosition`] `(tree_id, lft, rgt, level)`, plus the preorder listing
//! of the whole forest. `B` is a descendant of `A` iff both share a
//! `tree_id` and `A.lft < B.lft && B.rgt < A.rgt`.
//!
//! Siblings (and roots) are ordered by name; same-named siblings keep their
//! insertion order. The index is recomputed from parent pointers alone by
//! [`EquipmentTree::rebuild_index`], which every structural mutation calls,
//! so the index can never drift from the pointers it was built from.
//!
//! ## Moves
//!
//! [`EquipmentTree::set_parent`] refuses to put a node under itself or under
//! any of its descendants. The check walks parent pointers upward from the
//! proposed parent, so it holds even if the index is stale.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cmms_core::EquipmentId;

/// Errors raised by hierarchy operations. A failed operation leaves the
/// tree unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    /// The move would make `node` its own ancestor.
    #[error("cannot place equipment {node} under {parent}: it would become its own descendant")]
    Cycle {
        /// The node being moved.
        node: EquipmentId,
        /// The rejected parent.
        parent: EquipmentId,
    },

    /// The id is not in the tree.
    #[error("unknown equipment {0}")]
    UnknownNode(EquipmentId),

    /// The id is already in the tree.
    #[error("equipment {0} already exists in the tree")]
    DuplicateNode(EquipmentId),

    /// Raw parent pointers describe nodes that no root reaches.
    #[error("equipment tree is corrupt: {} node(s) unreachable from any root", unreachable.len())]
    CorruptTree {
        /// Nodes on a parent cycle or below a missing parent, sorted.
        unreachable: Vec<EquipmentId>,
    },
}

/// Nested-set coordinates of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePosition {
    /// 1-based index of the root this node hangs from, in root order.
    pub tree_id: u32,
    /// Left bound, assigned on the way down.
    pub lft: u32,
    /// Right bound, assigned on the way up.
    pub rgt: u32,
    /// Depth; roots are level 0.
    pub level: u32,
}

impl TreePosition {
    /// Whether `self` lies strictly inside `ancestor`'s interval.
    pub fn is_inside(&self, ancestor: &TreePosition) -> bool {
        self.tree_id == ancestor.tree_id && ancestor.lft < self.lft && self.rgt < ancestor.rgt
    }

    /// Number of nodes strictly below this one.
    pub fn descendant_count(&self) -> usize {
        ((self.rgt - self.lft - 1) / 2) as usize
    }
}

/// A persisted equipment row reduced to what the tree needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNode {
    /// Equipment id.
    pub id: EquipmentId,
    /// Name, used for sibling order.
    pub name: String,
    /// Parent pointer as stored.
    #[serde(default)]
    pub parent: Option<EquipmentId>,
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<EquipmentId>,
    seq: u64,
    children: Vec<EquipmentId>,
    position: Option<TreePosition>,
    rank: usize,
}

/// Arena of equipment nodes with a rebuilt nested-set index.
#[derive(Debug, Clone, Default)]
pub struct EquipmentTree {
    nodes: HashMap<EquipmentId, Node>,
    roots: Vec<EquipmentId>,
    preorder: Vec<EquipmentId>,
    next_seq: u64,
}

impl EquipmentTree {
    /// An empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from persisted rows, then index it.
    ///
    /// Rows may arrive in any order. Fails on a repeated id, or with
    /// [`HierarchyError::CorruptTree`] when the stored parent pointers
    /// contain a cycle or reference missing rows.
    pub fn from_raw(rows: impl IntoIterator<Item = RawNode>) -> Result<Self, HierarchyError> {
        let mut tree = Self::new();
        for row in rows {
            if tree.nodes.contains_key(&row.id) {
                return Err(HierarchyError::DuplicateNode(row.id));
            }
            tree.push_node(row.id, row.name, row.parent);
        }
        tree.rebuild_index()?;
        Ok(tree)
    }

    /// The raw rows this tree was built from, in preorder.
    pub fn to_raw(&self) -> Vec<RawNode> {
        let mut ids = self.preorder.clone();
        ids.extend(self.unreachable());
        ids.into_iter()
            .filter_map(|id| {
                self.nodes.get(&id).map(|n| RawNode {
                    id,
                    name: n.name.clone(),
                    parent: n.parent,
                })
            })
            .collect()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the forest is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` is in the tree.
    pub fn contains(&self, id: EquipmentId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Add a node under `parent` (or as a root).
    pub fn insert(
        &mut self,
        id: EquipmentId,
        name: impl Into<String>,
        parent: Option<EquipmentId>,
    ) -> Result<(), HierarchyError> {
        if self.nodes.contains_key(&id) {
            return Err(HierarchyError::DuplicateNode(id));
        }
        if let Some(p) = parent {
            self.require(p)?;
        }
        self.push_node(id, name.into(), parent);
        self.reindex();
        Ok(())
    }

    /// Check that `node` may be moved under `new_parent` without changing
    /// anything.
    pub fn check_move(
        &self,
        node: EquipmentId,
        new_parent: Option<EquipmentId>,
    ) -> Result<(), HierarchyError> {
        self.require(node)?;
        let Some(parent) = new_parent else {
            return Ok(());
        };
        self.require(parent)?;
        if parent == node || self.has_ancestor(parent, node) {
            return Err(HierarchyError::Cycle { node, parent });
        }
        Ok(())
    }

    /// Move `node` under `new_parent`; `None` makes it a root.
    ///
    /// Fails with [`HierarchyError::Cycle`] when `new_parent` is `node`
    /// itself or one of its descendants.
    pub fn set_parent(
        &mut self,
        node: EquipmentId,
        new_parent: Option<EquipmentId>,
    ) -> Result<(), HierarchyError> {
        self.check_move(node, new_parent)?;
        let entry = self.node_mut(node)?;
        if entry.parent == new_parent {
            return Ok(());
        }
        entry.parent = new_parent;
        self.reindex();
        Ok(())
    }

    /// Rename `node` and re-sort it among its siblings.
    pub fn rename(
        &mut self,
        node: EquipmentId,
        name: impl Into<String>,
    ) -> Result<(), HierarchyError> {
        let name = name.into();
        let entry = self.node_mut(node)?;
        if entry.name == name {
            return Ok(());
        }
        entry.name = name;
        self.reindex();
        Ok(())
    }

    /// Remove `node` and its whole subtree. Returns the removed ids,
    /// `node` first, then its descendants in preorder.
    pub fn remove(&mut self, node: EquipmentId) -> Result<Vec<EquipmentId>, HierarchyError> {
        self.require(node)?;
        let mut removed = vec![node];
        removed.extend_from_slice(self.descendants(node));
        for id in &removed {
            self.nodes.remove(id);
        }
        self.reindex();
        Ok(removed)
    }

    /// Name of `node`.
    pub fn name(&self, node: EquipmentId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.name.as_str())
    }

    /// Parent of `node`, `None` for a root or an unknown id.
    pub fn parent(&self, node: EquipmentId) -> Option<EquipmentId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    /// Root ids, ordered by name.
    pub fn roots(&self) -> &[EquipmentId] {
        &self.roots
    }

    /// Direct children of `node`, ordered by name. Empty for an unknown id.
    pub fn children(&self, node: EquipmentId) -> &[EquipmentId] {
        self.nodes
            .get(&node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestors of `node`, root first, excluding `node`.
    pub fn ancestors(&self, node: EquipmentId) -> Vec<EquipmentId> {
        let mut out = Vec::new();
        let mut current = self.parent(node);
        while let Some(id) = current {
            // A raw cycle would loop forever; stop once every node was visited.
            if out.len() >= self.nodes.len() {
                break;
            }
            out.push(id);
            current = self.parent(id);
        }
        out.reverse();
        out
    }

    /// Descendants of `node` in preorder, excluding `node`.
    pub fn descendants(&self, node: EquipmentId) -> &[EquipmentId] {
        match self.nodes.get(&node) {
            Some(Node {
                position: Some(pos),
                rank,
                ..
            }) => {
                let start = rank + 1;
                &self.preorder[start..start + pos.descendant_count()]
            }
            _ => &[],
        }
    }

    /// Whether `node` lies strictly below `other`.
    pub fn is_descendant_of(&self, node: EquipmentId, other: EquipmentId) -> bool {
        match (self.position(node), self.position(other)) {
            (Some(a), Some(b)) => a.is_inside(&b),
            _ => false,
        }
    }

    /// Nested-set coordinates of `node`, `None` when unknown or unreachable.
    pub fn position(&self, node: EquipmentId) -> Option<TreePosition> {
        self.nodes.get(&node).and_then(|n| n.position)
    }

    /// Every reachable node in preorder, roots in name order.
    pub fn preorder(&self) -> &[EquipmentId] {
        &self.preorder
    }

    /// Recompute child lists and the nested-set index from the raw parent
    /// pointers. Idempotent.
    ///
    /// Nodes no root reaches are left without a position and reported in
    /// [`HierarchyError::CorruptTree`]; everything else is still indexed.
    pub fn rebuild_index(&mut self) -> Result<(), HierarchyError> {
        let unreachable = self.reindex();
        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(HierarchyError::CorruptTree { unreachable })
        }
    }

    // -- internals ---------------------------------------------------------

    fn push_node(&mut self, id: EquipmentId, name: String, parent: Option<EquipmentId>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.nodes.insert(
            id,
            Node {
                name,
                parent,
                seq,
                children: Vec::new(),
                position: None,
                rank: 0,
            },
        );
    }

    fn require(&self, id: EquipmentId) -> Result<(), HierarchyError> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(HierarchyError::UnknownNode(id))
        }
    }

    fn node_mut(&mut self, id: EquipmentId) -> Result<&mut Node, HierarchyError> {
        self.nodes
            .get_mut(&id)
            .ok_or(HierarchyError::UnknownNode(id))
    }

    /// Whether `ancestor` appears on the parent chain above `node`.
    fn has_ancestor(&self, node: EquipmentId, ancestor: EquipmentId) -> bool {
        let mut current = self.parent(node);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.parent(id);
        }
        false
    }

    fn sibling_order(&self, a: &EquipmentId, b: &EquipmentId) -> Ordering {
        match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(x), Some(y)) => x.name.cmp(&y.name).then(x.seq.cmp(&y.seq)),
            _ => a.cmp(b),
        }
    }

    fn unreachable(&self) -> Vec<EquipmentId> {
        let mut ids: Vec<EquipmentId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.position.is_none())
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// Rebuild everything derived from parent pointers and return the
    /// unreachable nodes.
    fn reindex(&mut self) -> Vec<EquipmentId> {
        let mut children: HashMap<EquipmentId, Vec<EquipmentId>> = HashMap::new();
        let mut roots = Vec::new();
        for (&id, node) in &self.nodes {
            match node.parent {
                None => roots.push(id),
                Some(p) => children.entry(p).or_default().push(id),
            }
        }
        roots.sort_by(|a, b| self.sibling_order(a, b));
        for list in children.values_mut() {
            list.sort_by(|a, b| self.sibling_order(a, b));
        }

        let mut positions: HashMap<EquipmentId, TreePosition> =
            HashMap::with_capacity(self.nodes.len());
        let mut preorder = Vec::with_capacity(self.nodes.len());

        for (i, &root) in roots.iter().enumerate() {
            let tree_id = i as u32 + 1;
            let mut counter = 1u32;
            let mut stack: Vec<(EquipmentId, u32, usize)> = vec![(root, 0, 0)];
            positions.insert(
                root,
                TreePosition {
                    tree_id,
                    lft: counter,
                    rgt: 0,
                    level: 0,
                },
            );
            preorder.push(root);
            counter += 1;

            while let Some(top) = stack.last_mut() {
                let (id, level, next) = *top;
                let kids = children.get(&id).map(Vec::as_slice).unwrap_or(&[]);
                if let Some(&child) = kids.get(next) {
                    top.2 += 1;
                    positions.insert(
                        child,
                        TreePosition {
                            tree_id,
                            lft: counter,
                            rgt: 0,
                            level: level + 1,
                        },
                    );
                    preorder.push(child);
                    counter += 1;
                    stack.push((child, level + 1, 0));
                } else {
                    if let Some(pos) = positions.get_mut(&id) {
                        pos.rgt = counter;
                    }
                    counter += 1;
                    stack.pop();
                }
            }
        }

        let ranks: HashMap<EquipmentId, usize> =
            preorder.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        for (id, node) in self.nodes.iter_mut() {
            node.children = children.remove(id).unwrap_or_default();
            node.position = positions.get(id).copied();
            node.rank = ranks.get(id).copied().unwrap_or(0);
        }
        self.roots = roots;
        self.preorder = preorder;
        self.unreachable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// plant
    /// ├── boiler
    /// │   └── burner
    /// └── chiller
    ///     ├── compressor
    ///     └── condenser
    struct Fixture {
        tree: EquipmentTree,
        plant: EquipmentId,
        boiler: EquipmentId,
        burner: EquipmentId,
        chiller: EquipmentId,
        compressor: EquipmentId,
        condenser: EquipmentId,
    }

    fn fixture() -> Fixture {
        let mut tree = EquipmentTree::new();
        let plant = EquipmentId::new();
        let boiler = EquipmentId::new();
        let burner = EquipmentId::new();
        let chiller = EquipmentId::new();
        let compressor = EquipmentId::new();
        let condenser = EquipmentId::new();
        tree.insert(plant, "plant", None).unwrap();
        // Inserted out of name order on purpose.
        tree.insert(chiller, "chiller", Some(plant)).unwrap();
        tree.insert(boiler, "boiler", Some(plant)).unwrap();
        tree.insert(burner, "burner", Some(boiler)).unwrap();
        tree.insert(condenser, "condenser", Some(chiller)).unwrap();
        tree.insert(compressor, "compressor", Some(chiller)).unwrap();
        Fixture {
            tree,
            plant,
            boiler,
            burner,
            chiller,
            compressor,
            condenser,
        }
    }

    #[test]
    fn children_are_ordered_by_name() {
        let f = fixture();
        assert_eq!(f.tree.children(f.plant), &[f.boiler, f.chiller]);
        assert_eq!(f.tree.children(f.chiller), &[f.compressor, f.condenser]);
        assert!(f.tree.children(f.burner).is_empty());
    }

    #[test]
    fn same_named_siblings_keep_insertion_order() {
        let mut tree = EquipmentTree::new();
        let root = EquipmentId::new();
        let first = EquipmentId::new();
        let second = EquipmentId::new();
        tree.insert(root, "rack", None).unwrap();
        tree.insert(first, "pump", Some(root)).unwrap();
        tree.insert(second, "pump", Some(root)).unwrap();
        assert_eq!(tree.children(root), &[first, second]);
    }

    #[test]
    fn nested_set_index_matches_shape() {
        let f = fixture();
        let plant = f.tree.position(f.plant).unwrap();
        assert_eq!((plant.lft, plant.rgt, plant.level), (1, 12, 0));
        let boiler = f.tree.position(f.boiler).unwrap();
        assert_eq!((boiler.lft, boiler.rgt, boiler.level), (2, 5, 1));
        let burner = f.tree.position(f.burner).unwrap();
        assert_eq!((burner.lft, burner.rgt, burner.level), (3, 4, 2));
        assert_eq!(plant.descendant_count(), 5);
    }

    #[test]
    fn preorder_and_descendants() {
        let f = fixture();
        assert_eq!(
            f.tree.preorder(),
            &[f.plant, f.boiler, f.burner, f.chiller, f.compressor, f.condenser]
        );
        assert_eq!(f.tree.descendants(f.chiller), &[f.compressor, f.condenser]);
        assert!(f.tree.descendants(f.condenser).is_empty());
        assert!(f.tree.is_descendant_of(f.burner, f.plant));
        assert!(!f.tree.is_descendant_of(f.plant, f.burner));
        assert!(!f.tree.is_descendant_of(f.plant, f.plant));
    }

    #[test]
    fn ancestors_are_root_first() {
        let f = fixture();
        assert_eq!(f.tree.ancestors(f.burner), vec![f.plant, f.boiler]);
        assert!(f.tree.ancestors(f.plant).is_empty());
    }

    #[test]
    fn move_under_self_is_a_cycle() {
        let mut f = fixture();
        let err = f.tree.set_parent(f.chiller, Some(f.chiller)).unwrap_err();
        assert_eq!(
            err,
            HierarchyError::Cycle {
                node: f.chiller,
                parent: f.chiller
            }
        );
    }

    #[test]
    fn move_under_descendant_is_a_cycle_and_changes_nothing() {
        let mut f = fixture();
        let before = f.tree.to_raw();
        let err = f.tree.set_parent(f.plant, Some(f.burner)).unwrap_err();
        assert!(matches!(err, HierarchyError::Cycle { .. }));
        assert_eq!(f.tree.to_raw(), before);
        assert_eq!(f.tree.parent(f.plant), None);
    }

    #[test]
    fn valid_move_reorders_and_reindexes() {
        let mut f = fixture();
        f.tree.set_parent(f.compressor, Some(f.boiler)).unwrap();
        assert_eq!(f.tree.children(f.boiler), &[f.burner, f.compressor]);
        assert_eq!(f.tree.children(f.chiller), &[f.condenser]);
        assert_eq!(f.tree.ancestors(f.compressor), vec![f.plant, f.boiler]);
        assert!(f.tree.is_descendant_of(f.compressor, f.boiler));
        assert!(!f.tree.is_descendant_of(f.compressor, f.chiller));
    }

    #[test]
    fn moving_to_none_makes_a_root() {
        let mut f = fixture();
        f.tree.set_parent(f.chiller, None).unwrap();
        assert_eq!(f.tree.roots(), &[f.chiller, f.plant]);
        let pos = f.tree.position(f.condenser).unwrap();
        assert_eq!(pos.tree_id, 1);
        assert_eq!(pos.level, 1);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut f = fixture();
        let ghost = EquipmentId::new();
        assert_eq!(
            f.tree.set_parent(ghost, None),
            Err(HierarchyError::UnknownNode(ghost))
        );
        assert_eq!(
            f.tree.set_parent(f.boiler, Some(ghost)),
            Err(HierarchyError::UnknownNode(ghost))
        );
        assert_eq!(
            f.tree.insert(EquipmentId::new(), "x", Some(ghost)),
            Err(HierarchyError::UnknownNode(ghost))
        );
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut f = fixture();
        assert_eq!(
            f.tree.insert(f.boiler, "again", None),
            Err(HierarchyError::DuplicateNode(f.boiler))
        );
    }

    #[test]
    fn rename_resorts_siblings() {
        let mut f = fixture();
        f.tree.rename(f.boiler, "zeta boiler").unwrap();
        assert_eq!(f.tree.children(f.plant), &[f.chiller, f.boiler]);
        assert_eq!(f.tree.name(f.boiler), Some("zeta boiler"));
    }

    #[test]
    fn remove_cascades_to_subtree() {
        let mut f = fixture();
        let removed = f.tree.remove(f.chiller).unwrap();
        assert_eq!(removed[0], f.chiller);
        assert_eq!(removed.len(), 3);
        assert!(removed.contains(&f.compressor));
        assert!(removed.contains(&f.condenser));
        assert_eq!(f.tree.len(), 3);
        assert_eq!(f.tree.children(f.plant), &[f.boiler]);
        assert_eq!(f.tree.position(f.plant).unwrap().rgt, 6);
    }

    #[test]
    fn from_raw_accepts_any_row_order() {
        let f = fixture();
        let mut rows = f.tree.to_raw();
        rows.reverse();
        let rebuilt = EquipmentTree::from_raw(rows).unwrap();
        assert_eq!(rebuilt.preorder(), f.tree.preorder());
        assert_eq!(rebuilt.position(f.burner), f.tree.position(f.burner));
    }

    #[test]
    fn from_raw_reports_cycle_as_corrupt() {
        let a = EquipmentId::new();
        let b = EquipmentId::new();
        let root = EquipmentId::new();
        let rows = vec![
            RawNode { id: root, name: "root".into(), parent: None },
            RawNode { id: a, name: "a".into(), parent: Some(b) },
            RawNode { id: b, name: "b".into(), parent: Some(a) },
        ];
        let err = EquipmentTree::from_raw(rows).unwrap_err();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(err, HierarchyError::CorruptTree { unreachable: expected });
    }

    #[test]
    fn rebuild_reports_orphans_but_indexes_the_rest() {
        let root = EquipmentId::new();
        let child = EquipmentId::new();
        let orphan = EquipmentId::new();
        let mut tree = EquipmentTree::new();
        tree.push_node(root, "root".into(), None);
        tree.push_node(child, "child".into(), Some(root));
        tree.push_node(orphan, "orphan".into(), Some(EquipmentId::new()));
        let err = tree.rebuild_index().unwrap_err();
        assert_eq!(err, HierarchyError::CorruptTree { unreachable: vec![orphan] });
        assert_eq!(tree.position(child).unwrap().level, 1);
        assert!(tree.position(orphan).is_none());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut f = fixture();
        let before: Vec<_> = f.tree.preorder().iter().map(|&id| f.tree.position(id)).collect();
        f.tree.rebuild_index().unwrap();
        f.tree.rebuild_index().unwrap();
        let after: Vec<_> = f.tree.preorder().iter().map(|&id| f.tree.position(id)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn raw_node_parent_defaults_to_none() {
        let id = EquipmentId::new();
        let json = serde_json::json!({ "id": id, "name": "press" });
        let node: RawNode = serde_json::from_value(json).unwrap();
        assert_eq!(node.parent, None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// A random forest: node `i` hangs under `parents[i]` when that
        /// index is smaller than `i`, otherwise it is a root.
        fn build(parents: &[usize], names: &[u8]) -> (EquipmentTree, Vec<EquipmentId>) {
            let mut tree = EquipmentTree::new();
            let ids: Vec<EquipmentId> = (0..parents.len()).map(|_| EquipmentId::new()).collect();
            for (i, &p) in parents.iter().enumerate() {
                let parent = (p < i).then(|| ids[p]);
                let name = format!("n{}", names[i % names.len()] % 4);
                tree.insert(ids[i], name, parent).unwrap();
            }
            (tree, ids)
        }

        fn forest() -> impl Strategy<Value = (Vec<usize>, Vec<u8>)> {
            (1usize..24).prop_flat_map(|n| {
                (
                    proptest::collection::vec(0usize..n + 4, n),
                    proptest::collection::vec(any::<u8>(), 1..8),
                )
            })
        }

        proptest! {
            #[test]
            fn moves_into_own_subtree_always_fail((parents, names) in forest(), pick in any::<usize>()) {
                let (mut tree, ids) = build(&parents, &names);
                let node = ids[pick % ids.len()];
                let before = tree.to_raw();
                let mut targets = tree.descendants(node).to_vec();
                targets.push(node);
                for target in targets {
                    let is_cycle = matches!(
                        tree.set_parent(node, Some(target)),
                        Err(HierarchyError::Cycle { .. })
                    );
                    prop_assert!(is_cycle);
                    prop_assert_eq!(&tree.to_raw(), &before);
                }
            }

            #[test]
            fn valid_moves_keep_the_forest_consistent(
                (parents, names) in forest(),
                moves in proptest::collection::vec((any::<usize>(), any::<usize>()), 1..16),
            ) {
                let (mut tree, ids) = build(&parents, &names);
                for (a, b) in moves {
                    let node = ids[a % ids.len()];
                    let target = ids[b % ids.len()];
                    if tree.set_parent(node, Some(target)).is_ok() {
                        let ancestors = tree.ancestors(node);
                        prop_assert_eq!(ancestors.last(), Some(&target));
                        let mut expected = tree.ancestors(target);
                        expected.push(target);
                        prop_assert_eq!(&ancestors, &expected);
                        prop_assert!(tree.children(target).contains(&node));
                        let names: Vec<_> = tree
                            .children(target)
                            .iter()
                            .map(|&c| tree.name(c).unwrap().to_string())
                            .collect();
                        let mut sorted = names.clone();
                        sorted.sort();
                        prop_assert_eq!(names, sorted);
                    }
                }
                prop_assert_eq!(tree.preorder().len(), ids.len());
                prop_assert!(tree.clone().rebuild_index().is_ok());
            }

            #[test]
            fn rebuild_index_is_idempotent((parents, names) in forest()) {
                let (mut tree, _) = build(&parents, &names);
                let snapshot = |t: &EquipmentTree| -> Vec<(EquipmentId, Option<TreePosition>)> {
                    t.preorder().iter().map(|&id| (id, t.position(id))).collect()
                };
                let once = snapshot(&tree);
                tree.rebuild_index().unwrap();
                prop_assert_eq!(&snapshot(&tree), &once);
                tree.rebuild_index().unwrap();
                prop_assert_eq!(snapshot(&tree), once);
            }
        }
    }
}
