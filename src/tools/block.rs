//! Blocks group adaptive-tree nodes of equal weight.
//! Within a block nodes are ranked by their implicit sibling-property order;
//! the representative is the highest-ranked member, which is the swap target
//! when a weight increment would otherwise break the ordering.

use std::collections::{BTreeMap,HashMap};
use crate::tools::adaptive_tree::Node;

pub struct BlockManager {
    /// weight -> (order number -> arena index)
    blocks: HashMap<u64,BTreeMap<u64,usize>>
}

impl BlockManager {
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new()
        }
    }
    /// add a node to the block of its current weight
    pub fn insert(&mut self, idx: usize, arena: &[Node]) {
        let n = &arena[idx];
        self.blocks.entry(n.weight).or_insert_with(BTreeMap::new).insert(n.num,idx);
    }
    /// remove a node from the block of its current weight
    pub fn remove(&mut self, idx: usize, arena: &[Node]) {
        let n = &arena[idx];
        if let Some(block) = self.blocks.get_mut(&n.weight) {
            block.remove(&n.num);
            if block.is_empty() {
                self.blocks.remove(&n.weight);
            }
        }
    }
    /// move a node from its block into the next heavier one
    pub fn increment(&mut self, idx: usize, arena: &mut [Node]) {
        self.remove(idx,arena);
        arena[idx].weight += 1;
        self.insert(idx,arena);
    }
    /// the highest-ordered node of weight `weight`, if any
    pub fn representative(&self, weight: u64) -> Option<usize> {
        match self.blocks.get(&weight) {
            Some(block) => block.iter().next_back().map(|(_num,&idx)| idx),
            None => None
        }
    }
    /// drop everything and re-register the tree, used after a shrink
    pub fn rebuild(&mut self, arena: &[Node], nyt: usize) {
        self.blocks.clear();
        for idx in 0..arena.len() {
            if idx != nyt {
                self.insert(idx,arena);
            }
        }
    }
}

#[cfg(test)]
fn test_node(weight: u64, num: u64) -> Node {
    use crate::tools::adaptive_tree::NodeKind;
    Node {
        kind: NodeKind::Internal,
        weight,
        num,
        parent: None,
        left: None,
        right: None,
        depth: 0
    }
}

#[test]
fn representative_is_highest_ordered() {
    let arena = vec![test_node(1,10),test_node(1,30),test_node(1,20),test_node(2,5)];
    let mut mgr = BlockManager::new();
    for i in 0..arena.len() {
        mgr.insert(i,&arena);
    }
    assert_eq!(mgr.representative(1),Some(1));
    assert_eq!(mgr.representative(2),Some(3));
    assert_eq!(mgr.representative(3),None);
    mgr.remove(1,&arena);
    assert_eq!(mgr.representative(1),Some(2));
}

#[test]
fn increment_moves_between_blocks() {
    let mut arena = vec![test_node(1,10),test_node(1,30)];
    let mut mgr = BlockManager::new();
    for i in 0..arena.len() {
        mgr.insert(i,&arena);
    }
    mgr.increment(0,&mut arena);
    assert_eq!(arena[0].weight,2);
    assert_eq!(mgr.representative(1),Some(1));
    assert_eq!(mgr.representative(2),Some(0));
    mgr.increment(1,&mut arena);
    assert_eq!(mgr.representative(1),None);
    // order numbers still rank the weight-2 block
    assert_eq!(mgr.representative(2),Some(1));
}

#[test]
fn rebuild_reregisters_all_but_nyt() {
    let arena = vec![test_node(0,50),test_node(3,10),test_node(3,20)];
    let mut mgr = BlockManager::new();
    mgr.rebuild(&arena,0);
    assert_eq!(mgr.representative(0),None);
    assert_eq!(mgr.representative(3),Some(2));
}
