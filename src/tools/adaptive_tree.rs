//! FGK adaptive Huffman tree.
//! This is used by the `adaptive_huff` module.  Encoder and decoder each hold
//! one of these and drive it with the same symbol sequence, so the two trees
//! evolve in lockstep and the stream needs no code table.
//!
//! Nodes live in an arena and carry an explicit order number realizing the
//! sibling-property ordering: sorted by number, weights are non-decreasing
//! and every sibling pair is adjacent.  A subtree swap exchanges the two
//! numbers, so maintaining the ordering costs O(1) per swap and the block
//! manager can always name the true swap target.

use std::collections::HashMap;
use crate::Error;
use crate::tools::bits::BitWriter;
use crate::tools::block::BlockManager;
use crate::tools::symbol::{BITS_PER_BYTE,MAX_BYTES_PER_SYMBOL,BYTES_PER_MB};

/// Order numbers count down from here as nodes are created, which keeps the
/// NYT at the bottom of the ordering without renumbering anything.
const BASE_NUM: u64 = 1 << 62;

#[derive(Clone,Copy,PartialEq)]
pub enum NodeKind {
    Internal,
    /// carries a transmitted symbol
    Leaf(u64),
    /// the escape leaf reserving a codeword for untransmitted symbols
    Nyt
}

/// A tree node.  The arena index is the node's identity; parent and child
/// links are indices into the same arena.
pub struct Node {
    pub kind: NodeKind,
    pub weight: u64,
    /// position in the implicit sibling-property ordering
    pub num: u64,
    pub parent: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub depth: u32
}

/// symbol -> leaf index, dense for narrow symbols, hashed for wide ones
enum LeafIndex {
    Dense(Vec<Option<usize>>),
    Sparse(HashMap<u64,usize>)
}

impl LeafIndex {
    fn create(bits_per_symbol: usize) -> Self {
        match bits_per_symbol <= 2 * BITS_PER_BYTE {
            true => Self::Dense(vec![None; 1 << bits_per_symbol]),
            false => Self::Sparse(HashMap::new())
        }
    }
    fn get(&self, symbol: u64) -> Option<usize> {
        match self {
            Self::Dense(v) => v[symbol as usize],
            Self::Sparse(m) => m.get(&symbol).copied()
        }
    }
    fn set(&mut self, symbol: u64, leaf: usize) {
        match self {
            Self::Dense(v) => v[symbol as usize] = Some(leaf),
            Self::Sparse(m) => {
                m.insert(symbol,leaf);
            }
        }
    }
}

pub struct AdaptiveTree {
    arena: Vec<Node>,
    root: usize,
    nyt: usize,
    leaf_of: LeafIndex,
    /// decoding walk position
    cur: usize,
    blocks: BlockManager,
    next_num: u64,
    bits_per_symbol: usize,
    bytes_per_symbol: usize,
    /// bits collected toward a raw symbol while the walk sits on the NYT
    nyt_buffer: u64,
    nyt_buffered: usize,
    symbol_count: u64,
    shrink_count: u64,
    /// input megabytes between shrinks, 0 disables
    chunk_size: u64,
    shrink_factor: u64
}

impl AdaptiveTree {
    /// Start from the bare NYT.  Can panic if options are inconsistent.
    pub fn create(bytes_per_symbol: usize, chunk_size: usize, shrink_factor: usize) -> Self {
        assert!(bytes_per_symbol >= 1 && bytes_per_symbol <= MAX_BYTES_PER_SYMBOL);
        assert!(chunk_size == 0 || shrink_factor > 1);
        let bits_per_symbol = bytes_per_symbol * BITS_PER_BYTE;
        let nyt = Node {
            kind: NodeKind::Nyt,
            weight: 0,
            num: BASE_NUM,
            parent: None,
            left: None,
            right: None,
            depth: 0
        };
        Self {
            arena: vec![nyt],
            root: 0,
            nyt: 0,
            leaf_of: LeafIndex::create(bits_per_symbol),
            cur: 0,
            blocks: BlockManager::new(),
            next_num: BASE_NUM - 1,
            bits_per_symbol,
            bytes_per_symbol,
            nyt_buffer: 0,
            nyt_buffered: 0,
            symbol_count: 0,
            shrink_count: 0,
            chunk_size: chunk_size as u64,
            shrink_factor: shrink_factor as u64
        }
    }
    /// number of weight shrinks performed so far
    pub fn shrink_count(&self) -> u64 {
        self.shrink_count
    }
    /// true when the decoding walk sits at the root with no buffered NYT bits
    pub fn at_symbol_boundary(&self) -> bool {
        self.cur == self.root && self.nyt_buffered == 0
    }
    /// Emit the codeword for `symbol` and fold the symbol into the tree.
    pub fn encode_symbol(&mut self, symbol: u64, out: &mut BitWriter) -> Result<(),Error> {
        match self.leaf_of.get(symbol) {
            Some(leaf) => {
                self.emit_path(leaf,out);
                self.update(leaf)?;
            },
            None => {
                // escape: the NYT path as the tree stands, then the raw symbol
                self.emit_path(self.nyt,out);
                out.put_code(self.bits_per_symbol,symbol);
                self.create_new_leaf(symbol)?;
            }
        }
        self.count_symbol();
        Ok(())
    }
    /// Feed one bit to the decoding walk, returning the completed symbol if any.
    pub fn decode_bit(&mut self, bit: bool) -> Result<Option<u64>,Error> {
        if self.cur == self.nyt {
            self.nyt_buffer = self.nyt_buffer << 1 | bit as u64;
            self.nyt_buffered += 1;
            if self.nyt_buffered < self.bits_per_symbol {
                return Ok(None);
            }
            let symbol = self.nyt_buffer;
            self.nyt_buffer = 0;
            self.nyt_buffered = 0;
            if self.leaf_of.get(symbol).is_some() {
                // a compliant encoder escapes each symbol at most once
                return Err(Error::MalformedStream);
            }
            self.create_new_leaf(symbol)?;
            self.cur = self.root;
            self.count_symbol();
            return Ok(Some(symbol));
        }
        let next = match bit {
            false => self.arena[self.cur].left,
            true => self.arena[self.cur].right
        };
        self.cur = next.ok_or(Error::InvariantViolation)?;
        if let NodeKind::Leaf(symbol) = self.arena[self.cur].kind {
            let leaf = self.cur;
            self.update(leaf)?;
            self.cur = self.root;
            self.count_symbol();
            return Ok(Some(symbol));
        }
        Ok(None)
    }
    /// structural consistency: links, depths, weight additivity, NYT shape
    pub fn audit(&self) -> Result<(),Error> {
        for (i,n) in self.arena.iter().enumerate() {
            match n.parent {
                Some(p) => {
                    if n.depth != self.arena[p].depth + 1 {
                        return Err(Error::InvariantViolation);
                    }
                    if self.arena[p].left != Some(i) && self.arena[p].right != Some(i) {
                        return Err(Error::InvariantViolation);
                    }
                },
                None => {
                    if i != self.root || n.depth != 0 {
                        return Err(Error::InvariantViolation);
                    }
                }
            }
            if let NodeKind::Internal = n.kind {
                match (n.left,n.right) {
                    (Some(l),Some(r)) => {
                        if n.weight != self.arena[l].weight + self.arena[r].weight {
                            return Err(Error::InvariantViolation);
                        }
                    },
                    _ => return Err(Error::InvariantViolation)
                }
            }
        }
        let nyt = &self.arena[self.nyt];
        if nyt.weight != 0 || nyt.left.is_some() || nyt.right.is_some() {
            return Err(Error::InvariantViolation);
        }
        if let Some(p) = nyt.parent {
            if self.arena[p].left != Some(self.nyt) {
                return Err(Error::InvariantViolation);
            }
        }
        Ok(())
    }
    /// codeword for a node, found by walking the parent links
    fn emit_path(&self, idx: usize, out: &mut BitWriter) {
        let mut rev: Vec<bool> = Vec::new();
        let mut n = idx;
        while let Some(p) = self.arena[n].parent {
            rev.push(self.arena[p].right == Some(n));
            n = p;
        }
        for bit in rev.iter().rev() {
            out.put_bit(*bit);
        }
    }
    /// Split the NYT: a fresh internal node takes its place, with the NYT as
    /// left child and a weight-1 leaf for `symbol` as right child.
    fn create_new_leaf(&mut self, symbol: u64) -> Result<(),Error> {
        let y = self.nyt;
        let parent = self.arena[y].parent;
        let depth = self.arena[y].depth;
        let num = self.arena[y].num;
        let internal = self.arena.len();
        let leaf = internal + 1;
        self.arena.push(Node {
            kind: NodeKind::Internal,
            weight: 1,
            num,
            parent,
            left: Some(y),
            right: Some(leaf),
            depth
        });
        self.arena.push(Node {
            kind: NodeKind::Leaf(symbol),
            weight: 1,
            num: self.next_num,
            parent: Some(internal),
            left: None,
            right: None,
            depth: depth + 1
        });
        self.next_num -= 1;
        self.arena[y].num = self.next_num;
        self.next_num -= 1;
        self.arena[y].parent = Some(internal);
        self.arena[y].depth = depth + 1;
        match parent {
            Some(p) => {
                if self.arena[p].left == Some(y) {
                    self.arena[p].left = Some(internal);
                } else {
                    self.arena[p].right = Some(internal);
                }
            },
            None => {
                self.root = internal;
            }
        }
        self.blocks.insert(internal,&self.arena);
        self.blocks.insert(leaf,&self.arena);
        self.leaf_of.set(symbol,leaf);
        match parent {
            Some(p) => self.update(p),
            None => Ok(())
        }
    }
    /// Weight increment along the path to the root.  Each visited node is
    /// first swapped with its block representative, unless the representative
    /// is the node itself or the node's parent.
    fn update(&mut self, node: usize) -> Result<(),Error> {
        let mut cursor = Some(node);
        while let Some(n) = cursor {
            let weight = self.arena[n].weight;
            let rep = match self.blocks.representative(weight) {
                Some(rep) => rep,
                None => return Err(Error::InvariantViolation)
            };
            if rep != n && self.arena[n].parent != Some(rep) {
                self.swap(n,rep);
            }
            self.blocks.increment(n,&mut self.arena);
            cursor = self.arena[n].parent;
        }
        Ok(())
    }
    /// Exchange two equal-weight subtrees: parent slots, order numbers, and
    /// depths.  The NYT is never one of the two.
    fn swap(&mut self, a: usize, b: usize) {
        let (pa,pb) = match (self.arena[a].parent,self.arena[b].parent) {
            (Some(pa),Some(pb)) => (pa,pb),
            _ => return
        };
        let a_on_left = self.arena[pa].left == Some(a);
        let b_on_left = self.arena[pb].left == Some(b);
        match a_on_left {
            true => self.arena[pa].left = Some(b),
            false => self.arena[pa].right = Some(b)
        }
        match b_on_left {
            true => self.arena[pb].left = Some(a),
            false => self.arena[pb].right = Some(a)
        }
        self.arena[a].parent = Some(pb);
        self.arena[b].parent = Some(pa);
        // order numbers belong to the positions, not the nodes
        self.blocks.remove(a,&self.arena);
        self.blocks.remove(b,&self.arena);
        let num = self.arena[a].num;
        self.arena[a].num = self.arena[b].num;
        self.arena[b].num = num;
        self.blocks.insert(a,&self.arena);
        self.blocks.insert(b,&self.arena);
        self.refresh_depths(a);
        self.refresh_depths(b);
    }
    /// recompute depths below `top` after it moved
    fn refresh_depths(&mut self, top: usize) {
        let mut stack = vec![top];
        while let Some(i) = stack.pop() {
            self.arena[i].depth = match self.arena[i].parent {
                Some(p) => self.arena[p].depth + 1,
                None => 0
            };
            if let (Some(l),Some(r)) = (self.arena[i].left,self.arena[i].right) {
                stack.push(l);
                stack.push(r);
            }
        }
    }
    /// Bookkeeping at each symbol boundary.  Encoder and decoder call this at
    /// identical points, so their trees shrink in the same instant and stay
    /// bit-compatible.
    fn count_symbol(&mut self) {
        self.symbol_count += 1;
        if self.chunk_size == 0 {
            return;
        }
        let processed = self.symbol_count * self.bytes_per_symbol as u64;
        if processed > self.chunk_size * (self.shrink_count + 1) * BYTES_PER_MB {
            self.shrink();
        }
    }
    /// Divide leaf weights by the shrink factor (floored at 1), restore the
    /// internal sums bottom-up, and re-register every node with the block
    /// manager.  Shape, order numbers, and the symbol index are untouched.
    fn shrink(&mut self) {
        let mut order = vec![self.root];
        let mut i = 0;
        while i < order.len() {
            if let (Some(l),Some(r)) = (self.arena[order[i]].left,self.arena[order[i]].right) {
                order.push(l);
                order.push(r);
            }
            i += 1;
        }
        for &n in order.iter().rev() {
            match self.arena[n].kind {
                NodeKind::Leaf(_) => {
                    let w = self.arena[n].weight;
                    self.arena[n].weight = std::cmp::max(1,w / self.shrink_factor);
                },
                NodeKind::Internal => {
                    if let (Some(l),Some(r)) = (self.arena[n].left,self.arena[n].right) {
                        self.arena[n].weight = self.arena[l].weight + self.arena[r].weight;
                    }
                },
                NodeKind::Nyt => {}
            }
        }
        self.blocks.rebuild(&self.arena,self.nyt);
        self.shrink_count += 1;
        debug_assert!(self.audit().is_ok());
    }
}

// *************** TESTS *****************

#[cfg(test)]
impl AdaptiveTree {
    /// sorted by order number, weights must be non-decreasing and every
    /// sibling pair adjacent with the left sibling first
    fn assert_sibling_property(&self) {
        let mut order: Vec<usize> = (0..self.arena.len()).collect();
        order.sort_by_key(|&i| self.arena[i].num);
        let mut pos = vec![0usize; self.arena.len()];
        for (k,&i) in order.iter().enumerate() {
            pos[i] = k;
        }
        for k in 1..order.len() {
            assert!(self.arena[order[k-1]].weight <= self.arena[order[k]].weight,
                "weight ordering broken at rank {}",k);
        }
        for n in self.arena.iter() {
            if let (Some(l),Some(r)) = (n.left,n.right) {
                assert_eq!(pos[l] + 1,pos[r],"sibling pair not adjacent");
                assert!(n.num > self.arena[l].num && n.num > self.arena[r].num);
            }
        }
    }
    /// shape, weights and symbols in preorder, for mirror comparisons
    fn signature(&self) -> Vec<(u32,u64,u8,u64)> {
        let mut sig = Vec::new();
        let mut stack = vec![self.root];
        while let Some(i) = stack.pop() {
            let n = &self.arena[i];
            let (kind,symbol) = match n.kind {
                NodeKind::Internal => (0,0),
                NodeKind::Leaf(s) => (1,s),
                NodeKind::Nyt => (2,0)
            };
            sig.push((n.depth,n.weight,kind,symbol));
            if let (Some(l),Some(r)) = (n.left,n.right) {
                stack.push(r);
                stack.push(l);
            }
        }
        sig
    }
    fn path_of(&self, idx: usize) -> Vec<bool> {
        let mut rev = Vec::new();
        let mut n = idx;
        while let Some(p) = self.arena[n].parent {
            rev.push(self.arena[p].right == Some(n));
            n = p;
        }
        rev.reverse();
        rev
    }
}

#[cfg(test)]
fn lcg_bytes(count: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..count).map(|_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 56) as u8
    }).collect()
}

#[test]
fn repeated_symbol_grows_one_leaf() {
    let mut tree = AdaptiveTree::create(1,0,2);
    let mut lengths = Vec::new();
    for _i in 0..4 {
        let mut bw = BitWriter::new();
        tree.encode_symbol(0x61,&mut bw).unwrap();
        lengths.push(bw.bit_count());
    }
    // raw escape first, then a one-bit codeword
    assert_eq!(lengths,vec![8,1,1,1]);
    assert_eq!(tree.arena.len(),3);
    let leaf = tree.leaf_of.get(0x61).unwrap();
    assert_eq!(tree.arena[leaf].weight,4);
    assert_eq!(tree.arena[tree.root].weight,4);
    tree.audit().unwrap();
    tree.assert_sibling_property();
}

#[test]
fn fresh_symbols_escape_through_nyt() {
    let mut tree = AdaptiveTree::create(1,0,2);
    let mut lengths = Vec::new();
    for symbol in "abcd".bytes() {
        let mut bw = BitWriter::new();
        tree.encode_symbol(symbol as u64,&mut bw).unwrap();
        lengths.push(bw.bit_count());
        tree.audit().unwrap();
        tree.assert_sibling_property();
    }
    // the NYT path grows by one bit per distinct symbol
    assert_eq!(lengths,vec![8,9,10,11]);
}

#[test]
fn invariants_hold_under_pressure() {
    let mut tree = AdaptiveTree::create(1,0,2);
    let mut bw = BitWriter::new();
    for by in lcg_bytes(3000,0xdead_beef) {
        tree.encode_symbol(by as u64,&mut bw).unwrap();
        tree.audit().unwrap();
        tree.assert_sibling_property();
    }
}

#[test]
fn decoder_mirrors_encoder() {
    let data = "mirror mirror on the wall, which code is adaptive of them all".as_bytes();
    let mut enc = AdaptiveTree::create(1,0,2);
    let mut bw = BitWriter::new();
    for by in data {
        enc.encode_symbol(*by as u64,&mut bw).unwrap();
    }
    let bits = bw.bit_count();
    let mut packed: Vec<u8> = Vec::new();
    bw.finish(&mut packed).unwrap();
    let mut dec = AdaptiveTree::create(1,0,2);
    let mut decoded = Vec::new();
    for i in 0..bits as usize {
        let bit = packed[i/8] >> (7 - i%8) & 1 != 0;
        if let Some(symbol) = dec.decode_bit(bit).unwrap() {
            decoded.push(symbol as u8);
            dec.audit().unwrap();
            dec.assert_sibling_property();
        }
    }
    assert_eq!(decoded,data);
    assert!(dec.at_symbol_boundary());
    assert_eq!(enc.signature(),dec.signature());
}

#[test]
fn codewords_stay_prefix_free() {
    let mut tree = AdaptiveTree::create(1,0,2);
    let mut bw = BitWriter::new();
    for by in "abracadabra".bytes() {
        tree.encode_symbol(by as u64,&mut bw).unwrap();
        let mut paths = Vec::new();
        for (i,n) in tree.arena.iter().enumerate() {
            if let NodeKind::Leaf(_) = n.kind {
                paths.push(tree.path_of(i));
            }
        }
        for a in 0..paths.len() {
            for b in 0..paths.len() {
                if a != b {
                    assert!(!paths[b].starts_with(&paths[a]),"prefix collision");
                }
            }
        }
    }
}

#[test]
fn shrink_keeps_trees_in_step() {
    let head = lcg_bytes(400,0x0123_4567);
    let tail = lcg_bytes(600,0x89ab_cdef);
    let mut enc = AdaptiveTree::create(1,0,2);
    let mut dec = AdaptiveTree::create(1,0,2);
    let replay = |enc: &mut AdaptiveTree, dec: &mut AdaptiveTree, data: &[u8]| {
        let mut bw = BitWriter::new();
        for by in data {
            enc.encode_symbol(*by as u64,&mut bw).unwrap();
        }
        let bits = bw.bit_count();
        let mut packed: Vec<u8> = Vec::new();
        bw.finish(&mut packed).unwrap();
        let mut count = 0;
        for i in 0..bits as usize {
            let bit = packed[i/8] >> (7 - i%8) & 1 != 0;
            if dec.decode_bit(bit).unwrap().is_some() {
                count += 1;
            }
        }
        assert_eq!(count,data.len());
    };
    replay(&mut enc,&mut dec,&head);
    // both sides shrink at the same symbol boundary
    enc.shrink();
    dec.shrink();
    enc.audit().unwrap();
    dec.audit().unwrap();
    assert_eq!(enc.signature(),dec.signature());
    replay(&mut enc,&mut dec,&tail);
    assert_eq!(enc.signature(),dec.signature());
    enc.audit().unwrap();
    dec.audit().unwrap();
}

#[test]
fn wide_symbols_buffer_through_nyt() {
    let mut enc = AdaptiveTree::create(2,0,2);
    let mut bw = BitWriter::new();
    enc.encode_symbol(0x6162,&mut bw).unwrap();
    enc.encode_symbol(0x6162,&mut bw).unwrap();
    assert_eq!(bw.bit_count(),17);
    let bits = bw.bit_count();
    let mut packed: Vec<u8> = Vec::new();
    bw.finish(&mut packed).unwrap();
    let mut dec = AdaptiveTree::create(2,0,2);
    let mut decoded = Vec::new();
    for i in 0..bits as usize {
        let bit = packed[i/8] >> (7 - i%8) & 1 != 0;
        if let Some(symbol) = dec.decode_bit(bit).unwrap() {
            decoded.push(symbol);
        }
    }
    assert_eq!(decoded,vec![0x6162,0x6162]);
    assert!(dec.at_symbol_boundary());
}
