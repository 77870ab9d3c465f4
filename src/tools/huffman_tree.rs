//! Static Huffman tree with canonical reconstruction.
//! The encoder builds twice: a throwaway merge tree from the measured
//! distribution yields code lengths, then the canonical tree is rebuilt from
//! the lengths alone.  The decoder only ever performs the second
//! construction, from the header's length table, so the two sides agree
//! without transmitting any tree structure.

use std::collections::{BTreeMap,BinaryHeap,HashMap};
use std::cmp::Reverse;
use bit_vec::BitVec;
use crate::Error;

struct StaticNode {
    symbol: Option<u64>,
    left: Option<usize>,
    right: Option<usize>
}

pub struct HuffmanTree {
    arena: Vec<StaticNode>,
    root: usize,
    /// for encoding only
    codes: HashMap<u64,BitVec>,
    /// for decoding only
    cur: usize
}

impl HuffmanTree {
    /// Code lengths for a symbol distribution, by the two-smallest merge.
    /// Ties break on (internal before leaf, then smallest symbol in the
    /// subtree) so that independent builds assign identical lengths.
    /// A one-symbol alphabet gets the single-bit code.
    pub fn code_lengths(freq: &HashMap<u64,u64>) -> BTreeMap<u64,u64> {
        let mut lengths = BTreeMap::new();
        if freq.len() == 1 {
            if let Some((&symbol,_count)) = freq.iter().next() {
                lengths.insert(symbol,1);
            }
            return lengths;
        }
        // merge arena: (left, right, symbol)
        let mut nodes: Vec<(Option<usize>,Option<usize>,Option<u64>)> = Vec::new();
        let mut heap: BinaryHeap<Reverse<(u64,u8,u64,usize)>> = BinaryHeap::new();
        for (&symbol,&count) in freq {
            nodes.push((None,None,Some(symbol)));
            heap.push(Reverse((count,1,symbol,nodes.len()-1)));
        }
        while heap.len() > 1 {
            if let (Some(Reverse((w1,_,m1,n1))),Some(Reverse((w2,_,m2,n2)))) = (heap.pop(),heap.pop()) {
                nodes.push((Some(n1),Some(n2),None));
                heap.push(Reverse((w1+w2,0,std::cmp::min(m1,m2),nodes.len()-1)));
            }
        }
        if let Some(Reverse((_,_,_,root))) = heap.pop() {
            let mut stack = vec![(root,0u64)];
            while let Some((i,depth)) = stack.pop() {
                match nodes[i] {
                    (Some(l),Some(r),_) => {
                        stack.push((l,depth+1));
                        stack.push((r,depth+1));
                    },
                    (_,_,Some(symbol)) => {
                        lengths.insert(symbol,depth);
                    },
                    _ => {}
                }
            }
        }
        lengths
    }
    /// Build the canonical tree for a code-length table.
    /// Level by level from the root: leaves of each length claim the leftmost
    /// open slots in ascending symbol order, then fresh internal nodes extend
    /// the remaining frontier.  Lengths that cannot be consumed are rejected.
    pub fn from_code_lengths(lengths: &BTreeMap<u64,u64>) -> Result<Self,Error> {
        if lengths.is_empty() {
            return Err(Error::InvalidCodeLengths);
        }
        let mut by_len: BTreeMap<u64,Vec<u64>> = BTreeMap::new();
        for (&symbol,&len) in lengths {
            if len == 0 {
                return Err(Error::InvalidCodeLengths);
            }
            by_len.entry(len).or_insert_with(Vec::new).push(symbol);
        }
        let max_len = match by_len.keys().next_back() {
            Some(&l) => l,
            None => return Err(Error::InvalidCodeLengths)
        };
        // backstop against absurd tables that would balloon the frontier
        let node_limit = 4 * lengths.len() + 4096;
        let mut arena = vec![StaticNode { symbol: None, left: None, right: None }];
        let mut parents = vec![0usize];
        for level in 1..=max_len {
            if parents.is_empty() {
                return Err(Error::InvalidCodeLengths);
            }
            let pending = by_len.remove(&level).unwrap_or_default();
            let mut next_leaf = pending.iter();
            let mut new_parents = Vec::new();
            for &p in &parents {
                for side in 0..2 {
                    let idx = arena.len();
                    match next_leaf.next() {
                        Some(&symbol) => {
                            arena.push(StaticNode { symbol: Some(symbol), left: None, right: None });
                        },
                        None => {
                            arena.push(StaticNode { symbol: None, left: None, right: None });
                            new_parents.push(idx);
                        }
                    }
                    match side {
                        0 => arena[p].left = Some(idx),
                        _ => arena[p].right = Some(idx)
                    }
                }
            }
            if next_leaf.next().is_some() {
                return Err(Error::InvalidCodeLengths);
            }
            if arena.len() > node_limit {
                return Err(Error::InvalidCodeLengths);
            }
            parents = new_parents;
        }
        // read the codes back off the canonical shape
        let mut codes = HashMap::new();
        let mut stack: Vec<(usize,BitVec)> = vec![(0,BitVec::new())];
        while let Some((i,prefix)) = stack.pop() {
            match arena[i].symbol {
                Some(symbol) => {
                    codes.insert(symbol,prefix);
                },
                None => {
                    if let Some(r) = arena[i].right {
                        let mut branch = prefix.clone();
                        branch.push(true);
                        stack.push((r,branch));
                    }
                    if let Some(l) = arena[i].left {
                        let mut branch = prefix.clone();
                        branch.push(false);
                        stack.push((l,branch));
                    }
                }
            }
        }
        Ok(Self {
            arena,
            root: 0,
            codes,
            cur: 0
        })
    }
    /// codeword for `symbol`, if the tree carries it
    pub fn code(&self, symbol: u64) -> Option<&BitVec> {
        self.codes.get(&symbol)
    }
    /// Walk one bit; emits the decoded symbol on reaching a leaf.
    pub fn decode_bit(&mut self, bit: bool) -> Result<Option<u64>,Error> {
        let next = match bit {
            false => self.arena[self.cur].left,
            true => self.arena[self.cur].right
        };
        self.cur = next.ok_or(Error::MalformedStream)?;
        match self.arena[self.cur].symbol {
            Some(symbol) => {
                self.cur = self.root;
                Ok(Some(symbol))
            },
            None => Ok(None)
        }
    }
    /// true when the decoding walk sits at the root
    pub fn at_root(&self) -> bool {
        self.cur == self.root
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn freq_of(pairs: &[(u8,u64)]) -> HashMap<u64,u64> {
    pairs.iter().map(|&(s,c)| (s as u64,c)).collect()
}

#[cfg(test)]
fn code_str(tree: &HuffmanTree, symbol: u8) -> String {
    tree.code(symbol as u64).unwrap().iter()
        .map(|b| if b { '1' } else { '0' }).collect()
}

#[test]
fn lengths_for_known_distribution() {
    let freq = freq_of(&[(b'a',5),(b'b',2),(b'c',1),(b'd',1)]);
    let lengths = HuffmanTree::code_lengths(&freq);
    assert_eq!(lengths.get(&(b'a' as u64)),Some(&1));
    assert_eq!(lengths.get(&(b'b' as u64)),Some(&2));
    assert_eq!(lengths.get(&(b'c' as u64)),Some(&3));
    assert_eq!(lengths.get(&(b'd' as u64)),Some(&3));
}

#[test]
fn lengths_are_deterministic() {
    // a flat distribution is all ties, the worst case for stability
    let freq: HashMap<u64,u64> = (0..=255).map(|s| (s,1)).collect();
    let first = HuffmanTree::code_lengths(&freq);
    for _i in 0..5 {
        assert_eq!(HuffmanTree::code_lengths(&freq),first);
    }
    assert!(first.values().all(|&l| l == 8));
}

#[test]
fn canonical_codes_are_ordered() {
    let freq = freq_of(&[(b'a',5),(b'b',2),(b'c',1),(b'd',1),(b'r',2)]);
    let lengths = HuffmanTree::code_lengths(&freq);
    let tree = HuffmanTree::from_code_lengths(&lengths).unwrap();
    assert_eq!(code_str(&tree,b'a'),"0");
    assert_eq!(code_str(&tree,b'r'),"10");
    assert_eq!(code_str(&tree,b'b'),"110");
    assert_eq!(code_str(&tree,b'c'),"1110");
    assert_eq!(code_str(&tree,b'd'),"1111");
    // rebuilt lengths match the originals
    for (&symbol,&len) in &lengths {
        assert_eq!(tree.code(symbol).unwrap().len() as u64,len);
    }
}

#[test]
fn single_symbol_gets_one_bit() {
    let freq = freq_of(&[(b'a',3)]);
    let lengths = HuffmanTree::code_lengths(&freq);
    assert_eq!(lengths.len(),1);
    assert_eq!(lengths.get(&(b'a' as u64)),Some(&1));
    let mut tree = HuffmanTree::from_code_lengths(&lengths).unwrap();
    assert_eq!(code_str(&tree,b'a'),"0");
    assert_eq!(tree.decode_bit(false).unwrap(),Some(b'a' as u64));
    assert!(tree.at_root());
}

#[test]
fn impossible_lengths_are_rejected() {
    let mut lengths: BTreeMap<u64,u64> = BTreeMap::new();
    for (symbol,len) in [(0u64,1u64),(1,1),(2,1)] {
        lengths.insert(symbol,len);
    }
    assert!(HuffmanTree::from_code_lengths(&lengths).is_err());
    lengths.clear();
    assert!(HuffmanTree::from_code_lengths(&lengths).is_err());
    lengths.insert(7,0);
    assert!(HuffmanTree::from_code_lengths(&lengths).is_err());
}

#[test]
fn decode_inverts_encode() {
    let freq = freq_of(&[(b'x',9),(b'y',3),(b'z',1)]);
    let tree_lengths = HuffmanTree::code_lengths(&freq);
    let mut tree = HuffmanTree::from_code_lengths(&tree_lengths).unwrap();
    let message = b"xyzzyxxyx";
    let mut bits: Vec<bool> = Vec::new();
    for symbol in message {
        bits.extend(tree.code(*symbol as u64).unwrap().iter());
    }
    let mut decoded = Vec::new();
    for bit in bits {
        if let Some(symbol) = tree.decode_bit(bit).unwrap() {
            decoded.push(symbol as u8);
        }
    }
    assert_eq!(decoded,message.to_vec());
    assert!(tree.at_root());
}
