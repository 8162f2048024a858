use std::cmp::Ordering;
use std::collections::HashMap;

use ustr::{Ustr, UstrMap};

/// Weighted union-find over heap addresses, with path compression.
///
/// On top of the usual parent/rank bookkeeping each set can carry a
/// representative that differs from its root, so that `union(dest, src)`
/// always leaves `dest`'s representative in charge, whichever root ends up on
/// top.
#[derive(Debug, Default)]
pub struct UnionFind {
    slots: UstrMap<usize>,
    addrs: Vec<Ustr>,
    parent: Vec<usize>,
    rank: Vec<u32>,
    /// root slot -> representative slot, when they differ.
    representative: HashMap<usize, usize>,
}

impl UnionFind {
    pub fn new() -> Self {
        UnionFind::default()
    }

    fn slot(&mut self, addr: Ustr) -> usize {
        if let Some(slot) = self.slots.get(&addr) {
            return *slot;
        }
        let slot = self.addrs.len();
        self.slots.insert(addr, slot);
        self.addrs.push(addr);
        self.parent.push(slot);
        self.rank.push(0);
        slot
    }

    fn find_slot(&mut self, slot: usize) -> usize {
        let mut root = slot;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = slot;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    pub fn contains(&self, addr: &Ustr) -> bool {
        self.slots.contains_key(addr)
    }

    /// Every address that has been involved in a union or lookup, in order
    /// of first involvement.
    pub fn addrs(&self) -> &[Ustr] {
        &self.addrs
    }

    /// The root of `addr`'s set.
    pub fn find(&mut self, addr: Ustr) -> Ustr {
        let slot = self.slot(addr);
        let root = self.find_slot(slot);
        self.addrs[root]
    }

    /// Merge `src`'s set into `dest`'s set.
    pub fn union(&mut self, dest: Ustr, src: Ustr) {
        let dest_slot = self.slot(dest);
        let src_slot = self.slot(src);
        let x = self.find_slot(dest_slot);
        let y = self.find_slot(src_slot);
        if x == y {
            return;
        }

        match self.rank[x].cmp(&self.rank[y]) {
            Ordering::Less => {
                let rep = self.representative.remove(&x).unwrap_or(x);
                self.representative.insert(y, rep);
                self.parent[x] = y;
            }
            Ordering::Greater => {
                self.parent[y] = x;
            }
            Ordering::Equal => {
                self.parent[y] = x;
                self.rank[x] += 1;
            }
        }
    }

    /// The address standing in for `addr`'s whole set.  Addresses never seen
    /// before stand for themselves.
    pub fn canonical(&mut self, addr: Ustr) -> Ustr {
        let slot = match self.slots.get(&addr) {
            Some(slot) => *slot,
            None => return addr,
        };
        let root = self.find_slot(slot);
        let rep = self.representative.get(&root).cloned().unwrap_or(root);
        self.addrs[rep]
    }

    /// Map every known address to its canonical address.
    pub fn canonicalize_all(&mut self) -> UstrMap<Ustr> {
        let addrs = self.addrs.clone();
        addrs
            .into_iter()
            .map(|addr| (addr, self.canonical(addr)))
            .collect()
    }
}
