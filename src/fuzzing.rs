//! Module for testing using fuzzing (quickcheck).
//!
//! Random operation sequences are applied to both tree implementations in
//! lockstep; any observable difference between the two is a bug in one of
//! them.

use std::fmt::Debug;
use std::net::Ipv4Addr;

use quickcheck::Arbitrary;

use crate::*;

#[cfg(miri)]
const DEFAULT_NUM_TESTS: usize = 10;
#[cfg(not(miri))]
const DEFAULT_NUM_TESTS: usize = 500;
const DEFAULT_GEN_SIZE: usize = 100;

fn proptest_runner<A: Arbitrary + Debug + PartialEq, F: Fn(A) -> bool>(f: F) {
    let num_tests: usize = std::env::var("QUICKCHECK_TESTS")
        .ok()
        .and_then(|x| x.parse::<usize>().ok())
        .unwrap_or(DEFAULT_NUM_TESTS);

    let gen_size: usize = std::env::var("QUICKCHECK_GENERATOR_SIZE")
        .ok()
        .and_then(|x| x.parse::<usize>().ok())
        .unwrap_or(DEFAULT_GEN_SIZE);

    let mut gen = quickcheck::Gen::new(gen_size);

    // sample all inputs
    for _ in 0..num_tests {
        let input = A::arbitrary(&mut gen);
        let input_c = input.clone();
        let success = f(input_c);
        if !success {
            shrink_failure(f, input)
        }
    }
}

fn shrink_failure<A: Arbitrary + Debug + PartialEq, F: Fn(A) -> bool>(f: F, input: A) -> ! {
    for i in input.shrink() {
        let i_c = i.clone();
        let success = f(i_c);
        if !success {
            shrink_failure(f, i)
        }
    }
    // if we reach this point, then all shrunken inputs work. Therefore, `input` is the minimal
    // input
    panic!(
        "[QUICKCHECK] Test case failed!\n  Minimal input:\n    {:?}",
        input
    );
}

macro_rules! qc {
    ($name:ident, $f:ident) => {
        #[test]
        fn $name() {
            proptest_runner($f)
        }
    };
}

/// A prefix drawn from a small IPv4 universe (at most 10 significant bits),
/// so that random sequences collide and nest often.
#[derive(Clone, Copy, PartialEq, Eq)]
struct TestPrefix(u32, u8);

impl TestPrefix {
    fn text(self) -> String {
        format!("{}/{}", Ipv4Addr::from(self.0), self.1)
    }

    fn address_text(self) -> String {
        Ipv4Addr::from(self.0).to_string()
    }
}

impl Debug for TestPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

impl Arbitrary for TestPrefix {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        #[rustfmt::skip]
        let len: u8 = *g
            .choose(&[
                0,
                1, 1,
                2, 2, 2,
                3, 3, 3, 3,
                4, 4, 4, 4, 4,
                5, 5, 5, 5, 5, 5,
                6, 6, 6, 6, 6, 6, 6,
                7, 7, 7, 7, 7, 7, 7, 7,
                8, 8, 8, 8, 8, 8, 8, 8, 8,
                9, 9, 9, 9, 9, 9, 9, 9, 9, 9,
                10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10,
            ])
            .unwrap();
        let x = u32::arbitrary(g);
        Self(crate::bits::mask_to_len(x, len), len)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        if self.1 == 0 {
            quickcheck::empty_shrinker()
        } else {
            let len = self.1 - 1;
            quickcheck::single_shrinker(Self(crate::bits::mask_to_len(self.0, len), len))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add(TestPrefix, u8),
    Delete(TestPrefix),
    Flush(u8),
    FlushSubtree(TestPrefix, u8),
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let p = TestPrefix::arbitrary(g);
        match g.choose(&[0u8, 0, 0, 0, 0, 0, 0, 1, 1, 2]).copied().unwrap_or(0) {
            0 => Op::Add(p, u8::arbitrary(g)),
            1 => Op::Delete(p),
            _ => {
                if bool::arbitrary(g) {
                    Op::Flush(u8::arbitrary(g))
                } else {
                    Op::FlushSubtree(p, u8::arbitrary(g))
                }
            }
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match *self {
            Op::Add(p, t) => Box::new(p.shrink().map(move |p| Op::Add(p, t))),
            Op::Delete(p) => Box::new(p.shrink().map(Op::Delete)),
            Op::Flush(_) => quickcheck::empty_shrinker(),
            Op::FlushSubtree(p, t) => Box::new(p.shrink().map(move |p| Op::FlushSubtree(p, t))),
        }
    }
}

fn attrs_for(tag: u8) -> Attrs {
    match tag % 3 {
        0 => attrs! { proto = "bgp" },
        1 => attrs! { proto = "ospf" },
        _ => attrs! { proto = "static" },
    }
}

/// The observable content of a route list, comparable across trees.
fn contents(routes: &[Route]) -> Vec<(String, Attrs)> {
    routes
        .iter()
        .map(|r| (r.prefix().to_string(), r.attrs().clone()))
        .collect()
}

/// Apply `ops` to both trees in lockstep. Returns `None` as soon as the two
/// disagree on an operation outcome.
fn apply(ops: &[Op]) -> Option<(IpPrefixTree, IpRadixTree)> {
    let mut bit_tree = IpPrefixTree::new(Family::Ipv4);
    let mut radix = IpRadixTree::new(Family::Ipv4);
    for op in ops {
        match *op {
            Op::Add(p, tag) => {
                bit_tree.add(&p.text(), attrs_for(tag)).unwrap();
                radix.add(&p.text(), attrs_for(tag)).unwrap();
            }
            Op::Delete(p) => {
                let a = bit_tree.delete(&p.text(), &Attrs::new());
                let b = radix.delete(&p.text(), &Attrs::new());
                match (a, b) {
                    (Ok(a), Ok(b)) if contents(&a) == contents(&b) => {}
                    (Err(a), Err(b)) if a == b => {}
                    _ => return None,
                }
            }
            Op::Flush(tag) => {
                if bit_tree.flush(&attrs_for(tag)) != radix.flush(&attrs_for(tag)) {
                    return None;
                }
            }
            Op::FlushSubtree(p, tag) => {
                let a = bit_tree.flush_subtree(&p.text(), &attrs_for(tag)).unwrap();
                let b = radix.flush_subtree(&p.text(), &attrs_for(tag)).unwrap();
                if a != b {
                    return None;
                }
            }
        }
    }
    Some((bit_tree, radix))
}

fn probes(ops: &[Op]) -> Vec<String> {
    let mut probes = Vec::new();
    for op in ops {
        if let Op::Add(p, _) | Op::Delete(p) | Op::FlushSubtree(p, _) = op {
            probes.push(p.text());
            probes.push(p.address_text());
        }
    }
    probes
}

qc!(equivalence, _equivalence);
fn _equivalence(ops: Vec<Op>) -> bool {
    let Some((bit_tree, radix)) = apply(&ops) else {
        return false;
    };
    if bit_tree.len() != radix.len() {
        return false;
    }
    if contents(&bit_tree.show(&Attrs::new())) != contents(&radix.show(&Attrs::new())) {
        return false;
    }
    if contents(&bit_tree.routes()) != contents(&radix.routes()) {
        return false;
    }
    probes(&ops).iter().all(|p| {
        contents(&bit_tree.get(p, &Attrs::new()).unwrap())
            == contents(&radix.get(p, &Attrs::new()).unwrap())
            && contents(&bit_tree.cover(p, &Attrs::new()).unwrap())
                == contents(&radix.cover(p, &Attrs::new()).unwrap())
            && bit_tree.contains(p).unwrap() == radix.contains(p).unwrap()
    })
}

qc!(equivalent_neighborhoods, _equivalent_neighborhoods);
fn _equivalent_neighborhoods(ops: Vec<Op>) -> bool {
    let Some((bit_tree, radix)) = apply(&ops) else {
        return false;
    };
    probes(&ops).iter().all(|p| {
        contents(&bit_tree.show_exact(p, &Attrs::new()).unwrap())
            == contents(&radix.show_exact(p, &Attrs::new()).unwrap())
            && contents(&bit_tree.show_subtree(p, &Attrs::new()).unwrap())
                == contents(&radix.show_subtree(p, &Attrs::new()).unwrap())
            && contents(&bit_tree.children(p, &Attrs::new()).unwrap())
                == contents(&radix.children(p, &Attrs::new()).unwrap())
            && contents(&bit_tree.parent(p, &Attrs::new()).unwrap())
                == contents(&radix.parent(p, &Attrs::new()).unwrap())
    })
}

qc!(invariants_hold, _invariants_hold);
fn _invariants_hold(ops: Vec<Op>) -> bool {
    let Some((bit_tree, radix)) = apply(&ops) else {
        return false;
    };

    // the binary tree keeps no dead chains
    fn subtree_has_routes(node: &crate::prefix_tree::Node) -> bool {
        !node.routes.is_empty() || node.children.iter().flatten().any(|c| subtree_has_routes(c))
    }
    fn bit_tree_pruned(node: &crate::prefix_tree::Node) -> bool {
        node.children
            .iter()
            .flatten()
            .all(|c| subtree_has_routes(c) && bit_tree_pruned(c))
    }

    // the radix tree stays compressed: no routeless node with fewer than two
    // children (root excepted)
    fn compressed(node: &crate::radix_tree::Node) -> bool {
        (!node.routes.is_empty() || node.children.iter().flatten().count() == 2)
            && node.children.iter().flatten().all(|c| compressed(c))
    }

    bit_tree_pruned(&bit_tree.root)
        && radix.root.children.iter().flatten().all(|c| compressed(c))
        && bit_tree.len() == bit_tree.show(&Attrs::new()).len()
        && radix.len() == radix.show(&Attrs::new()).len()
}

qc!(delete_reverts_add, _delete_reverts_add);
fn _delete_reverts_add((ops, p): (Vec<Op>, TestPrefix)) -> bool {
    let Some((mut bit_tree, mut radix)) = apply(&ops) else {
        return false;
    };
    if !bit_tree.show_exact(&p.text(), &Attrs::new()).unwrap().is_empty() {
        return true;
    }
    let bit_before = format!("{bit_tree:?}");
    let radix_before = format!("{radix:?}");
    bit_tree.add(&p.text(), attrs_for(0)).unwrap();
    radix.add(&p.text(), attrs_for(0)).unwrap();
    bit_tree.delete(&p.text(), &Attrs::new()).unwrap();
    radix.delete(&p.text(), &Attrs::new()).unwrap();
    format!("{bit_tree:?}") == bit_before && format!("{radix:?}") == radix_before
}
