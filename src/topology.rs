//! Ring/chain classification of bonds and atoms.
//!
//! A bond is part of a ring exactly when removing it does not split its
//! component. Classification therefore builds a scratch graph, deletes the
//! bond in a copy, and compares component counts — O(V + E) per bond,
//! which is comfortably fast at drawing sizes and trivially correct.

use std::collections::HashMap;

use petgraph::algo::connected_components;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::index::{AtomId, BondId};
use crate::mol::Molecule;

/// Ring/chain classification of an atom or bond.
///
/// `Undefined` is the state of parts created since the last topology pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    #[default]
    Undefined,
    Chain,
    Ring,
}

/// One fused-ring component: a connected component of the subgraph induced
/// by Ring-tagged bonds. Rings sharing an atom (spiro) or a bond (fused)
/// land in the same system; rings joined by a chain bond do not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingSystem {
    /// Member atoms in insertion order.
    pub atoms: Vec<AtomId>,
    /// Member bonds in insertion order.
    pub bonds: Vec<BondId>,
}

struct Scratch {
    graph: UnGraph<AtomId, BondId>,
    nodes: HashMap<AtomId, NodeIndex>,
    edges: HashMap<BondId, EdgeIndex>,
}

fn scratch_graph(mol: &Molecule) -> Scratch {
    let mut graph = UnGraph::default();
    let mut nodes = HashMap::new();
    let mut edges = HashMap::new();
    for id in mol.atoms() {
        nodes.insert(id, graph.add_node(id));
    }
    for id in mol.bonds() {
        let Some(bond) = mol.bond(id) else { continue };
        if let (Some(&a), Some(&b)) = (nodes.get(&bond.atoms.0), nodes.get(&bond.atoms.1)) {
            edges.insert(id, graph.add_edge(a, b, id));
        }
    }
    Scratch { graph, nodes, edges }
}

fn classify(scratch: &Scratch, bond: BondId, components_before: usize) -> Topology {
    let Some(&edge) = scratch.edges.get(&bond) else {
        return Topology::Undefined;
    };
    let mut copy = scratch.graph.clone();
    copy.remove_edge(edge);
    if connected_components(&copy) == components_before {
        Topology::Ring
    } else {
        Topology::Chain
    }
}

/// Classify a single bond without touching stored tags.
///
/// A dead handle comes back as `Undefined`.
pub fn bond_topology(mol: &Molecule, bond: BondId) -> Topology {
    let Some(b) = mol.bond(bond) else {
        return Topology::Undefined;
    };
    // a bond ending at a leaf can never close a cycle
    if mol.degree(b.atoms.0) <= 1 || mol.degree(b.atoms.1) <= 1 {
        return Topology::Chain;
    }
    let scratch = scratch_graph(mol);
    let before = connected_components(&scratch.graph);
    classify(&scratch, bond, before)
}

/// Recompute every topology tag and the ring-system list.
pub fn update_topology(mol: &mut Molecule) {
    let scratch = scratch_graph(mol);
    let before = connected_components(&scratch.graph);

    let bonds: Vec<BondId> = mol.bonds().collect();
    let mut ring_bonds: Vec<BondId> = Vec::new();
    for id in bonds {
        let Some(bond) = mol.bond(id) else { continue };
        let topo = if mol.degree(bond.atoms.0) <= 1 || mol.degree(bond.atoms.1) <= 1 {
            Topology::Chain
        } else {
            classify(&scratch, id, before)
        };
        if topo == Topology::Ring {
            ring_bonds.push(id);
        }
        if let Some(bond) = mol.bond_mut(id) {
            bond.topology = topo;
        }
    }

    let atoms: Vec<AtomId> = mol.atoms().collect();
    for id in atoms {
        let in_ring = mol
            .neighbors(id)
            .iter()
            .any(|n| mol.bond(n.bond).map_or(false, |b| b.topology == Topology::Ring));
        if let Some(atom) = mol.atom_mut(id) {
            atom.topology = if in_ring { Topology::Ring } else { Topology::Chain };
        }
    }

    mol.set_ring_systems(collect_ring_systems(mol, &scratch, &ring_bonds));
}

// Union endpoints across every ring bond; components of that relation are
// the ring systems. Sharing a node is enough to merge, which is what makes
// spiro rings one system.
fn collect_ring_systems(
    mol: &Molecule,
    scratch: &Scratch,
    ring_bonds: &[BondId],
) -> Vec<RingSystem> {
    let mut uf = UnionFind::<usize>::new(scratch.graph.node_count());
    for &id in ring_bonds {
        let Some(bond) = mol.bond(id) else { continue };
        if let (Some(&a), Some(&b)) = (
            scratch.nodes.get(&bond.atoms.0),
            scratch.nodes.get(&bond.atoms.1),
        ) {
            uf.union(a.index(), b.index());
        }
    }

    let mut systems: Vec<RingSystem> = Vec::new();
    let mut root_to_system: HashMap<usize, usize> = HashMap::new();
    for id in mol.atoms() {
        let ring_atom = mol
            .atom(id)
            .map_or(false, |a| a.topology == Topology::Ring);
        if !ring_atom {
            continue;
        }
        let Some(&node) = scratch.nodes.get(&id) else { continue };
        let root = uf.find(node.index());
        let sys = *root_to_system.entry(root).or_insert_with(|| {
            systems.push(RingSystem::default());
            systems.len() - 1
        });
        systems[sys].atoms.push(id);
    }
    for &id in ring_bonds {
        let Some(bond) = mol.bond(id) else { continue };
        let Some(&node) = scratch.nodes.get(&bond.atoms.0) else { continue };
        let root = uf.find(node.index());
        if let Some(&sys) = root_to_system.get(&root) {
            systems[sys].bonds.push(id);
        }
    }
    systems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomLabel;
    use crate::bond::BondKind;
    use glam::DVec2;

    fn chain_of(mol: &mut Molecule, n: usize) -> Vec<AtomId> {
        let atoms: Vec<AtomId> = (0..n)
            .map(|i| mol.add_atom(DVec2::new(i as f64 * 40.0, 0.0), AtomLabel::default()))
            .collect();
        for w in atoms.windows(2) {
            mol.bind(w[0], w[1], BondKind::Single);
        }
        atoms
    }

    fn cycle_of(mol: &mut Molecule, n: usize) -> Vec<AtomId> {
        let atoms = chain_of(mol, n);
        mol.bind(atoms[n - 1], atoms[0], BondKind::Single);
        atoms
    }

    #[test]
    fn path_graph_is_all_chain() {
        let mut mol = Molecule::new();
        let atoms = chain_of(&mut mol, 4);
        update_topology(&mut mol);
        for id in mol.bonds() {
            assert_eq!(mol.bond(id).unwrap().topology, Topology::Chain);
        }
        for &id in &atoms {
            assert_eq!(mol.atom(id).unwrap().topology, Topology::Chain);
        }
        assert!(mol.ring_systems().is_empty());
    }

    #[test]
    fn cycle_is_all_ring_with_one_system() {
        let mut mol = Molecule::new();
        let atoms = cycle_of(&mut mol, 6);
        update_topology(&mut mol);
        for id in mol.bonds() {
            assert_eq!(mol.bond(id).unwrap().topology, Topology::Ring);
        }
        for &id in &atoms {
            assert_eq!(mol.atom(id).unwrap().topology, Topology::Ring);
        }
        assert_eq!(mol.ring_systems().len(), 1);
        assert_eq!(mol.ring_systems()[0].atoms.len(), 6);
        assert_eq!(mol.ring_systems()[0].bonds.len(), 6);
    }

    #[test]
    fn tail_on_ring_stays_chain() {
        let mut mol = Molecule::new();
        let ring = cycle_of(&mut mol, 5);
        let tail = mol.add_atom(DVec2::new(200.0, 0.0), AtomLabel::default());
        let tail_bond = mol.bind(ring[0], tail, BondKind::Single).unwrap();
        update_topology(&mut mol);

        assert_eq!(mol.bond(tail_bond).unwrap().topology, Topology::Chain);
        assert_eq!(mol.atom(tail).unwrap().topology, Topology::Chain);
        assert_eq!(mol.atom(ring[0]).unwrap().topology, Topology::Ring);
        assert_eq!(mol.ring_systems().len(), 1);
        assert_eq!(mol.ring_systems()[0].atoms.len(), 5);
    }

    #[test]
    fn fused_rings_are_one_system() {
        let mut mol = Molecule::new();
        // two four-cycles sharing the bond a-b
        let a = mol.add_atom(DVec2::new(0.0, 0.0), AtomLabel::default());
        let b = mol.add_atom(DVec2::new(40.0, 0.0), AtomLabel::default());
        let c = mol.add_atom(DVec2::new(40.0, 40.0), AtomLabel::default());
        let d = mol.add_atom(DVec2::new(0.0, 40.0), AtomLabel::default());
        let e = mol.add_atom(DVec2::new(40.0, -40.0), AtomLabel::default());
        let f = mol.add_atom(DVec2::new(0.0, -40.0), AtomLabel::default());
        let shared = mol.bind(a, b, BondKind::Single).unwrap();
        mol.bind(b, c, BondKind::Single);
        mol.bind(c, d, BondKind::Single);
        mol.bind(d, a, BondKind::Single);
        mol.bind(b, e, BondKind::Single);
        mol.bind(e, f, BondKind::Single);
        mol.bind(f, a, BondKind::Single);
        update_topology(&mut mol);

        assert_eq!(mol.bond(shared).unwrap().topology, Topology::Ring);
        assert_eq!(mol.ring_systems().len(), 1);
        assert_eq!(mol.ring_systems()[0].atoms.len(), 6);
        assert_eq!(mol.ring_systems()[0].bonds.len(), 7);
    }

    #[test]
    fn spiro_rings_are_one_system() {
        let mut mol = Molecule::new();
        // two triangles sharing only the atom a
        let a = mol.add_atom(DVec2::new(0.0, 0.0), AtomLabel::default());
        let b = mol.add_atom(DVec2::new(40.0, 20.0), AtomLabel::default());
        let c = mol.add_atom(DVec2::new(40.0, -20.0), AtomLabel::default());
        let d = mol.add_atom(DVec2::new(-40.0, 20.0), AtomLabel::default());
        let e = mol.add_atom(DVec2::new(-40.0, -20.0), AtomLabel::default());
        for (x, y) in [(a, b), (b, c), (c, a), (a, d), (d, e), (e, a)] {
            mol.bind(x, y, BondKind::Single);
        }
        update_topology(&mut mol);
        assert_eq!(mol.ring_systems().len(), 1);
        assert_eq!(mol.ring_systems()[0].atoms.len(), 5);
        assert_eq!(mol.ring_systems()[0].bonds.len(), 6);
    }

    #[test]
    fn rings_joined_by_chain_bond_are_two_systems() {
        let mut mol = Molecule::new();
        let ring_a = cycle_of(&mut mol, 3);
        let ring_b = cycle_of(&mut mol, 3);
        let link = mol.bind(ring_a[0], ring_b[0], BondKind::Single).unwrap();
        update_topology(&mut mol);

        assert_eq!(mol.bond(link).unwrap().topology, Topology::Chain);
        assert_eq!(mol.ring_systems().len(), 2);
        assert_eq!(mol.ring_systems()[0].atoms.len(), 3);
        assert_eq!(mol.ring_systems()[1].atoms.len(), 3);
    }

    #[test]
    fn isolated_atom_is_chain() {
        let mut mol = Molecule::new();
        let lone = mol.add_atom(DVec2::ZERO, AtomLabel::default());
        update_topology(&mut mol);
        assert_eq!(mol.atom(lone).unwrap().topology, Topology::Chain);
        assert!(mol.ring_systems().is_empty());
    }

    #[test]
    fn single_query_agrees_with_full_pass() {
        let mut mol = Molecule::new();
        let ring = cycle_of(&mut mol, 4);
        let tail = mol.add_atom(DVec2::new(300.0, 0.0), AtomLabel::default());
        let tail_bond = mol.bind(ring[1], tail, BondKind::Single).unwrap();

        let queried: Vec<Topology> = mol.bonds().map(|b| bond_topology(&mol, b)).collect();
        update_topology(&mut mol);
        let stored: Vec<Topology> = mol
            .bonds()
            .map(|b| mol.bond(b).unwrap().topology)
            .collect();
        assert_eq!(queried, stored);
        assert_eq!(bond_topology(&mol, tail_bond), Topology::Chain);
    }

    #[test]
    fn dead_bond_is_undefined() {
        let mut mol = Molecule::new();
        let a = mol.add_atom(DVec2::ZERO, AtomLabel::default());
        let b = mol.add_atom(DVec2::new(40.0, 0.0), AtomLabel::default());
        let bond = mol.bind(a, b, BondKind::Single).unwrap();
        mol.delete_bond(bond, false);
        assert_eq!(bond_topology(&mol, bond), Topology::Undefined);
    }
}
