use std::collections::{HashSet, VecDeque};
use std::fmt;

use glam::DVec2;

use crate::atom::{Atom, AtomLabel, Neighbor};
use crate::bond::{Bond, BondKind, BondOrientation};
use crate::index::{AtomId, BondId};
use crate::topology::RingSystem;

/// Drawing-scale bond length used when a molecule has no bonds to average.
pub const DEFAULT_BOND_LENGTH: f64 = 40.0;

#[derive(Debug, Clone, PartialEq)]
struct Slot<T> {
    generation: u32,
    occupant: Option<T>,
}

/// An inventory of graph parts produced by a growth operation: the created
/// atoms and bonds, plus any pre-existing atoms the operation repositioned.
///
/// An empty fragment is how an operation reports an unsatisfied
/// precondition; callers check [`Fragment::is_empty`] before treating the
/// operation as applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub atoms: Vec<AtomId>,
    pub bonds: Vec<BondId>,
    pub moved: Vec<MovedAtom>,
}

/// A repositioning record: `atom` went from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovedAtom {
    pub atom: AtomId,
    pub from: DVec2,
    pub to: DVec2,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty() && self.bonds.is_empty() && self.moved.is_empty()
    }

    pub fn merge(&mut self, other: Fragment) {
        self.atoms.extend(other.atoms);
        self.bonds.extend(other.bonds);
        self.moved.extend(other.moved);
    }
}

/// A sub-graph removed from a [`Molecule`], owned by the caller.
///
/// Each part is stored with the position it occupied at the moment of its
/// removal — the insertion-order slot, and for bonds also the slot its
/// record held in each endpoint's neighbor list. [`Molecule::attach`]
/// replays the removals backwards, re-inserting at the recorded positions,
/// so a detach/attach round trip restores the exact original iteration and
/// adjacency order. While detached, the ids stay reserved in the arena and
/// come back under the same identities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detached {
    pub(crate) atoms: Vec<(AtomId, Atom, usize)>,
    pub(crate) bonds: Vec<(BondId, Bond, usize, [usize; 2])>,
}

impl Detached {
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty() && self.bonds.is_empty()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn atom_ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.atoms.iter().map(|(id, _, _)| *id)
    }

    pub fn bond_ids(&self) -> impl Iterator<Item = BondId> + '_ {
        self.bonds.iter().map(|(id, _, _, _)| *id)
    }
}

/// The editable molecular graph.
///
/// Atoms and bonds live in slot arenas addressed by generational handles;
/// separate vectors keep the live ids in insertion order for deterministic
/// iteration. Removal comes in two flavors: *detaching* (the undoable kind,
/// which leaves the slot reserved so the parts can come back under the same
/// ids) and *discarding* a previously detached sub-graph (which frees the
/// slots for reuse under a bumped generation).
///
/// Derived state — implicit hydrogen counts — is refreshed eagerly by every
/// mutation that can affect it. Topology tags and double-bond orientations
/// are refreshed by explicit passes (see [`update_topology`] and
/// [`update_orientation`]), which the action layer triggers as needed.
///
/// [`update_topology`]: crate::topology::update_topology
/// [`update_orientation`]: crate::orientation::update_orientation
#[derive(Clone, Default)]
pub struct Molecule {
    atoms: Vec<Slot<Atom>>,
    bonds: Vec<Slot<Bond>>,
    atom_order: Vec<AtomId>,
    bond_order: Vec<BondId>,
    free_atoms: Vec<u32>,
    free_bonds: Vec<u32>,
    ring_systems: Vec<RingSystem>,
}

impl Molecule {
    pub fn new() -> Molecule {
        Molecule::default()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        let slot = self.atoms.get(id.slot())?;
        if slot.generation == id.generation() {
            slot.occupant.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        let slot = self.atoms.get_mut(id.slot())?;
        if slot.generation == id.generation() {
            slot.occupant.as_mut()
        } else {
            None
        }
    }

    pub fn bond(&self, id: BondId) -> Option<&Bond> {
        let slot = self.bonds.get(id.slot())?;
        if slot.generation == id.generation() {
            slot.occupant.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn bond_mut(&mut self, id: BondId) -> Option<&mut Bond> {
        let slot = self.bonds.get_mut(id.slot())?;
        if slot.generation == id.generation() {
            slot.occupant.as_mut()
        } else {
            None
        }
    }

    pub fn contains_atom(&self, id: AtomId) -> bool {
        self.atom(id).is_some()
    }

    pub fn contains_bond(&self, id: BondId) -> bool {
        self.bond(id).is_some()
    }

    pub fn atom_count(&self) -> usize {
        self.atom_order.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bond_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atom_order.is_empty()
    }

    /// Live atom ids in insertion order.
    pub fn atoms(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.atom_order.iter().copied()
    }

    /// Live bond ids in insertion order.
    pub fn bonds(&self) -> impl Iterator<Item = BondId> + '_ {
        self.bond_order.iter().copied()
    }

    /// Adjacency records of `id`; empty for a dead handle.
    pub fn neighbors(&self, id: AtomId) -> &[Neighbor] {
        self.atom(id).map_or(&[], |a| a.neighbors())
    }

    pub fn degree(&self, id: AtomId) -> usize {
        self.atom(id).map_or(0, |a| a.degree())
    }

    pub fn bond_between(&self, a: AtomId, b: AtomId) -> Option<BondId> {
        self.atom(a)?
            .neighbors()
            .iter()
            .find(|n| n.atom == b)
            .map(|n| n.bond)
    }

    /// Ring systems from the last topology pass.
    pub fn ring_systems(&self) -> &[RingSystem] {
        &self.ring_systems
    }

    pub(crate) fn set_ring_systems(&mut self, systems: Vec<RingSystem>) {
        self.ring_systems = systems;
    }

    /// Mean distance between bonded atoms, or [`DEFAULT_BOND_LENGTH`] when
    /// there is nothing to average. Placement uses this so that grown atoms
    /// match the scale the user has been drawing at.
    pub fn average_bond_length(&self) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for id in self.bonds() {
            let Some(bond) = self.bond(id) else { continue };
            let (Some(a), Some(b)) = (self.atom(bond.atoms.0), self.atom(bond.atoms.1)) else {
                continue;
            };
            total += a.pos.distance(b.pos);
            count += 1;
        }
        if count == 0 {
            DEFAULT_BOND_LENGTH
        } else {
            total / count as f64
        }
    }

    pub fn add_atom(&mut self, pos: DVec2, label: AtomLabel) -> AtomId {
        let id = match self.free_atoms.pop() {
            Some(slot) => AtomId::new(slot, self.atoms[slot as usize].generation),
            None => {
                self.atoms.push(Slot {
                    generation: 0,
                    occupant: None,
                });
                AtomId::new((self.atoms.len() - 1) as u32, 0)
            }
        };
        self.atoms[id.slot()].occupant = Some(Atom::new(pos, label));
        self.atom_order.push(id);
        id
    }

    /// Create a bond between two live atoms.
    ///
    /// Returns `None` without touching the graph if the atoms coincide,
    /// either handle is dead, or the pair is already bonded.
    pub fn bind(&mut self, a: AtomId, b: AtomId, kind: BondKind) -> Option<BondId> {
        if a == b
            || !self.contains_atom(a)
            || !self.contains_atom(b)
            || self.bond_between(a, b).is_some()
        {
            return None;
        }
        let id = match self.free_bonds.pop() {
            Some(slot) => BondId::new(slot, self.bonds[slot as usize].generation),
            None => {
                self.bonds.push(Slot {
                    generation: 0,
                    occupant: None,
                });
                BondId::new((self.bonds.len() - 1) as u32, 0)
            }
        };
        self.bonds[id.slot()].occupant = Some(Bond::new(a, b, kind));
        self.bond_order.push(id);
        self.link_neighbors(id, a, b, kind.order());
        Some(id)
    }

    /// Detach one bond. With `drop_dangling`, endpoints left neighborless
    /// are detached too. A dead handle yields an empty result.
    pub fn delete_bond(&mut self, id: BondId, drop_dangling: bool) -> Detached {
        let mut det = Detached::default();
        let Some(bond) = self.bond(id) else { return det };
        let (a, b) = bond.atoms;
        self.detach_bond_inner(id, &mut det);
        if drop_dangling {
            for endpoint in [a, b] {
                if self.contains_atom(endpoint) && self.degree(endpoint) == 0 {
                    self.detach_atom_inner(endpoint, &mut det);
                }
            }
        }
        det
    }

    /// Detach one atom and, in cascade, every incident bond.
    pub fn delete_atom(&mut self, id: AtomId) -> Detached {
        let mut det = Detached::default();
        if !self.contains_atom(id) {
            return det;
        }
        let incident: Vec<BondId> = self.neighbors(id).iter().map(|n| n.bond).collect();
        for bond in incident {
            self.detach_bond_inner(bond, &mut det);
        }
        self.detach_atom_inner(id, &mut det);
        det
    }

    /// Bulk removal by identity. Ids not present are silently skipped, so
    /// replaying a removal is safe. Bonds incident to a listed atom are
    /// detached even when not listed themselves.
    pub fn detach(&mut self, frag: &Fragment) -> Detached {
        let mut det = Detached::default();
        for &bond in &frag.bonds {
            if self.contains_bond(bond) {
                self.detach_bond_inner(bond, &mut det);
            }
        }
        for &atom in &frag.atoms {
            if !self.contains_atom(atom) {
                continue;
            }
            let incident: Vec<BondId> = self.neighbors(atom).iter().map(|n| n.bond).collect();
            for bond in incident {
                self.detach_bond_inner(bond, &mut det);
            }
            self.detach_atom_inner(atom, &mut det);
        }
        det
    }

    /// Merge a detached sub-graph back, restoring ids and insertion-order
    /// positions. Parts whose id is already live (or whose slot has been
    /// discarded since) are silently skipped, so replaying is safe.
    pub fn attach(&mut self, det: Detached) {
        let Detached { atoms, bonds } = det;
        for (id, atom, pos) in atoms.into_iter().rev() {
            let fits = self
                .atoms
                .get(id.slot())
                .map_or(false, |s| s.generation == id.generation() && s.occupant.is_none());
            if !fits {
                continue;
            }
            self.atoms[id.slot()].occupant = Some(atom);
            let at = pos.min(self.atom_order.len());
            self.atom_order.insert(at, id);
        }
        for (id, bond, pos, ends) in bonds.into_iter().rev() {
            let fits = self
                .bonds
                .get(id.slot())
                .map_or(false, |s| s.generation == id.generation() && s.occupant.is_none());
            let (a, b) = bond.atoms;
            if !fits || !self.contains_atom(a) || !self.contains_atom(b) {
                continue;
            }
            let order = bond.kind.order();
            self.bonds[id.slot()].occupant = Some(bond);
            let at = pos.min(self.bond_order.len());
            self.bond_order.insert(at, id);
            self.insert_neighbor(a, ends[0], Neighbor { atom: b, bond: id, order });
            self.insert_neighbor(b, ends[1], Neighbor { atom: a, bond: id, order });
        }
    }

    /// Free the slots of a detached sub-graph for reuse. The generation
    /// bump makes every outstanding handle to these parts stale. Called
    /// when undo history owning the parts is discarded.
    pub fn discard(&mut self, det: Detached) {
        for (id, _, _) in det.atoms {
            if let Some(slot) = self.atoms.get_mut(id.slot()) {
                if slot.generation == id.generation() && slot.occupant.is_none() {
                    slot.generation = slot.generation.wrapping_add(1);
                    self.free_atoms.push(id.slot() as u32);
                }
            }
        }
        for (id, _, _, _) in det.bonds {
            if let Some(slot) = self.bonds.get_mut(id.slot()) {
                if slot.generation == id.generation() && slot.occupant.is_none() {
                    slot.generation = slot.generation.wrapping_add(1);
                    self.free_bonds.push(id.slot() as u32);
                }
            }
        }
    }

    /// Connected components, one id list per component, discovered in
    /// insertion order.
    pub fn components(&self) -> Vec<Vec<AtomId>> {
        let mut seen: HashSet<AtomId> = HashSet::new();
        let mut out = Vec::new();
        for start in self.atoms() {
            if seen.contains(&start) {
                continue;
            }
            let comp = self.reachable(start, None, None);
            seen.extend(comp.iter().copied());
            out.push(comp);
        }
        out
    }

    /// Atoms reachable from `start` by BFS, optionally refusing to cross
    /// one bond or enter one atom.
    pub(crate) fn reachable(
        &self,
        start: AtomId,
        skip_bond: Option<BondId>,
        skip_atom: Option<AtomId>,
    ) -> Vec<AtomId> {
        let mut out = Vec::new();
        if !self.contains_atom(start) || Some(start) == skip_atom {
            return out;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back(start);
        while let Some(id) = queue.pop_front() {
            out.push(id);
            for n in self.neighbors(id) {
                if Some(n.bond) == skip_bond || Some(n.atom) == skip_atom || seen.contains(&n.atom)
                {
                    continue;
                }
                seen.insert(n.atom);
                queue.push_back(n.atom);
            }
        }
        out
    }

    pub fn set_label(&mut self, id: AtomId, label: AtomLabel) {
        if let Some(atom) = self.atom_mut(id) {
            atom.label = label;
            atom.refresh_hydrogens();
        }
    }

    pub fn set_charge(&mut self, id: AtomId, charge: i8) {
        if let Some(atom) = self.atom_mut(id) {
            atom.charge = charge;
            atom.refresh_hydrogens();
        }
    }

    pub fn set_isotope(&mut self, id: AtomId, isotope: Option<u16>) {
        if let Some(atom) = self.atom_mut(id) {
            atom.isotope = isotope;
        }
    }

    pub fn set_position(&mut self, id: AtomId, pos: DVec2) {
        if let Some(atom) = self.atom_mut(id) {
            atom.pos = pos;
        }
    }

    /// Change a bond's shape, propagating the order into both endpoints'
    /// adjacency records and hydrogen counts. Leaving the plain double
    /// shape clears the resolved orientation.
    pub fn set_kind(&mut self, id: BondId, kind: BondKind) {
        let Some((old_kind, (a, b))) = self.bond(id).map(|bond| (bond.kind, bond.atoms)) else {
            return;
        };
        if let Some(bond) = self.bond_mut(id) {
            bond.kind = kind;
            if kind != BondKind::Double {
                bond.orientation = None;
            }
        }
        if old_kind.order() != kind.order() {
            let order = kind.order();
            for endpoint in [a, b] {
                if let Some(atom) = self.atom_mut(endpoint) {
                    if let Some(entry) = atom.neighbors.iter_mut().find(|n| n.bond == id) {
                        entry.order = order;
                    }
                    atom.refresh_hydrogens();
                }
            }
        }
    }

    /// Store a resolved orientation. Only plain double bonds carry one;
    /// for any other shape the stored value is forced to `None`.
    pub fn set_orientation(&mut self, id: BondId, orientation: Option<BondOrientation>) {
        if let Some(bond) = self.bond_mut(id) {
            bond.orientation = if bond.kind == BondKind::Double {
                orientation
            } else {
                None
            };
        }
    }

    /// Consistency diagnostics; empty on a healthy molecule. Exercised by
    /// the test suites after every compound operation.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for &id in &self.atom_order {
            if self.atom(id).is_none() {
                issues.push(format!("atom order lists dead handle {:?}", id));
            }
        }
        for &id in &self.bond_order {
            if self.bond(id).is_none() {
                issues.push(format!("bond order lists dead handle {:?}", id));
            }
        }
        let live_atoms = self.atoms.iter().filter(|s| s.occupant.is_some()).count();
        if live_atoms != self.atom_order.len() {
            issues.push(format!(
                "{} occupied atom slots but {} ordered atoms",
                live_atoms,
                self.atom_order.len()
            ));
        }
        let live_bonds = self.bonds.iter().filter(|s| s.occupant.is_some()).count();
        if live_bonds != self.bond_order.len() {
            issues.push(format!(
                "{} occupied bond slots but {} ordered bonds",
                live_bonds,
                self.bond_order.len()
            ));
        }

        for &id in &self.bond_order {
            let Some(bond) = self.bond(id) else { continue };
            let (a, b) = bond.atoms;
            if a == b {
                issues.push(format!("bond {:?} is a self loop", id));
            }
            for endpoint in [a, b] {
                match self.atom(endpoint) {
                    None => issues.push(format!("bond {:?} endpoint {:?} is dead", id, endpoint)),
                    Some(atom) => match atom.neighbors().iter().find(|n| n.bond == id) {
                        None => issues.push(format!(
                            "bond {:?} missing from adjacency of {:?}",
                            id, endpoint
                        )),
                        Some(entry) => {
                            if entry.order != bond.kind.order() {
                                issues.push(format!(
                                    "adjacency order for bond {:?} at {:?} is {} not {}",
                                    id,
                                    endpoint,
                                    entry.order,
                                    bond.kind.order()
                                ));
                            }
                            if Some(entry.atom) != bond.other(endpoint) {
                                issues.push(format!(
                                    "adjacency partner for bond {:?} at {:?} is wrong",
                                    id, endpoint
                                ));
                            }
                        }
                    },
                }
            }
            if bond.orientation.is_some() && bond.kind != BondKind::Double {
                issues.push(format!(
                    "bond {:?} of kind {:?} carries an orientation",
                    id, bond.kind
                ));
            }
        }

        for &id in &self.atom_order {
            let Some(atom) = self.atom(id) else { continue };
            for n in atom.neighbors() {
                match self.bond(n.bond) {
                    None => issues.push(format!(
                        "atom {:?} adjacency lists dead bond {:?}",
                        id, n.bond
                    )),
                    Some(bond) => {
                        if !bond.connects(id, n.atom) {
                            issues.push(format!(
                                "atom {:?} adjacency disagrees with bond {:?}",
                                id, n.bond
                            ));
                        }
                    }
                }
            }
            let mut partners: Vec<AtomId> = atom.neighbors().iter().map(|n| n.atom).collect();
            partners.sort();
            partners.dedup();
            if partners.len() != atom.neighbors().len() {
                issues.push(format!("atom {:?} has duplicate neighbors", id));
            }
            let expected = match atom.label {
                AtomLabel::Element(e) => e.implicit_hydrogens(atom.bond_order_sum(), atom.charge),
                _ => 0,
            };
            if atom.hydrogen_count != expected {
                issues.push(format!(
                    "atom {:?} hydrogen count is {} not {}",
                    id, atom.hydrogen_count, expected
                ));
            }
        }

        issues
    }

    fn link_neighbors(&mut self, bond: BondId, a: AtomId, b: AtomId, order: u8) {
        self.insert_neighbor(a, usize::MAX, Neighbor { atom: b, bond, order });
        self.insert_neighbor(b, usize::MAX, Neighbor { atom: a, bond, order });
    }

    fn insert_neighbor(&mut self, id: AtomId, at: usize, record: Neighbor) {
        if let Some(atom) = self.atom_mut(id) {
            let at = at.min(atom.neighbors.len());
            atom.neighbors.insert(at, record);
            atom.refresh_hydrogens();
        }
    }

    fn detach_bond_inner(&mut self, id: BondId, det: &mut Detached) {
        let Some(pos) = self.bond_order.iter().position(|&b| b == id) else {
            return;
        };
        self.bond_order.remove(pos);
        let Some(bond) = self.bonds[id.slot()].occupant.take() else {
            return;
        };
        let (a, b) = bond.atoms;
        let mut ends = [0usize; 2];
        for (side, endpoint) in [a, b].into_iter().enumerate() {
            if let Some(atom) = self.atom_mut(endpoint) {
                if let Some(at) = atom.neighbors.iter().position(|n| n.bond == id) {
                    ends[side] = at;
                    atom.neighbors.remove(at);
                    atom.refresh_hydrogens();
                }
            }
        }
        det.bonds.push((id, bond, pos, ends));
    }

    fn detach_atom_inner(&mut self, id: AtomId, det: &mut Detached) {
        let Some(pos) = self.atom_order.iter().position(|&a| a == id) else {
            return;
        };
        self.atom_order.remove(pos);
        let Some(atom) = self.atoms[id.slot()].occupant.take() else {
            return;
        };
        det.atoms.push((id, atom, pos));
    }
}

// Equality is over the live graph: same ids in the same order with the same
// data. Arena internals (slot count, generations, free lists) are allowed
// to differ, so a molecule equals its past self after an undo even though
// the undo grew the arena.
impl PartialEq for Molecule {
    fn eq(&self, other: &Self) -> bool {
        if self.atom_order != other.atom_order || self.bond_order != other.bond_order {
            return false;
        }
        for &id in &self.atom_order {
            if self.atom(id) != other.atom(id) {
                return false;
            }
        }
        for &id in &self.bond_order {
            if self.bond(id) != other.bond(id) {
                return false;
            }
        }
        self.ring_systems == other.ring_systems
    }
}

impl fmt::Debug for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let atoms: Vec<_> = self
            .atom_order
            .iter()
            .filter_map(|&id| self.atom(id).map(|a| (id, a)))
            .collect();
        let bonds: Vec<_> = self
            .bond_order
            .iter()
            .filter_map(|&id| self.bond(id).map(|b| (id, b)))
            .collect();
        f.debug_struct("Molecule")
            .field("atoms", &atoms)
            .field("bonds", &bonds)
            .field("ring_systems", &self.ring_systems)
            .finish()
    }
}
