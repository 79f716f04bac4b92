//! Linear undo history.
//!
//! Every user-visible mutation is wrapped in an [`Action`] holding enough
//! state to run it forwards and backwards. Committed actions sit on a tape
//! behind a cursor; rollback walks the cursor down, recommit walks it back
//! up, and committing something new truncates everything above the cursor.
//!
//! Structural actions never re-run their editing operation on recommit.
//! The first commit records the created [`Fragment`] (or parks the removed
//! parts of a deletion), and every later transition moves those exact parts
//! in or out of the molecule with [`Molecule::detach`] and
//! [`Molecule::attach`], so handles stay stable across any number of undo
//! cycles. Parts are only discarded for good when the history that owns
//! them is dropped.

use glam::DVec2;
use tracing::{debug, trace};

use crate::atom::AtomLabel;
use crate::bond::BondKind;
use crate::editor;
use crate::index::{AtomId, BondId};
use crate::mol::{Detached, Fragment, Molecule, MovedAtom};
use crate::orientation::update_orientation;
use crate::topology::update_topology;

/// One editing operation, as stored on the tape.
#[derive(Debug, Clone)]
pub enum EditOp {
    DefaultFragment { at: DVec2 },
    Sprout { anchor: AtomId, kind: BondKind, label: AtomLabel },
    Bind { a: AtomId, b: AtomId, kind: BondKind },
    Chain { anchor: AtomId, length: usize },
    FuseRing { bond: BondId, size: usize, desaturate: bool },
    AttachRing { anchor: AtomId, size: usize, desaturate: bool },
    DeleteAtom { atom: AtomId },
    DeleteBond { bond: BondId, drop_dangling: bool },
    SymmetrizeAlongBond { bond: BondId },
    SymmetrizeAtAtom { atom: AtomId, order: u32 },
}

/// A structural action: the operation plus whatever it needs to replay.
///
/// `parked` is `Some` exactly when this action owns parts that are absent
/// from the molecule — a rolled-back growth or a committed deletion. That
/// makes cleanup uniform: dropping an action discards whatever it parked.
#[derive(Debug)]
pub struct EditAction {
    op: EditOp,
    fragment: Fragment,
    parked: Option<Detached>,
}

impl EditAction {
    /// What the operation created (growth) or removed (deletion).
    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    pub fn op(&self) -> &EditOp {
        &self.op
    }

    fn first_apply(&mut self, mol: &mut Molecule) -> bool {
        match self.op.clone() {
            EditOp::DefaultFragment { at } => {
                self.fragment = editor::add_default_fragment(mol, at);
            }
            EditOp::Sprout { anchor, kind, label } => {
                self.fragment = editor::sprout_atom(mol, anchor, kind, label);
            }
            EditOp::Bind { a, b, kind } => {
                self.fragment = editor::bind_atoms(mol, a, b, kind);
            }
            EditOp::Chain { anchor, length } => {
                self.fragment = editor::add_chain(mol, anchor, length);
            }
            EditOp::FuseRing { bond, size, desaturate } => {
                self.fragment = editor::fuse_ring(mol, bond, size, desaturate);
            }
            EditOp::AttachRing { anchor, size, desaturate } => {
                self.fragment = editor::attach_ring(mol, anchor, size, desaturate);
            }
            EditOp::SymmetrizeAlongBond { bond } => {
                self.fragment = editor::symmetrize_along_bond(mol, bond);
            }
            EditOp::SymmetrizeAtAtom { atom, order } => {
                self.fragment = editor::symmetrize_at_atom(mol, atom, order);
            }
            EditOp::DeleteAtom { atom } => self.park_removed(editor::delete_atom(mol, atom)),
            EditOp::DeleteBond { bond, drop_dangling } => {
                self.park_removed(editor::delete_bond(mol, bond, drop_dangling));
            }
        }
        !self.fragment.is_empty() || self.parked.is_some()
    }

    fn park_removed(&mut self, det: Detached) {
        if det.is_empty() {
            return;
        }
        self.fragment = Fragment {
            atoms: det.atom_ids().collect(),
            bonds: det.bond_ids().collect(),
            moved: Vec::new(),
        };
        self.parked = Some(det);
    }

    // Committed growth holds nothing and detaches its fragment; committed
    // deletion holds the removed parts and reattaches them. The parked
    // state flips either way, which is what makes recommit the mirror
    // image of this.
    fn rollback(&mut self, mol: &mut Molecule) {
        match self.parked.take() {
            Some(det) => mol.attach(det),
            None => {
                let det = mol.detach(&self.fragment);
                for m in &self.fragment.moved {
                    mol.set_position(m.atom, m.from);
                }
                self.parked = Some(det);
            }
        }
    }

    fn recommit(&mut self, mol: &mut Molecule) {
        match self.parked.take() {
            Some(det) => {
                mol.attach(det);
                for m in &self.fragment.moved {
                    mol.set_position(m.atom, m.to);
                }
            }
            None => self.parked = Some(mol.detach(&self.fragment)),
        }
    }
}

/// One undoable step.
#[derive(Debug)]
pub enum Action {
    SetLabel { target: AtomId, before: AtomLabel, after: AtomLabel },
    SetCharge { target: AtomId, before: i8, after: i8 },
    SetIsotope { target: AtomId, before: Option<u16>, after: Option<u16> },
    SetBondKind { target: BondId, before: BondKind, after: BondKind },
    MoveAtoms { moves: Vec<MovedAtom> },
    Edit(EditAction),
}

impl Action {
    /// Capture a label change. `None` when the atom is dead or the label
    /// already matches.
    pub fn set_label(mol: &Molecule, target: AtomId, after: AtomLabel) -> Option<Action> {
        let before = mol.atom(target)?.label.clone();
        (before != after).then(|| Action::SetLabel { target, before, after })
    }

    pub fn set_charge(mol: &Molecule, target: AtomId, after: i8) -> Option<Action> {
        let before = mol.atom(target)?.charge;
        (before != after).then_some(Action::SetCharge { target, before, after })
    }

    pub fn set_isotope(mol: &Molecule, target: AtomId, after: Option<u16>) -> Option<Action> {
        let before = mol.atom(target)?.isotope;
        (before != after).then_some(Action::SetIsotope { target, before, after })
    }

    pub fn set_bond_kind(mol: &Molecule, target: BondId, after: BondKind) -> Option<Action> {
        let before = mol.bond(target)?.kind;
        (before != after).then_some(Action::SetBondKind { target, before, after })
    }

    /// Capture a drag of one or more atoms to new positions. Atoms that
    /// would not actually move are dropped; `None` if nothing moves.
    pub fn move_atoms(mol: &Molecule, targets: &[(AtomId, DVec2)]) -> Option<Action> {
        let mut moves = Vec::new();
        for &(atom, to) in targets {
            let from = mol.atom(atom)?.pos;
            if from.distance(to) > 1e-9 {
                moves.push(MovedAtom { atom, from, to });
            }
        }
        (!moves.is_empty()).then_some(Action::MoveAtoms { moves })
    }

    pub fn edit(op: EditOp) -> Action {
        Action::Edit(EditAction {
            op,
            fragment: Fragment::default(),
            parked: None,
        })
    }

    fn commit(&mut self, mol: &mut Molecule) -> bool {
        match self {
            Action::SetLabel { target, after, .. } => mol.set_label(*target, after.clone()),
            Action::SetCharge { target, after, .. } => mol.set_charge(*target, *after),
            Action::SetIsotope { target, after, .. } => mol.set_isotope(*target, *after),
            Action::SetBondKind { target, after, .. } => mol.set_kind(*target, *after),
            Action::MoveAtoms { moves } => {
                for m in moves.iter() {
                    mol.set_position(m.atom, m.to);
                }
            }
            Action::Edit(edit) => return edit.first_apply(mol),
        }
        true
    }

    fn rollback(&mut self, mol: &mut Molecule) {
        match self {
            Action::SetLabel { target, before, .. } => mol.set_label(*target, before.clone()),
            Action::SetCharge { target, before, .. } => mol.set_charge(*target, *before),
            Action::SetIsotope { target, before, .. } => mol.set_isotope(*target, *before),
            Action::SetBondKind { target, before, .. } => mol.set_kind(*target, *before),
            Action::MoveAtoms { moves } => {
                for m in moves.iter() {
                    mol.set_position(m.atom, m.from);
                }
            }
            Action::Edit(edit) => edit.rollback(mol),
        }
    }

    fn recommit(&mut self, mol: &mut Molecule) {
        match self {
            Action::Edit(edit) => edit.recommit(mol),
            other => {
                other.commit(mol);
            }
        }
    }

    // A continuing gesture folds into the action it extends: repeated
    // relabels of the same atom, charge bumps on the same atom, or drag
    // updates of the same atom set. Everything else stays a separate step.
    fn try_merge(&mut self, newer: &Action) -> bool {
        match (self, newer) {
            (
                Action::SetLabel { target, after, .. },
                Action::SetLabel { target: t2, after: a2, .. },
            ) if target == t2 => {
                *after = a2.clone();
                true
            }
            (
                Action::SetCharge { target, after, .. },
                Action::SetCharge { target: t2, after: a2, .. },
            ) if target == t2 => {
                *after = *a2;
                true
            }
            (Action::MoveAtoms { moves }, Action::MoveAtoms { moves: newer_moves })
                if moves.len() == newer_moves.len()
                    && moves.iter().zip(newer_moves).all(|(a, b)| a.atom == b.atom) =>
            {
                for (m, n) in moves.iter_mut().zip(newer_moves) {
                    m.to = n.to;
                }
                true
            }
            _ => false,
        }
    }

    fn take_parked(&mut self) -> Option<Detached> {
        match self {
            Action::Edit(edit) => edit.parked.take(),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Recompute {
    Nothing,
    Orientation,
    Full,
}

fn recompute_class(action: &Action) -> Recompute {
    match action {
        Action::MoveAtoms { .. } => Recompute::Nothing,
        Action::SetLabel { .. } | Action::SetCharge { .. } | Action::SetIsotope { .. } => {
            Recompute::Orientation
        }
        Action::SetBondKind { .. } | Action::Edit(_) => Recompute::Full,
    }
}

fn recompute(mol: &mut Molecule, class: Recompute) {
    match class {
        Recompute::Nothing => {}
        Recompute::Orientation => update_orientation(mol),
        Recompute::Full => {
            update_topology(mol);
            update_orientation(mol);
        }
    }
}

/// The undo tape: committed actions below the cursor, rolled-back ones
/// above it.
#[derive(Debug, Default)]
pub struct ActionStack {
    tape: Vec<Action>,
    cursor: usize,
}

impl ActionStack {
    pub fn new() -> ActionStack {
        ActionStack::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tape.len()
    }

    pub fn can_rollback(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_recommit(&self) -> bool {
        self.cursor < self.tape.len()
    }

    /// The most recently committed action, if any.
    pub fn last_committed(&self) -> Option<&Action> {
        self.cursor.checked_sub(1).map(|i| &self.tape[i])
    }

    /// Apply `action` and record it. Committing while rolled back drops
    /// the tail above the cursor for good. Returns `false` when the action
    /// turned out to do nothing, in which case it is not recorded.
    pub fn commit(&mut self, mol: &mut Molecule, mut action: Action) -> bool {
        self.truncate(mol);
        if !action.commit(mol) {
            debug!("action had no effect, not recorded");
            return false;
        }
        recompute(mol, recompute_class(&action));
        if let Some(top) = self.tape.last_mut() {
            if top.try_merge(&action) {
                trace!("merged into previous action");
                return true;
            }
        }
        self.tape.push(action);
        self.cursor = self.tape.len();
        debug!(depth = self.cursor, "committed action");
        true
    }

    /// Undo up to `steps` actions; returns how many actually ran.
    pub fn rollback(&mut self, mol: &mut Molecule, steps: usize) -> usize {
        let mut class = Recompute::Nothing;
        let mut done = 0;
        while done < steps && self.cursor > 0 {
            self.cursor -= 1;
            let action = &mut self.tape[self.cursor];
            action.rollback(mol);
            class = class.max(recompute_class(action));
            done += 1;
        }
        if done > 0 {
            recompute(mol, class);
            debug!(steps = done, "rolled back");
        }
        done
    }

    /// Redo up to `steps` rolled-back actions; returns how many ran.
    pub fn recommit(&mut self, mol: &mut Molecule, steps: usize) -> usize {
        let mut class = Recompute::Nothing;
        let mut done = 0;
        while done < steps && self.cursor < self.tape.len() {
            let action = &mut self.tape[self.cursor];
            action.recommit(mol);
            class = class.max(recompute_class(action));
            self.cursor += 1;
            done += 1;
        }
        if done > 0 {
            recompute(mol, class);
            debug!(steps = done, "recommitted");
        }
        done
    }

    /// Forget the whole history, freeing any parts the tape still owns.
    pub fn clear(&mut self, mol: &mut Molecule) {
        for action in &mut self.tape {
            if let Some(det) = action.take_parked() {
                mol.discard(det);
            }
        }
        self.tape.clear();
        self.cursor = 0;
    }

    fn truncate(&mut self, mol: &mut Molecule) {
        while self.tape.len() > self.cursor {
            if let Some(mut action) = self.tape.pop() {
                if let Some(det) = action.take_parked() {
                    mol.discard(det);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    fn two_carbons() -> (Molecule, AtomId, AtomId, BondId) {
        let mut mol = Molecule::new();
        let a = mol.add_atom(DVec2::ZERO, AtomLabel::default());
        let b = mol.add_atom(DVec2::new(40.0, 0.0), AtomLabel::default());
        let bond = mol.bind(a, b, BondKind::Single).unwrap();
        (mol, a, b, bond)
    }

    #[test]
    fn set_label_round_trip() {
        let (mut mol, a, _, _) = two_carbons();
        let mut stack = ActionStack::new();

        let action = Action::set_label(&mol, a, AtomLabel::Element(Element::N)).unwrap();
        assert!(stack.commit(&mut mol, action));
        assert_eq!(mol.atom(a).unwrap().label, AtomLabel::Element(Element::N));
        assert_eq!(mol.atom(a).unwrap().hydrogen_count, 2);

        assert_eq!(stack.rollback(&mut mol, 1), 1);
        assert_eq!(mol.atom(a).unwrap().label, AtomLabel::Element(Element::C));
        assert_eq!(mol.atom(a).unwrap().hydrogen_count, 3);
        assert!(stack.can_recommit());

        assert_eq!(stack.recommit(&mut mol, 1), 1);
        assert_eq!(mol.atom(a).unwrap().label, AtomLabel::Element(Element::N));
        assert!(!stack.can_recommit());
    }

    #[test]
    fn set_isotope_round_trip() {
        let (mut mol, a, _, _) = two_carbons();
        let mut stack = ActionStack::new();

        let action = Action::set_isotope(&mol, a, Some(13)).unwrap();
        assert!(stack.commit(&mut mol, action));
        assert_eq!(mol.atom(a).unwrap().isotope, Some(13));
        assert!(matches!(
            stack.last_committed(),
            Some(Action::SetIsotope { after: Some(13), .. })
        ));

        assert_eq!(stack.rollback(&mut mol, 1), 1);
        assert_eq!(mol.atom(a).unwrap().isotope, None);
        assert!(stack.last_committed().is_none());
        assert_eq!(stack.recommit(&mut mol, 1), 1);
        assert_eq!(mol.atom(a).unwrap().isotope, Some(13));
    }

    #[test]
    fn unchanged_setter_is_not_an_action() {
        let (mol, a, _, bond) = two_carbons();
        assert!(Action::set_isotope(&mol, a, None).is_none());
        assert!(Action::set_label(&mol, a, AtomLabel::default()).is_none());
        assert!(Action::set_charge(&mol, a, 0).is_none());
        assert!(Action::set_bond_kind(&mol, bond, BondKind::Single).is_none());
        assert!(Action::move_atoms(&mol, &[(a, DVec2::ZERO)]).is_none());
    }

    #[test]
    fn label_gesture_merges_into_one_step() {
        let (mut mol, a, _, _) = two_carbons();
        let mut stack = ActionStack::new();

        let first = Action::set_label(&mol, a, AtomLabel::Element(Element::N)).unwrap();
        stack.commit(&mut mol, first);
        let second = Action::set_label(&mol, a, AtomLabel::Element(Element::O)).unwrap();
        stack.commit(&mut mol, second);

        assert_eq!(stack.len(), 1);
        stack.rollback(&mut mol, 1);
        assert_eq!(mol.atom(a).unwrap().label, AtomLabel::Element(Element::C));
        stack.recommit(&mut mol, 1);
        assert_eq!(mol.atom(a).unwrap().label, AtomLabel::Element(Element::O));
    }

    #[test]
    fn different_targets_do_not_merge() {
        let (mut mol, a, b, _) = two_carbons();
        let mut stack = ActionStack::new();
        let first = Action::set_label(&mol, a, AtomLabel::Element(Element::N)).unwrap();
        stack.commit(&mut mol, first);
        let second = Action::set_label(&mol, b, AtomLabel::Element(Element::O)).unwrap();
        stack.commit(&mut mol, second);
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn drag_gesture_merges_and_round_trips() {
        let (mut mol, a, _, _) = two_carbons();
        let mut stack = ActionStack::new();

        let first = Action::move_atoms(&mol, &[(a, DVec2::new(10.0, 0.0))]).unwrap();
        stack.commit(&mut mol, first);
        let second = Action::move_atoms(&mol, &[(a, DVec2::new(20.0, 5.0))]).unwrap();
        stack.commit(&mut mol, second);

        assert_eq!(stack.len(), 1);
        stack.rollback(&mut mol, 1);
        assert_eq!(mol.atom(a).unwrap().pos, DVec2::ZERO);
        stack.recommit(&mut mol, 1);
        assert_eq!(mol.atom(a).unwrap().pos, DVec2::new(20.0, 5.0));
    }

    #[test]
    fn growth_round_trip_restores_exact_graph() {
        let mut mol = Molecule::new();
        let mut stack = ActionStack::new();

        stack.commit(
            &mut mol,
            Action::edit(EditOp::DefaultFragment {
                at: DVec2::new(100.0, 100.0),
            }),
        );
        let after_first = mol.clone();
        let anchor = mol.atoms().last().unwrap();

        stack.commit(&mut mol, Action::edit(EditOp::Chain { anchor, length: 2 }));
        let after_chain = mol.clone();
        assert_eq!(mol.atom_count(), 4);

        stack.rollback(&mut mol, 1);
        assert_eq!(mol, after_first);
        stack.rollback(&mut mol, 1);
        assert_eq!(mol.atom_count(), 0);

        stack.recommit(&mut mol, 2);
        assert_eq!(mol, after_chain);
        assert!(mol.validate().is_empty());
    }

    #[test]
    fn deletion_round_trip_restores_exact_graph() {
        let (mut mol, a, _, _) = two_carbons();
        let mut stack = ActionStack::new();
        stack.commit(&mut mol, Action::edit(EditOp::Chain { anchor: a, length: 2 }));
        let grown = mol.clone();

        stack.commit(&mut mol, Action::edit(EditOp::DeleteAtom { atom: a }));
        let deleted = mol.clone();
        assert_eq!(mol.atom_count(), 3);

        stack.rollback(&mut mol, 1);
        assert_eq!(mol, grown);
        stack.recommit(&mut mol, 1);
        assert_eq!(mol, deleted);
        assert!(mol.validate().is_empty());
    }

    #[test]
    fn commit_truncates_the_rolled_back_tail() {
        let mut mol = Molecule::new();
        let mut stack = ActionStack::new();

        stack.commit(&mut mol, Action::edit(EditOp::DefaultFragment { at: DVec2::ZERO }));
        let anchor = mol.atoms().last().unwrap();
        stack.commit(&mut mol, Action::edit(EditOp::Sprout {
            anchor,
            kind: BondKind::Single,
            label: AtomLabel::default(),
        }));
        stack.rollback(&mut mol, 1);
        assert!(stack.can_recommit());

        stack.commit(&mut mol, Action::edit(EditOp::Chain { anchor, length: 1 }));
        assert!(!stack.can_recommit());
        assert_eq!(stack.len(), 2);
        assert_eq!(mol.atom_count(), 3);
        assert!(mol.validate().is_empty());
    }

    #[test]
    fn noop_action_is_not_recorded() {
        let mut mol = Molecule::new();
        let dead = mol.add_atom(DVec2::ZERO, AtomLabel::default());
        let det = mol.delete_atom(dead);
        mol.discard(det);
        // slot reused under a new generation; the old handle stays dead
        let live = mol.add_atom(DVec2::ZERO, AtomLabel::default());
        assert_ne!(live, dead);

        let mut stack = ActionStack::new();
        assert!(!stack.commit(
            &mut mol,
            Action::edit(EditOp::Sprout {
                anchor: dead,
                kind: BondKind::Single,
                label: AtomLabel::default(),
            })
        ));
        assert!(stack.is_empty());
        assert!(mol.contains_atom(live));
        assert_eq!(mol.atom_count(), 1);
    }

    #[test]
    fn structural_commit_refreshes_topology_and_orientation() {
        let (mut mol, _, _, bond) = two_carbons();
        let mut stack = ActionStack::new();

        stack.commit(
            &mut mol,
            Action::edit(EditOp::FuseRing {
                bond,
                size: 6,
                desaturate: true,
            }),
        );
        assert_eq!(mol.ring_systems().len(), 1);
        let oriented = mol
            .bonds()
            .filter_map(|id| mol.bond(id))
            .filter(|b| b.kind == BondKind::Double)
            .all(|b| b.orientation.is_some());
        assert!(oriented);

        stack.rollback(&mut mol, 1);
        assert!(mol.ring_systems().is_empty());
    }

    #[test]
    fn kind_change_refreshes_orientation() {
        let (mut mol, _, _, bond) = two_carbons();
        let mut stack = ActionStack::new();

        let action = Action::set_bond_kind(&mol, bond, BondKind::Double).unwrap();
        stack.commit(&mut mol, action);
        assert!(mol.bond(bond).unwrap().orientation.is_some());

        stack.rollback(&mut mol, 1);
        assert!(mol.bond(bond).unwrap().orientation.is_none());
    }

    #[test]
    fn clear_frees_parked_parts() {
        let (mut mol, a, _, _) = two_carbons();
        let mut stack = ActionStack::new();
        stack.commit(&mut mol, Action::edit(EditOp::DeleteAtom { atom: a }));
        assert_eq!(mol.atom_count(), 1);

        stack.clear(&mut mol);
        assert!(stack.is_empty());
        assert!(!stack.can_rollback());
        // the deleted atom's slot is free again
        let replacement = mol.add_atom(DVec2::new(5.0, 5.0), AtomLabel::default());
        assert_eq!(replacement.slot(), a.slot());
        assert_ne!(replacement, a);
        assert!(mol.validate().is_empty());
    }

    #[test]
    fn rollback_past_the_bottom_stops_quietly() {
        let mut mol = Molecule::new();
        let mut stack = ActionStack::new();
        stack.commit(&mut mol, Action::edit(EditOp::DefaultFragment { at: DVec2::ZERO }));
        assert_eq!(stack.rollback(&mut mol, 5), 1);
        assert_eq!(stack.rollback(&mut mol, 1), 0);
        assert_eq!(stack.recommit(&mut mol, 5), 1);
        assert_eq!(stack.recommit(&mut mol, 1), 0);
    }
}
