//! Drawing-side resolution for asymmetric double bonds.
//!
//! A plain double bond is drawn as a main stroke on the bond axis plus a
//! second, shorter stroke to one side — or two symmetric strokes around the
//! axis. Which of those a renderer should use depends on the surroundings:
//! inside a ring the second stroke belongs on the ring side, next to a
//! printed label or a ring it is safer to center, and a bare chain bond
//! defaults to the left. Sides are measured looking from the first
//! endpoint toward the second, with y up.
//!
//! Resolution runs as a whole-molecule pass after edits that can change
//! ring membership, bond shapes, or label visibility. Pure coordinate
//! moves do not re-run it, so a drag can leave a stale side until the next
//! structural edit; that matches how the editor has always behaved.

use std::cmp::Ordering;

use glam::DVec2;

use crate::bond::{BondKind, BondOrientation};
use crate::index::{AtomId, BondId};
use crate::mol::Molecule;
use crate::topology::Topology;

/// Re-resolve the stored orientation of every bond. Plain double bonds get
/// a side; every other kind is cleared to `None`.
pub fn update_orientation(mol: &mut Molecule) {
    let bonds: Vec<BondId> = mol.bonds().collect();
    for id in bonds {
        let orientation = resolve(mol, id);
        mol.set_orientation(id, orientation);
    }
}

fn resolve(mol: &Molecule, id: BondId) -> Option<BondOrientation> {
    let bond = mol.bond(id)?;
    if bond.kind != BondKind::Double {
        return None;
    }
    let side = if bond.topology == Topology::Ring {
        ring_side(mol, id)
    } else {
        chain_side(mol, id)
    };
    Some(side)
}

// Centered strokes collide with printed captions and with ring interiors,
// so a chain double bond centers next to either; otherwise left.
fn chain_side(mol: &Molecule, id: BondId) -> BondOrientation {
    let Some(bond) = mol.bond(id) else {
        return BondOrientation::Center;
    };
    let endpoints = [bond.atoms.0, bond.atoms.1];
    let labeled = endpoints
        .iter()
        .any(|&v| mol.atom(v).map_or(false, |a| a.has_visible_label()));
    let touches_ring = endpoints
        .iter()
        .any(|&v| mol.atom(v).map_or(false, |a| a.topology == Topology::Ring));
    if labeled || touches_ring {
        BondOrientation::Center
    } else {
        BondOrientation::Left
    }
}

// Put the second stroke where the ring is: count ring neighbors of both
// endpoints on each side of the directed axis. A tie (the fused-bond case,
// with a ring on either side) is retried counting only neighbors that carry
// a multiple bond of their own, and falls back to Right.
fn ring_side(mol: &Molecule, id: BondId) -> BondOrientation {
    let Some(bond) = mol.bond(id) else {
        return BondOrientation::Right;
    };
    let (a, b) = bond.atoms;
    let (Some(pa), Some(pb)) = (
        mol.atom(a).map(|at| at.pos),
        mol.atom(b).map(|at| at.pos),
    ) else {
        return BondOrientation::Right;
    };

    let mut all: Vec<AtomId> = Vec::new();
    let mut multiple: Vec<AtomId> = Vec::new();
    for (endpoint, partner) in [(a, b), (b, a)] {
        for n in mol.neighbors(endpoint) {
            if n.atom == partner || n.bond == id {
                continue;
            }
            let via_ring = mol
                .bond(n.bond)
                .map_or(false, |nb| nb.topology == Topology::Ring);
            if !via_ring {
                continue;
            }
            // a neighbor bonded to both endpoints (three-ring) shows up
            // twice; it counts once
            if all.contains(&n.atom) {
                continue;
            }
            all.push(n.atom);
            let has_multiple = mol
                .neighbors(n.atom)
                .iter()
                .any(|m| m.bond != id && m.order >= 2);
            if has_multiple {
                multiple.push(n.atom);
            }
        }
    }

    let (left, right) = side_counts(mol, pa, pb, &all);
    match left.cmp(&right) {
        Ordering::Greater => BondOrientation::Left,
        Ordering::Less => BondOrientation::Right,
        Ordering::Equal => {
            let (left, right) = side_counts(mol, pa, pb, &multiple);
            if left > right {
                BondOrientation::Left
            } else {
                BondOrientation::Right
            }
        }
    }
}

fn side_counts(mol: &Molecule, pa: DVec2, pb: DVec2, atoms: &[AtomId]) -> (usize, usize) {
    let axis = pb - pa;
    let mut left = 0;
    let mut right = 0;
    for &v in atoms {
        let Some(atom) = mol.atom(v) else { continue };
        let cross = axis.perp_dot(atom.pos - pa);
        // exactly collinear neighbors count for neither side
        if cross > 1e-9 {
            left += 1;
        } else if cross < -1e-9 {
            right += 1;
        }
    }
    (left, right)
}
