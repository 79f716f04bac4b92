//! Compound editing operations.
//!
//! Everything here mutates a [`Molecule`] in place and reports what it did
//! as a [`Fragment`] (growth) or a [`Detached`] sub-graph (removal), which
//! is exactly the bookkeeping the undo layer needs. Operations whose
//! preconditions do not hold return an empty result and leave the molecule
//! untouched — callers check emptiness, they never handle errors.
//!
//! New atoms are placed by crowding analysis: candidate positions are
//! scored by summed inverse-square distance to nearby atoms and the least
//! crowded candidate wins, which is what makes grown chains zig-zag and
//! fused rings pop to the open side of a bond without any global layout.

use std::collections::{HashMap, HashSet};
use std::f64::consts::{PI, TAU};

use glam::DVec2;
use tracing::{debug, trace};

use crate::atom::{AtomLabel, Neighbor};
use crate::bond::BondKind;
use crate::geometry::{largest_gap, normalize_angle, reflect_through, rotate_about, snap_angle};
use crate::index::{AtomId, BondId};
use crate::mol::{Detached, Fragment, Molecule, MovedAtom};

/// Crowding window, as a multiple of the average bond length.
const CROWDING_WINDOW: f64 = 3.0;
/// Atoms closer than this multiple of the average bond length are assumed
/// to be the probe's own anchor context and are excluded from crowding.
const CROWDING_EXCLUSION: f64 = 0.1;
/// Gap-bisecting placement snaps to this increment.
const ANGLE_SNAP: f64 = 15.0 * PI / 180.0;
/// Direction of the very first bond grown from an isolated atom.
const SPROUT_ANGLE: f64 = PI / 6.0;
/// Angle between consecutive bonds of a grown chain.
const BRANCH_ANGLE: f64 = 2.0 * PI / 3.0;

/// Crowding potential at `p`: summed inverse-square distance to every atom
/// within the local window. Lower means more open space.
pub fn crowding(mol: &Molecule, p: DVec2) -> f64 {
    let avg = mol.average_bond_length();
    let window = CROWDING_WINDOW * avg;
    let exclusion = CROWDING_EXCLUSION * avg;
    let mut total = 0.0;
    for id in mol.atoms() {
        let Some(atom) = mol.atom(id) else { continue };
        let d = atom.pos.distance(p);
        if d <= exclusion || d > window {
            continue;
        }
        total += 1.0 / (d * d);
    }
    total
}

// Candidate positions that are geometric mirror images score identically
// only up to the rounding of the trigonometry that produced them; scores
// closer than relative noise count as a tie.
fn less_crowded(a: f64, b: f64) -> bool {
    b - a > 1e-9 * a.max(b)
}

/// Start a structure on open canvas: two bonded carbons, the second one
/// bond length from `at`, 30° above the horizontal.
pub fn add_default_fragment(mol: &mut Molecule, at: DVec2) -> Fragment {
    let length = mol.average_bond_length();
    let mut frag = Fragment::default();
    let first = mol.add_atom(at, AtomLabel::default());
    let second = mol.add_atom(at + length * DVec2::from_angle(SPROUT_ANGLE), AtomLabel::default());
    frag.atoms.push(first);
    frag.atoms.push(second);
    if let Some(bond) = mol.bind(first, second, BondKind::Single) {
        frag.bonds.push(bond);
    }
    debug!(at = ?(at.x, at.y), "added default fragment");
    frag
}

/// Grow one atom off `anchor`, picking a position from the anchor's
/// surroundings (see module docs). Pre-existing sprouted neighbors may be
/// swung around the anchor to make room; those moves are reported in the
/// fragment.
pub fn sprout_atom(mol: &mut Molecule, anchor: AtomId, kind: BondKind, label: AtomLabel) -> Fragment {
    let mut frag = Fragment::default();
    let Some(placement) = sprout_placement(mol, anchor) else {
        return frag;
    };
    for m in &placement.moves {
        mol.set_position(m.atom, m.to);
    }
    let atom = mol.add_atom(placement.pos, label);
    frag.atoms.push(atom);
    if let Some(bond) = mol.bind(anchor, atom, kind) {
        frag.bonds.push(bond);
    }
    frag.moved = placement.moves;
    trace!(?anchor, pos = ?(placement.pos.x, placement.pos.y), "sprouted atom");
    frag
}

/// Bond two existing atoms. Empty if they coincide, either is dead, or
/// they are already bonded.
pub fn bind_atoms(mol: &mut Molecule, a: AtomId, b: AtomId, kind: BondKind) -> Fragment {
    let mut frag = Fragment::default();
    if let Some(bond) = mol.bind(a, b, kind) {
        frag.bonds.push(bond);
    }
    frag
}

/// Grow a carbon chain of `length` single bonds off `anchor`, one sprout
/// at a time; crowding makes it zig-zag.
pub fn add_chain(mol: &mut Molecule, anchor: AtomId, length: usize) -> Fragment {
    let mut frag = Fragment::default();
    if length == 0 || !mol.contains_atom(anchor) {
        return frag;
    }
    let mut cur = anchor;
    for _ in 0..length {
        let step = sprout_atom(mol, cur, BondKind::Single, AtomLabel::default());
        let Some(&next) = step.atoms.first() else { break };
        frag.merge(step);
        cur = next;
    }
    debug!(?anchor, length, "grew chain");
    frag
}

/// Erect a regular `size`-gon on an existing bond. The two mirror
/// placements are scored by summed crowding over the would-be vertices and
/// the more open side wins. With `desaturate`, a single seed bond whose
/// first endpoint still has an implicit hydrogen gets alternating double
/// bonds around the new ring.
pub fn fuse_ring(mol: &mut Molecule, bond: BondId, size: usize, desaturate: bool) -> Fragment {
    let mut frag = Fragment::default();
    if size < 3 {
        return frag;
    }
    let Some(seed) = mol.bond(bond) else {
        return frag;
    };
    let (a, b) = seed.atoms;
    let seed_kind = seed.kind;
    let (Some(pa), Some(pb)) = (mol.atom(a).map(|at| at.pos), mol.atom(b).map(|at| at.pos)) else {
        return frag;
    };
    let span = pa.distance(pb);
    if span < 1e-9 {
        return frag;
    }

    let mid = (pa + pb) / 2.0;
    let apothem = span / (2.0 * (PI / size as f64).tan());
    let normal = ((pb - pa) / span).perp();
    let left = ring_positions(pa, pb, mid + apothem * normal, size);
    let right = ring_positions(pa, pb, mid - apothem * normal, size);
    let score = |ps: &[DVec2]| ps.iter().map(|&p| crowding(mol, p)).sum::<f64>();
    // tie goes to the left side of the seed bond
    let chosen = if less_crowded(score(&right), score(&left)) {
        right
    } else {
        left
    };

    let alternate = desaturate
        && seed_kind == BondKind::Single
        && mol.atom(a).map_or(false, |at| at.hydrogen_count > 0);

    let mut prev = a;
    for (i, &p) in chosen.iter().enumerate() {
        let atom = mol.add_atom(p, AtomLabel::default());
        frag.atoms.push(atom);
        let kind = if alternate && i % 2 == 0 {
            BondKind::Double
        } else {
            BondKind::Single
        };
        if let Some(nb) = mol.bind(prev, atom, kind) {
            frag.bonds.push(nb);
        }
        prev = atom;
    }
    let closing = if alternate && (size - 2) % 2 == 0 {
        BondKind::Double
    } else {
        BondKind::Single
    };
    if let Some(nb) = mol.bind(prev, b, closing) {
        frag.bonds.push(nb);
    }
    debug!(size, desaturate, "fused ring onto bond");
    frag
}

/// Sprout a carbon off `anchor` and fuse a `size`-gon on the new bond, so
/// the ring hangs off the anchor through one connecting position.
pub fn attach_ring(mol: &mut Molecule, anchor: AtomId, size: usize, desaturate: bool) -> Fragment {
    if size < 3 || !mol.contains_atom(anchor) {
        return Fragment::default();
    }
    let mut frag = sprout_atom(mol, anchor, BondKind::Single, AtomLabel::default());
    let Some(&bond) = frag.bonds.first() else {
        return frag;
    };
    frag.merge(fuse_ring(mol, bond, size, desaturate));
    frag
}

/// Remove one atom and its bonds; the caller owns the detached parts.
pub fn delete_atom(mol: &mut Molecule, atom: AtomId) -> Detached {
    let det = mol.delete_atom(atom);
    if !det.is_empty() {
        debug!(?atom, bonds = det.bond_count(), "deleted atom");
    }
    det
}

/// Remove one bond, optionally dropping endpoints it leaves isolated.
pub fn delete_bond(mol: &mut Molecule, bond: BondId, drop_dangling: bool) -> Detached {
    let det = mol.delete_bond(bond, drop_dangling);
    if !det.is_empty() {
        debug!(?bond, drop_dangling, "deleted bond");
    }
    det
}

/// Mirror the branch hanging off a bond's interior endpoint through the
/// bond midpoint, attaching the copies to the leaf endpoint. Requires the
/// bond to have exactly one leaf endpoint and something beyond the other.
pub fn symmetrize_along_bond(mol: &mut Molecule, bond: BondId) -> Fragment {
    let mut frag = Fragment::default();
    let Some(b) = mol.bond(bond) else {
        return frag;
    };
    let (e0, e1) = b.atoms;
    let (leaf, hub) = match (mol.degree(e0) == 1, mol.degree(e1) == 1) {
        (true, false) => (e0, e1),
        (false, true) => (e1, e0),
        _ => return frag,
    };
    let (Some(p_leaf), Some(p_hub)) = (
        mol.atom(leaf).map(|at| at.pos),
        mol.atom(hub).map(|at| at.pos),
    ) else {
        return frag;
    };
    let mid = (p_leaf + p_hub) / 2.0;

    let branch: Vec<AtomId> = mol
        .reachable(hub, Some(bond), None)
        .into_iter()
        .filter(|&v| v != hub)
        .collect();
    if branch.is_empty() {
        return frag;
    }
    copy_branch(mol, &branch, hub, leaf, &mut frag, |p| reflect_through(p, mid));
    debug!(?bond, added = frag.atoms.len(), "symmetrized along bond");
    frag
}

/// Rotationally repeat the branch on a terminal atom's single bond around
/// the atom, `order` arms in total. An order of 2 uses the drawing-friendly
/// 120° spread rather than a straight line.
pub fn symmetrize_at_atom(mol: &mut Molecule, atom: AtomId, order: u32) -> Fragment {
    let mut frag = Fragment::default();
    if order < 2 || mol.degree(atom) != 1 {
        return frag;
    }
    let Some(center) = mol.atom(atom).map(|at| at.pos) else {
        return frag;
    };
    let first = mol.neighbors(atom)[0].atom;
    let branch = mol.reachable(first, None, Some(atom));
    if branch.is_empty() {
        return frag;
    }
    let step = if order == 2 { BRANCH_ANGLE } else { TAU / order as f64 };
    for c in 1..order {
        let angle = step * c as f64;
        copy_branch(mol, &branch, atom, atom, &mut frag, |p| {
            rotate_about(p, center, angle)
        });
    }
    debug!(?atom, order, added = frag.atoms.len(), "symmetrized at atom");
    frag
}

struct Placement {
    pos: DVec2,
    moves: Vec<MovedAtom>,
}

fn sprout_placement(mol: &Molecule, anchor: AtomId) -> Option<Placement> {
    let origin = mol.atom(anchor)?.pos;
    let length = mol.average_bond_length();
    let neighbors = mol.neighbors(anchor);
    match neighbors.len() {
        0 => Some(Placement {
            pos: origin + length * DVec2::from_angle(SPROUT_ANGLE),
            moves: Vec::new(),
        }),
        1 => {
            let n = neighbors[0];
            let toward = (mol.atom(n.atom)?.pos - origin).to_angle();
            // a triple bond keeps the chain linear
            if n.order == 3 {
                return Some(Placement {
                    pos: origin + length * DVec2::from_angle(toward + PI),
                    moves: Vec::new(),
                });
            }
            let ccw = origin + length * DVec2::from_angle(toward + BRANCH_ANGLE);
            let cw = origin + length * DVec2::from_angle(toward - BRANCH_ANGLE);
            // tie goes to the counter-clockwise candidate
            let pos = if less_crowded(crowding(mol, cw), crowding(mol, ccw)) {
                cw
            } else {
                ccw
            };
            Some(Placement {
                pos,
                moves: Vec::new(),
            })
        }
        _ => crowded_placement(mol, anchor, origin, length),
    }
}

// Two or more neighbors. Neighbors that are only decorations of this
// anchor (single-bonded leaves with an element label) may be swung around
// to even out the spread; anything else is fixed geometry. With more than
// one fixed direction the new atom simply takes the widest gap.
fn crowded_placement(
    mol: &Molecule,
    anchor: AtomId,
    origin: DVec2,
    length: f64,
) -> Option<Placement> {
    let mut fixed: Vec<f64> = Vec::new();
    let mut movable: Vec<(AtomId, f64)> = Vec::new();
    for n in mol.neighbors(anchor) {
        let Some(other) = mol.atom(n.atom) else { continue };
        let angle = normalize_angle((other.pos - origin).to_angle());
        if other.degree() == 1 && matches!(other.label, AtomLabel::Element(_)) {
            movable.push((n.atom, angle));
        } else {
            fixed.push(angle);
        }
    }

    if fixed.len() <= 1 && !movable.is_empty() {
        return Some(redistribute(mol, origin, length, &fixed, movable));
    }

    let mut dirs = fixed;
    dirs.extend(movable.iter().map(|m| m.1));
    let (start, width) = largest_gap(&dirs)?;
    let angle = snap_angle(start + width / 2.0, ANGLE_SNAP);
    Some(Placement {
        pos: origin + length * DVec2::from_angle(angle),
        moves: Vec::new(),
    })
}

fn redistribute(
    mol: &Molecule,
    origin: DVec2,
    length: f64,
    fixed: &[f64],
    mut movable: Vec<(AtomId, f64)>,
) -> Placement {
    let k = movable.len();
    let mut assignments: Vec<(AtomId, f64)> = Vec::new();
    let new_angle;
    if let Some(&anchor_dir) = fixed.first() {
        // spread everything through the arc behind the fixed neighbor,
        // the new atom in the middle slot
        let step = TAU / (k + 2) as f64;
        let new_slot = (k + 2) / 2;
        movable.sort_by(|a, b| {
            normalize_angle(a.1 - anchor_dir).total_cmp(&normalize_angle(b.1 - anchor_dir))
        });
        let slots = (1..=k + 1).filter(|&i| i != new_slot);
        for (&(id, _), slot) in movable.iter().zip(slots) {
            assignments.push((id, anchor_dir + step * slot as f64));
        }
        new_angle = anchor_dir + step * new_slot as f64;
    } else {
        // nothing is fixed: spread around the full circle, keeping the
        // movables' circular order and appending the new atom
        let step = TAU / (k + 1) as f64;
        movable.sort_by(|a, b| a.1.total_cmp(&b.1));
        let base = movable[0].1;
        for (i, &(id, _)) in movable.iter().enumerate() {
            assignments.push((id, base + step * i as f64));
        }
        new_angle = base + step * k as f64;
    }

    let mut moves = Vec::new();
    for (id, slot_angle) in assignments {
        let Some(atom) = mol.atom(id) else { continue };
        let from = atom.pos;
        let to = origin + from.distance(origin) * DVec2::from_angle(slot_angle);
        if from.distance(to) > 1e-9 {
            moves.push(MovedAtom { atom: id, from, to });
        }
    }
    Placement {
        pos: origin + length * DVec2::from_angle(new_angle),
        moves,
    }
}

// The size-2 intermediate vertices of a regular polygon on edge a-b with
// the given center, walking from a the long way around to b.
fn ring_positions(pa: DVec2, pb: DVec2, center: DVec2, size: usize) -> Vec<DVec2> {
    let step = TAU / size as f64;
    let plus = rotate_about(pa, center, step);
    let minus = rotate_about(pa, center, -step);
    let away = if plus.distance(pb) <= minus.distance(pb) {
        -step
    } else {
        step
    };
    (1..=size.saturating_sub(2))
        .map(|k| rotate_about(pa, center, away * k as f64))
        .collect()
}

// Clone `branch` under `transform`, rewiring bonds that touched
// `source_root` onto `target_root`. Shared by both symmetrize operations:
// mirroring maps the hub onto the leaf, rotation keeps the pivot in place.
fn copy_branch<F: Fn(DVec2) -> DVec2>(
    mol: &mut Molecule,
    branch: &[AtomId],
    source_root: AtomId,
    target_root: AtomId,
    frag: &mut Fragment,
    transform: F,
) {
    let mut map: HashMap<AtomId, AtomId> = HashMap::new();
    for &v in branch {
        let Some(atom) = mol.atom(v) else { continue };
        let (pos, label, charge, isotope) = (atom.pos, atom.label.clone(), atom.charge, atom.isotope);
        let copy = mol.add_atom(transform(pos), label);
        mol.set_charge(copy, charge);
        mol.set_isotope(copy, isotope);
        map.insert(v, copy);
        frag.atoms.push(copy);
    }

    let mut done: HashSet<BondId> = HashSet::new();
    for &v in branch {
        let records: Vec<Neighbor> = mol.neighbors(v).to_vec();
        for n in records {
            if !done.insert(n.bond) {
                continue;
            }
            let Some(bd) = mol.bond(n.bond) else { continue };
            let (x, y) = bd.atoms;
            let kind = bd.kind;
            let map_end = |e: AtomId| {
                if e == source_root {
                    Some(target_root)
                } else {
                    map.get(&e).copied()
                }
            };
            let (Some(nx), Some(ny)) = (map_end(x), map_end(y)) else {
                continue;
            };
            if let Some(nb) = mol.bind(nx, ny, kind) {
                frag.bonds.push(nb);
            }
        }
    }
}
