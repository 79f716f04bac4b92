use glam::DVec2;
use smallvec::SmallVec;

use crate::element::Element;
use crate::index::{AtomId, BondId};
use crate::topology::Topology;

/// One adjacency record of an atom: the atom across the bond, the bond
/// itself, and the bond's order mirrored here for valence bookkeeping.
/// The containing [`Molecule`](crate::Molecule) keeps records symmetric
/// and in sync with the bond list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub atom: AtomId,
    pub bond: BondId,
    pub order: u8,
}

/// What a vertex of the drawing represents.
///
/// Only [`AtomLabel::Element`] vertices take part in valence bookkeeping;
/// the other two are opaque captions carried through the graph unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomLabel {
    /// A single chemical element (the common case).
    Element(Element),
    /// A linear formula fragment drawn as one vertex, e.g. `COOH`.
    Formula(String),
    /// Free text with no chemical meaning.
    Text(String),
}

impl AtomLabel {
    /// The string a renderer would draw for this label.
    pub fn text(&self) -> &str {
        match self {
            AtomLabel::Element(e) => e.symbol(),
            AtomLabel::Formula(s) | AtomLabel::Text(s) => s,
        }
    }

    pub fn element(&self) -> Option<Element> {
        match self {
            AtomLabel::Element(e) => Some(*e),
            _ => None,
        }
    }
}

impl Default for AtomLabel {
    fn default() -> Self {
        AtomLabel::Element(Element::C)
    }
}

/// A vertex of the molecular graph.
///
/// `Atom` stores what the editor needs to draw and grow a structure: a 2D
/// position, the label, the formal charge, and two derived values kept up
/// to date by the containing [`Molecule`](crate::Molecule) — the implicit
/// hydrogen count and the ring/chain topology tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Drawing position in canvas units.
    pub pos: DVec2,
    pub label: AtomLabel,
    /// Formal charge in elementary charge units.
    pub charge: i8,
    /// Mass number override. `None` means natural isotopic abundance.
    pub isotope: Option<u16>,
    /// Number of virtual (suppressed) hydrogens on this atom.
    ///
    /// These are not graph vertices — they are implied by the label's
    /// valence and recomputed after every mutation that can affect it.
    pub hydrogen_count: u8,
    /// Ring/chain classification from the last topology pass.
    pub topology: Topology,
    /// Adjacency records, maintained by the containing molecule.
    pub(crate) neighbors: SmallVec<[Neighbor; 4]>,
}

impl Atom {
    pub fn new(pos: DVec2, label: AtomLabel) -> Atom {
        let mut atom = Atom {
            pos,
            label,
            charge: 0,
            isotope: None,
            hydrogen_count: 0,
            topology: Topology::Undefined,
            neighbors: SmallVec::new(),
        };
        atom.refresh_hydrogens();
        atom
    }

    /// Adjacent atoms with the connecting bond and its order.
    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    /// Sum of the orders of all explicit bonds on this atom.
    pub fn bond_order_sum(&self) -> u8 {
        self.neighbors
            .iter()
            .fold(0u8, |acc, n| acc.saturating_add(n.order))
    }

    /// Whether a renderer would print this vertex's label.
    ///
    /// A plain, uncharged, isotope-free carbon is drawn skeletally (no
    /// caption); everything else is visible. Orientation resolution uses
    /// this to route asymmetric double bonds around captions.
    pub fn has_visible_label(&self) -> bool {
        match self.label {
            AtomLabel::Element(Element::C) => self.charge != 0 || self.isotope.is_some(),
            _ => true,
        }
    }

    pub(crate) fn refresh_hydrogens(&mut self) {
        self.hydrogen_count = match self.label {
            AtomLabel::Element(e) => e.implicit_hydrogens(self.bond_order_sum(), self.charge),
            _ => 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_carbon_is_methane() {
        let a = Atom::new(DVec2::ZERO, AtomLabel::Element(Element::C));
        assert_eq!(a.hydrogen_count, 4);
        assert_eq!(a.degree(), 0);
    }

    #[test]
    fn opaque_labels_have_no_hydrogens() {
        let f = Atom::new(DVec2::ZERO, AtomLabel::Formula("COOH".into()));
        let t = Atom::new(DVec2::ZERO, AtomLabel::Text("?".into()));
        assert_eq!(f.hydrogen_count, 0);
        assert_eq!(t.hydrogen_count, 0);
    }

    #[test]
    fn label_visibility() {
        let mut c = Atom::new(DVec2::ZERO, AtomLabel::Element(Element::C));
        assert!(!c.has_visible_label());
        c.charge = 1;
        assert!(c.has_visible_label());
        c.charge = 0;
        c.isotope = Some(13);
        assert!(c.has_visible_label());

        let n = Atom::new(DVec2::ZERO, AtomLabel::Element(Element::N));
        assert!(n.has_visible_label());
        let f = Atom::new(DVec2::ZERO, AtomLabel::Formula("OEt".into()));
        assert!(f.has_visible_label());
    }

    #[test]
    fn label_text() {
        assert_eq!(AtomLabel::Element(Element::Cl).text(), "Cl");
        assert_eq!(AtomLabel::Formula("NO2".into()).text(), "NO2");
        assert_eq!(AtomLabel::Text("R1".into()).text(), "R1");
    }
}
