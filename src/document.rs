//! Flat serde document format for saving and exchanging structures.
//!
//! A [`Document`] is the positional view of a molecule: vertices in
//! insertion order, edges referring to them by index. Handles, slot
//! generations and undo state never leave the process — loading rebuilds
//! a fresh [`Molecule`] and rederives hydrogen counts, topology tags and
//! double-bond orientations from scratch, so a document written by an
//! older build (or edited by hand) always comes back internally
//! consistent.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::atom::AtomLabel;
use crate::bond::{BondKind, BondOrientation};
use crate::element::Element;
use crate::index::AtomId;
use crate::mol::Molecule;
use crate::orientation::update_orientation;
use crate::topology::{update_topology, Topology};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("edge vertex {index} out of range, document has {count} vertices")]
    VertexOutOfRange { index: usize, count: usize },
    #[error("edge connects vertex {0} to itself")]
    DegenerateEdge(usize),
    #[error("duplicate edge between vertices {0} and {1}")]
    DuplicateEdge(usize, usize),
    #[error("unknown element symbol {0:?}")]
    UnknownElement(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// How a vertex label string is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelType {
    /// An element symbol.
    #[default]
    Atom,
    /// A linear formula shown verbatim, e.g. `CO2H`.
    Linear,
    /// Free text.
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    pub x: f64,
    pub y: f64,
    pub label: String,
    #[serde(default)]
    pub label_type: LabelType,
    #[serde(default, skip_serializing_if = "charge_is_zero")]
    pub charge: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isotope: Option<u16>,
    /// Derived; written for the benefit of other readers, ignored on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydrogens: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub vertices: [usize; 2],
    #[serde(default)]
    pub kind: BondKind,
    /// Derived; ignored on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<BondOrientation>,
    /// Derived; ignored on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<EdgeRecord>,
}

fn charge_is_zero(charge: &i8) -> bool {
    *charge == 0
}

impl Document {
    pub fn from_molecule(mol: &Molecule) -> Document {
        let index: std::collections::HashMap<AtomId, usize> =
            mol.atoms().enumerate().map(|(i, id)| (id, i)).collect();

        let vertices = mol
            .atoms()
            .filter_map(|id| mol.atom(id))
            .map(|atom| VertexRecord {
                x: atom.pos.x,
                y: atom.pos.y,
                label: atom.label.text().to_string(),
                label_type: match atom.label {
                    AtomLabel::Element(_) => LabelType::Atom,
                    AtomLabel::Formula(_) => LabelType::Linear,
                    AtomLabel::Text(_) => LabelType::Custom,
                },
                charge: atom.charge,
                isotope: atom.isotope,
                hydrogens: Some(atom.hydrogen_count),
            })
            .collect();

        let edges = mol
            .bonds()
            .filter_map(|id| {
                let bond = mol.bond(id)?;
                let a = *index.get(&bond.atoms.0)?;
                let b = *index.get(&bond.atoms.1)?;
                Some(EdgeRecord {
                    vertices: [a, b],
                    kind: bond.kind,
                    orientation: bond.orientation,
                    topology: Some(bond.topology),
                })
            })
            .collect();

        Document { vertices, edges }
    }

    /// Validate the records and build a molecule. Derived state is
    /// recomputed, whatever the document claimed.
    pub fn to_molecule(&self) -> Result<Molecule, DocumentError> {
        let mut mol = Molecule::new();
        let mut ids = Vec::with_capacity(self.vertices.len());
        for v in &self.vertices {
            let label = match v.label_type {
                LabelType::Atom => AtomLabel::Element(
                    Element::from_symbol(&v.label)
                        .ok_or_else(|| DocumentError::UnknownElement(v.label.clone()))?,
                ),
                LabelType::Linear => AtomLabel::Formula(v.label.clone()),
                LabelType::Custom => AtomLabel::Text(v.label.clone()),
            };
            let id = mol.add_atom(DVec2::new(v.x, v.y), label);
            mol.set_charge(id, v.charge);
            mol.set_isotope(id, v.isotope);
            ids.push(id);
        }

        let count = ids.len();
        for e in &self.edges {
            let [i, j] = e.vertices;
            if let Some(&bad) = [i, j].iter().find(|&&idx| idx >= count) {
                return Err(DocumentError::VertexOutOfRange { index: bad, count });
            }
            if i == j {
                return Err(DocumentError::DegenerateEdge(i));
            }
            if mol.bind(ids[i], ids[j], e.kind).is_none() {
                return Err(DocumentError::DuplicateEdge(i, j));
            }
        }

        update_topology(&mut mol);
        update_orientation(&mut mol);
        debug!(
            vertices = count,
            edges = self.edges.len(),
            "loaded document"
        );
        Ok(mol)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Document, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }
}
