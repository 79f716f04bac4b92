pub mod atom;
pub mod bond;
pub mod document;
pub mod editor;
pub mod element;
pub mod geometry;
pub mod history;
pub mod index;
pub mod mol;
pub mod orientation;
pub mod topology;

pub use atom::{Atom, AtomLabel, Neighbor};
pub use bond::{Bond, BondKind, BondOrientation};
pub use document::{Document, DocumentError, EdgeRecord, LabelType, VertexRecord};
pub use element::Element;
pub use history::{Action, ActionStack, EditAction, EditOp};
pub use index::{AtomId, BondId};
pub use mol::{Detached, Fragment, Molecule, MovedAtom, DEFAULT_BOND_LENGTH};
pub use orientation::update_orientation;
pub use topology::{update_topology, RingSystem, Topology};
