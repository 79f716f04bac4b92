use serde::{Deserialize, Serialize};

use crate::index::AtomId;
use crate::topology::Topology;

/// Visual/chemical shape of a bond.
///
/// The shape is what the user picked in the editor; the chemical order is
/// derived from it via [`BondKind::order`]. Wedges and the "either" shapes
/// exist for drawing purposes and collapse onto orders 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondKind {
    #[default]
    Single,
    Double,
    Triple,
    /// Stereo wedge pointing up (toward the viewer) at the second endpoint.
    WedgeUp,
    /// Stereo wedge pointing down (away from the viewer) at the second endpoint.
    WedgeDown,
    /// Single bond of unspecified stereochemistry.
    SingleEither,
    /// Double bond of unspecified geometry, drawn crossed.
    DoubleEither,
}

impl BondKind {
    /// Integer bond order used for valence bookkeeping.
    pub fn order(self) -> u8 {
        match self {
            BondKind::Single | BondKind::WedgeUp | BondKind::WedgeDown | BondKind::SingleEither => 1,
            BondKind::Double | BondKind::DoubleEither => 2,
            BondKind::Triple => 3,
        }
    }
}

/// Which side of an asymmetric double bond the second stroke is drawn on,
/// looking from the first endpoint toward the second. `Center` means two
/// symmetric strokes around the bond axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondOrientation {
    Left,
    Right,
    Center,
}

/// An edge of the molecular graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    /// Ordered endpoints. The order is meaningful: wedges point from the
    /// first endpoint to the second, and orientation is resolved looking
    /// along that direction.
    pub atoms: (AtomId, AtomId),
    pub kind: BondKind,
    /// Resolved drawing side. `Some` only on plain [`BondKind::Double`]
    /// bonds; every other shape carries `None`.
    pub orientation: Option<BondOrientation>,
    /// Ring/chain classification from the last topology pass.
    pub topology: Topology,
}

impl Bond {
    pub fn new(a: AtomId, b: AtomId, kind: BondKind) -> Bond {
        Bond {
            atoms: (a, b),
            kind,
            orientation: None,
            topology: Topology::Undefined,
        }
    }

    /// Whether this bond joins the two given atoms, in either order.
    pub fn connects(&self, a: AtomId, b: AtomId) -> bool {
        (self.atoms.0 == a && self.atoms.1 == b) || (self.atoms.0 == b && self.atoms.1 == a)
    }

    /// The endpoint opposite `id`, or `None` if `id` is not an endpoint.
    pub fn other(&self, id: AtomId) -> Option<AtomId> {
        if self.atoms.0 == id {
            Some(self.atoms.1)
        } else if self.atoms.1 == id {
            Some(self.atoms.0)
        } else {
            None
        }
    }
}
