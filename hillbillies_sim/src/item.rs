// Boulders and logs: inert carryable debris.
//
// Items are created by cave-ins and by working on rock or trees, and are
// consumed at workshops. A free item falls until it rests at the centre of a
// standable cube. While carried, an item's position is slaved to its
// carrier and it never falls on its own.

use crate::types::{CubeCoord, ItemId, ItemKind, Position, UnitId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub(crate) id: ItemId,
    pub(crate) kind: ItemKind,
    pub(crate) position: Position,
    pub(crate) weight: u32,
    pub(crate) carrier: Option<UnitId>,
}

impl Item {
    pub fn new(id: ItemId, kind: ItemKind, position: Position, weight: u32) -> Self {
        Self {
            id,
            kind,
            position,
            weight,
            carrier: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn cube(&self) -> CubeCoord {
        CubeCoord::of(self.position)
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn carrier(&self) -> Option<UnitId> {
        self.carrier
    }

    pub fn is_carried(&self) -> bool {
        self.carrier.is_some()
    }
}
