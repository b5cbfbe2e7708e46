//! Boundary arithmetic for inserts and moves.
//!
//! Everything here is pure: callers read [`NodeBounds`] inside their
//! transaction and feed them in, then hand the results to the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NestedSetError;
use crate::node::{NodeBounds, NODE_WIDTH};

/// Where a new or moved node lands relative to a target node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Before,
    After,
    AppendChild,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Before => "before",
            Region::After => "after",
            Region::AppendChild => "append_child",
        }
    }

    /// Extra depth gained relative to the target.
    fn depth_offset(&self) -> i32 {
        match self {
            Region::Before | Region::After => 0,
            Region::AppendChild => 1,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = NestedSetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "before" => Ok(Region::Before),
            "after" => Ok(Region::After),
            "append_child" => Ok(Region::AppendChild),
            other => Err(NestedSetError::UnknownRegion(other.to_owned())),
        }
    }
}

/// How far a subtree travels and which rows to pick up before it does.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MoveCalculation {
    /// Added to both boundaries of every relocated row.
    pub distance: i32,
    /// Current left boundary of the moved node once the target gap is open.
    pub temp_anchor: i32,
    /// Boundary units occupied by the moved subtree.
    pub width: i32,
}

impl MoveCalculation {
    /// Right edge of the slot the subtree leaves behind.
    pub fn vacated_right(&self) -> i32 {
        self.temp_anchor + self.width - 1
    }
}

/// Boundary at which space has to be opened for `region` relative to `target`.
pub fn resolve_insertion_boundary(region: Region, target: &NodeBounds) -> i32 {
    match region {
        Region::Before => target.left_bound,
        Region::After => target.right_bound + 1,
        Region::AppendChild => target.right_bound,
    }
}

/// Boundary units occupied by a node and all of its descendants.
pub fn subtree_width(node: &NodeBounds) -> i32 {
    node.right_bound - node.left_bound + 1
}

/// Width of the gap to close after removing `node`'s range, always a whole
/// number of node steps.
pub fn closing_width(node: &NodeBounds) -> i32 {
    let width = subtree_width(node);
    width + width.rem_euclid(NODE_WIDTH)
}

/// Distance and pickup anchor for moving `moved` so its left boundary lands on
/// `new_boundary`, assuming the gap at `new_boundary` is already open.
///
/// Inside one tree, opening the gap at or before the source also pushed the
/// source right by `width`; the anchor follows it and the distance shrinks by
/// the same amount.
pub fn compute_move_distance(
    moved: &NodeBounds,
    target: &NodeBounds,
    new_boundary: i32,
    width: i32,
) -> MoveCalculation {
    let mut distance = new_boundary - moved.left_bound;
    let mut temp_anchor = moved.left_bound;

    if moved.root_id == target.root_id && distance <= 0 {
        distance -= width;
        temp_anchor += width;
    }

    MoveCalculation {
        distance,
        temp_anchor,
        width,
    }
}

pub fn compute_level_delta(region: Region, moved_level: i32, target_level: i32) -> i32 {
    target_level - moved_level + region.depth_offset()
}

/// Level a node placed at `region` relative to `target` ends up on.
pub fn resolve_new_level(region: Region, target: &NodeBounds) -> i32 {
    target.level + region.depth_offset()
}

pub fn resolve_new_parent_id(region: Region, target: &NodeBounds) -> i32 {
    match region {
        Region::Before | Region::After => target.parent_id,
        Region::AppendChild => target.node_id,
    }
}
