//! Falling-marker data model.
//!
//! A marker is either a solid color or a wildcard. Wildcards carry
//! their resolution state explicitly so callers match on it instead of
//! downcasting: `resolved` stays `None` while falling and is filled in
//! when the grid settles the color.

use crate::types::TreeColor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    Solid(TreeColor),
    Wildcard { resolved: Option<TreeColor> },
}

impl Marker {
    pub fn solid(color: TreeColor) -> Self {
        debug_assert!(color.is_concrete(), "solid markers carry a concrete color");
        Self::Solid(color)
    }

    pub fn wildcard() -> Self {
        Self::Wildcard { resolved: None }
    }

    /// The color this marker presents to `check_neighbors` while
    /// falling: its own for solids, the wildcard sentinel otherwise.
    pub fn drop_color(&self) -> TreeColor {
        match *self {
            Self::Solid(color) => color,
            Self::Wildcard { .. } => TreeColor::Wildcard,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard { .. })
    }

    /// Records the color the grid settled this wildcard to. No-op for
    /// solid markers.
    pub fn set_resolved(&mut self, color: TreeColor) {
        debug_assert!(color.is_concrete());
        if let Self::Wildcard { resolved } = self {
            *resolved = Some(color);
        }
    }

    /// The color to display: the resolved color once a wildcard has
    /// settled, otherwise the drop color.
    pub fn display_color(&self) -> TreeColor {
        match *self {
            Self::Solid(color) => color,
            Self::Wildcard { resolved } => resolved.unwrap_or(TreeColor::Wildcard),
        }
    }
}
