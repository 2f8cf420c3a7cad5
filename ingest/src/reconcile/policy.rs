use serde::{Deserialize, Serialize};

/// How pre-existing destination values are treated inside and outside the extent before the
/// staged values are copied in.
///
/// Wiping sets values to null, zeroing sets them to the zero value of their type. Zeroing wins
/// when both are set for the same side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    pub in_panel_wipe: bool,
    pub out_panel_wipe: bool,
    pub in_panel_zero: bool,
    pub out_panel_zero: bool,
}

impl MergePolicy {
    /// Leaves every existing value untouched apart from the staged ones.
    pub fn preserve() -> Self {
        Self {
            in_panel_wipe: false,
            out_panel_wipe: false,
            in_panel_zero: false,
            out_panel_zero: false,
        }
    }

    pub fn touches_inside(&self) -> bool {
        self.in_panel_wipe || self.in_panel_zero
    }

    pub fn touches_outside(&self) -> bool {
        self.out_panel_wipe || self.out_panel_zero
    }
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            in_panel_wipe: true,
            out_panel_wipe: false,
            in_panel_zero: true,
            out_panel_zero: false,
        }
    }
}
