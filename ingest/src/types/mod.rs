mod cell;
mod semantic;

pub use cell::Cell;
pub use semantic::SemanticType;
pub(crate) use semantic::zero_value_of;
