//! Composited multi-slice geospatial scene.
//!
//! `Dashboard` owns the per-slice state (data, order, visibility, selection,
//! time cursor, viewport) and turns it into one ordered layer list.

pub mod compositor;
pub mod dashboard;
pub mod events;
pub mod load;
pub mod selection;
pub mod settings;
pub mod temporal;
pub mod viewport;
pub mod visibility;

pub use compositor::*;
pub use dashboard::*;
pub use events::*;
pub use load::*;
pub use selection::*;
pub use settings::*;
pub use temporal::*;
pub use viewport::*;
pub use visibility::*;
