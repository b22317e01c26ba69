pub mod cache;
pub mod geometry;
pub mod loader;
pub mod series;
pub mod source;

pub use cache::*;
pub use geometry::*;
pub use loader::*;
pub use series::*;
pub use source::*;
