mod class;
mod model;

pub use class::ErrorClass;
pub use model::*;
