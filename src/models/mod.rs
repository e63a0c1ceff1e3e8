pub mod category_result;
pub mod summary;

pub use category_result::*;
pub use summary::*;
