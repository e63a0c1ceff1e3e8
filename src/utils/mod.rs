pub mod formatting;
pub mod panic;
