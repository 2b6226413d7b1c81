pub mod errors;
pub mod refinery;
