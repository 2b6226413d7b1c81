pub mod collector;
pub mod driver;
pub mod grouped;
pub mod merger;
pub mod side_state;
