pub mod combine;
pub mod ordering;
pub mod reduce;
