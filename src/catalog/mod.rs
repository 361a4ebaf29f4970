pub mod filters;
pub mod views;
