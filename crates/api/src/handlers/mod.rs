pub mod connections;
pub mod pin;
