pub mod products;
pub mod schema;
