pub mod products;
pub mod stores;
