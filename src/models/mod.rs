pub mod import;
pub mod product;
pub mod store;

pub use import::{ExportOptions, ImportOptions};
pub use product::{NewProduct, Product, ProductField};
pub use store::{NewStore, Store};
