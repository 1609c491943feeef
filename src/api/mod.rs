pub mod providers;

pub use providers::{Catalog, HttpCatalog, Provider};
