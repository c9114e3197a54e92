//! Raw and domain storage
//!
//! Collection writes raw pages through [`RawStore`]; extraction reads them back
//! and writes normalized rows through [`DomainStore`].

mod database;
mod memory;
mod traits;

pub use database::DuckDbStore;
pub use memory::MemoryStore;
pub use traits::{DomainStore, RawRecord, RawStore};
