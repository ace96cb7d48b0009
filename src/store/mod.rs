pub mod memory;
pub mod platform;
pub mod postgres;
pub mod sparql;
pub mod traits;

pub use memory::*;
pub use platform::*;
pub use postgres::*;
pub use sparql::*;
pub use traits::*;
