//! CrudService: generic CRUD using safe SQL builder.

mod crud;
mod transaction;
pub use crud::CrudService;
pub use transaction::{run_single_statement, RetryPolicy, TxState};
