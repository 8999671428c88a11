mod error;
pub mod keys;
mod projections;
pub mod tables;
mod traits;
mod types;

pub use error::{Result, StoreError};
pub use keys::KeyPair;
pub use projections::{Projection, ROLE_PROJECTIONS, USER_PROJECTIONS};
pub use traits::TableStore;
pub use types::{
    validate_batch, BatchOperation, ContinuationToken, EntityPage, Properties, TableEntity,
    MAX_BATCH_OPERATIONS,
};
