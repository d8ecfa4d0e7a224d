pub mod serializer;
pub mod types;

pub use serializer::{serialize, serialize_batch};
pub use types::TransactionRecord;
