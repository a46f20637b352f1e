pub mod connection;
pub mod operations;

pub use connection::RetryPolicy;
pub use operations::{create_schema, fetch_recent, insert_reading};
