pub mod hub;
pub mod snapshot;
pub mod stream;
