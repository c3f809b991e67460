pub mod handler;
pub mod session;
pub mod storage;
