pub mod file;
pub mod resolve;
