// Promise bookkeeping owned by the coordinator

pub mod table;

pub use table::*;
