//! Core contracts for prefstore: typed value conversion, the crypto engine
//! abstraction, and the storage medium the pipeline writes through.
//! Concrete engines and media live in `prefstore-storage`.

pub mod charset;
pub mod convert;
pub mod engine;
pub mod medium;
pub mod transmission;
