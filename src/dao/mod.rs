/// Finished race records handed to the stores.
pub mod models;
/// Persistence gateway for finished races.
pub mod race_store;
/// Storage abstraction layer errors.
pub mod storage;
