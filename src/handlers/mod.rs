//! Turn handling for hosts

pub mod dialog_manager;

pub use dialog_manager::{DialogManager, StorageKeys, TurnOutcome};
