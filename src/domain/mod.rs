//! Core domain types and logic.

pub mod asset_class;
pub mod config_validation;
pub mod emi;
pub mod error;
pub mod format;
pub mod goal;
pub mod instrument;
pub mod policy;
pub mod position;
pub mod price_history;
pub mod returns;
pub mod schedule;
pub mod simulation;
pub mod tax;
pub mod universe;
