// engine_core/src/lib.rs
pub mod address;
pub mod config;
pub mod contracts;
pub mod controller;
pub mod data_models;
pub mod driver;
pub mod engine;
pub mod executor;
pub mod handlers;
pub mod indexer;
pub mod invariants;
pub mod js;
pub mod keywords;
pub mod locator;
pub mod normalizer;
pub mod ocr;
pub mod popups;
pub mod shipping;
pub mod utils;
pub mod verifier;

#[cfg(test)]
pub mod test_support;

pub use contracts::{ClickKind, ErrorKind, FieldKind, Intent, Outcome};
pub use engine::{Context, Engine};
