//! Persistence sinks for llmbench run artifacts
//!
//! This crate provides implementations of the `PersistenceSink` trait:
//!
//! - Local filesystem (`{dir}/{run:03}.{kind}.txt`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod local;

pub use local::LocalStorage;
