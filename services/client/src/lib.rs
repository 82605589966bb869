//! services/client/src/lib.rs
//!
//! The FlashNotes client service: adapters for the local document store and
//! the remote backend, the upload pipeline, and the application flows the
//! `flashnotes` binary is built on.

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod upload;
