//! coverstamp - Stamp episode numbers onto podcast cover artwork.
//!
//! Renders a numbered badge and an optional navigation caption over a base
//! image, one episode at a time or across a whole feed, and publishes the
//! results to a blob store.

pub mod badge;
pub mod autosync;
pub mod batch;
pub mod colors;
pub mod compositor;
pub mod config;
pub mod encode;
pub mod errors;
pub mod export;
pub mod feed;
pub mod fetch;
pub mod image;
pub mod label;
pub mod layout;
pub mod navigation;
pub mod numbering;
pub mod service;
pub mod storage;
pub mod store;
pub mod style;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
