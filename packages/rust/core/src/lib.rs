//! Core picklist pipeline and domain logic for cardpick.
//!
//! This crate ties together order retrieval, location resolution, card
//! lookups, pick-path sorting, and export into the `build_picklist`
//! workflow, plus the progress model the TUI drives.

pub mod assembler;
pub mod export;
pub mod locations;
pub mod pipeline;
pub mod progress;
pub mod sorter;
