//! Marketplace order retrieval for cardpick.
//!
//! [`HttpOrderClient`] talks to the seller API; [`OrderRetriever`] drives
//! pagination, status filtering, and detail fetching over any [`OrderSource`].

mod client;
mod retriever;

pub use client::{FulfillmentUpdate, HttpOrderClient, OrderSource};
pub use retriever::{OrderRetriever, RetrievalFailure, RetrievalReport};
