//! Core library for the bill-injector command line application.
//!
//! The library injects billing-provider records into an upload template and
//! validates the result. IO adapters live under [`io`], cell and record types
//! inside [`model`], the matching engine in [`identity`], [`filter`],
//! [`matcher`] and [`synthesize`], the cross-check in [`validate`], and the
//! run orchestration under [`sync`].

pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod io;
pub mod matcher;
pub mod model;
pub mod sheet;
pub mod sync;
pub mod synthesize;
pub mod validate;

pub use error::{Result, ToolError};
