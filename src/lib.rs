//! ilc: inline class lowering driver.
//!
//! The lowering itself lives in the `ilc-lowering` crate. This crate adds the
//! pieces around it:
//! - [`unit`]: JSON unit manifests and the type-expression syntax they use
//! - [`cli`]: `ilc.json` configuration, the lowering driver and reporting
//! - [`tracing_config`]: opt-in tracing for the `ilc` binary

pub mod cli;
pub mod tracing_config;
pub mod unit;
