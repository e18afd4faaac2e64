//! Microsoft Dynamics 365 extractor
//!
//! Downloads an OData entity collection page by page into a quoted CSV table
//! with a JSON manifest, authenticating with a rotating OAuth refresh token.

pub mod api;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod extractor;
pub mod output;
