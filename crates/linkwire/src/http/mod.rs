//! Request/response transport over HTTP.
//!
//! [`HttpLink`] is the terminating link of a chain. It turns one operation
//! into one HTTP request and decodes one result.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use linkwire::http::HttpLink;
//!
//! let jar = Arc::new(reqwest::cookie::Jar::default());
//! let link = HttpLink::builder("http://localhost:4000")
//!     .cookie_jar(jar)
//!     .build()?;
//! ```

mod envelope;
mod link;

pub use link::{HttpLink, HttpLinkBuilder};
