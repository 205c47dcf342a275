//! # Indictment Relay
//!
//! Drafts tenancy-dispute indictments with an OpenAI-style text completion
//! endpoint and relays the generated text to the browser while the upstream
//! is still producing it.
//!
//! ## Pipeline
//!
//! - [`provider`] / [`client`] - issue the upstream request and expose its body as raw chunks
//! - [`streaming::frame`] - reassemble `text/event-stream` records from arbitrary chunking
//! - [`streaming::token`] - decode each record's text fragment and drop leading blank lines
//! - [`streaming::relay`] - publish tokens to a bounded channel with backpressure and cancellation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use indictment_relay::config::RelayConfig;
//! use indictment_relay::handler::{AppState, router};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayConfig::from_env()?;
//! config.validate()?;
//!
//! let listener = tokio::net::TcpListener::bind(&config.server.listen_addr).await?;
//! let app = router(Arc::new(AppState::from_config(config)?));
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod streaming;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
