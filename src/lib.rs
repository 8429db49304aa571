//! # lifelog
//!
//! Capture quick notes and files into OneNote and OneDrive via the Microsoft
//! Graph API.
//!
//! The heart of the crate is the [`auth`] module: a Microsoft OAuth 2.0
//! authenticator that runs the interactive authorization-code flow once
//! (browser, local callback listener, code exchange) and then serves every
//! later call silently from a persisted token cache, refreshing on expiry.
//! The [`graph`] clients sit on top and attach the bearer token to OneNote
//! and OneDrive requests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lifelog::auth::Authenticator;
//! use lifelog::config::Config;
//! use lifelog::graph::onenote::{NewPage, OneNoteClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None);
//!     config.validate()?;
//!
//!     let auth = Authenticator::new(config.client_identity());
//!     if !auth.is_authenticated().await {
//!         // One browser round trip; afterwards the token cache carries us
//!         auth.authenticate().await;
//!     }
//!
//!     let onenote = OneNoteClient::new(&auth);
//!     let page = onenote
//!         .create_page(&NewPage {
//!             title: "Today".to_string(),
//!             content: "A quick thought.".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("created page {}", page.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Credentials come from `config.json` in the working directory or from the
//! `MS_CLIENT_ID` / `MS_CLIENT_SECRET` / `MS_REDIRECT_URI` environment
//! variables; see [`config::Config`].

pub mod auth;
pub mod config;
pub mod error;
pub mod graph;

pub use auth::{Authenticator, ClientIdentity, TokenCache};
pub use config::Config;
pub use error::{LifelogError, Result};
