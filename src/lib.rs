//! # Recipebook - query/mutation client for the recipe book backend
//!
//! Recipebook talks to the recipe book REST backend and gives the view layer what it
//! needs: cached, de-duplicated reads and tracked writes, with failures reduced to one
//! normalized shape.
//!
//! ## Layers
//!
//! 1. **Transport**: one HTTP call per invocation against the configured base host,
//!    with upload progress reporting and no retries.
//! 2. **Queries**: reads keyed by name and parameters. Overlapping reads of the same
//!    key share one request, and the result is cached for every observer.
//! 3. **Mutations**: writes tracked through `Idle → Pending → Success | Error`, with
//!    optional success, error, and progress callbacks.
//! 4. **API**: the recipe book endpoints built from the layers above.
//!
//! ## Errors
//!
//! Network failures (no response) are published on a process-wide notice channel and
//! never reach per-call handlers. Everything else becomes an
//! [`ErrorRes`](subscription::http::ErrorRes) `{ errorCode, message }` handed to the
//! caller's `on_error`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use recipebook::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let book = RecipeBook::from_config(&ClientConfig::from_env()?);
//!
//! let mut notices = book.client().notices();
//! tokio::spawn(async move {
//!     while let Some(notice) = notices.next().await {
//!         eprintln!("{notice:?}");
//!     }
//! });
//!
//! let categories = book
//!     .category_list()
//!     .on_error(|err| eprintln!("{}", err.user_message()))
//!     .fetch()
//!     .await;
//!
//! if let Some(categories) = categories.data() {
//!     for category in categories {
//!         println!("{}: {}", category.id, category.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod command;
pub mod config;
pub mod prelude;
pub mod subscription;
pub mod transport;
