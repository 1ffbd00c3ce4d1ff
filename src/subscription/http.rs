//! Cached reads and tracked writes over HTTP, similar to SWR or TanStack Query.
//!
//! # Features
//!
//! - **Queries**: keyed reads with a shared cache, in-flight de-duplication, and
//!   refetch on invalidation. Usable directly or as a subscription.
//! - **Mutations**: writes with `Idle → Pending → Success | Error` state, optional
//!   callbacks, and upload progress passthrough.
//! - **Two-tier errors**: business errors reach per-call handlers; network failures are
//!   published once on the client's notice channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use recipebook::prelude::*;
//! use std::sync::Arc;
//!
//! let client = Arc::new(QueryClient::new());
//! let key = QueryKey::new("READ_CATEGORY_LIST");
//!
//! let categories = Query::new(key.clone(), || Box::pin(fetch_categories()), client.clone())
//!     .on_error(|err| eprintln!("{}", err.user_message()));
//!
//! let create = Mutation::new(client.clone(), |name: String, _| Box::pin(create_category(name)))
//!     .reload_on_success();
//!
//! let mut notices = client.notices();
//! ```

mod cache;
mod config;
mod error;
pub mod mutation;
pub mod query;

pub use cache::CacheEntry;
pub use config::QueryConfig;
pub use error::{ErrorCode, ErrorRes, Notice, QueryError};
pub use mutation::{Mutation, MutationResult, MutationState, SuccessHandler};
pub use query::{ErrorHandler, Query, QueryClient, QueryKey, QueryResult, QueryState};
