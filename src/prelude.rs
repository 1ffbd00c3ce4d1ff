//! Prelude module for convenient imports.
//!
//! ```
//! use recipebook::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`RecipeBook`] and its forms - The recipe book endpoints
//! - [`ClientConfig`] - Backend connection settings
//! - [`Command`] - For running side effects
//! - [`Subscription`] - For long-lived queries
//! - [`Query`], [`Mutation`], [`QueryClient`] - Cached reads and tracked writes
//! - [`StreamExt`] - For consuming notices and state streams

pub use futures::StreamExt;

pub use crate::api::{
    Category, CategoryForm, IdRequest, PictureUpload, QueryName, RecipeBook, RecipeForm,
    RecipeInfo, RecipeSearch, RecipeSummary, RecipeUpdateForm,
};
pub use crate::command::Command;
pub use crate::config::ClientConfig;
pub use crate::subscription::http::{
    ErrorRes, Mutation, MutationResult, MutationState, Notice, Query, QueryClient, QueryError,
    QueryKey, QueryResult, QueryState,
};
pub use crate::subscription::{Subscription, SubscriptionManager};
pub use crate::transport::UploadProgress;
