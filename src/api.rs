//! The recipe book backend, as queries and mutations.
//!
//! [`RecipeBook`] binds a [`Transport`] to a [`QueryClient`] and hands out ready-made
//! [`Query`] and [`Mutation`] values for every endpoint. Reads are cached under the
//! names in [`QueryName`]; writes validate their form before sending anything.
//!
//! # Example
//!
//! ```rust,no_run
//! use recipebook::api::{CategoryForm, RecipeBook};
//! use recipebook::config::ClientConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let book = RecipeBook::from_config(&ClientConfig::from_env()?);
//!
//! let categories = book.category_list().fetch().await;
//!
//! let create = book
//!     .create_category()
//!     .on_error(|err| eprintln!("{}", err.user_message()))
//!     .reload_on_success();
//! create.mutate(CategoryForm::new("Korean")).await;
//! # Ok(())
//! # }
//! ```

mod dto;
mod form;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::subscription::http::{Mutation, Query, QueryClient, QueryError, QueryKey};
use crate::transport::{Params, Payload, Transport, TransportError};

pub use dto::{Category, Empty, IdRequest, Picture, RecipeInfo, RecipeSearch, RecipeSummary};
pub use form::{
    CATEGORY_NAME_MAX, CategoryForm, FormError, PictureUpload, REFERENCE_MAX, RecipeForm,
    RecipeUpdateForm, TITLE_MAX,
};

/// Backend paths, relative to the base host.
pub mod endpoint {
    pub const CATEGORY_LIST: &str = "/api/v1/recipe/category/list";
    pub const CATEGORY_CREATE: &str = "/api/v1/recipe/category/create";
    pub const CATEGORY_DELETE: &str = "/api/v1/recipe/category/delete";
    pub const RECIPE_LIST: &str = "/api/v1/recipe/list";
    pub const RECIPE_INFO: &str = "/api/v1/recipe/info";
    pub const RECIPE_CREATE: &str = "/api/v1/recipe/create";
    pub const RECIPE_UPDATE: &str = "/api/v1/recipe/update";
    pub const RECIPE_DELETE: &str = "/api/v1/recipe/delete";
    pub const PICTURE_PREVIEW: &str = "/api/v1/recipe/picture/preview";
    pub const PICTURE_DELETE: &str = "/api/v1/recipe/picture/delete";
}

/// Names the cached reads are stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryName {
    CategoryList,
    RecipeList,
    RecipeInfo,
}

impl QueryName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CategoryList => "READ_CATEGORY_LIST",
            Self::RecipeList => "READ_RECIPE_LIST",
            Self::RecipeInfo => "READ_RECIPE_INFO",
        }
    }

    /// The cache key without parameters.
    #[must_use]
    pub fn key(self) -> QueryKey {
        QueryKey::new(self.as_str())
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recipe book endpoints bound to one backend and one query cache.
#[derive(Debug, Clone)]
pub struct RecipeBook {
    transport: Arc<Transport>,
    client: Arc<QueryClient>,
}

impl RecipeBook {
    #[must_use]
    pub fn new(transport: Transport, client: Arc<QueryClient>) -> Self {
        Self {
            transport: Arc::new(transport),
            client,
        }
    }

    /// Creates a recipe book with a fresh query cache.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(Transport::new(config), Arc::new(QueryClient::new()))
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    #[must_use]
    pub const fn client(&self) -> &Arc<QueryClient> {
        &self.client
    }

    /// All categories, cached under `READ_CATEGORY_LIST`.
    #[must_use]
    pub fn category_list(&self) -> Query<Vec<Category>> {
        self.read(QueryName::CategoryList.key(), endpoint::CATEGORY_LIST, None)
    }

    /// Recipes matching `search`, cached under `READ_RECIPE_LIST` plus the search.
    #[must_use]
    pub fn recipe_list(&self, search: &RecipeSearch) -> Query<Vec<RecipeSummary>> {
        let params = search.params();
        self.read(
            QueryName::RecipeList.key().with_params(params.clone()),
            endpoint::RECIPE_LIST,
            Some(params),
        )
    }

    /// One recipe, cached under `READ_RECIPE_INFO` plus its id.
    #[must_use]
    pub fn recipe_info(&self, id: i64) -> Query<RecipeInfo> {
        let params = Params::flat([("id", id.to_string())]);
        self.read(
            QueryName::RecipeInfo.key().with_params(params.clone()),
            endpoint::RECIPE_INFO,
            Some(params),
        )
    }

    #[must_use]
    pub fn create_category(&self) -> Mutation<CategoryForm, Empty> {
        let transport = self.transport.clone();
        Mutation::new(self.client.clone(), move |form: CategoryForm, progress| {
            let transport = transport.clone();
            async move {
                form.validate()?;
                let payload = Payload::json(&form)?;
                let created: Empty = transport
                    .post(endpoint::CATEGORY_CREATE, payload, progress)
                    .await?;
                Ok::<_, QueryError>(created)
            }
            .boxed()
        })
    }

    #[must_use]
    pub fn delete_category(&self) -> Mutation<IdRequest, Empty> {
        self.remove(endpoint::CATEGORY_DELETE)
    }

    /// Creates a recipe. Upload progress covers the picture bytes.
    #[must_use]
    pub fn create_recipe(&self) -> Mutation<RecipeForm, Empty> {
        let transport = self.transport.clone();
        Mutation::new(self.client.clone(), move |form: RecipeForm, progress| {
            let transport = transport.clone();
            async move {
                form.validate()?;
                let payload = Payload::from(form.to_multipart());
                let created: Empty = transport
                    .post(endpoint::RECIPE_CREATE, payload, progress)
                    .await?;
                Ok::<_, QueryError>(created)
            }
            .boxed()
        })
    }

    #[must_use]
    pub fn update_recipe(&self) -> Mutation<RecipeUpdateForm, Empty> {
        let transport = self.transport.clone();
        Mutation::new(self.client.clone(), move |form: RecipeUpdateForm, progress| {
            let transport = transport.clone();
            async move {
                form.validate()?;
                let payload = Payload::from(form.to_multipart());
                let updated: Empty = transport
                    .put(endpoint::RECIPE_UPDATE, payload, progress)
                    .await?;
                Ok::<_, QueryError>(updated)
            }
            .boxed()
        })
    }

    #[must_use]
    pub fn delete_recipe(&self) -> Mutation<IdRequest, Empty> {
        self.remove(endpoint::RECIPE_DELETE)
    }

    #[must_use]
    pub fn delete_picture(&self) -> Mutation<IdRequest, Empty> {
        self.remove(endpoint::PICTURE_DELETE)
    }

    /// Address of a picture's binary, for display.
    pub fn picture_preview_url(&self, id: i64) -> Result<Url, TransportError> {
        let mut url = self.transport.endpoint(endpoint::PICTURE_PREVIEW)?;
        url.query_pairs_mut().append_pair("id", &id.to_string());
        Ok(url)
    }

    /// Downloads a picture's binary.
    pub async fn picture_preview(&self, id: i64) -> Result<Bytes, QueryError> {
        let params = Params::flat([("id", id.to_string())]);
        Ok(self
            .transport
            .get_bytes(endpoint::PICTURE_PREVIEW, Some(&params))
            .await?)
    }

    fn read<V>(&self, key: QueryKey, path: &'static str, params: Option<Params>) -> Query<V>
    where
        V: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let transport = self.transport.clone();
        Query::new(
            key,
            move || {
                let transport = transport.clone();
                let params = params.clone();
                async move { Ok::<V, QueryError>(transport.get(path, params.as_ref()).await?) }.boxed()
            },
            self.client.clone(),
        )
    }

    fn remove(&self, path: &'static str) -> Mutation<IdRequest, Empty> {
        let transport = self.transport.clone();
        Mutation::new(self.client.clone(), move |request: IdRequest, _| {
            let transport = transport.clone();
            async move { Ok::<Empty, QueryError>(transport.delete(path, &request).await?) }.boxed()
        })
    }
}
