use serde::{Deserialize, Serialize};

use crate::transport::Params;

/// A recipe category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A stored picture. The binary is served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Picture {
    pub id: i64,
}

/// One row of the recipe list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub category: Category,
}

/// Full recipe detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeInfo {
    pub id: i64,
    pub title: String,
    pub ingredients: String,
    pub contents: String,
    #[serde(default)]
    pub tip: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub picture: Option<Picture>,
    pub category: Category,
}

/// Body or parameters carrying a single id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRequest {
    pub id: i64,
}

impl IdRequest {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self { id }
    }
}

/// Response of create and delete endpoints. Any fields are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Recipe list filter.
///
/// `search_type` is either [`RecipeSearch::ALL`] or a category name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSearch {
    pub search_type: String,
    pub search_keyword: String,
}

impl RecipeSearch {
    pub const ALL: &'static str = "all";

    /// Recipes in one category.
    pub fn category(name: impl Into<String>) -> Self {
        Self {
            search_type: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.search_keyword = keyword.into();
        self
    }

    /// Query parameters, which are also part of the cache key.
    #[must_use]
    pub fn params(&self) -> Params {
        Params::flat([
            ("searchType", self.search_type.as_str()),
            ("searchKeyword", self.search_keyword.as_str()),
        ])
    }
}

impl Default for RecipeSearch {
    fn default() -> Self {
        Self {
            search_type: Self::ALL.to_string(),
            search_keyword: String::new(),
        }
    }
}
