//! Input forms and their client-side validation.
//!
//! Validation runs before any request is sent. A failure surfaces as a
//! `NOT_VALID_ERROR` through the same `on_error` path a backend rejection would use.
//! Lengths are counted in characters.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::subscription::http::{ErrorCode, ErrorRes, QueryError};
use crate::transport::{FilePart, MultipartForm};

pub const CATEGORY_NAME_MAX: usize = 20;
pub const TITLE_MAX: usize = 30;
pub const REFERENCE_MAX: usize = 100;

/// A form field that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FormError {
    pub field: &'static str,
    pub message: String,
}

impl FormError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl From<FormError> for ErrorRes {
    fn from(err: FormError) -> Self {
        Self::new(ErrorCode::NOT_VALID, err.message)
    }
}

impl From<FormError> for QueryError {
    fn from(err: FormError) -> Self {
        Self::Response(err.into())
    }
}

fn required(field: &'static str, value: &str, message: &str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        return Err(FormError::new(field, message));
    }
    Ok(())
}

fn max_chars(field: &'static str, value: &str, max: usize, message: &str) -> Result<(), FormError> {
    if value.chars().count() > max {
        return Err(FormError::new(field, message));
    }
    Ok(())
}

/// New category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryForm {
    pub name: String,
}

impl CategoryForm {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        required("name", &self.name, "카테고리 명을 입력해 주세요.")?;
        max_chars(
            "name",
            &self.name,
            CATEGORY_NAME_MAX,
            "카테고리 명은 20자 이하로 입력해 주세요.",
        )
    }
}

/// A picture selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureUpload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Bytes,
}

impl PictureUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: None,
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// New recipe, sent as a multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeForm {
    pub title: String,
    pub picture: Option<PictureUpload>,
    pub category_id: Option<i64>,
    pub ingredients: String,
    pub contents: String,
    pub tip: String,
    pub reference: String,
}

impl RecipeForm {
    /// Checks fields in the order a user fills them in and reports the first problem.
    pub fn validate(&self) -> Result<(), FormError> {
        required("title", &self.title, "제목을 입력해 주세요.")?;
        max_chars("title", &self.title, TITLE_MAX, "제목은 30자 이하로 입력해 주세요.")?;
        if self.category_id.is_none() {
            return Err(FormError::new("categoryId", "카테고리를 선택해 주세요."));
        }
        required("ingredients", &self.ingredients, "재료를 입력해 주세요.")?;
        required("contents", &self.contents, "레시피를 입력해 주세요.")?;
        max_chars(
            "reference",
            &self.reference,
            REFERENCE_MAX,
            "링크 주소는 100자 이하로 입력해 주세요.",
        )
    }

    /// Builds the multipart body: text fields plus the optional `picture` file.
    #[must_use]
    pub fn to_multipart(&self) -> MultipartForm {
        let mut form = MultipartForm::new().text("title", &self.title);

        if let Some(picture) = &self.picture {
            form = form.file(FilePart {
                name: "picture".to_string(),
                file_name: picture.file_name.clone(),
                mime: picture.mime.clone(),
                bytes: picture.bytes.clone(),
            });
        }

        form.text(
            "categoryId",
            self.category_id.map(|id| id.to_string()).unwrap_or_default(),
        )
        .text("ingredients", &self.ingredients)
        .text("contents", &self.contents)
        .text("tip", &self.tip)
        .text("reference", &self.reference)
    }
}

/// Changes to an existing recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeUpdateForm {
    pub id: i64,
    pub recipe: RecipeForm,
}

impl RecipeUpdateForm {
    pub fn validate(&self) -> Result<(), FormError> {
        self.recipe.validate()
    }

    #[must_use]
    pub fn to_multipart(&self) -> MultipartForm {
        // `id` first, then the same fields as a new recipe.
        let recipe = self.recipe.to_multipart();
        let mut form = MultipartForm::new().text("id", self.id.to_string());
        for (name, value) in recipe.fields() {
            form = form.text(name, value);
        }
        for file in recipe.files() {
            form = form.file(file.clone());
        }
        form
    }
}
