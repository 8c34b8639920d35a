use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    config::PropertyNames,
    error::{AppError, AppResult},
};

use super::{MovieId, MovieRecord};

// ============================================================================
// Notion database query types
// ============================================================================

/// Body of `POST /v1/databases/{id}/query`
#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub filter: CheckboxFilter<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<&'a str>,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
pub struct CheckboxFilter<'a> {
    pub property: &'a str,
    pub checkbox: CheckboxCondition,
}

#[derive(Debug, Serialize)]
pub struct CheckboxCondition {
    pub equals: bool,
}

/// Raw response of a database query
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<NotionPage>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A database row as returned by Notion
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

/// The property value shapes this app reads; everything else is `Other`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        title: Vec<RichText>,
    },
    MultiSelect {
        multi_select: Vec<SelectOption>,
    },
    Checkbox {
        checkbox: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

impl NotionPage {
    /// Maps a raw page onto a `MovieRecord`.
    ///
    /// The title is every text fragment joined together. A page without a
    /// usable title or without the categories property is rejected so the
    /// caller can skip it.
    pub fn to_movie(&self, props: &PropertyNames) -> AppResult<MovieRecord> {
        let fragments = match self.properties.get(&props.title) {
            Some(PropertyValue::Title { title }) => title,
            Some(_) => {
                return Err(AppError::malformed(
                    &self.id,
                    format!("property '{}' is not a title", props.title),
                ))
            }
            None => {
                return Err(AppError::malformed(
                    &self.id,
                    format!("missing property '{}'", props.title),
                ))
            }
        };

        if fragments.is_empty() {
            return Err(AppError::malformed(&self.id, "title has no text fragments"));
        }

        let title: String = fragments.iter().map(|f| f.plain_text.as_str()).collect();
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::malformed(&self.id, "title is blank"));
        }

        let categories = match self.properties.get(&props.categories) {
            Some(PropertyValue::MultiSelect { multi_select }) => {
                multi_select.iter().map(|o| o.name.clone()).collect()
            }
            Some(_) => {
                return Err(AppError::malformed(
                    &self.id,
                    format!("property '{}' is not a multi-select", props.categories),
                ))
            }
            None => {
                return Err(AppError::malformed(
                    &self.id,
                    format!("missing property '{}'", props.categories),
                ))
            }
        };

        Ok(MovieRecord::new(
            MovieId::new(self.id.clone()),
            title,
            categories,
        ))
    }
}
