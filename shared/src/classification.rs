//! Resolution of tag/category labels coming off the editing UI.
//!
//! The editor submits classification as label objects; a label flagged
//! `__isNew__` is a request to mint the tag on the spot. Tag creation and
//! URL registration happen together so a tag never exists without its
//! public URL.

use serde::Deserialize;

use crate::error::{CmsError, CmsResult};
use crate::taxonomy_store::{CategoryRecord, TagRecord, TaxonomyStore};
use crate::url_registry::{UrlKind, UrlRegistry};

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationLabel {
    pub label: String,
    pub value: String,
    #[serde(rename = "__isNew__", default)]
    pub is_new: bool,
}

pub struct ClassificationResolver<'a> {
    taxonomy: &'a TaxonomyStore,
    urls: &'a UrlRegistry,
}

impl<'a> ClassificationResolver<'a> {
    pub fn new(taxonomy: &'a TaxonomyStore, urls: &'a UrlRegistry) -> Self {
        Self { taxonomy, urls }
    }

    /// Map tag labels to tag records, preserving submission order and
    /// dropping duplicates. Labels flagged new are created (tag plus URL
    /// record); a new label whose name already exists reuses the existing
    /// tag, so re-submitting a form does not fail. An unflagged label that
    /// matches nothing is rejected.
    pub async fn resolve_tags(&self, labels: &[ClassificationLabel]) -> CmsResult<Vec<TagRecord>> {
        let mut seen = Vec::new();
        let mut resolved = Vec::new();
        for label in labels {
            if seen.contains(&label.label) {
                continue;
            }
            seen.push(label.label.clone());

            let existing = self.taxonomy.find_tag_by_name(&label.label).await?;
            let tag = match (existing, label.is_new) {
                (Some(tag), _) => tag,
                (None, true) => {
                    let tag = self.taxonomy.create_tag(&label.label).await?;
                    self.urls
                        .create_url(&tag.id, UrlKind::Tag, None, Some(&tag.name))
                        .await?;
                    tag
                },
                (None, false) => return Err(CmsError::UnknownLabel(label.label.clone())),
            };
            resolved.push(tag);
        }
        Ok(resolved)
    }

    /// At most one category, and it must already exist. No labels means
    /// the article stays uncategorized.
    pub async fn resolve_category(
        &self,
        labels: &[ClassificationLabel],
    ) -> CmsResult<Option<CategoryRecord>> {
        match labels {
            [] => Ok(None),
            [label] => {
                let found = self.taxonomy.find_category_by_name(&label.label).await?;
                found
                    .map(Some)
                    .ok_or_else(|| CmsError::UnknownLabel(label.label.clone()))
            },
            _ => Err(CmsError::InvalidInput(
                "an article takes at most one category".to_string(),
            )),
        }
    }
}
