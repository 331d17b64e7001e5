//! Multipart article submission, collected into one value object.
//!
//! The editing UI JSON-encodes every text part, so "field absent", the
//! literal `null`, and a real value are three distinct things. They map
//! onto [`Field::Keep`], [`Field::Clear`] and [`Field::Set`]; the handlers
//! pass the resulting draft through the classification/render/registry
//! stages instead of stashing intermediates anywhere.

use axum::extract::Multipart;
use newsdesk_shared::{ClassificationLabel, CmsError, CmsResult, Field};

#[derive(Debug)]
pub struct UploadPart {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ArticleDraft {
    pub title: Option<String>,
    /// Raw rich-text document, kept as the submitted JSON text.
    pub content: Option<String>,
    pub tags: Option<Vec<ClassificationLabel>>,
    /// `Some(vec![])` is an explicit "no category" (falls back to
    /// uncategorized); `None` means the field was not sent.
    pub categories: Option<Vec<ClassificationLabel>>,
    pub head_title: Field<String>,
    pub head_keyword: Field<String>,
    pub head_description: Field<String>,
    pub manual_url: Field<String>,
    pub alt_text: Field<String>,
    pub hidden: Option<bool>,
    pub scheduled_at: Field<i64>,
    pub top_sorting: Field<i64>,
    pub recommend_sorting: Field<i64>,
    pub home_image: Option<UploadPart>,
    pub content_image: Option<UploadPart>,
}

impl ArticleDraft {
    pub async fn from_multipart(mut multipart: Multipart) -> CmsResult<Self> {
        let mut draft = ArticleDraft::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| CmsError::InvalidInput(format!("multipart: {err}")))?
        {
            let Some(name) = field.name().map(ToOwned::to_owned) else {
                continue;
            };
            match name.as_str() {
                "homeImg" | "contentImg" => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| CmsError::InvalidInput(format!("multipart: {err}")))?
                        .to_vec();
                    let part = UploadPart { filename, bytes };
                    if name == "homeImg" {
                        draft.home_image = Some(part);
                    } else {
                        draft.content_image = Some(part);
                    }
                },
                _ => {
                    let raw = field
                        .text()
                        .await
                        .map_err(|err| CmsError::InvalidInput(format!("multipart: {err}")))?;
                    draft.apply_text_part(&name, &raw)?;
                },
            }
        }
        Ok(draft)
    }

    fn apply_text_part(&mut self, name: &str, raw: &str) -> CmsResult<()> {
        match name {
            "title" => self.title = Some(parse_string(raw)),
            "content" => self.content = Some(raw.to_string()),
            "tags" => self.tags = Some(parse_labels(raw)?),
            "categories" => self.categories = Some(parse_labels(raw)?),
            "headTitle" => self.head_title = parse_string_field(raw),
            "headKeyword" => self.head_keyword = parse_string_field(raw),
            "headDescription" => self.head_description = parse_string_field(raw),
            "manualUrl" => self.manual_url = parse_string_field(raw),
            "altText" => self.alt_text = parse_string_field(raw),
            "hidden" => self.hidden = Some(parse_bool(raw)?),
            "scheduledAt" => self.scheduled_at = parse_i64_field(raw)?,
            "topSorting" => self.top_sorting = parse_i64_field(raw)?,
            "recommendSorting" => self.recommend_sorting = parse_i64_field(raw)?,
            // Unknown parts are tolerated so UI additions do not break saves.
            _ => {},
        }
        Ok(())
    }
}

/// A JSON-encoded string part, or a bare string from older clients.
fn parse_string(raw: &str) -> String {
    serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string())
}

fn parse_string_field(raw: &str) -> Field<String> {
    if raw.trim() == "null" {
        Field::Clear
    } else {
        Field::Set(parse_string(raw))
    }
}

fn parse_i64_field(raw: &str) -> CmsResult<Field<i64>> {
    let trimmed = raw.trim();
    if trimmed == "null" || trimmed.is_empty() {
        return Ok(Field::Clear);
    }
    trimmed
        .parse::<i64>()
        .map(Field::Set)
        .map_err(|_| CmsError::InvalidInput(format!("expected a number, got {trimmed:?}")))
}

fn parse_bool(raw: &str) -> CmsResult<bool> {
    match raw.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(CmsError::InvalidInput(format!("expected a boolean, got {other:?}"))),
    }
}

fn parse_labels(raw: &str) -> CmsResult<Vec<ClassificationLabel>> {
    if raw.trim() == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|err| CmsError::InvalidInput(format!("bad classification payload: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_value_and_absent_are_distinct() {
        let mut draft = ArticleDraft::default();
        assert_eq!(draft.manual_url, Field::Keep);

        draft.apply_text_part("manualUrl", "null").expect("null");
        assert_eq!(draft.manual_url, Field::Clear);

        draft.apply_text_part("manualUrl", "\"my-slug\"").expect("value");
        assert_eq!(draft.manual_url, Field::Set("my-slug".to_string()));
    }

    #[test]
    fn numbers_and_booleans() {
        let mut draft = ArticleDraft::default();
        draft.apply_text_part("scheduledAt", "1700000000000").expect("number");
        assert_eq!(draft.scheduled_at, Field::Set(1_700_000_000_000));

        draft.apply_text_part("topSorting", "null").expect("null");
        assert_eq!(draft.top_sorting, Field::Clear);

        draft.apply_text_part("hidden", "true").expect("bool");
        assert_eq!(draft.hidden, Some(true));

        assert!(draft.apply_text_part("hidden", "yes").is_err());
        assert!(draft.apply_text_part("scheduledAt", "soon").is_err());
    }

    #[test]
    fn labels_parse_with_the_new_marker() {
        let mut draft = ArticleDraft::default();
        draft
            .apply_text_part(
                "tags",
                r#"[{"label":"rust","value":"rust","__isNew__":true},{"label":"web","value":"web"}]"#,
            )
            .expect("labels");
        let tags = draft.tags.clone().expect("parsed");
        assert_eq!(tags.len(), 2);
        assert!(tags[0].is_new);
        assert!(!tags[1].is_new);

        draft.apply_text_part("categories", "null").expect("null categories");
        assert_eq!(draft.categories.expect("explicit empty").len(), 0);
    }

    #[test]
    fn bare_strings_from_older_clients_still_work() {
        let mut draft = ArticleDraft::default();
        draft.apply_text_part("title", "plain title").expect("title");
        assert_eq!(draft.title.as_deref(), Some("plain title"));
    }
}
