//! Entry intake from webhooks and manual forms.
//!
//! Automation payloads carry a single formula string of the form
//! `Name|Cage`. Two shapes are accepted: the page-automation shape, where the
//! string sits in a formula-typed entry of `data.properties`, and a flat
//! legacy shape with `formulaContent`, `content` or `text` at the top level.

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::storage::{AppendOutcome, EntryStore};

/// Header an automation sender is expected to sign requests with.
pub const SIGNATURE_HEADER: &str = "x-notion-signature";

const LEGACY_TEXT_FIELDS: [&str; 3] = ["formulaContent", "content", "text"];

/// The parts of a payload needed to build an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookFields {
    /// Trimmed name.
    pub name: String,
    /// Trimmed cage.
    pub cage: String,
    /// Source page id, if the payload carried one.
    pub page_id: Option<String>,
}

impl WebhookFields {
    /// Link for the label: the page id without dashes when known, otherwise
    /// the allocated egg id, appended to `link_base`.
    #[must_use]
    pub fn link(&self, link_base: &str, egg_id: &str) -> String {
        match &self.page_id {
            Some(page) => format!("{link_base}{}", page.replace('-', "")),
            None => format!("{link_base}{egg_id}"),
        }
    }
}

/// Extract name, cage and page id from a webhook payload.
///
/// # Errors
///
/// Returns [`Error::InvalidPayload`] when no formula string is present, the
/// string has no `|`, or either part is blank.
pub fn parse_payload(body: &Value) -> Result<WebhookFields> {
    let (formula, page_id) = match body.pointer("/data/properties").and_then(Value::as_object) {
        Some(properties) => {
            let formula = properties
                .values()
                .find_map(formula_string)
                .ok_or_else(|| Error::invalid_payload("no string formula property found"))?;
            (formula, non_empty_str(body.pointer("/data/id")))
        }
        None => {
            let formula = LEGACY_TEXT_FIELDS
                .iter()
                .find_map(|field| non_empty_str(body.get(*field)))
                .ok_or_else(|| Error::invalid_payload("no formula content in payload"))?;
            (formula, non_empty_str(body.get("pageId")))
        }
    };

    let (name, cage) = split_formula(&formula)?;
    debug!(%name, %cage, page_id = ?page_id, "parsed webhook payload");
    Ok(WebhookFields {
        name,
        cage,
        page_id,
    })
}

/// Split a `Name|Cage` string into its trimmed first two parts.
///
/// # Errors
///
/// Returns [`Error::InvalidPayload`] when there are fewer than two parts or
/// either is blank after trimming.
pub fn split_formula(formula: &str) -> Result<(String, String)> {
    let mut parts = formula.split('|').map(str::trim);
    let (Some(name), Some(cage)) = (parts.next(), parts.next()) else {
        return Err(Error::invalid_payload(format!(
            "expected `Name|Cage`, got {formula:?}"
        )));
    };
    if name.is_empty() || cage.is_empty() {
        return Err(Error::invalid_payload("name and cage must both be non-empty"));
    }
    Ok((name.to_string(), cage.to_string()))
}

/// Allocate an egg id and store an entry built from `fields`.
///
/// # Errors
///
/// Returns a storage error if the entry document is unreadable or the write
/// fails.
pub async fn ingest(
    store: &EntryStore,
    config: &Config,
    fields: WebhookFields,
) -> Result<(Entry, AppendOutcome)> {
    let link_base = config.labels.link_base.clone();
    let (entry, outcome) = store
        .append_with_next_egg_id(move |egg_id| {
            let link = fields.link(&link_base, &egg_id);
            Entry::new(egg_id, fields.name, fields.cage, link)
        })
        .await?;
    info!(egg_id = %entry.egg_id, ?outcome, "webhook entry stored");
    Ok((entry, outcome))
}

/// Build an entry from manually supplied fields.
///
/// `egg_id`, `name` and `cage` are trimmed and must be non-empty. A blank
/// `link` defaults to the link base plus the egg id; a given one must be an
/// absolute http(s) URL.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming the first offending field.
pub fn manual_entry(
    config: &Config,
    egg_id: &str,
    name: &str,
    cage: &str,
    link: Option<&str>,
) -> Result<Entry> {
    let egg_id = required("egg_id", egg_id)?;
    let name = required("name", name)?;
    let cage = required("cage", cage)?;
    let link = checked_link(link)?.unwrap_or_else(|| config.link_for(egg_id));

    Ok(Entry::new(egg_id, name, cage, link))
}

/// Validate manual fields, then allocate the next egg id and store the entry.
///
/// Same rules as [`manual_entry`], minus the egg id, which comes from the
/// allocator under the store's write gate.
///
/// # Errors
///
/// Returns [`Error::Validation`] for bad fields, or a storage error.
pub async fn add_allocated(
    store: &EntryStore,
    config: &Config,
    name: &str,
    cage: &str,
    link: Option<&str>,
) -> Result<(Entry, AppendOutcome)> {
    let name = required("name", name)?.to_string();
    let cage = required("cage", cage)?.to_string();
    let link = checked_link(link)?;
    let link_base = config.labels.link_base.clone();

    let (entry, outcome) = store
        .append_with_next_egg_id(move |egg_id| {
            let link = link.unwrap_or_else(|| format!("{link_base}{egg_id}"));
            Entry::new(egg_id, name, cage, link)
        })
        .await?;
    info!(egg_id = %entry.egg_id, ?outcome, "manual entry stored");
    Ok((entry, outcome))
}

fn checked_link(link: Option<&str>) -> Result<Option<String>> {
    let Some(link) = link.map(str::trim).filter(|l| !l.is_empty()) else {
        return Ok(None);
    };
    let valid = Url::parse(link).is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
    if valid {
        Ok(Some(link.to_string()))
    } else {
        Err(Error::validation("link must be an absolute http(s) URL"))
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::validation(format!("{field} is required")))
    } else {
        Ok(value)
    }
}

fn formula_string(property: &Value) -> Option<String> {
    if property.get("type").and_then(Value::as_str) != Some("formula") {
        return None;
    }
    let formula = property.get("formula")?;
    if formula.get("type").and_then(Value::as_str) != Some("string") {
        return None;
    }
    non_empty_str(formula.get("string"))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn automation_payload(formula: &str) -> Value {
        json!({
            "source": { "type": "automation" },
            "data": {
                "object": "page",
                "id": "1f2e3d4c-5b6a-7980-a1b2-c3d4e5f60718",
                "properties": {
                    "Title": { "type": "title", "title": [] },
                    "Label": {
                        "type": "formula",
                        "formula": { "type": "string", "string": formula }
                    }
                }
            }
        })
    }

    #[test]
    fn test_split_formula() {
        assert_eq!(
            split_formula("Alice|B12").unwrap(),
            ("Alice".to_string(), "B12".to_string())
        );
        assert_eq!(
            split_formula("  Alice  |  B12  ").unwrap(),
            ("Alice".to_string(), "B12".to_string())
        );
        assert_eq!(
            split_formula("Alice|B12|extra").unwrap(),
            ("Alice".to_string(), "B12".to_string())
        );
    }

    #[test]
    fn test_split_formula_rejections() {
        assert!(split_formula("Alice").is_err());
        assert!(split_formula("Alice|").is_err());
        assert!(split_formula(" |B12").is_err());
        assert!(split_formula("").is_err());
    }

    #[test]
    fn test_parse_automation_payload() {
        let fields = parse_payload(&automation_payload("Alice|B12")).unwrap();
        assert_eq!(fields.name, "Alice");
        assert_eq!(fields.cage, "B12");
        assert_eq!(
            fields.page_id.as_deref(),
            Some("1f2e3d4c-5b6a-7980-a1b2-c3d4e5f60718")
        );
        assert_eq!(
            fields.link("https://www.notion.so/", "Egg-1"),
            "https://www.notion.so/1f2e3d4c5b6a7980a1b2c3d4e5f60718"
        );
    }

    #[test]
    fn test_parse_rejects_missing_delimiter() {
        let err = parse_payload(&automation_payload("Alice")).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
    }

    #[test]
    fn test_parse_ignores_non_string_formulas() {
        let body = json!({
            "data": {
                "id": "abc",
                "properties": {
                    "Count": { "type": "formula", "formula": { "type": "number", "number": 3 } }
                }
            }
        });
        assert!(parse_payload(&body).is_err());
    }

    #[test]
    fn test_parse_legacy_payload() {
        let body = json!({ "content": "Bob | C3", "pageId": "deadbeef" });
        let fields = parse_payload(&body).unwrap();
        assert_eq!(fields.name, "Bob");
        assert_eq!(fields.cage, "C3");
        assert_eq!(fields.link("https://www.notion.so/", "Egg-9"), "https://www.notion.so/deadbeef");
    }

    #[test]
    fn test_legacy_field_precedence() {
        let body = json!({ "formulaContent": "", "content": "A|1", "text": "B|2" });
        assert_eq!(parse_payload(&body).unwrap().name, "A");
    }

    #[test]
    fn test_link_without_page_id_uses_egg_id() {
        let fields = parse_payload(&json!({ "text": "Carol|D4" })).unwrap();
        assert_eq!(fields.page_id, None);
        assert_eq!(fields.link("https://www.notion.so/", "Egg-12"), "https://www.notion.so/Egg-12");
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(parse_payload(&json!({})).is_err());
        assert!(parse_payload(&json!(null)).is_err());
    }

    #[test]
    fn test_manual_entry_defaults_link() {
        let config = Config::default();
        let entry = manual_entry(&config, " Egg-5 ", "Alice", "B12", None).unwrap();
        assert_eq!(entry.egg_id, "Egg-5");
        assert_eq!(entry.link, "https://www.notion.so/Egg-5");

        let blank = manual_entry(&config, "Egg-6", "Alice", "B12", Some("  ")).unwrap();
        assert_eq!(blank.link, "https://www.notion.so/Egg-6");
    }

    #[test]
    fn test_manual_entry_validation() {
        let config = Config::default();
        let err = manual_entry(&config, "Egg-5", "  ", "B12", None).unwrap_err();
        assert!(err.to_string().contains("name is required"));

        let err = manual_entry(&config, "Egg-5", "A", "B", Some("not a url")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = manual_entry(&config, "Egg-5", "A", "B", Some("ftp://x/y")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let ok = manual_entry(&config, "Egg-5", "A", "B", Some("https://example.com/p")).unwrap();
        assert_eq!(ok.link, "https://example.com/p");
    }

    #[tokio::test]
    async fn test_ingest_allocates_sequentially() {
        let store = EntryStore::in_memory();
        let config = Config::default();

        let fields = parse_payload(&json!({ "text": "Alice|B12" })).unwrap();
        let (first, outcome) = ingest(&store, &config, fields.clone()).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Appended);
        assert_eq!(first.egg_id, "Egg-1");
        assert_eq!(first.link, "https://www.notion.so/Egg-1");

        let (second, _) = ingest(&store, &config, fields).await.unwrap();
        assert_eq!(second.egg_id, "Egg-2");
        assert_eq!(store.read_all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_add_allocated() {
        let store = EntryStore::in_memory();
        let config = Config::default();

        let (first, _) = add_allocated(&store, &config, " Alice ", "B12", None).await.unwrap();
        assert_eq!(first.egg_id, "Egg-1");
        assert_eq!(first.name, "Alice");
        assert_eq!(first.link, "https://www.notion.so/Egg-1");

        let (second, _) = add_allocated(&store, &config, "Bob", "C3", Some("https://example.com/b"))
            .await
            .unwrap();
        assert_eq!(second.egg_id, "Egg-2");
        assert_eq!(second.link, "https://example.com/b");
    }

    #[tokio::test]
    async fn test_add_allocated_validates_before_storing() {
        let store = EntryStore::in_memory();
        let config = Config::default();

        assert!(add_allocated(&store, &config, "", "B12", None).await.is_err());
        assert!(add_allocated(&store, &config, "Alice", "B12", Some("nope")).await.is_err());
        assert!(store.read_all().await.is_empty());
    }
}
