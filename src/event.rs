use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::build::BuildError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl Event {
    pub fn new(id: impl Into<String>, title: impl Into<String>, tags: &[&str]) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: None,
            tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Case-insensitive substring match over the searchable fields.
    /// `needle` must already be lowercase.
    pub fn matches_query(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self
                .category
                .as_deref()
                .is_some_and(|category| category.to_lowercase().contains(needle))
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(needle))
    }
}

#[derive(Clone, Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Option<Value>,
}

fn event_from_value(value: &Value) -> Result<Event, BuildError> {
    let raw = RawEvent::deserialize(value).map_err(|error| BuildError::InvalidInput {
        id: None,
        reason: error.to_string(),
    })?;

    let id = match raw.id {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(Value::Number(number)) => number.to_string(),
        _ => {
            return Err(BuildError::InvalidInput {
                id: None,
                reason: "missing id".to_owned(),
            });
        }
    };

    let title = raw
        .title
        .filter(|title| !title.trim().is_empty())
        .ok_or_else(|| BuildError::InvalidInput {
            id: Some(id.clone()),
            reason: "missing title".to_owned(),
        })?;

    let tags = match raw.tags {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(tag) => Ok(tag),
                other => Err(BuildError::InvalidInput {
                    id: Some(id.clone()),
                    reason: format!("tag is not a string: {other}"),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(BuildError::InvalidInput {
                id: Some(id.clone()),
                reason: "tags are not a list".to_owned(),
            });
        }
    };

    Ok(Event {
        id,
        title,
        description: raw.description.unwrap_or_default(),
        category: raw.category.filter(|category| !category.trim().is_empty()),
        tags,
    })
}

/// Events that survived validation, plus the reasons the rest were skipped.
#[derive(Debug, Default)]
pub struct ParsedEvents {
    pub events: Vec<Event>,
    pub rejected: Vec<BuildError>,
}

pub fn parse_events(raw: &str) -> Result<ParsedEvents> {
    let parsed: Value = serde_json::from_str(raw).context("invalid event JSON")?;
    let records = match &parsed {
        Value::Array(records) => records,
        Value::Object(object) => object
            .get("events")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("expected an `events` array in event JSON"))?,
        _ => return Err(anyhow!("unexpected JSON type for event list")),
    };

    let mut seen = HashSet::with_capacity(records.len());
    let mut result = ParsedEvents::default();
    for record in records {
        match event_from_value(record) {
            Ok(event) => {
                if seen.insert(event.id.clone()) {
                    result.events.push(event);
                } else {
                    result.rejected.push(BuildError::InvalidInput {
                        id: Some(event.id),
                        reason: "duplicate id".to_owned(),
                    });
                }
            }
            Err(error) => result.rejected.push(error),
        }
    }

    Ok(result)
}

pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read events from {}", path.display()))?;
    let parsed = parse_events(&raw)
        .with_context(|| format!("failed to parse events from {}", path.display()))?;

    for rejected in &parsed.rejected {
        warn!(%rejected, "skipping event");
    }
    info!(
        loaded = parsed.events.len(),
        skipped = parsed.rejected.len(),
        "loaded events from {}",
        path.display()
    );

    Ok(parsed.events)
}
