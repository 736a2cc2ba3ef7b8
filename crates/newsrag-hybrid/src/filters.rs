//! Post-retrieval filters over chunk metadata.
//!
//! Entity lists arrive in several shapes (`["Acme"]`,
//! `[{"name": "Acme", "role": "lead"}]`, a bare string). They are
//! normalized into [`EntityRef`] here and nowhere else.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use newsrag_core::traits::DateParser;
use newsrag_core::types::{DateFilter, FusedResult, Metadata, RankedResult, RetrievalHit};
use newsrag_core::RetrievalError;

/// Anything carrying chunk metadata.
pub trait HasMetadata {
    fn metadata(&self) -> &Metadata;
}

impl HasMetadata for FusedResult {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl HasMetadata for RankedResult {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl HasMetadata for RetrievalHit {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

pub struct TemporalFilter {
    presets: BTreeMap<String, u32>,
    parser: Arc<dyn DateParser>,
}

impl TemporalFilter {
    pub fn new(presets: BTreeMap<String, u32>, parser: Arc<dyn DateParser>) -> Self {
        Self { presets, parser }
    }

    pub fn parse(&self, filter: &DateFilter) -> Result<Option<DateRange>, RetrievalError> {
        self.parse_at(filter, Utc::now())
    }

    /// Resolves a filter against `now`.
    ///
    /// A preset spans `now - days ..= now`. Any other string is parsed as a
    /// date and spans from it to `now`. A range with one bound gets the
    /// earliest representable instant or `now` for the other. `Ok(None)`
    /// means the filter imposes nothing; `InvalidFilter` means it was
    /// supplied but nothing in it could be parsed.
    pub fn parse_at(&self, filter: &DateFilter, now: DateTime<Utc>) -> Result<Option<DateRange>, RetrievalError> {
        match filter {
            DateFilter::Preset(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Ok(None);
                }
                if let Some(days) = self.presets.get(name) {
                    let start = now.checked_sub_signed(Duration::days(i64::from(*days))).unwrap_or(DateTime::<Utc>::MIN_UTC);
                    return Ok(Some(DateRange { start, end: now }));
                }
                match self.parser.parse(name) {
                    Some(start) => Ok(Some(DateRange { start, end: now })),
                    None => Err(RetrievalError::InvalidFilter(format!("unrecognized date filter '{name}'"))),
                }
            }
            DateFilter::Range { start_date, end_date } => {
                fn given(s: &Option<String>) -> Option<&str> {
                    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
                }
                let (start_raw, end_raw) = (given(start_date), given(end_date));
                if start_raw.is_none() && end_raw.is_none() {
                    return Ok(None);
                }
                let start = start_raw.and_then(|s| self.parser.parse(s));
                let end = end_raw.and_then(|s| self.parser.parse(s));
                if start.is_none() && end.is_none() {
                    return Err(RetrievalError::InvalidFilter(format!(
                        "unparseable date range {start_raw:?}..{end_raw:?}"
                    )));
                }
                Ok(Some(DateRange { start: start.unwrap_or(DateTime::<Utc>::MIN_UTC), end: end.unwrap_or(now) }))
            }
        }
    }

    /// Publication date from `published_date`, falling back to `date`.
    /// Strings go through the date parser; integers are unix seconds.
    pub fn metadata_date(&self, metadata: &Metadata) -> Option<DateTime<Utc>> {
        let value = ["published_date", "date"]
            .iter()
            .filter_map(|k| metadata.get(*k))
            .find(|v| match v {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            })?;
        match value {
            Value::String(s) => self.parser.parse(s),
            Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            _ => None,
        }
    }

    /// Keeps results without a usable date and results dated inside `range`.
    pub fn filter<T: HasMetadata>(&self, results: Vec<T>, range: &DateRange) -> Vec<T> {
        results
            .into_iter()
            .filter(|r| self.metadata_date(r.metadata()).map_or(true, |d| range.contains(d)))
            .collect()
    }
}

/// Canonical entity shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub name: String,
}

/// Reads an entity list from metadata. Strings are names; objects
/// contribute the first of `name_keys` holding a string. A bare string is
/// a one-element list. Other shapes yield nothing.
pub fn normalize_entities(value: Option<&Value>, name_keys: &[&str]) -> Vec<EntityRef> {
    let one = |v: &Value| -> Option<EntityRef> {
        let name = match v {
            Value::String(s) => s.as_str(),
            Value::Object(map) => name_keys.iter().find_map(|k| map.get(*k).and_then(Value::as_str))?,
            _ => return None,
        };
        let name = name.trim();
        (!name.is_empty()).then(|| EntityRef { name: name.to_string() })
    };
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(one).collect(),
        Some(v @ Value::String(_)) => one(v).into_iter().collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy)]
struct Dimension {
    key: &'static str,
    name_keys: &'static [&'static str],
}

const COMPANIES: Dimension = Dimension { key: "companies", name_keys: &["name"] };
const INVESTORS: Dimension = Dimension { key: "investors", name_keys: &["name"] };
const SECTORS: Dimension = Dimension { key: "sectors", name_keys: &["sector", "name"] };

/// Case-insensitive substring match over companies, investors and sectors.
/// Every supplied dimension must match; dimensions left out (or given as
/// empty lists) are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    dimensions: Vec<(Dimension, Vec<String>)>,
}

impl EntityFilter {
    pub fn new(companies: Option<&[String]>, investors: Option<&[String]>, sectors: Option<&[String]>) -> Self {
        let dimensions = [(COMPANIES, companies), (INVESTORS, investors), (SECTORS, sectors)]
            .into_iter()
            .filter_map(|(dim, terms)| {
                let terms: Vec<String> = terms?
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                (!terms.is_empty()).then_some((dim, terms))
            })
            .collect();
        Self { dimensions }
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.dimensions.iter().all(|(dim, terms)| {
            normalize_entities(metadata.get(dim.key), dim.name_keys).iter().any(|entity| {
                let name = entity.name.to_lowercase();
                terms.iter().any(|t| name.contains(t.as_str()))
            })
        })
    }

    pub fn apply<T: HasMetadata>(&self, results: Vec<T>) -> Vec<T> {
        if self.is_empty() {
            return results;
        }
        results.into_iter().filter(|r| self.matches(r.metadata())).collect()
    }
}

/// Order-preserving entity filter over `results`.
pub fn filter_by_entities<T: HasMetadata>(
    results: Vec<T>,
    companies: Option<&[String]>,
    investors: Option<&[String]>,
    sectors: Option<&[String]>,
) -> Vec<T> {
    EntityFilter::new(companies, investors, sectors).apply(results)
}
