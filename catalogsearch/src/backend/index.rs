// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Index backend contract and structured index queries
//!
//! Index queries are built as an AST and only rendered to the backend's
//! query-string syntax when a request is sent. [`normalize_query_string`]
//! runs as the final rendering step and is idempotent.

use super::{BackendError, SortSpec};
use crate::model::{AttributeValue, EntityRecord};
use crate::predicate::Comparison;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Structured index query
#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    MatchAll,
    Term {
        field: String,
        op: Comparison,
        value: AttributeValue,
    },
    Terms {
        field: String,
        values: Vec<AttributeValue>,
    },
    Exists(String),
    Missing(String),
    And(Vec<IndexQuery>),
    Or(Vec<IndexQuery>),
}

impl IndexQuery {
    pub fn term(field: impl Into<String>, op: Comparison, value: AttributeValue) -> Self {
        IndexQuery::Term {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        IndexQuery::Terms {
            field: field.into(),
            values,
        }
    }

    /// Flatten nested groups and drop empty ones
    ///
    /// `MatchAll` is the identity of AND and absorbs OR. Empty groups carry
    /// no constraint and collapse to `MatchAll`.
    pub fn simplify(self) -> IndexQuery {
        match self {
            IndexQuery::And(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children.into_iter().map(IndexQuery::simplify) {
                    match child {
                        IndexQuery::MatchAll => {}
                        IndexQuery::And(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                collapse(flat, IndexQuery::And)
            }
            IndexQuery::Or(children) => {
                let mut flat = Vec::with_capacity(children.len());
                for child in children.into_iter().map(IndexQuery::simplify) {
                    match child {
                        IndexQuery::MatchAll => return IndexQuery::MatchAll,
                        IndexQuery::Or(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                collapse(flat, IndexQuery::Or)
            }
            other => other,
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, IndexQuery::MatchAll)
    }

    /// Render in Lucene query-string syntax
    pub fn to_query_string(&self) -> String {
        match self {
            IndexQuery::MatchAll => "*:*".to_string(),
            IndexQuery::Term { field, op, value } => render_term(field, *op, value),
            IndexQuery::Terms { field, values } => {
                let rendered: Vec<String> = values.iter().map(quoted).collect();
                format!("{}:({})", field, rendered.join(" OR "))
            }
            IndexQuery::Exists(field) => format!("_exists_:{}", field),
            IndexQuery::Missing(field) => format!("(*:* -_exists_:{})", field),
            IndexQuery::And(children) => render_group(children, "AND"),
            IndexQuery::Or(children) => render_group(children, "OR"),
        }
    }
}

fn collapse(mut flat: Vec<IndexQuery>, group: fn(Vec<IndexQuery>) -> IndexQuery) -> IndexQuery {
    if flat.len() > 1 {
        group(flat)
    } else {
        flat.pop().unwrap_or(IndexQuery::MatchAll)
    }
}

fn render_group(children: &[IndexQuery], op: &str) -> String {
    let rendered: Vec<String> = children.iter().map(IndexQuery::to_query_string).collect();
    format!("({})", rendered.join(&format!(" {} ", op)))
}

fn render_term(field: &str, op: Comparison, value: &AttributeValue) -> String {
    match op {
        Comparison::Eq => format!("{}:{}", field, quoted(value)),
        Comparison::Neq => format!("(*:* -{}:{})", field, quoted(value)),
        Comparison::Lt => format!("{}:{{* TO {}}}", field, quoted(value)),
        Comparison::Lte => format!("{}:[* TO {}]", field, quoted(value)),
        Comparison::Gt => format!("{}:{{{} TO *}}", field, quoted(value)),
        Comparison::Gte => format!("{}:[{} TO *]", field, quoted(value)),
        Comparison::StartsWith => format!("{}:{}*", field, escape_term(&value.to_term())),
        Comparison::EndsWith => format!("{}:*{}", field, escape_term(&value.to_term())),
        Comparison::Contains => format!("{}:*{}*", field, escape_term(&value.to_term())),
        Comparison::NotContains => {
            format!("(*:* -{}:*{}*)", field, escape_term(&value.to_term()))
        }
        Comparison::Like => format!("{}:{}", field, escape_pattern(&value.to_term())),
    }
}

fn quoted(value: &AttributeValue) -> String {
    match value {
        AttributeValue::String(s) => {
            format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
        }
        other => other.to_term(),
    }
}

const SPECIAL_CHARS: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
    '/', ' ',
];

fn escape_term(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if SPECIAL_CHARS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escape everything except the `*` and `?` wildcards
fn escape_pattern(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch != '*' && ch != '?' && SPECIAL_CHARS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).unwrap());
static EMPTY_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)").unwrap());
static OPERATOR_BEFORE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\b(?:AND|OR)\s*\)").unwrap());
static OPERATOR_AFTER_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*(?:AND|OR)\b\s*").unwrap());
static REPEATED_OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(AND|OR)(?:\s+(?:AND|OR))+\b").unwrap());
static LEADING_OPERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:AND|OR)\b\s*").unwrap());
static TRAILING_OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\b(?:AND|OR)\s*$").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip stray boolean operators and empty groups from a query string
///
/// Quoted phrases are left untouched. Applying the function twice yields the
/// same string as applying it once.
pub fn normalize_query_string(raw: &str) -> String {
    let mut phrases = Vec::new();
    let masked = QUOTED.replace_all(raw, |caps: &regex::Captures<'_>| {
        phrases.push(caps[0].to_string());
        format!("\u{0}{}\u{0}", phrases.len() - 1)
    });

    let mut current = WHITESPACE.replace_all(masked.trim(), " ").into_owned();
    loop {
        let mut next = EMPTY_GROUP.replace_all(&current, "").into_owned();
        next = OPERATOR_BEFORE_CLOSE.replace_all(&next, ")").into_owned();
        next = OPERATOR_AFTER_OPEN.replace_all(&next, "(").into_owned();
        next = REPEATED_OPERATOR.replace_all(&next, "$1").into_owned();
        next = LEADING_OPERATOR.replace_all(&next, "").into_owned();
        next = TRAILING_OPERATOR.replace_all(&next, "").into_owned();
        next = WHITESPACE.replace_all(next.trim(), " ").into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    let mut restored = current;
    for (i, phrase) in phrases.iter().enumerate() {
        restored = restored.replace(&format!("\u{0}{}\u{0}", i), phrase);
    }
    restored
}

/// A search request sent to the index backend
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSearchRequest {
    pub index_name: String,
    pub query: IndexQuery,
    pub free_text: Option<String>,
    pub sort: Option<SortSpec>,
    pub min_score: Option<f64>,
    pub attribute_weights: BTreeMap<String, f64>,
    pub offset: usize,
    pub limit: usize,
}

impl IndexSearchRequest {
    pub fn new(index_name: impl Into<String>, query: IndexQuery) -> Self {
        Self {
            index_name: index_name.into(),
            query,
            free_text: None,
            sort: None,
            min_score: None,
            attribute_weights: BTreeMap::new(),
            offset: 0,
            limit: 0,
        }
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// The query as it goes over the wire
    pub fn wire_query(&self) -> String {
        let filter = self.query.to_query_string();
        let combined = match self.free_text.as_deref() {
            Some(text) if self.query.is_match_all() => format!("({})", text),
            Some(text) => format!("({}) AND {}", text, filter),
            None => filter,
        };
        normalize_query_string(&combined)
    }
}

/// One index hit with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub record: EntityRecord,
    pub score: f64,
}

/// Hits for one page plus the total number of matches
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexSearchResponse {
    pub hits: Vec<IndexHit>,
    pub total: u64,
}

/// Inverted index over entity records
///
/// The index may lag the graph and may analyze string fields, so its
/// answers on string attributes can be looser than exact comparison.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Storage properties the index can filter and sort on
    fn filterable_fields(&self) -> Arc<BTreeSet<String>>;

    async fn search(&self, request: &IndexSearchRequest) -> Result<IndexSearchResponse, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_flattens_and_drops_empty_groups() {
        let query = IndexQuery::And(vec![
            IndexQuery::MatchAll,
            IndexQuery::And(vec![
                IndexQuery::term("Asset.name", Comparison::Eq, "orders".into()),
                IndexQuery::Or(vec![]),
            ]),
            IndexQuery::Exists("Asset.owner".into()),
        ]);

        assert_eq!(
            query.simplify(),
            IndexQuery::And(vec![
                IndexQuery::term("Asset.name", Comparison::Eq, "orders".into()),
                IndexQuery::Exists("Asset.owner".into()),
            ])
        );
        assert_eq!(IndexQuery::And(vec![]).simplify(), IndexQuery::MatchAll);
        assert_eq!(
            IndexQuery::Or(vec![IndexQuery::Exists("a".into()), IndexQuery::MatchAll]).simplify(),
            IndexQuery::MatchAll
        );
    }

    #[test]
    fn test_query_string_rendering() {
        let query = IndexQuery::And(vec![
            IndexQuery::terms("__typeName", vec!["Table".into(), "View".into()]),
            IndexQuery::term("DataSet.rowCount", Comparison::Gte, 10.0.into()),
            IndexQuery::term("Asset.name", Comparison::StartsWith, "cust ord".into()),
            IndexQuery::Missing("Asset.owner".into()),
        ]);
        assert_eq!(
            query.to_query_string(),
            "(__typeName:(\"Table\" OR \"View\") AND DataSet.rowCount:[10 TO *] AND \
             Asset.name:cust\\ ord* AND (*:* -_exists_:Asset.owner))"
        );
    }

    #[test]
    fn test_normalize_strips_strays() {
        assert_eq!(normalize_query_string("(a AND )"), "(a)");
        assert_eq!(normalize_query_string("( OR b)"), "(b)");
        assert_eq!(normalize_query_string("a AND () AND b"), "a AND b");
        assert_eq!(normalize_query_string("AND a OR"), "a");
        assert_eq!(normalize_query_string("(x AND (() OR ))"), "(x)");
        assert_eq!(normalize_query_string("a AND OR b"), "a AND b");
    }

    #[test]
    fn test_normalize_preserves_quoted_phrases() {
        let raw = "name:\"( AND )\" AND ()";
        assert_eq!(normalize_query_string(raw), "name:\"( AND )\"");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "(a AND )",
            "((( )))",
            "  x   OR  ( y AND ( ) ) ",
            "(__typeName:(\"Table\" OR \"View\") AND Asset.name:\"a\")",
            "OR OR",
        ];
        for raw in inputs {
            let once = normalize_query_string(raw);
            assert_eq!(normalize_query_string(&once), once, "input: {}", raw);
        }
    }

    #[test]
    fn test_wire_query_combines_free_text() {
        let request = IndexSearchRequest::new(
            "vertex_index",
            IndexQuery::term("__state", Comparison::Eq, "ACTIVE".into()),
        )
        .page(0, 10);
        assert_eq!(request.wire_query(), "__state:\"ACTIVE\"");

        let with_text = IndexSearchRequest {
            free_text: Some("orders".into()),
            ..request.clone()
        };
        assert_eq!(with_text.wire_query(), "(orders) AND __state:\"ACTIVE\"");

        let text_only = IndexSearchRequest {
            query: IndexQuery::MatchAll,
            free_text: Some("orders".into()),
            ..request
        };
        assert_eq!(text_only.wire_query(), "(orders)");
    }
}
