// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers

use super::commands::{OutputFormat, RequestArgs, SourceArgs};
use super::output::ResultFormatter;
use catalogsearch::backend::memory::Dataset;
use catalogsearch::{SearchConfig, SearchCoordinator, SearchRequest, SortOrder};
use colored::Colorize;
use log::info;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load the dataset into in-memory backends
fn load_coordinator(source: &SourceArgs) -> CliResult<SearchCoordinator> {
    let config = match &source.config {
        Some(path) => SearchConfig::from_json_file(path)?,
        None => SearchConfig::default(),
    };
    let loaded = Dataset::from_json_file(&source.dataset)?.load()?;
    info!("Loaded catalog from {}", source.dataset.display());
    Ok(SearchCoordinator::from_dataset(loaded, config))
}

/// Build the request from the request file and flag overrides
fn build_request(args: RequestArgs) -> CliResult<SearchRequest> {
    let mut request = match &args.request {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            serde_json::from_str::<SearchRequest>(&raw)
                .map_err(|e| format!("Invalid request {}: {}", path.display(), e))?
        }
        None => SearchRequest::default(),
    };

    if let Some(type_name) = args.type_name {
        request.type_name = Some(type_name);
        request.type_names.clear();
    }
    if let Some(classification) = args.classification {
        request.classification = Some(classification);
        request.classifications.clear();
    }
    if let Some(query) = args.query {
        request = request.with_query(query);
    }
    if let Some(sort_by) = args.sort_by {
        let order = if args.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        request = request.sorted_by(sort_by, order);
    }
    if let Some(limit) = args.limit {
        request = request.with_limit(limit);
    }
    if let Some(offset) = args.offset {
        request = request.with_offset(offset);
    }
    if args.exclude_deleted {
        request = request.exclude_deleted();
    }
    Ok(request)
}

/// Handle the search command
pub async fn handle_search(
    source: SourceArgs,
    request: RequestArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let coordinator = load_coordinator(&source)?;
    let request = build_request(request)?;

    match coordinator.search(&request).await {
        Ok(response) => {
            print!("{}", ResultFormatter::format_response(&response, format));
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format!("Search failed: {}", e).red());
            if e.is_retryable() {
                eprintln!("{}", "The backend may be temporarily unavailable; retry later.".yellow());
            }
            Err(e.into())
        }
    }
}

/// Handle the explain command
pub fn handle_explain(
    source: SourceArgs,
    request: RequestArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let coordinator = load_coordinator(&source)?;
    let request = build_request(request)?;
    let explanation = coordinator.explain(&request)?;
    print!("{}", ResultFormatter::format_explanation(&explanation, format));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> RequestArgs {
        RequestArgs {
            request: None,
            type_name: None,
            classification: None,
            query: None,
            sort_by: None,
            desc: false,
            limit: None,
            offset: None,
            exclude_deleted: false,
        }
    }

    #[test]
    fn test_flags_override_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(
            &path,
            r#"{"typeName": "Table", "query": "orders", "limit": 5}"#,
        )
        .unwrap();

        let request = build_request(RequestArgs {
            request: Some(path),
            type_name: Some("View".to_string()),
            query: Some("customers".to_string()),
            sort_by: Some("name".to_string()),
            desc: true,
            exclude_deleted: true,
            ..empty_args()
        })
        .unwrap();

        assert_eq!(request.requested_types(), vec!["View".to_string()]);
        assert_eq!(request.free_text(), Some("customers"));
        assert_eq!(request.limit, Some(5));
        assert_eq!(request.sort_order, Some(SortOrder::Descending));
        assert!(request.exclude_deleted_entities);
    }

    #[test]
    fn test_invalid_request_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = build_request(RequestArgs {
            request: Some(path),
            ..empty_args()
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("Invalid request"));
    }
}
