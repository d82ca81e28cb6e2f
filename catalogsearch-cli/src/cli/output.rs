// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result formatting for CLI output

use super::commands::OutputFormat;
use catalogsearch::{EntityRecord, SearchExplanation, SearchResponse};
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

/// Result formatter for different output formats
pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format_response(response: &SearchResponse, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::response_table(response),
            OutputFormat::Json => Self::to_json(response),
        }
    }

    pub fn format_explanation(explanation: &SearchExplanation, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::explanation_table(explanation),
            OutputFormat::Json => Self::to_json(explanation),
        }
    }

    fn to_json<T: serde::Serialize>(value: &T) -> String {
        match serde_json::to_string_pretty(value) {
            Ok(json) => format!("{}\n", json),
            Err(_) => "{\"status\": \"error\", \"error\": \"Could not serialize results to JSON\"}\n"
                .to_string(),
        }
    }

    /// Format a response as a table using comfy-table
    fn response_table(response: &SearchResponse) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", "Search Results".bold().green()));
        output.push_str(&format!("Strategy: {}\n", response.strategy));
        output.push_str(&format!(
            "Execution time: {} ms\n",
            response.execution_time_ms
        ));
        output.push_str(&format!(
            "Returned: {} of {}{}\n",
            response.len(),
            response.approximate_count,
            if response.is_last_page { " (last page)" } else { "" }
        ));
        if response.partial {
            output.push_str(&format!("{}\n", "Partial results".yellow()));
        }
        output.push('\n');

        if response.is_empty() {
            output.push_str(&format!("{}\n", "No results found".yellow()));
        } else {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(
                ["guid", "type", "state", "name", "classifications"]
                    .iter()
                    .map(|col| Cell::new(col).fg(Color::Green))
                    .collect::<Vec<Cell>>(),
            );
            for entity in &response.entities {
                table.add_row(vec![
                    entity.guid.clone(),
                    entity.type_name.clone(),
                    entity.state.to_string(),
                    display_name(entity),
                    classifications(entity),
                ]);
            }
            output.push_str(&table.to_string());
            output.push('\n');
        }

        Self::push_warnings(&mut output, &response.warnings);
        output
    }

    fn explanation_table(explanation: &SearchExplanation) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}\n", "Search Plan".bold().green()));
        output.push_str(&format!("Strategy: {}\n\n", explanation.strategy));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(
            ["stage", "role", "strategy", "native query", "in memory"]
                .iter()
                .map(|col| Cell::new(col).fg(Color::Green))
                .collect::<Vec<Cell>>(),
        );
        for stage in &explanation.stages {
            let mut native: Vec<String> = Vec::new();
            if let Some(query) = &stage.index_query {
                native.push(format!("index: {}", query));
            }
            if let Some(query) = &stage.graph_query {
                native.push(format!("graph: {}", query));
            }
            if let Some(query) = &stage.rescope_query {
                native.push(format!("rescope: {}", query));
            }
            table.add_row(vec![
                stage.stage.to_string(),
                if stage.primary { "primary" } else { "filter" }.to_string(),
                stage.strategy.to_string(),
                native.join("\n"),
                stage.residual.clone(),
            ]);
        }
        output.push_str(&table.to_string());
        output.push('\n');

        Self::push_warnings(&mut output, &explanation.warnings);
        output
    }

    fn push_warnings(output: &mut String, warnings: &[String]) {
        if warnings.is_empty() {
            return;
        }
        output.push_str(&format!("\n{}\n", "Warnings:".bold().yellow()));
        for (i, warning) in warnings.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, warning.yellow()));
        }
    }
}

/// First attribute stored as `<Type>.name`
fn display_name(entity: &EntityRecord) -> String {
    entity
        .attributes
        .iter()
        .find(|(property, _)| property.ends_with(".name"))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

fn classifications(entity: &EntityRecord) -> String {
    let mut names: Vec<String> = entity.classifications.clone();
    names.extend(
        entity
            .propagated_classifications
            .iter()
            .map(|name| format!("{} (propagated)", name)),
    );
    names.join(", ")
}
