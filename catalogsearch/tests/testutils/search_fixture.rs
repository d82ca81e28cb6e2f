//! Search fixture for catalogsearch integration tests
//!
//! Catalog contents:
//! - 25 active `Table`s `t01`..`t25`; `t01`, `t06`, `t11`, `t16`, `t21` are
//!   classified `PII`. `rowCount` is `i * 100`, tier is `gold` for every
//!   fourth table, descriptions mention "orders" for every third.
//! - `t26`: a deleted `Table` classified `PII`
//! - 3 `View`s; `v2` carries `PII` by propagation
//! - 4 `Column`s: `c1` is `PII_Email` (a `PII` subtype), `c2` is `Finance`,
//!   `c3` carries `PII` by propagation, `c4` is unclassified

use catalogsearch::backend::memory::{
    Dataset, InMemoryGraph, InMemoryIndex, IndexSettings, LoadedDataset,
};
use catalogsearch::backend::GraphBackend;
use catalogsearch::registry::{
    AttributeDef, AttributeType, ClassificationTypeDef, EntityTypeDef, InMemoryTypeRegistry,
};
use catalogsearch::{
    EntityRecord, EntityState, SearchConfig, SearchCoordinator, SearchRequest, SearchResponse,
};
use std::sync::Arc;

/// Which index backend the fixture builds
#[derive(Debug, Clone)]
pub enum IndexMode {
    Disabled,
    /// Every indexed attribute is filterable
    AllFields,
    /// Only the named attributes (plus system properties) are filterable
    Fields(Vec<&'static str>),
}

pub struct SearchFixture {
    pub registry: Arc<InMemoryTypeRegistry>,
    pub graph: Arc<InMemoryGraph>,
    pub index: Option<Arc<InMemoryIndex>>,
    coordinator: SearchCoordinator,
}

fn entity_types() -> Vec<EntityTypeDef> {
    vec![
        EntityTypeDef::new("Asset")
            .with_attribute(AttributeDef::new("name", AttributeType::String))
            .with_attribute(AttributeDef::new("description", AttributeType::String))
            .with_attribute(AttributeDef::new("owner", AttributeType::String).unindexed()),
        EntityTypeDef::new("DataSet")
            .with_super_type("Asset")
            .with_attribute(AttributeDef::new("rowCount", AttributeType::Number)),
        EntityTypeDef::new("Table")
            .with_super_type("DataSet")
            .with_attribute(AttributeDef::new("tier", AttributeType::String))
            .with_attribute(AttributeDef::new("createTime", AttributeType::Date)),
        EntityTypeDef::new("View").with_super_type("DataSet"),
        EntityTypeDef::new("Column")
            .with_super_type("Asset")
            .with_attribute(AttributeDef::new("dataType", AttributeType::String)),
    ]
}

fn classification_types() -> Vec<ClassificationTypeDef> {
    vec![
        ClassificationTypeDef::new("PII"),
        ClassificationTypeDef::new("PII_Email").with_super_type("PII"),
        ClassificationTypeDef::new("Finance"),
    ]
}

fn table(i: u32) -> EntityRecord {
    let mut record = EntityRecord::new(format!("t{:02}", i), "Table")
        .with_attribute("name", format!("table_{:02}", i))
        .with_attribute(
            "description",
            if i % 3 == 0 {
                "daily orders snapshot"
            } else {
                "customer ledger"
            },
        )
        .with_attribute("owner", if i % 2 == 0 { "alice" } else { "bob" })
        .with_attribute("rowCount", (i * 100) as i64)
        .with_attribute("tier", if i % 4 == 0 { "gold" } else { "silver" })
        .with_attribute("createTime", format!("2024-01-{:02}", i));
    if i % 5 == 1 {
        record = record.with_classification("PII");
    }
    record
}

/// Records of the fixture catalog, keyed by attribute name
pub fn catalog_entities() -> Vec<EntityRecord> {
    let mut entities: Vec<EntityRecord> = (1..=25).map(table).collect();
    entities.push(table(26).with_state(EntityState::Deleted));
    entities.push(
        EntityRecord::new("v1", "View")
            .with_attribute("name", "view_orders")
            .with_attribute("description", "orders by region"),
    );
    entities.push(
        EntityRecord::new("v2", "View")
            .with_attribute("name", "view_customers")
            .with_propagated_classification("PII"),
    );
    entities.push(EntityRecord::new("v3", "View").with_attribute("name", "view_revenue"));
    entities.push(
        EntityRecord::new("c1", "Column")
            .with_attribute("name", "email")
            .with_attribute("dataType", "string")
            .with_classification("PII_Email"),
    );
    entities.push(
        EntityRecord::new("c2", "Column")
            .with_attribute("name", "amount")
            .with_attribute("dataType", "decimal")
            .with_classification("Finance"),
    );
    entities.push(
        EntityRecord::new("c3", "Column")
            .with_attribute("name", "customer_id")
            .with_attribute("dataType", "string")
            .with_propagated_classification("PII"),
    );
    entities.push(
        EntityRecord::new("c4", "Column")
            .with_attribute("name", "created")
            .with_attribute("dataType", "date"),
    );
    entities
}

/// The fixture catalog as a dataset
pub fn catalog_dataset(mode: &IndexMode) -> Dataset {
    let index = match mode {
        IndexMode::Disabled => IndexSettings {
            enabled: false,
            ..IndexSettings::default()
        },
        IndexMode::AllFields => IndexSettings::default(),
        IndexMode::Fields(names) => IndexSettings {
            fields: Some(names.iter().map(|n| n.to_string()).collect()),
            ..IndexSettings::default()
        },
    };
    Dataset {
        entity_types: entity_types(),
        classification_types: classification_types(),
        index,
        entities: catalog_entities(),
    }
}

pub fn load_catalog(mode: &IndexMode) -> LoadedDataset {
    catalog_dataset(mode)
        .load()
        .expect("Failed to load fixture catalog")
}

impl SearchFixture {
    /// Catalog with a full index and default configuration
    pub fn new() -> Self {
        Self::with(IndexMode::AllFields, SearchConfig::default())
    }

    pub fn without_index() -> Self {
        Self::with(IndexMode::Disabled, SearchConfig::default())
    }

    pub fn with(mode: IndexMode, config: SearchConfig) -> Self {
        Self::from_dataset(catalog_dataset(&mode), config)
    }

    /// Fixture over a modified copy of the catalog
    pub fn from_dataset(dataset: Dataset, config: SearchConfig) -> Self {
        let loaded = dataset.load().expect("Failed to load fixture catalog");
        let registry = Arc::clone(&loaded.registry);
        let graph = Arc::clone(&loaded.graph);
        let index = loaded.index.clone();
        Self {
            registry,
            graph,
            index,
            coordinator: SearchCoordinator::from_dataset(loaded, config),
        }
    }

    /// Coordinator over the fixture registry and index, with `graph` as the
    /// graph backend
    pub fn coordinator_over(
        &self,
        graph: Arc<dyn GraphBackend>,
        config: SearchConfig,
    ) -> SearchCoordinator {
        let coordinator = SearchCoordinator::new(graph, self.registry.clone(), config);
        match &self.index {
            Some(index) => coordinator.with_index(index.clone()),
            None => coordinator,
        }
    }

    pub fn coordinator(&self) -> &SearchCoordinator {
        &self.coordinator
    }

    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        self.coordinator
            .search(request)
            .await
            .expect("Search failed")
    }

    /// Calls made to both backends so far
    pub fn backend_calls(&self) -> u64 {
        self.graph.stats().calls() + self.index.as_ref().map_or(0, |i| i.stats().calls())
    }
}

/// Sorted guids of a response
pub fn sorted_guids(response: &SearchResponse) -> Vec<String> {
    let mut guids: Vec<String> = response.guids().into_iter().map(str::to_string).collect();
    guids.sort();
    guids
}
