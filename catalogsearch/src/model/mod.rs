// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Data model shared by planning and execution

pub mod criteria;
pub mod entity;
pub mod request;
pub mod response;
pub mod value;

pub use criteria::{Condition, CriteriaNode, FilterCriteria, Operator};
pub use entity::{
    EntityRecord, EntityState, CREATED_BY_KEY, GUID_PROPERTY_KEY,
    MODIFICATION_TIMESTAMP_PROPERTY_KEY, MODIFIED_BY_KEY, PROPAGATED_TRAIT_NAMES_PROPERTY_KEY,
    STATE_PROPERTY_KEY, TIMESTAMP_PROPERTY_KEY, TRAIT_NAMES_PROPERTY_KEY, TYPE_NAME_PROPERTY_KEY,
};
pub use request::{SearchRequest, SortOrder};
pub use response::{ResultCount, SearchResponse, StrategyKind};
pub use value::AttributeValue;
