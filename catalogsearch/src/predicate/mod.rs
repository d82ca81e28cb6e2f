// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory predicates over entity records
//!
//! Predicates are plain data: combinators flatten nested groups and treat
//! [`Predicate::Always`] as the identity of AND, so compiled filters stay
//! shallow and comparable. Evaluation has no side effects.

pub mod ops;

pub use ops::{Comparison, LikePattern};

use crate::model::{AttributeValue, EntityRecord, EntityState};
use std::collections::BTreeSet;
use std::fmt;

/// A single test against one record
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Compare {
        property: String,
        op: Comparison,
        value: AttributeValue,
    },
    In {
        property: String,
        values: Vec<AttributeValue>,
    },
    Like {
        property: String,
        pattern: LikePattern,
    },
    TypeIn(BTreeSet<String>),
    StateIs(EntityState),
    /// Any direct or propagated classification
    Classified,
    NotClassified,
    /// A direct or propagated classification from the set
    ClassifiedAs(BTreeSet<String>),
}

impl Leaf {
    pub fn evaluate(&self, record: &EntityRecord) -> bool {
        match self {
            Leaf::Compare {
                property,
                op,
                value,
            } => ops::matches(*op, record.property(property).as_deref(), value),
            Leaf::In { property, values } => {
                ops::is_member(record.property(property).as_deref(), values)
            }
            Leaf::Like { property, pattern } => {
                pattern.matches_value(record.property(property).as_deref())
            }
            Leaf::TypeIn(types) => types.contains(&record.type_name),
            Leaf::StateIs(state) => record.state == *state,
            Leaf::Classified => record.is_classified(),
            Leaf::NotClassified => !record.is_classified(),
            Leaf::ClassifiedAs(names) => record.has_classification_in(names),
        }
    }
}

fn write_set(f: &mut fmt::Formatter<'_>, names: &BTreeSet<String>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", name)?;
    }
    write!(f, "}}")
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Compare {
                property,
                op,
                value,
            } => write!(f, "{} {} {}", property, op, value),
            Leaf::In { property, values } => {
                write!(f, "{} in {}", property, AttributeValue::Array(values.clone()))
            }
            Leaf::Like { property, pattern } => write!(f, "{} like {}", property, pattern),
            Leaf::TypeIn(types) => {
                write!(f, "type in ")?;
                write_set(f, types)
            }
            Leaf::StateIs(state) => write!(f, "state = {}", state),
            Leaf::Classified => write!(f, "classified"),
            Leaf::NotClassified => write!(f, "not classified"),
            Leaf::ClassifiedAs(names) => {
                write!(f, "classified as ")?;
                write_set(f, names)
            }
        }
    }
}

/// Boolean combination of leaves
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Leaf(Leaf),
    And(Vec<Predicate>),
    /// An empty `Or` matches nothing
    Or(Vec<Predicate>),
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::Always
    }
}

impl Predicate {
    pub fn compare(property: impl Into<String>, op: Comparison, value: AttributeValue) -> Self {
        Predicate::Leaf(Leaf::Compare {
            property: property.into(),
            op,
            value,
        })
    }

    pub fn eq(property: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::compare(property, Comparison::Eq, value.into())
    }

    pub fn in_set(property: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        Predicate::Leaf(Leaf::In {
            property: property.into(),
            values,
        })
    }

    pub fn like(property: impl Into<String>, pattern: LikePattern) -> Self {
        Predicate::Leaf(Leaf::Like {
            property: property.into(),
            pattern,
        })
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Self::compare(property, Comparison::Eq, AttributeValue::Null)
    }

    pub fn not_null(property: impl Into<String>) -> Self {
        Self::compare(property, Comparison::Neq, AttributeValue::Null)
    }

    pub fn type_in(types: BTreeSet<String>) -> Self {
        Predicate::Leaf(Leaf::TypeIn(types))
    }

    pub fn state_is(state: EntityState) -> Self {
        Predicate::Leaf(Leaf::StateIs(state))
    }

    pub fn classified() -> Self {
        Predicate::Leaf(Leaf::Classified)
    }

    pub fn not_classified() -> Self {
        Predicate::Leaf(Leaf::NotClassified)
    }

    pub fn classified_as(names: BTreeSet<String>) -> Self {
        Predicate::Leaf(Leaf::ClassifiedAs(names))
    }

    /// Conjunction, flattening nested ANDs
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Always, p) | (p, Predicate::Always) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    /// Disjunction, flattening nested ORs; `Always` absorbs
    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Always, _) | (_, Predicate::Always) => Predicate::Always,
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (p, Predicate::Or(mut right)) => {
                right.insert(0, p);
                Predicate::Or(right)
            }
            (left, right) => Predicate::Or(vec![left, right]),
        }
    }

    pub fn all<I: IntoIterator<Item = Predicate>>(predicates: I) -> Predicate {
        predicates
            .into_iter()
            .fold(Predicate::Always, Predicate::and)
    }

    pub fn any<I: IntoIterator<Item = Predicate>>(predicates: I) -> Predicate {
        let mut iter = predicates.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, Predicate::or),
            None => Predicate::Or(Vec::new()),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::Always)
    }

    pub fn evaluate(&self, record: &EntityRecord) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Leaf(leaf) => leaf.evaluate(record),
            Predicate::And(parts) => parts.iter().all(|p| p.evaluate(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.evaluate(record)),
        }
    }

    /// Drop records that do not satisfy the predicate, keeping order
    pub fn retain(&self, records: &mut Vec<EntityRecord>) {
        if !self.is_always() {
            records.retain(|record| self.evaluate(record));
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, parts: &[Predicate], sep: &str| {
            write!(f, "(")?;
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", sep)?;
                }
                write!(f, "{}", part)?;
            }
            write!(f, ")")
        };
        match self {
            Predicate::Always => write!(f, "true"),
            Predicate::Leaf(leaf) => write!(f, "{}", leaf),
            Predicate::And(parts) => join(f, parts, "AND"),
            Predicate::Or(parts) if parts.is_empty() => write!(f, "false"),
            Predicate::Or(parts) => join(f, parts, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(guid: &str, name: &str) -> EntityRecord {
        EntityRecord::new(guid, "Table").with_attribute("Asset.name", name)
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_and_flattens_and_drops_always() {
        let a = Predicate::eq("Asset.name", "a");
        let b = Predicate::eq("Asset.name", "b");
        let c = Predicate::eq("Asset.name", "c");

        let combined = Predicate::Always
            .and(a.clone())
            .and(b.clone().and(c.clone()))
            .and(Predicate::Always);
        assert_eq!(combined, Predicate::And(vec![a.clone(), b, c]));
        assert_eq!(Predicate::all(vec![]), Predicate::Always);
        assert_eq!(Predicate::all(vec![a.clone()]), a);
    }

    #[test]
    fn test_or_absorbs_always() {
        let a = Predicate::eq("Asset.name", "a");
        assert_eq!(a.clone().or(Predicate::Always), Predicate::Always);
        assert!(!Predicate::any(vec![]).evaluate(&table("t1", "a")));
        assert_eq!(Predicate::any(vec![]).to_string(), "false");
    }

    #[test]
    fn test_evaluate_classification_leaves() {
        let plain = table("t1", "orders");
        let tagged = table("t2", "users").with_propagated_classification("PII");

        assert!(Predicate::not_classified().evaluate(&plain));
        assert!(!Predicate::classified().evaluate(&plain));
        assert!(Predicate::classified().evaluate(&tagged));
        assert!(Predicate::classified_as(names(&["PII", "Sensitive"])).evaluate(&tagged));
        assert!(!Predicate::classified_as(names(&["Sensitive"])).evaluate(&tagged));
    }

    #[test]
    fn test_retain_keeps_order() {
        let mut records = vec![
            table("t1", "orders"),
            table("t2", "users"),
            table("t3", "order_items"),
        ];
        let predicate = Predicate::like("Asset.name", LikePattern::compile("order*").unwrap())
            .and(Predicate::type_in(names(&["Table"])))
            .and(Predicate::state_is(EntityState::Active));
        predicate.retain(&mut records);

        let guids: Vec<&str> = records.iter().map(|r| r.guid.as_str()).collect();
        assert_eq!(guids, vec!["t1", "t3"]);
    }

    #[test]
    fn test_null_checks() {
        let record = table("t1", "orders");
        assert!(Predicate::is_null("Asset.owner").evaluate(&record));
        assert!(!Predicate::not_null("Asset.owner").evaluate(&record));
        assert!(Predicate::not_null("Asset.name").evaluate(&record));
    }

    #[test]
    fn test_display() {
        let predicate = Predicate::eq("Asset.name", "orders").and(
            Predicate::in_set("__state", vec!["ACTIVE".into()]).or(Predicate::classified()),
        );
        assert_eq!(
            predicate.to_string(),
            "(Asset.name = 'orders' AND (__state in ['ACTIVE'] OR classified))"
        );
    }
}
