//! Inheritance resolution
//!
//! Computes the effective field list of an entity type by merging its own
//! fields over everything inherited along its single-parent chain.
//!
//! Resolution walks up the parent chain with an explicit stack until it
//! reaches a root, a memoized ancestor, a cycle or the depth bound, then
//! folds fields back down keyed by `field_name` (the nearer definition
//! replaces the farther one entirely).
//!
//! Only lineages that were resolved completely are memoized. A type whose
//! walk was cut short by a cycle or the depth bound is resolved from its own
//! walk every time, so the result for any type never depends on the order
//! in which types are resolved.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::warn;

use super::compiled::IntegrityWarning;
use super::definitions::{EntityTypeDef, FieldDef};

/// Maximum number of ancestors a type may inherit from
pub const MAX_INHERITANCE_DEPTH: usize = 10;

/// Effective fields of one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    /// Sorted by `display_order`, ties broken by `field_name`
    pub fields: Vec<FieldDef>,
    /// Ancestor ids whose fields were merged, nearest first
    pub lineage: Vec<String>,
}

#[derive(Debug, Clone)]
struct Resolution {
    merged: BTreeMap<String, FieldDef>,
    lineage: Vec<String>,
}

impl Resolution {
    fn empty() -> Self {
        Self {
            merged: BTreeMap::new(),
            lineage: Vec::new(),
        }
    }

    fn to_resolved(&self) -> ResolvedFields {
        let mut fields: Vec<FieldDef> = self.merged.values().cloned().collect();
        fields.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.field_name.cmp(&b.field_name))
        });
        ResolvedFields {
            fields,
            lineage: self.lineage.clone(),
        }
    }
}

/// Per-compile inheritance resolver
///
/// Holds the memo cache for one compile call; drop it with the call.
pub struct InheritanceResolver<'a> {
    types: HashMap<&'a str, &'a EntityTypeDef>,
    own_fields: &'a HashMap<String, Vec<FieldDef>>,
    memo: HashMap<String, Resolution>,
    warnings: Vec<IntegrityWarning>,
    max_depth: usize,
}

impl<'a> InheritanceResolver<'a> {
    /// Create a resolver over one version's entity types and their own fields
    pub fn new(
        entity_types: &'a [EntityTypeDef],
        own_fields: &'a HashMap<String, Vec<FieldDef>>,
    ) -> Self {
        Self {
            types: entity_types.iter().map(|t| (t.id.as_str(), t)).collect(),
            own_fields,
            memo: HashMap::new(),
            warnings: Vec::new(),
            max_depth: MAX_INHERITANCE_DEPTH,
        }
    }

    /// Override the ancestor bound
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Warnings recorded so far, deduplicated
    pub fn warnings(&self) -> &[IntegrityWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<IntegrityWarning> {
        self.warnings
    }

    /// Number of memoized entity types
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }

    /// Resolve the effective fields of `entity_type_id`
    ///
    /// Never fails: dangling parents, cycles and over-deep chains degrade to
    /// "no inheritance from that point" plus a warning. An id that is not in
    /// the version resolves to whatever own fields are known for it.
    pub fn resolve(&mut self, entity_type_id: &str) -> ResolvedFields {
        if let Some(done) = self.memo.get(entity_type_id) {
            return done.to_resolved();
        }

        let Some(&target) = self.types.get(entity_type_id) else {
            warn!(entity_type_id = %entity_type_id, "Resolving unknown entity type");
            let mut resolution = Resolution::empty();
            self.overlay(&mut resolution, entity_type_id);
            return resolution.to_resolved();
        };

        let (chain, base, complete) = self.walk_up(target);

        let mut resolution = match base {
            Some(base_id) => {
                let base_resolution = &self.memo[base_id];
                let mut lineage = Vec::with_capacity(base_resolution.lineage.len() + 1);
                lineage.push(base_id.to_string());
                lineage.extend(base_resolution.lineage.iter().cloned());
                Resolution {
                    merged: base_resolution.merged.clone(),
                    lineage,
                }
            }
            None => Resolution::empty(),
        };

        // Fold from the farthest ancestor down to the target.
        for (position, node) in chain.iter().enumerate().rev() {
            self.overlay(&mut resolution, &node.id);
            if complete {
                self.memo.insert(node.id.clone(), resolution.clone());
            }
            if position > 0 {
                resolution.lineage.insert(0, node.id.clone());
            }
        }

        resolution.to_resolved()
    }

    /// Collect the chain `[target, parent, grandparent, ...]`
    ///
    /// Returns the chain, the memoized ancestor to start from (if any) and
    /// whether the lineage was resolved completely.
    fn walk_up(
        &mut self,
        target: &'a EntityTypeDef,
    ) -> (Vec<&'a EntityTypeDef>, Option<&'a str>, bool) {
        let mut chain = vec![target];
        let mut on_chain: HashSet<&str> = HashSet::from([target.id.as_str()]);

        loop {
            let current = chain[chain.len() - 1];
            let Some(parent_id) = current.parent_type_id.as_deref() else {
                return (chain, None, true);
            };

            let parent = self
                .types
                .get(parent_id)
                .copied()
                .filter(|p| p.version_id == current.version_id);
            let Some(parent) = parent else {
                self.record(IntegrityWarning::DanglingParent {
                    entity_type_id: current.id.clone(),
                    parent_type_id: parent_id.to_string(),
                });
                return (chain, None, true);
            };

            if on_chain.contains(parent.id.as_str()) {
                let start = chain
                    .iter()
                    .position(|t| t.id == parent.id)
                    .unwrap_or_default();
                let mut cycle: Vec<String> = chain[start..].iter().map(|t| t.id.clone()).collect();
                cycle.push(parent.id.clone());
                self.record(IntegrityWarning::InheritanceCycle {
                    entity_type_id: target.id.clone(),
                    cycle,
                });
                return (chain, None, false);
            }

            // `parent` would become ancestor number `position`.
            let position = chain.len();
            if let Some(done) = self.memo.get(parent.id.as_str()) {
                if position + done.lineage.len() <= self.max_depth {
                    return (chain, Some(parent.id.as_str()), true);
                }
            }

            if position > self.max_depth {
                self.record(IntegrityWarning::InheritanceDepthExceeded {
                    entity_type_id: target.id.clone(),
                    max_depth: self.max_depth,
                });
                return (chain, None, false);
            }

            on_chain.insert(parent.id.as_str());
            chain.push(parent);
        }
    }

    fn overlay(&self, resolution: &mut Resolution, entity_type_id: &str) {
        if let Some(fields) = self.own_fields.get(entity_type_id) {
            for field in fields {
                resolution
                    .merged
                    .insert(field.field_name.clone(), field.clone());
            }
        }
    }

    fn record(&mut self, warning: IntegrityWarning) {
        if self.warnings.contains(&warning) {
            return;
        }
        warn!(
            entity_type_id = %warning.subject_id(),
            "Inheritance degraded: {}", warning
        );
        self.warnings.push(warning);
    }
}
