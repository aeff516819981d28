//! [`BeliefStore`] – last-write-wins map of tracked entities.
//!
//! The store is the single durable output of the perception pipeline.  Every
//! entity-bearing raw event overwrites the entity's record wholesale; there
//! is no merging and no decay.  Named signal confidences are the one field
//! maintained separately: the pipeline's router stage records the strength of
//! each attributed signal so reflex behaviors can ask questions like "is any
//! nearby entity teabagging at me with confidence above 0.6?".

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use botmind_types::EntityBelief;
use chrono::Utc;

// ─────────────────────────────────────────────────────────────────────────────
// BeliefStore
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the entity belief map.  Single writer: the perception pipeline.
#[derive(Debug, Default)]
pub struct BeliefStore {
    entities: HashMap<String, EntityBelief>,
}

impl BeliefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the record for `belief.id` (last-write-wins).
    ///
    /// Previously recorded confidences survive the overwrite; everything else
    /// is replaced by the new observation.
    pub fn upsert(&mut self, mut belief: EntityBelief) {
        if let Some(existing) = self.entities.get(&belief.id) {
            belief.confidences = existing.confidences.clone();
        }
        self.entities.insert(belief.id.clone(), belief);
    }

    /// Record a named signal confidence on an entity, creating nothing if the
    /// entity is unknown.
    pub fn set_confidence(&mut self, entity_id: &str, name: &str, value: f64) {
        if let Some(belief) = self.entities.get_mut(entity_id) {
            belief.confidences.insert(name.to_string(), value);
            belief.last_updated_at = Utc::now();
        }
    }

    /// Look up a single entity.
    pub fn get(&self, entity_id: &str) -> Option<&EntityBelief> {
        self.entities.get(entity_id)
    }

    /// Entities whose confidence for `name` exceeds `threshold`, with the
    /// confidence value attached.
    pub fn with_confidence_above(&self, name: &str, threshold: f64) -> Vec<(EntityBelief, f64)> {
        self.entities
            .values()
            .filter_map(|belief| {
                belief
                    .confidences
                    .get(name)
                    .filter(|&&c| c > threshold)
                    .map(|&c| (belief.clone(), c))
            })
            .collect()
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SharedBeliefs
// ─────────────────────────────────────────────────────────────────────────────

/// Clone-able read/write handle to a [`BeliefStore`].
///
/// The pipeline is the only writer; reflex behaviors take short synchronous
/// read locks.  A poisoned lock is unrecoverable logic territory, so reads
/// and writes fall back to the inner value regardless.
#[derive(Debug, Clone, Default)]
pub struct SharedBeliefs(Arc<RwLock<BeliefStore>>);

impl SharedBeliefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite an entity record.
    pub fn upsert(&self, belief: EntityBelief) {
        self.0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .upsert(belief);
    }

    /// Record a named signal confidence on an entity.
    pub fn set_confidence(&self, entity_id: &str, name: &str, value: f64) {
        self.0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .set_confidence(entity_id, name, value);
    }

    /// Clone out a single entity record.
    pub fn get(&self, entity_id: &str) -> Option<EntityBelief> {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(entity_id)
            .cloned()
    }

    /// Entities whose confidence for `name` exceeds `threshold`.
    pub fn with_confidence_above(&self, name: &str, threshold: f64) -> Vec<(EntityBelief, f64)> {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .with_confidence_above(name, threshold)
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botmind_types::{EntityKind, Vec3};

    fn belief(id: &str, name: &str) -> EntityBelief {
        EntityBelief {
            id: id.into(),
            kind: EntityKind::Player,
            name: Some(name.into()),
            position: Some(Vec3::new(0.0, 64.0, 0.0)),
            sneaking: Some(false),
            confidences: HashMap::new(),
            last_updated_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_is_last_write_wins() {
        let mut store = BeliefStore::new();
        store.upsert(belief("e1", "A"));
        store.upsert(belief("e1", "B"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("e1").unwrap().name.as_deref(), Some("B"));
    }

    #[test]
    fn upsert_preserves_confidences() {
        let mut store = BeliefStore::new();
        store.upsert(belief("e1", "A"));
        store.set_confidence("e1", "teabag", 0.8);
        // A fresh observation overwrites the record but keeps confidences.
        store.upsert(belief("e1", "A"));
        assert_eq!(
            store.get("e1").unwrap().confidences.get("teabag"),
            Some(&0.8)
        );
    }

    #[test]
    fn set_confidence_on_unknown_entity_is_noop() {
        let mut store = BeliefStore::new();
        store.set_confidence("ghost", "teabag", 0.9);
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn with_confidence_above_filters_by_threshold() {
        let mut store = BeliefStore::new();
        store.upsert(belief("e1", "A"));
        store.upsert(belief("e2", "B"));
        store.set_confidence("e1", "teabag", 0.9);
        store.set_confidence("e2", "teabag", 0.3);

        let hits = store.with_confidence_above("teabag", 0.6);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "e1");
        assert!((hits[0].1 - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_is_strict() {
        let mut store = BeliefStore::new();
        store.upsert(belief("e1", "A"));
        store.set_confidence("e1", "teabag", 0.6);
        assert!(store.with_confidence_above("teabag", 0.6).is_empty());
    }

    #[test]
    fn shared_handle_reads_see_writes() {
        let shared = SharedBeliefs::new();
        let reader = shared.clone();
        shared.upsert(belief("e1", "A"));
        shared.set_confidence("e1", "teabag", 0.7);

        let seen = reader.get("e1").unwrap();
        assert_eq!(seen.name.as_deref(), Some("A"));
        assert_eq!(reader.with_confidence_above("teabag", 0.6).len(), 1);
    }
}
