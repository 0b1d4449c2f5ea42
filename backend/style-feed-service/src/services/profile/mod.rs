// ============================================
// User Profile Store
// ============================================
//
// Per-user mutable state, created lazily on first reference and kept for
// the lifetime of the process (no eviction).
//
// - Creation is atomic per user id (DashMap entry API holds the shard lock)
// - Each profile sits behind its own Mutex so a whole feedback or pull
//   operation for one user is serialized, while different users proceed
//   in parallel

use crate::models::{OutfitSuggestion, PreferenceSnapshot};
use crate::services::catalog::ItemAttributes;
use dashmap::DashMap;
use ndarray::Array1;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Per-dimension multipliers used both when accumulating feedback and when
/// scoring affinity
pub const TYPE_WEIGHT: f32 = 1.2;
pub const COLOR_WEIGHT: f32 = 0.8;
pub const BRAND_WEIGHT: f32 = 1.0;

/// Signed, unbounded attribute scores. No decay.
///
/// BTreeMap keeps iteration (and tie-breaking of the top entry) deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributePreferences {
    pub item_type: BTreeMap<String, f32>,
    pub color: BTreeMap<String, f32>,
    pub brand: BTreeMap<String, f32>,
}

impl AttributePreferences {
    /// Preferences seeded with a single type score (used by calibration)
    pub fn seeded_with_type(item_type: &str, score: f32) -> Self {
        let mut prefs = Self::default();
        prefs.item_type.insert(item_type.to_string(), score);
        prefs
    }

    pub fn is_empty(&self) -> bool {
        self.item_type.is_empty() && self.color.is_empty() && self.brand.is_empty()
    }

    /// Add `score` to the item's type/color/brand entries, scaled per dimension.
    /// Empty attribute values are skipped.
    pub fn accumulate(&mut self, attrs: &ItemAttributes, score: f32) {
        let entries = [
            (&mut self.item_type, &attrs.item_type, TYPE_WEIGHT),
            (&mut self.color, &attrs.color, COLOR_WEIGHT),
            (&mut self.brand, &attrs.brand, BRAND_WEIGHT),
        ];
        for (map, key, weight) in entries {
            if !key.is_empty() {
                *map.entry(key.clone()).or_insert(0.0) += score * weight;
            }
        }
    }

    /// brand x1.0 + type x1.2 + color x0.8 of this profile's scores
    pub fn affinity(&self, attrs: &ItemAttributes) -> f32 {
        let lookup = |map: &BTreeMap<String, f32>, key: &str| map.get(key).copied().unwrap_or(0.0);
        lookup(&self.brand, &attrs.brand) * BRAND_WEIGHT
            + lookup(&self.item_type, &attrs.item_type) * TYPE_WEIGHT
            + lookup(&self.color, &attrs.color) * COLOR_WEIGHT
    }

    pub fn top_type(&self) -> Option<&str> {
        top_entry(&self.item_type)
    }

    pub fn top_color(&self) -> Option<&str> {
        top_entry(&self.color)
    }

    pub fn snapshot(&self) -> PreferenceSnapshot {
        PreferenceSnapshot {
            item_type: self.item_type.clone(),
            color: self.color.clone(),
            brand: self.brand.clone(),
        }
    }
}

/// Highest-scoring key; the alphabetically first one wins ties
fn top_entry(map: &BTreeMap<String, f32>) -> Option<&str> {
    let mut best: Option<(&String, f32)> = None;
    for (key, &score) in map {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((key, score)),
        }
    }
    best.map(|(key, _)| key.as_str())
}

#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    /// Item ids already served; cleared only by calibration
    pub seen: HashSet<String>,
    /// Exponentially weighted running average of feedback-weighted vectors
    pub session_vector: Option<Array1<f32>>,
    /// Explicit override set by calibration
    pub calibration_vector: Option<Array1<f32>>,
    pub preferences: AttributePreferences,
    pub super_like_queue: VecDeque<String>,
    pub outfit_suggestions: VecDeque<OutfitSuggestion>,
}

impl UserProfile {
    /// Put `ids` ahead of everything already queued, keeping their order
    pub fn prepend_guarantees(&mut self, ids: Vec<String>) {
        for id in ids.into_iter().rev() {
            self.super_like_queue.push_front(id);
        }
    }
}

pub type SharedProfile = Arc<Mutex<UserProfile>>;

/// Lock a profile. A panic in another request must not make the user
/// unservable, so poisoning is ignored.
pub fn lock_profile(profile: &SharedProfile) -> MutexGuard<'_, UserProfile> {
    profile.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: DashMap<String, SharedProfile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the profile for `user_id`, creating it on first reference.
    ///
    /// Concurrent first calls for the same id all observe the same instance.
    pub fn ensure(&self, user_id: &str) -> SharedProfile {
        if let Some(existing) = self.profiles.get(user_id) {
            return Arc::clone(existing.value());
        }
        let entry = self.profiles.entry(user_id.to_string()).or_insert_with(|| {
            debug!(user_id = user_id, "Creating user profile");
            Arc::new(Mutex::new(UserProfile::default()))
        });
        Arc::clone(entry.value())
    }

    /// Existing profile without creating one
    pub fn get(&self, user_id: &str) -> Option<SharedProfile> {
        self.profiles.get(user_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
