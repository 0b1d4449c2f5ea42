// ============================================
// Recommender Engine
// ============================================
//
// Owns the shared read-only catalog and index, the injected profile store
// and the engine PRNG. Every public operation locks exactly one user profile
// for its whole duration. The PRNG lock is taken after the profile lock and
// only around the draw that needs it, so feedback for different users does
// not serialize on it.
//
// Pull precedence:
//   1. one pending outfit suggestion
//   2. super-like guarantees (front of queue, seen ids skipped)
//   3. fused ranking + MMR, or uniform sampling on cold start

use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::models::{
    CalibrationResult, FeedEntry, FeedbackEvent, ItemDebugView, OutfitSuggestion,
    PreferenceSnapshot, ProductDetails,
};
use crate::services::catalog::Catalog;
use crate::services::diversity::DiversityLayer;
use crate::services::feedback::FeedbackProcessor;
use crate::services::outfit::OutfitMatcher;
use crate::services::profile::{lock_profile, AttributePreferences, ProfileStore, UserProfile};
use crate::services::ranking::RankingLayer;
use crate::services::similarity::SimilarityIndex;
use crate::utils::normalize_attr;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use validator::Validate;

/// Preference score given to the calibrated category
const CALIBRATION_TYPE_SCORE: f32 = 5.0;

/// How the debug view addresses an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemLookup {
    Id(String),
    Url(String),
}

pub struct RecommenderEngine {
    catalog: Arc<Catalog>,
    index: Arc<dyn SimilarityIndex>,
    profiles: Arc<ProfileStore>,
    feedback: FeedbackProcessor,
    outfits: OutfitMatcher,
    ranking: RankingLayer,
    diversity: DiversityLayer,
    rng: Mutex<StdRng>,
}

impl RecommenderEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        index: Arc<dyn SimilarityIndex>,
        profiles: Arc<ProfileStore>,
        config: &EngineConfig,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            catalog,
            index,
            profiles,
            feedback: FeedbackProcessor::new(config.super_like_batch),
            outfits: OutfitMatcher::new(),
            ranking: RankingLayer::new(config.retrieve_k),
            diversity: DiversityLayer::new(config.mmr_lambda),
            rng: Mutex::new(rng),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn index_name(&self) -> &'static str {
        self.index.name()
    }

    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one swipe. Unknown items are ignored; a missing user or item id
    /// is a validation error.
    pub fn apply_feedback(&self, event: &FeedbackEvent) -> Result<()> {
        event.validate()?;

        let shared = self.profiles.ensure(&event.user);
        let mut profile = lock_profile(&shared);
        self.feedback
            .apply(&self.catalog, &self.outfits, &mut profile, event, &self.rng);

        Ok(())
    }

    /// Next batch of at most `n` entries for `user_id`; everything returned
    /// is marked seen.
    pub fn recommend(&self, user_id: &str, n: usize) -> Result<Vec<FeedEntry>> {
        if user_id.is_empty() {
            return Err(AppError::Validation("user is required".to_string()));
        }
        if n == 0 {
            return Err(AppError::Validation("n must be at least 1".to_string()));
        }

        let shared = self.profiles.ensure(user_id);
        let mut profile = lock_profile(&shared);

        let mut out: Vec<FeedEntry> = Vec::with_capacity(n);
        // Catalog indices already placed in this pull
        let mut emitted: HashSet<usize> = HashSet::new();

        if let Some(suggestion) = self.next_outfit_suggestion(&mut profile) {
            if let Some(idx) = self.catalog.index_of(&suggestion.suggested_item.id) {
                emitted.insert(idx);
            }
            out.push(FeedEntry::Outfit(suggestion));
        }

        let guaranteed = self.drain_guarantees(&mut profile, &mut out, &mut emitted, n);

        let mut ranked = 0;
        if out.len() < n {
            let slots = n - out.len();
            let mut exclude: HashSet<usize> = profile
                .seen
                .iter()
                .filter_map(|id| self.catalog.index_of(id))
                .collect();
            exclude.extend(emitted.iter().copied());

            for idx in self.model_candidates(&profile, &exclude, slots) {
                out.push(FeedEntry::Item(self.catalog.item(idx).clone()));
                ranked += 1;
            }
        }

        for entry in &out {
            profile.seen.insert(entry.served_item().id.clone());
        }

        debug!(
            user_id = %user_id,
            requested = n,
            returned = out.len(),
            guaranteed,
            ranked,
            seen = profile.seen.len(),
            "Recommendation pull served"
        );

        Ok(out)
    }

    /// Pop the oldest suggestion whose suggested item is still unseen.
    /// Stale suggestions are discarded.
    fn next_outfit_suggestion(&self, profile: &mut UserProfile) -> Option<OutfitSuggestion> {
        while let Some(suggestion) = profile.outfit_suggestions.pop_front() {
            if profile.seen.contains(&suggestion.suggested_item.id) {
                debug!(
                    item_id = %suggestion.suggested_item.id,
                    "Dropping stale outfit suggestion"
                );
                continue;
            }
            return Some(suggestion);
        }
        None
    }

    fn drain_guarantees(
        &self,
        profile: &mut UserProfile,
        out: &mut Vec<FeedEntry>,
        emitted: &mut HashSet<usize>,
        n: usize,
    ) -> usize {
        let mut served = 0;
        while out.len() < n {
            let Some(id) = profile.super_like_queue.pop_front() else {
                break;
            };
            if profile.seen.contains(&id) {
                continue;
            }
            let Some(idx) = self.catalog.index_of(&id) else {
                continue;
            };
            if !emitted.insert(idx) {
                continue;
            }
            out.push(FeedEntry::Item(self.catalog.item(idx).clone()));
            served += 1;
        }
        served
    }

    /// Fused ranking + MMR over unseen items, or a uniform random sample when
    /// the profile has no usable base vector
    fn model_candidates(
        &self,
        profile: &UserProfile,
        exclude: &HashSet<usize>,
        slots: usize,
    ) -> Vec<usize> {
        let ranked = RankingLayer::base_vector(&self.catalog, profile).and_then(|base| {
            self.ranking.rank(
                &self.catalog,
                self.index.as_ref(),
                &profile.preferences,
                &base,
                exclude,
            )
        });

        match ranked {
            Some(candidates) => self.diversity.rerank(&self.catalog, &candidates, slots),
            None => {
                let pool: Vec<usize> = (0..self.catalog.len())
                    .filter(|idx| !exclude.contains(idx))
                    .collect();
                let amount = slots.min(pool.len());
                let mut rng = self.rng();
                sample(&mut *rng, pool.len(), amount)
                    .into_iter()
                    .map(|pos| pool[pos])
                    .collect()
            }
        }
    }

    /// Reset the user towards `category`: clears seen items, guarantees and
    /// preferences, and points both session and calibration vectors at the
    /// mean of that category. No matching item leaves the profile untouched.
    pub fn calibrate(&self, user_id: &str, category: &str) -> Result<CalibrationResult> {
        if user_id.is_empty() {
            return Err(AppError::Validation("user is required".to_string()));
        }
        let category = normalize_attr(category);
        if category.is_empty() {
            return Err(AppError::Validation("category is required".to_string()));
        }

        let shared = self.profiles.ensure(user_id);
        let mut profile = lock_profile(&shared);

        let indices: Vec<usize> = self.catalog.indices_of_type(&category).collect();
        let matched_count = indices.len();
        let Some(mean) = self.catalog.mean_of(indices) else {
            info!(user_id = %user_id, category = %category, "Calibration matched no products");
            return Ok(CalibrationResult { matched_count: 0 });
        };

        profile.calibration_vector = Some(mean.clone());
        profile.session_vector = Some(mean);
        profile.preferences =
            AttributePreferences::seeded_with_type(&category, CALIBRATION_TYPE_SCORE);
        profile.super_like_queue.clear();
        profile.seen.clear();

        info!(
            user_id = %user_id,
            category = %category,
            matched = matched_count,
            "User calibrated"
        );

        Ok(CalibrationResult { matched_count })
    }

    /// On-demand complement for `item_id`. Read-only: no queue is touched.
    pub fn get_outfit(&self, item_id: &str, user_id: &str) -> Result<OutfitSuggestion> {
        let idx = self
            .catalog
            .index_of(item_id)
            .ok_or_else(|| AppError::ItemNotFound(item_id.to_string()))?;

        let shared = self.profiles.ensure(user_id);
        let profile = lock_profile(&shared);

        let complement = self
            .outfits
            .find_complement(&self.catalog, idx, &profile.seen)
            .ok_or_else(|| AppError::NoComplementaryItem(item_id.to_string()))?;

        Ok(OutfitSuggestion::new(
            self.catalog.item(idx).clone(),
            self.catalog.item(complement).clone(),
        ))
    }

    /// Read-only scoring breakdown of one item for one user. Unknown users
    /// are scored with an empty profile and are not created.
    pub fn debug_item(&self, user_id: &str, lookup: &ItemLookup) -> Result<ItemDebugView> {
        let idx = match lookup {
            ItemLookup::Id(id) => self.catalog.index_of(id),
            ItemLookup::Url(url) => self.catalog.index_of_url(url),
        }
        .ok_or_else(|| {
            AppError::ItemNotFound(match lookup {
                ItemLookup::Id(id) => id.clone(),
                ItemLookup::Url(url) => url.clone(),
            })
        })?;

        let view = |profile: &UserProfile| {
            let base = RankingLayer::base_vector(&self.catalog, profile);
            ItemDebugView {
                product_details: ProductDetails::from(self.catalog.item(idx)),
                attr_prefs: profile.preferences.snapshot(),
                scoring_breakdown: RankingLayer::score_item(
                    &self.catalog,
                    &profile.preferences,
                    base.as_ref(),
                    idx,
                ),
            }
        };

        let debug_view = match self.profiles.get(user_id) {
            Some(shared) => {
                let profile = lock_profile(&shared);
                view(&profile)
            }
            None => view(&UserProfile::default()),
        };
        Ok(debug_view)
    }

    /// Current attribute preferences, empty for unknown users
    pub fn preferences(&self, user_id: &str) -> PreferenceSnapshot {
        match self.profiles.get(user_id) {
            Some(shared) => {
                let profile = lock_profile(&shared);
                profile.preferences.snapshot()
            }
            None => PreferenceSnapshot::default(),
        }
    }
}
