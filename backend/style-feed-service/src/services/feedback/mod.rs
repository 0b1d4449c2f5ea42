// ============================================
// Feedback Processor
// ============================================
//
// One swipe event updates, in order:
//   1. session vector   (EWMA of weighted item vectors)
//   2. attribute prefs  (type x1.2, color x0.8, brand x1.0)
//   3. outfit queue     (on like / super-like)
//   4. guarantee queue  (on super-like, same type + color)
//
// Callers hold the user's profile lock for the whole call. The shared PRNG
// is locked only while guarantees are shuffled.

use crate::models::{FeedbackEvent, OutfitSuggestion};
use crate::services::catalog::Catalog;
use crate::services::outfit::OutfitMatcher;
use crate::services::profile::UserProfile;
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Weight of the previous session vector in the running average
const SESSION_DECAY: f32 = 0.4;
/// Weight of the new observation
const SESSION_UPDATE: f32 = 0.6;

pub const DEFAULT_SUPER_LIKE_BATCH: usize = 20;

/// Multiplier applied to the item vector before blending into the session
pub fn session_weight(event: &FeedbackEvent) -> f32 {
    if event.saved {
        3.5
    } else if event.super_like {
        3.0
    } else if event.like > 0 {
        1.0
    } else {
        -1.0
    }
}

/// Score added to the item's attributes, `None` when the event carries no
/// attribute signal
pub fn attribute_score(event: &FeedbackEvent) -> Option<f32> {
    if event.saved {
        Some(3.0)
    } else if event.super_like {
        Some(2.0)
    } else if event.soft_like {
        Some(1.25)
    } else if event.like > 0 {
        Some(1.0)
    } else if event.like < 0 {
        Some(-0.7)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackProcessor {
    super_like_batch: usize,
}

impl Default for FeedbackProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_SUPER_LIKE_BATCH)
    }
}

impl FeedbackProcessor {
    pub fn new(super_like_batch: usize) -> Self {
        Self { super_like_batch }
    }

    /// Apply one event to `profile`. Returns false when the item is not in
    /// the catalog (nothing changes).
    pub fn apply<R: Rng>(
        &self,
        catalog: &Catalog,
        matcher: &OutfitMatcher,
        profile: &mut UserProfile,
        event: &FeedbackEvent,
        rng: &Mutex<R>,
    ) -> bool {
        let Some(idx) = catalog.index_of(&event.pid) else {
            debug!(
                user_id = %event.user,
                item_id = %event.pid,
                "Feedback for unknown item ignored"
            );
            return false;
        };

        debug!(
            user_id = %event.user,
            item_id = %event.pid,
            like = event.like,
            soft_like = event.soft_like,
            super_like = event.super_like,
            saved = event.saved,
            dwell_ms = event.dwell_ms,
            "Applying feedback"
        );

        self.update_session(catalog, profile, idx, session_weight(event));

        if let Some(score) = attribute_score(event) {
            profile.preferences.accumulate(catalog.attributes(idx), score);
        }

        if event.is_positive() {
            if let Some(complement) = matcher.find_complement(catalog, idx, &profile.seen) {
                profile.outfit_suggestions.push_back(OutfitSuggestion::new(
                    catalog.item(idx).clone(),
                    catalog.item(complement).clone(),
                ));
            }
        }

        if event.super_like {
            let guarantees = self.super_like_guarantees(catalog, profile, idx, rng);
            if !guarantees.is_empty() {
                debug!(
                    user_id = %event.user,
                    count = guarantees.len(),
                    "Queued super-like guarantees"
                );
                profile.prepend_guarantees(guarantees);
            }
        }

        true
    }

    fn update_session(
        &self,
        catalog: &Catalog,
        profile: &mut UserProfile,
        idx: usize,
        weight: f32,
    ) {
        let observed: Array1<f32> = catalog.vector(idx).mapv(|x| x * weight);
        profile.session_vector = Some(match profile.session_vector.take() {
            Some(previous) if previous.len() == observed.len() => {
                previous * SESSION_DECAY + observed * SESSION_UPDATE
            }
            _ => observed,
        });
    }

    /// Up to `super_like_batch` unseen items sharing the target's type and
    /// color, in random order. Empty when either attribute is missing.
    fn super_like_guarantees<R: Rng>(
        &self,
        catalog: &Catalog,
        profile: &UserProfile,
        idx: usize,
        rng: &Mutex<R>,
    ) -> Vec<String> {
        let target = catalog.attributes(idx);
        if target.item_type.is_empty() || target.color.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<&str> = (0..catalog.len())
            .filter(|&other| other != idx)
            .filter(|&other| {
                let attrs = catalog.attributes(other);
                attrs.item_type == target.item_type && attrs.color == target.color
            })
            .map(|other| catalog.item(other).id.as_str())
            .filter(|id| !profile.seen.contains(*id))
            .collect();

        {
            let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
            matches.shuffle(&mut *rng);
        }
        matches.truncate(self.super_like_batch);
        matches.into_iter().map(str::to_string).collect()
    }
}
