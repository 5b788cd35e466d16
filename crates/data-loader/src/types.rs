//! Core domain types for rating data.
//!
//! This module defines the fundamental data structures used throughout the system.
//! Key Rust concepts demonstrated here:
//! - Type aliases for domain clarity (UserId, ItemId)
//! - Small `Copy` structs for immutable records
//! - HashMap indices over shared records

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with item IDs

/// Opaque identifier for a user
pub type UserId = u32;

/// Opaque identifier for an item
pub type ItemId = u32;

// =============================================================================
// Rating Type
// =============================================================================

/// A single observed rating: `user_id` rated `item_id` with `value`.
///
/// Ratings are immutable once loaded. Many ratings may share a user or an item,
/// and nothing in the pipeline ever modifies or drops one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, value: f64) -> Self {
        Self {
            user_id,
            item_id,
            value,
        }
    }
}

// =============================================================================
// Statistics Types
// =============================================================================

/// Summary statistics over a set of ratings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    pub users: usize,
    pub items: usize,
    pub ratings: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Fraction of the user x item matrix that is observed
    pub density: f64,
}

// =============================================================================
// RatingIndex - In-Memory Rating Store
// =============================================================================

/// Holds every rating plus per-user and per-item adjacency.
///
/// The flat `ratings` vector keeps input order, which is what gets handed to
/// the factorization engine. The two maps store positions into that vector so
/// each rating is held once.
#[derive(Debug, Default)]
pub struct RatingIndex {
    pub(crate) ratings: Vec<Rating>,
    /// Positions of the ratings made by each user
    pub(crate) user_ratings: HashMap<UserId, Vec<usize>>,
    /// Positions of the ratings received by each item
    pub(crate) item_ratings: HashMap<ItemId, Vec<usize>>,
}

impl RatingIndex {
    /// Creates a new, empty RatingIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from already-parsed ratings
    pub fn from_ratings(ratings: Vec<Rating>) -> Self {
        let mut index = Self::new();
        for rating in ratings {
            index.insert_rating(rating);
        }
        index
    }

    /// Insert a rating and update the adjacency maps
    pub fn insert_rating(&mut self, rating: Rating) {
        let position = self.ratings.len();
        self.ratings.push(rating);
        self.user_ratings
            .entry(rating.user_id)
            .or_default()
            .push(position);
        self.item_ratings
            .entry(rating.item_id)
            .or_default()
            .push(position);
    }

    /// All ratings in load order
    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    /// Consume the index, keeping only the flat rating list
    pub fn into_ratings(self) -> Vec<Rating> {
        self.ratings
    }

    /// Iterate over the ratings made by a user (empty if unknown)
    pub fn user_ratings(&self, user_id: UserId) -> impl Iterator<Item = &Rating> + '_ {
        self.positions(self.user_ratings.get(&user_id))
    }

    /// Iterate over the ratings received by an item (empty if unknown)
    pub fn item_ratings(&self, item_id: ItemId) -> impl Iterator<Item = &Rating> + '_ {
        self.positions(self.item_ratings.get(&item_id))
    }

    fn positions<'a>(
        &'a self,
        positions: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a Rating> + 'a {
        positions
            .into_iter()
            .flatten()
            .map(move |&position| &self.ratings[position])
    }

    /// Distinct user ids, sorted
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.user_ratings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Distinct item ids, sorted
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.item_ratings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get counts for debugging/validation: (users, items, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.user_ratings.len(),
            self.item_ratings.len(),
            self.ratings.len(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}
