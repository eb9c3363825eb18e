//! Keep-old versus replace-with-new decision for fingerprint collisions.

use affdb_core::{NormalizedProduct, StoredProductSummary};

pub const DISCARD_REASON: &str = "duplicate, not better";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    Insert,
    /// Delete the stored row, then write the candidate.
    Replace { existing_id: i64 },
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub action: ResolutionAction,
    pub reason: &'static str,
}

/// Decides what to do with `candidate` given the best stored product sharing
/// its fingerprint, if any.
///
/// Quality wins outright. On equal scores the strictly cheaper listing wins,
/// and only when both prices are known; every other tie keeps the stored row.
#[must_use]
pub fn resolve(
    candidate: &NormalizedProduct,
    candidate_score: u32,
    existing: Option<(&StoredProductSummary, u32)>,
) -> Resolution {
    let Some((stored, stored_score)) = existing else {
        return Resolution {
            action: ResolutionAction::Insert,
            reason: "new product",
        };
    };

    if candidate_score > stored_score {
        return Resolution {
            action: ResolutionAction::Replace {
                existing_id: stored.id,
            },
            reason: "higher quality",
        };
    }

    if candidate_score == stored_score {
        if let (Some(new_price), Some(old_price)) = (candidate.price, stored.price) {
            if new_price < old_price {
                return Resolution {
                    action: ResolutionAction::Replace {
                        existing_id: stored.id,
                    },
                    reason: "same quality, lower price",
                };
            }
        }
    }

    Resolution {
        action: ResolutionAction::Discard,
        reason: DISCARD_REASON,
    }
}
