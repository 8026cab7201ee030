//! Keyword-scored classification of call transcripts into inquiry types.
//!
//! The catalog is an ordered list; when two types score equally the earliest
//! configured type wins, which keeps classification deterministic for a given
//! catalog. Transcripts scoring below [`MIN_CONFIDENCE`] fall back to the
//! general inquiry type.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum keyword-match ratio before a classification is trusted
pub const MIN_CONFIDENCE: f64 = 0.3;

/// Catalog id of the general inquiry fallback
pub const GENERAL_INQUIRY: &str = "general";

/// Priority tier of an inquiry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Low,
    Normal,
    High,
}

/// A category of customer request with its skill and keyword signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InquiryType {
    /// Stable catalog id, e.g. "reservation"
    pub id: String,

    /// Display name, e.g. "Reservation Request"
    pub name: String,

    /// Skills a staff member must hold to take this inquiry
    pub required_skills: Vec<String>,

    /// Keyword signature used by the classifier
    pub keywords: Vec<String>,

    /// Priority tier
    pub priority: PriorityTier,
}

impl InquiryType {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        required_skills: &[&str],
        keywords: &[&str],
        priority: PriorityTier,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            required_skills: required_skills.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            priority,
        }
    }
}

/// Ordered, immutable set of inquiry types
pub struct InquiryCatalog {
    types: Vec<InquiryType>,
}

impl InquiryCatalog {
    pub fn new(types: Vec<InquiryType>) -> Self {
        Self { types }
    }

    /// The standard restaurant catalog
    pub fn restaurant_default() -> Self {
        Self::new(vec![
            InquiryType::new(
                "reservation",
                "Reservation Request",
                &["reservations"],
                &["reservation", "book", "table", "party", "dinner", "lunch"],
                PriorityTier::Normal,
            ),
            InquiryType::new(
                "complaint",
                "Complaint/Issue",
                &["complaints", "management"],
                &["complaint", "problem", "issue", "wrong", "bad", "manager"],
                PriorityTier::High,
            ),
            InquiryType::new(
                "special_event",
                "Special Event/Party",
                &["special_events", "management"],
                &["party", "event", "celebration", "birthday", "anniversary"],
                PriorityTier::High,
            ),
            InquiryType::new(
                "menu_question",
                "Menu Questions",
                &["menu_questions", "customer_service"],
                &["menu", "food", "ingredients", "allergies", "gluten", "vegan"],
                PriorityTier::Normal,
            ),
            InquiryType::new(
                "order",
                "Takeout Order",
                &["orders", "customer_service"],
                &["order", "takeout", "pickup", "delivery", "to-go"],
                PriorityTier::Normal,
            ),
            InquiryType::new(
                GENERAL_INQUIRY,
                "General Inquiry",
                &["general_inquiries", "customer_service"],
                &["hours", "location", "directions", "parking", "information"],
                PriorityTier::Low,
            ),
        ])
    }

    /// Look up an inquiry type by id
    pub fn get(&self, id: &str) -> Option<&InquiryType> {
        self.types.iter().find(|t| t.id == id)
    }

    /// Iterate in configured order
    pub fn iter(&self) -> impl Iterator<Item = &InquiryType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

/// Keyword-scored intent classifier
pub struct IntentClassifier {
    catalog: Arc<InquiryCatalog>,
}

impl IntentClassifier {
    pub fn new(catalog: Arc<InquiryCatalog>) -> Self {
        Self { catalog }
    }

    /// Classify a transcript into an inquiry type id.
    ///
    /// Score per type = matched keywords / total keywords, where a match is a
    /// case-insensitive substring hit. Ties resolve to the earliest type in
    /// catalog order; anything under [`MIN_CONFIDENCE`] becomes
    /// [`GENERAL_INQUIRY`]. Pure function: same transcript, same answer.
    pub fn classify(&self, transcript: &str) -> String {
        let lower = transcript.to_lowercase();

        let mut best_id = GENERAL_INQUIRY;
        let mut best_score = 0.0_f64;

        for inquiry in self.catalog.iter() {
            if inquiry.keywords.is_empty() {
                continue;
            }
            let hits = inquiry
                .keywords
                .iter()
                .filter(|keyword| lower.contains(keyword.as_str()))
                .count();
            let score = hits as f64 / inquiry.keywords.len() as f64;
            if score > best_score {
                best_id = &inquiry.id;
                best_score = score;
            }
        }

        debug!(
            "📊 Intent analysis: best match '{}' at {:.2}",
            best_id, best_score
        );

        if best_score >= MIN_CONFIDENCE {
            best_id.to_string()
        } else {
            GENERAL_INQUIRY.to_string()
        }
    }
}
