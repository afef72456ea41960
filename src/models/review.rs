use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub sku: String,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub author: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    /// Reviews stay hidden until a moderator approves them.
    #[serde(default)]
    pub approved: bool,
}

/// Review as shown on a product page (no email address).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicReview {
    pub id: String,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Review> for PublicReview {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id.clone(),
            rating: review.rating,
            title: review.title.clone(),
            comment: review.comment.clone(),
            author: review.author.clone(),
            created_at: review.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub sku: String,
    pub total: usize,
    /// Mean rating rounded to one decimal; 0 when there are no reviews.
    pub average_rating: f64,
    /// Count per star rating, 1 through 5.
    pub distribution: BTreeMap<u8, usize>,
    pub reviews: Vec<PublicReview>,
}

impl ReviewSummary {
    /// Summarizes approved reviews, newest first.
    pub fn from_approved(sku: &str, reviews: &[Review]) -> Self {
        let mut approved: Vec<&Review> = reviews
            .iter()
            .filter(|review| review.approved && review.sku == sku)
            .collect();
        approved.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut distribution: BTreeMap<u8, usize> = (1..=5).map(|stars| (stars, 0)).collect();
        for review in &approved {
            *distribution.entry(review.rating).or_insert(0) += 1;
        }

        let total = approved.len();
        let average_rating = if total == 0 {
            0.0
        } else {
            let sum: u32 = approved.iter().map(|review| u32::from(review.rating)).sum();
            (f64::from(sum) / total as f64 * 10.0).round() / 10.0
        };

        Self {
            sku: sku.to_string(),
            total,
            average_rating,
            distribution,
            reviews: approved.into_iter().map(PublicReview::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn review(id: &str, rating: u8, approved: bool, age_days: i64) -> Review {
        Review {
            id: id.into(),
            sku: "SW-001".into(),
            rating,
            title: "Topspel".into(),
            comment: "Werkt perfect op mijn Switch".into(),
            author: "Sanne".into(),
            email: "sanne@example.nl".into(),
            created_at: Utc::now() - Duration::days(age_days),
            approved,
        }
    }

    #[test]
    fn only_approved_reviews_count() {
        let reviews = vec![
            review("r1", 5, true, 3),
            review("r2", 4, true, 1),
            review("r3", 1, false, 0),
        ];
        let summary = ReviewSummary::from_approved("SW-001", &reviews);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.average_rating, 4.5);
        assert_eq!(summary.distribution[&1], 0);
        assert_eq!(summary.reviews[0].id, "r2");
    }

    #[test]
    fn empty_summary_has_zero_average() {
        let summary = ReviewSummary::from_approved("SW-404", &[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.distribution.len(), 5);
    }
}
