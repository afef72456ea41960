use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Review, ReviewSummary};
use crate::store::{create_doc, list_docs, update_existing, Bucket, DocumentStore};
use crate::validation::ReviewSubmission;

/// Product reviews. New reviews stay hidden until approved.
#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn DocumentStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, submission), fields(sku = %submission.sku))]
    pub async fn submit(&self, submission: &ReviewSubmission) -> Result<Review, ServiceError> {
        let review = Review {
            id: format!("review_{}", Uuid::new_v4().simple()),
            sku: submission.sku.clone(),
            rating: submission.rating,
            title: submission.title.trim().to_string(),
            comment: submission.comment.trim().to_string(),
            author: submission.author.trim().to_string(),
            email: submission.email.trim().to_lowercase(),
            created_at: Utc::now(),
            approved: false,
        };
        create_doc(self.store.as_ref(), Bucket::Reviews, &review.id, &review).await?;
        info!(review_id = %review.id, rating = review.rating, "review submitted");
        Ok(review)
    }

    pub async fn summary(&self, sku: &str) -> Result<ReviewSummary, ServiceError> {
        let reviews: Vec<Review> = list_docs::<Review>(self.store.as_ref(), Bucket::Reviews)
            .await?
            .into_iter()
            .map(|(_, review)| review)
            .collect();
        Ok(ReviewSummary::from_approved(sku, &reviews))
    }

    #[instrument(skip(self))]
    pub async fn approve(&self, review_id: &str) -> Result<Review, ServiceError> {
        let review = update_existing::<Review, ServiceError, _>(
            self.store.as_ref(),
            Bucket::Reviews,
            review_id,
            |review| {
                review.approved = true;
                Ok(())
            },
        )
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Review {} niet gevonden", review_id)))?;
        info!("review approved");
        Ok(review)
    }
}
