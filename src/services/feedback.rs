//! Anonymous app and tour feedback.

use chrono::Utc;
use uuid::Uuid;

use super::{caller_user, check_rating, member_tour, owned_tour};
use crate::auth::Identity;
use crate::db::models::{AppFeedback, TourFeedback};
use crate::db::{Db, Filter};
use crate::error::ServiceResult;

/// Stored without any reference to the author.
pub async fn send_app_feedback(db: &Db, rating: i32, review: String) -> ServiceResult<AppFeedback> {
    check_rating(rating)?;
    let feedback = AppFeedback {
        id: Uuid::new_v4(),
        rating,
        review,
        created_at: Utc::now(),
    };
    db.insert(&feedback).await?;
    tracing::info!(rating, "app feedback received");
    Ok(feedback)
}

/// Members only; stored without any reference to the author.
pub async fn submit_tour_feedback(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    rating: i32,
    review: String,
) -> ServiceResult<TourFeedback> {
    let tour = member_tour(db, caller, tour_id).await?;
    check_rating(rating)?;
    let feedback = TourFeedback {
        id: Uuid::new_v4(),
        tour: tour.id,
        rating,
        review,
        created_at: Utc::now(),
    };
    db.insert(&feedback).await?;
    tracing::info!(tour = %tour.id, rating, "tour feedback received");
    Ok(feedback)
}

pub async fn tour_feedback(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
) -> ServiceResult<Vec<TourFeedback>> {
    let owner = caller_user(db, caller).await?;
    let tour = owned_tour(db, &owner, tour_id).await?;
    Ok(db
        .find::<TourFeedback>(Filter::eq("tour", tour.id))
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::services::{testing, tour as tours};

    #[tokio::test]
    async fn test_app_feedback_rating_range() {
        let db = Db::in_memory();
        for rating in [0, 6] {
            assert!(matches!(
                send_app_feedback(&db, rating, "meh".into()).await,
                Err(ServiceError::InvalidRating)
            ));
        }
        for rating in [1, 5] {
            assert!(send_app_feedback(&db, rating, "ok".into()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_app_feedback_is_anonymous() {
        let db = Db::in_memory();
        testing::user(&db, "ada").await;
        let feedback = send_app_feedback(&db, 4, "nice".into()).await.unwrap();
        let value = serde_json::to_value(&feedback).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
        assert!(!value.to_string().contains("ada"));
    }

    #[tokio::test]
    async fn test_tour_feedback_requires_membership_and_valid_rating() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let visitor = testing::user(&db, "visitor").await;
        let tour = testing::tour(&db, &owner, "t1").await;

        assert!(matches!(
            submit_tour_feedback(&db, &visitor, tour.id, 5, "great".into()).await,
            Err(ServiceError::NotFound)
        ));
        tours::add_member(&db, &visitor, tour.id, 1234).await.unwrap();

        for rating in [0, 6] {
            assert!(matches!(
                submit_tour_feedback(&db, &visitor, tour.id, rating, "x".into()).await,
                Err(ServiceError::InvalidRating)
            ));
        }
        for rating in [1, 5] {
            assert!(submit_tour_feedback(&db, &visitor, tour.id, rating, "x".into())
                .await
                .is_ok());
        }

        assert_eq!(tour_feedback(&db, &owner, tour.id).await.unwrap().len(), 2);
        assert!(tour_feedback(&db, &visitor, tour.id).await.is_err());
    }
}
