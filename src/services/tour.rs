/*!
 * Tour service
 * Creation, membership by session code, review submission and attachments
 */
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{caller_user, find_user, member_tour, owned_tour};
use crate::auth::Identity;
use crate::db::models::{
    Answer, MuseumObject, Question, Tour, TourStatus, MAX_DIFFICULTY, MIN_DIFFICULTY,
};
use crate::db::{Db, Filter};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTour {
    pub name: String,
    pub session_id: i64,
    pub difficulty: i32,
    pub search_id: String,
    pub description: Option<String>,
}

/// Create a tour owned by the caller, who becomes its first member.
pub async fn create_tour(db: &Db, caller: &Identity, input: NewTour) -> ServiceResult<Tour> {
    let user = match caller_user(db, caller).await {
        Ok(user) if user.producer => user,
        Ok(_) | Err(ServiceError::NotFound) => return Err(ServiceError::NotProducer),
        Err(e) => return Err(e),
    };
    if db
        .exists::<Tour>(Filter::eq("searchId", &input.search_id))
        .await?
    {
        return Err(ServiceError::SearchIdInUse);
    }

    let tour = Tour {
        id: Uuid::new_v4(),
        owner: user.id,
        name: input.name,
        session_id: input.session_id,
        search_id: input.search_id,
        description: input.description,
        difficulty: input.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
        status: TourStatus::Draft,
        users: BTreeSet::from([user.id]),
        referenced_objects: Vec::new(),
        questions: Vec::new(),
        created_at: Utc::now(),
    };
    match db.insert(&tour).await {
        Ok(()) => {}
        Err(e) if e.is_conflict() => return Err(ServiceError::SearchIdInUse),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(tour = %tour.id, owner = %user.username, "tour created");
    Ok(tour)
}

/// Join a tour with its current session code.
pub async fn add_member(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    session_id: i64,
) -> ServiceResult<Tour> {
    let mut tour = db.get::<Tour>(tour_id).await?.ok_or(ServiceError::NotFound)?;
    if tour.session_id != session_id {
        tracing::debug!(tour = %tour_id, "join with stale or wrong session code");
        return Err(ServiceError::Forbidden);
    }
    let user = caller_user(db, caller).await?;
    if tour.users.insert(user.id) {
        db.save(&tour).await?;
        tracing::info!(tour = %tour_id, user = %user.username, "member joined");
    }
    Ok(tour)
}

/// Remove a member. The owner cannot be removed from their own tour.
pub async fn remove_user(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    username: &str,
) -> ServiceResult<Tour> {
    let owner = caller_user(db, caller).await?;
    let mut tour = owned_tour(db, &owner, tour_id).await?;
    let target = find_user(db, username).await?.ok_or(ServiceError::NotFound)?;
    if tour.is_owned_by(target.id) {
        return Err(ServiceError::Forbidden);
    }
    if tour.users.remove(&target.id) {
        db.save(&tour).await?;
        tracing::info!(tour = %tour_id, user = %target.username, "member removed");
    }
    Ok(tour)
}

pub async fn update_session_id(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    session_id: i64,
) -> ServiceResult<Tour> {
    let owner = caller_user(db, caller).await?;
    let mut tour = owned_tour(db, &owner, tour_id).await?;
    tour.session_id = session_id;
    db.save(&tour).await?;
    tracing::info!(tour = %tour_id, "session code rotated");
    Ok(tour)
}

pub async fn submit_review(db: &Db, caller: &Identity, tour_id: Uuid) -> ServiceResult<Tour> {
    let owner = caller_user(db, caller).await?;
    let mut tour = owned_tour(db, &owner, tour_id).await?;
    tour.status = TourStatus::Pending;
    db.save(&tour).await?;
    tracing::info!(tour = %tour_id, "tour submitted for review");
    Ok(tour)
}

pub async fn add_object(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    object_id: &str,
) -> ServiceResult<Tour> {
    let owner = caller_user(db, caller).await?;
    let mut tour = owned_tour(db, &owner, tour_id).await?;
    if !db
        .exists::<MuseumObject>(Filter::eq("objectId", object_id))
        .await?
    {
        return Err(ServiceError::NotFound);
    }
    if !tour.referenced_objects.iter().any(|o| o == object_id) {
        tour.referenced_objects.push(object_id.to_string());
        db.save(&tour).await?;
    }
    Ok(tour)
}

pub async fn remove_object(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    object_id: &str,
) -> ServiceResult<Tour> {
    let owner = caller_user(db, caller).await?;
    let mut tour = owned_tour(db, &owner, tour_id).await?;
    let before = tour.referenced_objects.len();
    tour.referenced_objects.retain(|o| o != object_id);
    if tour.referenced_objects.len() != before {
        db.save(&tour).await?;
    }
    Ok(tour)
}

/// Attach a question created for this tour.
pub async fn add_question(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    question_id: Uuid,
) -> ServiceResult<Tour> {
    let owner = caller_user(db, caller).await?;
    let mut tour = owned_tour(db, &owner, tour_id).await?;
    match db.get::<Question>(question_id).await? {
        Some(question) if question.tour == tour.id => {}
        _ => return Err(ServiceError::NotFound),
    }
    if !tour.questions.contains(&question_id) {
        tour.questions.push(question_id);
        db.save(&tour).await?;
    }
    Ok(tour)
}

/// Detach and delete a question together with every answer to it.
pub async fn remove_question(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    question_id: Uuid,
) -> ServiceResult<Tour> {
    let owner = caller_user(db, caller).await?;
    let mut tour = owned_tour(db, &owner, tour_id).await?;
    if !tour.questions.contains(&question_id) {
        return Ok(tour);
    }

    tour.questions.retain(|q| *q != question_id);
    db.save(&tour).await?;
    for answer in db
        .find::<Answer>(Filter::eq("question", question_id))
        .await?
    {
        db.delete::<Answer>(answer.id).await?;
    }
    db.delete::<Question>(question_id).await?;
    tracing::info!(tour = %tour_id, question = %question_id, "question removed");
    Ok(tour)
}

/// Tours the caller is a member of.
pub async fn my_tours(db: &Db, caller: &Identity) -> ServiceResult<Vec<Tour>> {
    let user = caller_user(db, caller).await?;
    Ok(db.find::<Tour>(Filter::contains("users", user.id)).await?)
}

pub async fn owned_tours(db: &Db, caller: &Identity) -> ServiceResult<Vec<Tour>> {
    let user = caller_user(db, caller).await?;
    Ok(db.find::<Tour>(Filter::eq("owner", user.id)).await?)
}

/// A tour is visible to its members only.
pub async fn tour(db: &Db, caller: &Identity, tour_id: Uuid) -> ServiceResult<Tour> {
    member_tour(db, caller, tour_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AnswerBody, QuestionKind};
    use crate::services::testing;

    fn new_tour(search_id: &str, difficulty: i32) -> NewTour {
        NewTour {
            name: "Bronze age".to_string(),
            session_id: 1234,
            difficulty,
            search_id: search_id.to_string(),
            description: Some("Weapons and jewellery".to_string()),
        }
    }

    async fn museum_object(db: &Db, object_id: &str) {
        let object = MuseumObject {
            id: Uuid::new_v4(),
            object_id: object_id.to_string(),
            ..MuseumObject::default()
        };
        db.insert(&object).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_tour_requires_producer() {
        let db = Db::in_memory();
        let visitor = testing::user(&db, "visitor").await;
        let err = create_tour(&db, &visitor, new_tour("s1", 3)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotProducer));

        let ghost = Identity::new("ghost");
        let err = create_tour(&db, &ghost, new_tour("s1", 3)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotProducer));
    }

    #[tokio::test]
    async fn test_create_tour_rejects_duplicate_search_id() {
        let db = Db::in_memory();
        let producer = testing::producer(&db, "prod").await;
        create_tour(&db, &producer, new_tour("s1", 3)).await.unwrap();
        let err = create_tour(&db, &producer, new_tour("s1", 3)).await.unwrap_err();
        assert!(matches!(err, ServiceError::SearchIdInUse));
    }

    #[tokio::test]
    async fn test_create_tour_clamps_difficulty_and_adds_owner() {
        let db = Db::in_memory();
        let producer = testing::producer(&db, "prod").await;
        let high = create_tour(&db, &producer, new_tour("hi", 9)).await.unwrap();
        let low = create_tour(&db, &producer, new_tour("lo", -2)).await.unwrap();
        assert_eq!(high.difficulty, MAX_DIFFICULTY);
        assert_eq!(low.difficulty, MIN_DIFFICULTY);
        assert_eq!(high.status, TourStatus::Draft);
        assert!(high.is_member(high.owner));
        assert_eq!(high.users.len(), 1);
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let visitor = testing::user(&db, "visitor").await;
        let tour = testing::tour(&db, &owner, "t1").await;

        let first = add_member(&db, &visitor, tour.id, 1234).await.unwrap();
        let second = add_member(&db, &visitor, tour.id, 1234).await.unwrap();
        assert_eq!(first.users, second.users);
        assert_eq!(second.users.len(), 2);
    }

    #[tokio::test]
    async fn test_rotated_session_code_invalidates_old_code() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let visitor = testing::user(&db, "visitor").await;
        let tour = testing::tour(&db, &owner, "t1").await;

        update_session_id(&db, &owner, tour.id, 9999).await.unwrap();
        assert!(matches!(
            add_member(&db, &visitor, tour.id, 1234).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(add_member(&db, &visitor, tour.id, 9999).await.is_ok());
    }

    #[tokio::test]
    async fn test_owner_operations_reject_non_owner() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let other = testing::producer(&db, "other").await;
        let tour = testing::tour(&db, &owner, "t1").await;

        assert!(matches!(
            update_session_id(&db, &other, tour.id, 1).await,
            Err(ServiceError::NotFound)
        ));
        assert!(matches!(
            submit_review(&db, &other, tour.id).await,
            Err(ServiceError::NotFound)
        ));
        assert!(matches!(
            submit_review(&db, &owner, Uuid::new_v4()).await,
            Err(ServiceError::NotFound)
        ));
        let reviewed = submit_review(&db, &owner, tour.id).await.unwrap();
        assert_eq!(reviewed.status, TourStatus::Pending);
    }

    #[tokio::test]
    async fn test_remove_user() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let visitor = testing::user(&db, "visitor").await;
        let tour = testing::tour(&db, &owner, "t1").await;
        add_member(&db, &visitor, tour.id, 1234).await.unwrap();

        let after = remove_user(&db, &owner, tour.id, "visitor").await.unwrap();
        assert_eq!(after.users.len(), 1);
        // Removing a non-member is a no-op.
        let again = remove_user(&db, &owner, tour.id, "visitor").await.unwrap();
        assert_eq!(again.users, after.users);
        assert!(matches!(
            remove_user(&db, &owner, tour.id, "owner").await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            remove_user(&db, &visitor, tour.id, "owner").await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_objects_are_attached_once() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let tour = testing::tour(&db, &owner, "t1").await;
        museum_object(&db, "INV-1").await;

        add_object(&db, &owner, tour.id, "INV-1").await.unwrap();
        let tour = add_object(&db, &owner, tour.id, "INV-1").await.unwrap();
        assert_eq!(tour.referenced_objects, vec!["INV-1".to_string()]);
        assert!(matches!(
            add_object(&db, &owner, tour.id, "missing").await,
            Err(ServiceError::NotFound)
        ));

        let tour = remove_object(&db, &owner, tour.id, "INV-1").await.unwrap();
        assert!(tour.referenced_objects.is_empty());
        assert!(remove_object(&db, &owner, tour.id, "INV-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_question_deletes_its_answers() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let visitor = testing::user(&db, "visitor").await;
        let tour = testing::tour(&db, &owner, "t1").await;
        let question = Question {
            id: Uuid::new_v4(),
            tour: tour.id,
            question: "Why?".to_string(),
            linked_objects: vec![],
            kind: QuestionKind::FreeText,
            created_at: Utc::now(),
        };
        db.insert(&question).await.unwrap();
        add_question(&db, &owner, tour.id, question.id).await.unwrap();
        let tour = add_question(&db, &owner, tour.id, question.id).await.unwrap();
        assert_eq!(tour.questions, vec![question.id]);

        let visitor_id = crate::services::caller_user(&db, &visitor).await.unwrap().id;
        let answer = Answer {
            id: Uuid::new_v4(),
            question: question.id,
            user: visitor_id,
            tour: tour.id,
            body: AnswerBody::FreeText {
                answer: "because".to_string(),
            },
            updated_at: Utc::now(),
        };
        db.insert(&answer).await.unwrap();

        let tour = remove_question(&db, &owner, tour.id, question.id).await.unwrap();
        assert!(tour.questions.is_empty());
        assert!(db.get::<Question>(question.id).await.unwrap().is_none());
        assert!(db.get::<Answer>(answer.id).await.unwrap().is_none());
        assert!(remove_question(&db, &owner, tour.id, question.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_question_from_other_tour_cannot_be_attached() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let first = testing::tour(&db, &owner, "t1").await;
        let second = testing::tour(&db, &owner, "t2").await;
        let question = testing::mc_question(&db, &first).await;
        assert!(matches!(
            add_question(&db, &owner, second.id, question.id).await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_tour_queries() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let visitor = testing::user(&db, "visitor").await;
        let joined = testing::tour(&db, &owner, "t1").await;
        let other = testing::tour(&db, &owner, "t2").await;
        add_member(&db, &visitor, joined.id, 1234).await.unwrap();

        assert_eq!(owned_tours(&db, &owner).await.unwrap().len(), 2);
        let mine = my_tours(&db, &visitor).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, joined.id);
        assert!(tour(&db, &visitor, joined.id).await.is_ok());
        assert!(matches!(
            tour(&db, &visitor, other.id).await,
            Err(ServiceError::NotFound)
        ));
    }
}
