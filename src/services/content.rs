/*!
 * Content service
 * Questions, checkpoints, answer submission and scoring
 */
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{caller_user, find_user, member_tour, owned_tour};
use crate::auth::Identity;
use crate::blob::BlobStore;
use crate::db::models::{
    Answer, AnswerBody, Checkpoint, CheckpointKind, MuseumObject, Picture, Question, QuestionKind,
    Tour,
};
use crate::db::{Db, Filter};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question: String,
    #[serde(default)]
    pub linked_objects: Vec<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

fn validate_kind(kind: &QuestionKind) -> ServiceResult<()> {
    let QuestionKind::MultipleChoice {
        possible_answers,
        correct_answers,
        max_choices,
    } = kind
    else {
        return Ok(());
    };
    if possible_answers.is_empty() {
        return Err(ServiceError::Invalid("possible answers must not be empty".into()));
    }
    if correct_answers
        .iter()
        .any(|&i| i as usize >= possible_answers.len())
    {
        return Err(ServiceError::Invalid("correct answer index out of range".into()));
    }
    if *max_choices == 0 {
        return Err(ServiceError::Invalid("max choices must be at least 1".into()));
    }
    Ok(())
}

/// Create a question for a tour the caller owns. The question is not attached
/// to the tour until it is added explicitly.
pub async fn create_question(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    input: NewQuestion,
) -> ServiceResult<Question> {
    let owner = caller_user(db, caller).await?;
    let tour = owned_tour(db, &owner, tour_id).await?;
    validate_kind(&input.kind)?;

    let question = Question {
        id: Uuid::new_v4(),
        tour: tour.id,
        question: input.question,
        linked_objects: input.linked_objects,
        kind: input.kind,
        created_at: Utc::now(),
    };
    db.insert(&question).await?;
    tracing::info!(tour = %tour.id, question = %question.id, "question created");
    Ok(question)
}

/// The tour's attached questions, in tour order.
pub async fn tour_questions(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
) -> ServiceResult<Vec<Question>> {
    let tour = member_tour(db, caller, tour_id).await?;
    let mut questions = Vec::with_capacity(tour.questions.len());
    for id in &tour.questions {
        if let Some(question) = db.get::<Question>(*id).await? {
            questions.push(question);
        }
    }
    Ok(questions)
}

/// Submit or overwrite the caller's free-text answer.
pub async fn submit_answer(
    db: &Db,
    caller: &Identity,
    question_id: Uuid,
    text: String,
) -> ServiceResult<Answer> {
    let user = caller_user(db, caller).await?;
    let question = db
        .get::<Question>(question_id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    if question.kind != QuestionKind::FreeText {
        return Err(ServiceError::Invalid(
            "question expects a multiple-choice answer".into(),
        ));
    }

    let by_pair = Filter::eq("question", question.id).and(Filter::eq("user", user.id));
    let body = AnswerBody::FreeText { answer: text };

    if let Some(existing) = db.find_one::<Answer>(by_pair.clone()).await? {
        return overwrite(db, existing, body).await;
    }
    let answer = Answer {
        id: Uuid::new_v4(),
        question: question.id,
        user: user.id,
        tour: question.tour,
        body: body.clone(),
        updated_at: Utc::now(),
    };
    match db.insert(&answer).await {
        Ok(()) => Ok(answer),
        // A concurrent first submission won; overwrite it instead.
        Err(e) if e.is_conflict() => match db.find_one::<Answer>(by_pair).await? {
            Some(existing) => overwrite(db, existing, body).await,
            None => Err(e.into()),
        },
        Err(e) => Err(e.into()),
    }
}

async fn overwrite(db: &Db, mut answer: Answer, body: AnswerBody) -> ServiceResult<Answer> {
    answer.body = body;
    answer.updated_at = Utc::now();
    db.save(&answer).await?;
    Ok(answer)
}

/// Number of selected indices that are correct. Duplicate selections count once.
pub fn score(selection: &[u32], correct: &BTreeSet<u32>) -> u32 {
    let selected: BTreeSet<u32> = selection.iter().copied().collect();
    selected.intersection(correct).count() as u32
}

/// Submit a multiple-choice answer. The first submission is final.
pub async fn submit_mc_answer(
    db: &Db,
    caller: &Identity,
    question_id: Uuid,
    selection: Vec<u32>,
) -> ServiceResult<(Answer, u32)> {
    let user = caller_user(db, caller).await?;
    let question = db
        .get::<Question>(question_id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let QuestionKind::MultipleChoice {
        possible_answers,
        correct_answers,
        max_choices,
    } = &question.kind
    else {
        return Err(ServiceError::NotFound);
    };

    if selection.len() > *max_choices as usize {
        return Err(ServiceError::TooManyChoices);
    }
    if selection
        .iter()
        .any(|&i| i as usize >= possible_answers.len())
    {
        return Err(ServiceError::Invalid("selected index out of range".into()));
    }

    let by_pair = Filter::eq("question", question.id).and(Filter::eq("user", user.id));
    if db.exists::<Answer>(by_pair).await? {
        return Err(ServiceError::AlreadyAnswered);
    }

    let correct = score(&selection, correct_answers);
    let answer = Answer {
        id: Uuid::new_v4(),
        question: question.id,
        user: user.id,
        tour: question.tour,
        body: AnswerBody::MultipleChoice {
            answer: selection,
            correct,
        },
        updated_at: Utc::now(),
    };
    match db.insert(&answer).await {
        Ok(()) => {}
        Err(e) if e.is_conflict() => return Err(ServiceError::AlreadyAnswered),
        Err(e) => return Err(e.into()),
    }

    tracing::debug!(question = %question.id, user = %user.username, correct, "mc answer scored");
    Ok((answer, correct))
}

/// All answers to a question, visible to the owner of the question's tour.
pub async fn answers_to_question(
    db: &Db,
    caller: &Identity,
    question_id: Uuid,
) -> ServiceResult<Vec<Answer>> {
    let owner = caller_user(db, caller).await?;
    let question = db
        .get::<Question>(question_id)
        .await?
        .ok_or(ServiceError::NotFound)?;
    owned_tour(db, &owner, question.tour).await?;
    Ok(db
        .find::<Answer>(Filter::eq("question", question.id))
        .await?)
}

pub async fn answers_by_user(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    username: &str,
) -> ServiceResult<Vec<Answer>> {
    let owner = caller_user(db, caller).await?;
    let tour = owned_tour(db, &owner, tour_id).await?;
    let member = find_user(db, username).await?.ok_or(ServiceError::NotFound)?;
    Ok(db
        .find::<Answer>(Filter::eq("tour", tour.id).and(Filter::eq("user", member.id)))
        .await?)
}

pub async fn my_answers(db: &Db, caller: &Identity, tour_id: Uuid) -> ServiceResult<Vec<Answer>> {
    let user = caller_user(db, caller).await?;
    Ok(db
        .find::<Answer>(Filter::eq("tour", tour_id).and(Filter::eq("user", user.id)))
        .await?)
}

// ============================================================================
// Checkpoints
// ============================================================================

/// Where a picture checkpoint's image comes from.
#[derive(Debug)]
pub enum PictureSource {
    Existing(Uuid),
    Upload {
        bytes: Vec<u8>,
        description: Option<String>,
    },
}

async fn insert_checkpoint(
    db: &Db,
    tour: &Tour,
    text: Option<String>,
    kind: CheckpointKind,
) -> ServiceResult<Checkpoint> {
    let checkpoint = Checkpoint {
        id: Uuid::new_v4(),
        tour: tour.id,
        text,
        kind,
        created_at: Utc::now(),
    };
    db.insert(&checkpoint).await?;
    tracing::info!(tour = %tour.id, checkpoint = %checkpoint.id, "checkpoint created");
    Ok(checkpoint)
}

pub async fn create_checkpoint(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    text: Option<String>,
) -> ServiceResult<Checkpoint> {
    let owner = caller_user(db, caller).await?;
    let tour = owned_tour(db, &owner, tour_id).await?;
    insert_checkpoint(db, &tour, text, CheckpointKind::Generic).await
}

pub async fn create_object_checkpoint(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
    object_id: &str,
    text: Option<String>,
) -> ServiceResult<Checkpoint> {
    let owner = caller_user(db, caller).await?;
    let tour = owned_tour(db, &owner, tour_id).await?;
    if !db
        .exists::<MuseumObject>(Filter::eq("objectId", object_id))
        .await?
    {
        return Err(ServiceError::NotFound);
    }
    let kind = CheckpointKind::Object {
        museum_object: object_id.to_string(),
    };
    insert_checkpoint(db, &tour, text, kind).await
}

/// Create a picture checkpoint from an existing picture or a fresh upload.
/// Uploads are stored only after the ownership check passes.
pub async fn create_picture_checkpoint(
    db: &Db,
    blobs: &BlobStore,
    caller: &Identity,
    tour_id: Uuid,
    source: PictureSource,
    text: Option<String>,
) -> ServiceResult<Checkpoint> {
    let owner = caller_user(db, caller).await?;
    let tour = owned_tour(db, &owner, tour_id).await?;

    let picture = match source {
        PictureSource::Existing(id) => db.get::<Picture>(id).await?.ok_or(ServiceError::NotFound)?,
        PictureSource::Upload { bytes, description } => {
            let picture = Picture {
                id: Uuid::new_v4(),
                description,
                blob: blobs.put(&bytes).await?,
            };
            db.insert(&picture).await?;
            picture
        }
    };
    let kind = CheckpointKind::Picture {
        picture: picture.id,
    };
    insert_checkpoint(db, &tour, text, kind).await
}

pub async fn tour_checkpoints(
    db: &Db,
    caller: &Identity,
    tour_id: Uuid,
) -> ServiceResult<Vec<Checkpoint>> {
    let tour = member_tour(db, caller, tour_id).await?;
    Ok(db
        .find::<Checkpoint>(Filter::eq("tour", tour.id))
        .await?)
}
