//! Document models - records stored in the document store (serialized with serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::Document;

macro_rules! document {
    ($ty:ty, $collection:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> Uuid {
                self.id
            }
        }
    };
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub producer: bool,
    #[serde(default)]
    pub badges: BTreeSet<Uuid>,
    /// Progress per badge id, never above the badge's cost.
    #[serde(default)]
    pub badge_progress: BTreeMap<Uuid, i64>,
    pub profile_picture: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            producer: false,
            badges: BTreeSet::new(),
            badge_progress: BTreeMap::new(),
            profile_picture: None,
            created_at: Utc::now(),
        }
    }
}

document!(User, "users");

/// User info returned to clients; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub producer: bool,
    pub badges: BTreeSet<Uuid>,
    pub badge_progress: BTreeMap<Uuid, i64>,
    pub profile_picture: Option<Uuid>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            producer: user.producer,
            badges: user.badges.clone(),
            badge_progress: user.badge_progress.clone(),
            profile_picture: user.profile_picture,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TourStatus {
    #[default]
    Draft,
    Pending,
}

pub const MIN_DIFFICULTY: i32 = 1;
pub const MAX_DIFFICULTY: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    /// Current join code; replaced wholesale on rotation.
    pub session_id: i64,
    pub search_id: String,
    pub description: Option<String>,
    pub difficulty: i32,
    #[serde(default)]
    pub status: TourStatus,
    /// Members, always including the owner.
    pub users: BTreeSet<Uuid>,
    /// Museum inventory numbers, in tour order.
    #[serde(default)]
    pub referenced_objects: Vec<String>,
    /// Attached question ids, in tour order.
    #[serde(default)]
    pub questions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Tour {
    pub fn is_owned_by(&self, user: Uuid) -> bool {
        self.owner == user
    }

    pub fn is_member(&self, user: Uuid) -> bool {
        self.users.contains(&user)
    }
}

document!(Tour, "tours");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QuestionKind {
    FreeText,
    #[serde(rename_all = "camelCase")]
    MultipleChoice {
        possible_answers: Vec<String>,
        correct_answers: BTreeSet<u32>,
        max_choices: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub tour: Uuid,
    pub question: String,
    #[serde(default)]
    pub linked_objects: Vec<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub created_at: DateTime<Utc>,
}

document!(Question, "questions");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnswerBody {
    FreeText { answer: String },
    MultipleChoice { answer: Vec<u32>, correct: u32 },
}

/// One answer per (question, user); free-text answers are overwritten on
/// resubmission, multiple-choice answers are final.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    pub question: Uuid,
    pub user: Uuid,
    pub tour: Uuid,
    #[serde(flatten)]
    pub body: AnswerBody,
    pub updated_at: DateTime<Utc>,
}

document!(Answer, "answers");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CheckpointKind {
    Generic,
    Picture { picture: Uuid },
    #[serde(rename_all = "camelCase")]
    Object { museum_object: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: Uuid,
    pub tour: Uuid,
    pub text: Option<String>,
    #[serde(flatten)]
    pub kind: CheckpointKind,
    pub created_at: DateTime<Utc>,
}

document!(Checkpoint, "checkpoints");

/// Location of stored image bytes in the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobRef {
    pub key: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Picture {
    pub id: Uuid,
    pub description: Option<String>,
    pub blob: BlobRef,
}

document!(Picture, "pictures");

/// Picture a user may pick for their profile (reference data).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePicture {
    pub id: Uuid,
    pub name: String,
    pub blob: Option<BlobRef>,
}

document!(ProfilePicture, "profile_pictures");

/// Achievement unlocked once progress reaches `cost` (reference data).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub cost: i64,
}

document!(Badge, "badges");

/// One-time code promoting an account to producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionCode {
    pub id: Uuid,
    pub code: String,
}

document!(PromotionCode, "promotion_codes");

/// Museum inventory record (reference data), addressed by `object_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuseumObject {
    pub id: Uuid,
    pub object_id: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub year: Option<String>,
    pub art_type: Option<String>,
    pub creator: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub interdisciplinary_context: Option<String>,
    pub picture: Option<Uuid>,
}

document!(MuseumObject, "museum_objects");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favourites {
    pub id: Uuid,
    pub user: Uuid,
    #[serde(default)]
    pub favourite_objects: BTreeSet<String>,
    #[serde(default)]
    pub favourite_tours: BTreeSet<Uuid>,
}

impl Favourites {
    pub fn empty(user: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            favourite_objects: BTreeSet::new(),
            favourite_tours: BTreeSet::new(),
        }
    }
}

document!(Favourites, "favourites");

/// Anonymous app feedback; carries no author reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppFeedback {
    pub id: Uuid,
    pub rating: i32,
    pub review: String,
    pub created_at: DateTime<Utc>,
}

document!(AppFeedback, "app_feedback");

/// Anonymous feedback for a tour; carries no author reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourFeedback {
    pub id: Uuid,
    pub tour: Uuid,
    pub rating: i32,
    pub review: String,
    pub created_at: DateTime<Utc>,
}

document!(TourFeedback, "tour_feedback");
