/*!
 * Services
 * Authorization and state-transition rules over the document store
 */

pub mod account;
pub mod content;
pub mod favourites;
pub mod feedback;
pub mod objects;
pub mod tour;

use uuid::Uuid;

use crate::auth::Identity;
use crate::db::models::{Tour, User};
use crate::db::{Db, Filter};
use crate::error::{ServiceError, ServiceResult};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// Resolve the caller's account. A valid token for a deleted account
/// behaves like any other missing record.
pub(crate) async fn caller_user(db: &Db, caller: &Identity) -> ServiceResult<User> {
    find_user(db, &caller.username)
        .await?
        .ok_or(ServiceError::NotFound)
}

/// Usernames are stored and looked up without surrounding whitespace.
pub(crate) fn normalize_username(username: &str) -> &str {
    username.trim()
}

pub(crate) async fn find_user(db: &Db, username: &str) -> ServiceResult<Option<User>> {
    let username = normalize_username(username);
    Ok(db.find_one::<User>(Filter::eq("username", username)).await?)
}

/// Load a tour the user owns. A missing tour and a tour owned by someone else
/// are reported the same way.
pub(crate) async fn owned_tour(db: &Db, user: &User, tour_id: Uuid) -> ServiceResult<Tour> {
    match db.get::<Tour>(tour_id).await? {
        Some(tour) if tour.is_owned_by(user.id) => Ok(tour),
        Some(_) => {
            tracing::debug!(tour = %tour_id, user = %user.username, "caller is not tour owner");
            Err(ServiceError::NotFound)
        }
        None => Err(ServiceError::NotFound),
    }
}

/// Load a tour the caller is a member of.
pub(crate) async fn member_tour(db: &Db, caller: &Identity, tour_id: Uuid) -> ServiceResult<Tour> {
    let user = caller_user(db, caller).await?;
    match db.get::<Tour>(tour_id).await? {
        Some(tour) if tour.is_member(user.id) => Ok(tour),
        _ => Err(ServiceError::NotFound),
    }
}

pub(crate) fn check_rating(rating: i32) -> ServiceResult<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(ServiceError::InvalidRating)
    }
}
