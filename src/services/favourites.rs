//! Per-user favourite museum objects and tours, with set semantics.

use uuid::Uuid;

use super::caller_user;
use crate::auth::Identity;
use crate::db::models::{Favourites, MuseumObject, Tour, User};
use crate::db::{Db, Filter};
use crate::error::{ServiceError, ServiceResult};

/// The user's record, created on first use.
async fn load_or_create(db: &Db, user: &User) -> ServiceResult<Favourites> {
    let by_user = Filter::eq("user", user.id);
    if let Some(existing) = db.find_one::<Favourites>(by_user.clone()).await? {
        return Ok(existing);
    }
    let fresh = Favourites::empty(user.id);
    match db.insert(&fresh).await {
        Ok(()) => Ok(fresh),
        Err(e) if e.is_conflict() => db
            .find_one::<Favourites>(by_user)
            .await?
            .ok_or_else(|| e.into()),
        Err(e) => Err(e.into()),
    }
}

/// Apply `change` and persist only if it reported a difference.
async fn update<F>(db: &Db, caller: &Identity, change: F) -> ServiceResult<Favourites>
where
    F: FnOnce(&mut Favourites) -> bool,
{
    let user = caller_user(db, caller).await?;
    let mut favourites = load_or_create(db, &user).await?;
    if change(&mut favourites) {
        db.save(&favourites).await?;
    }
    Ok(favourites)
}

pub async fn favourites(db: &Db, caller: &Identity) -> ServiceResult<Favourites> {
    let user = caller_user(db, caller).await?;
    load_or_create(db, &user).await
}

pub async fn add_object(db: &Db, caller: &Identity, object_id: &str) -> ServiceResult<Favourites> {
    if !db
        .exists::<MuseumObject>(Filter::eq("objectId", object_id))
        .await?
    {
        return Err(ServiceError::NotFound);
    }
    update(db, caller, |f| f.favourite_objects.insert(object_id.to_string())).await
}

pub async fn remove_object(
    db: &Db,
    caller: &Identity,
    object_id: &str,
) -> ServiceResult<Favourites> {
    update(db, caller, |f| f.favourite_objects.remove(object_id)).await
}

pub async fn add_tour(db: &Db, caller: &Identity, tour_id: Uuid) -> ServiceResult<Favourites> {
    if db.get::<Tour>(tour_id).await?.is_none() {
        return Err(ServiceError::NotFound);
    }
    update(db, caller, |f| f.favourite_tours.insert(tour_id)).await
}

pub async fn remove_tour(db: &Db, caller: &Identity, tour_id: Uuid) -> ServiceResult<Favourites> {
    update(db, caller, |f| f.favourite_tours.remove(&tour_id)).await
}
