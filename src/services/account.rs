/*!
 * Account service
 * Signup, login, password change, cascading delete, promotion, badges
 */
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{caller_user, find_user, normalize_username};
use crate::auth::{self, Identity, TokenService};
use crate::db::models::{
    Answer, Badge, Checkpoint, Favourites, ProfilePicture, PromotionCode, Question, Tour, User,
    UserInfo,
};
use crate::db::{Db, Filter};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn create_account(
    db: &Db,
    bcrypt_cost: u32,
    username: &str,
    password: &str,
) -> ServiceResult<UserInfo> {
    let username = normalize_username(username);
    if username.is_empty() {
        return Err(ServiceError::Invalid("username must not be empty".into()));
    }
    if password.is_empty() {
        return Err(ServiceError::Invalid("password must not be empty".into()));
    }
    if find_user(db, username).await?.is_some() {
        return Err(ServiceError::UsernameTaken);
    }

    let hash = auth::hash_password(password.to_string(), bcrypt_cost).await?;
    let user = User::new(username.to_string(), hash);
    match db.insert(&user).await {
        Ok(()) => {}
        // Lost a race with a concurrent signup for the same name.
        Err(e) if e.is_conflict() => return Err(ServiceError::UsernameTaken),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(username = %user.username, "account created");
    Ok(UserInfo::from(&user))
}

lazy_static::lazy_static! {
    /// One throwaway hash per bcrypt cost, checked against on unknown usernames.
    static ref DUMMY_HASHES: Mutex<HashMap<u32, String>> = Mutex::new(HashMap::new());
}

async fn dummy_hash(bcrypt_cost: u32) -> ServiceResult<String> {
    let cached = DUMMY_HASHES
        .lock()
        .ok()
        .and_then(|hashes| hashes.get(&bcrypt_cost).cloned());
    if let Some(hash) = cached {
        return Ok(hash);
    }

    let hash = auth::hash_password(Uuid::new_v4().to_string(), bcrypt_cost).await?;
    Ok(match DUMMY_HASHES.lock() {
        Ok(mut hashes) => hashes.entry(bcrypt_cost).or_insert(hash).clone(),
        Err(_) => hash,
    })
}

/// Unknown user and wrong password fail identically, and both pay for a
/// bcrypt verification.
pub async fn login(
    db: &Db,
    tokens: &TokenService,
    bcrypt_cost: u32,
    username: &str,
    password: &str,
) -> ServiceResult<LoginTokens> {
    let Some(user) = find_user(db, username).await? else {
        auth::verify_password(password.to_string(), dummy_hash(bcrypt_cost).await?).await?;
        tracing::debug!("login for unknown user");
        return Err(ServiceError::InvalidCredentials);
    };
    if !auth::verify_password(password.to_string(), user.password_hash.clone()).await? {
        tracing::debug!(username = %user.username, "login with wrong password");
        return Err(ServiceError::InvalidCredentials);
    }

    Ok(LoginTokens {
        access_token: tokens.issue_access(&user.username)?,
        refresh_token: tokens.issue_refresh(&user.username)?,
    })
}

/// Mint a new access token for the holder of a verified refresh token.
pub async fn refresh(db: &Db, tokens: &TokenService, caller: &Identity) -> ServiceResult<String> {
    let user = caller_user(db, caller).await?;
    tokens.issue_access(&user.username)
}

pub async fn current_user(db: &Db, caller: &Identity) -> ServiceResult<UserInfo> {
    Ok(UserInfo::from(&caller_user(db, caller).await?))
}

pub async fn change_password(
    db: &Db,
    bcrypt_cost: u32,
    caller: &Identity,
    new_password: &str,
) -> ServiceResult<()> {
    let mut user = caller_user(db, caller).await?;
    user.password_hash = auth::hash_password(new_password.to_string(), bcrypt_cost).await?;
    db.save(&user).await?;
    tracing::info!(username = %user.username, "password changed");
    Ok(())
}

/// Remove the caller and everything they own, children first. There is no
/// rollback: a failure part-way leaves the already deleted records gone.
pub async fn delete_account(db: &Db, caller: &Identity) -> ServiceResult<()> {
    let Some(user) = find_user(db, &caller.username).await? else {
        return Ok(());
    };

    let tours = db.find::<Tour>(Filter::eq("owner", user.id)).await?;
    for tour in &tours {
        delete_tour_content(db, tour.id).await?;
        db.delete::<Tour>(tour.id).await?;
    }

    for answer in db.find::<Answer>(Filter::eq("user", user.id)).await? {
        db.delete::<Answer>(answer.id).await?;
    }
    for favourites in db.find::<Favourites>(Filter::eq("user", user.id)).await? {
        db.delete::<Favourites>(favourites.id).await?;
    }
    db.delete::<User>(user.id).await?;

    tracing::info!(username = %user.username, tours = tours.len(), "account deleted");
    Ok(())
}

async fn delete_tour_content(db: &Db, tour_id: Uuid) -> ServiceResult<()> {
    for answer in db.find::<Answer>(Filter::eq("tour", tour_id)).await? {
        db.delete::<Answer>(answer.id).await?;
    }
    for question in db.find::<Question>(Filter::eq("tour", tour_id)).await? {
        db.delete::<Question>(question.id).await?;
    }
    for checkpoint in db.find::<Checkpoint>(Filter::eq("tour", tour_id)).await? {
        db.delete::<Checkpoint>(checkpoint.id).await?;
    }
    Ok(())
}

/// Redeem a one-time promotion code. Only the request whose delete actually
/// removed the code gets promoted.
pub async fn promote_user(db: &Db, caller: &Identity, code: &str) -> ServiceResult<UserInfo> {
    let mut user = caller_user(db, caller).await?;
    let Some(promotion) = db
        .find_one::<PromotionCode>(Filter::eq("code", code))
        .await?
    else {
        return Err(ServiceError::NotFound);
    };
    if !db.delete::<PromotionCode>(promotion.id).await? {
        tracing::warn!(username = %user.username, "promotion code consumed concurrently");
        return Err(ServiceError::NotFound);
    }

    user.producer = true;
    db.save(&user).await?;
    tracing::info!(username = %user.username, "user promoted to producer");
    Ok(UserInfo::from(&user))
}

pub async fn add_badge_progress(
    db: &Db,
    caller: &Identity,
    badge_id: Uuid,
    delta: i64,
) -> ServiceResult<UserInfo> {
    let mut user = caller_user(db, caller).await?;
    let badge = db.get::<Badge>(badge_id).await?.ok_or(ServiceError::NotFound)?;

    let current = user.badge_progress.get(&badge_id).copied().unwrap_or(0);
    let progress = current.saturating_add(delta).clamp(0, badge.cost.max(0));
    user.badge_progress.insert(badge_id, progress);
    if progress >= badge.cost && user.badges.insert(badge_id) {
        tracing::info!(username = %user.username, badge = %badge.name, "badge awarded");
    }

    db.save(&user).await?;
    Ok(UserInfo::from(&user))
}

pub async fn choose_profile_picture(
    db: &Db,
    caller: &Identity,
    picture_id: Uuid,
) -> ServiceResult<UserInfo> {
    let mut user = caller_user(db, caller).await?;
    if db.get::<ProfilePicture>(picture_id).await?.is_none() {
        return Err(ServiceError::NotFound);
    }
    if user.profile_picture != Some(picture_id) {
        user.profile_picture = Some(picture_id);
        db.save(&user).await?;
    }
    Ok(UserInfo::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::models::{AnswerBody, QuestionKind};
    use crate::services::testing::{self, COST};
    use chrono::Utc;

    fn tokens() -> TokenService {
        TokenService::new(&AppConfig::default())
    }

    #[tokio::test]
    async fn test_create_account_twice_fails_second_time() {
        let db = Db::in_memory();
        let first = create_account(&db, COST, "ada", "pw").await.unwrap();
        assert_eq!(first.username, "ada");
        assert!(!first.producer);

        let second = create_account(&db, COST, "ada", "other").await;
        assert!(matches!(second, Err(ServiceError::UsernameTaken)));
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let db = Db::in_memory();
        create_account(&db, COST, "ada", "secret").await.unwrap();
        let user = find_user(&db, "ada").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "secret");
        assert!(user.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let db = Db::in_memory();
        create_account(&db, COST, "ada", "pw").await.unwrap();
        let svc = tokens();

        let ok = login(&db, &svc, COST, "ada", "pw").await.unwrap();
        assert_eq!(svc.verify_access(&ok.access_token), Some(Identity::new("ada")));
        assert_eq!(svc.verify_refresh(&ok.refresh_token), Some(Identity::new("ada")));

        let wrong = login(&db, &svc, COST, "ada", "nope").await.unwrap_err();
        let unknown = login(&db, &svc, COST, "bob", "pw").await.unwrap_err();
        assert!(matches!(wrong, ServiceError::InvalidCredentials));
        assert!(matches!(unknown, ServiceError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_padded_username_round_trips_through_login() {
        let db = Db::in_memory();
        let created = create_account(&db, COST, " ada ", "pw").await.unwrap();
        assert_eq!(created.username, "ada");

        let svc = tokens();
        let padded = login(&db, &svc, COST, " ada ", "pw").await.unwrap();
        assert_eq!(svc.verify_access(&padded.access_token), Some(Identity::new("ada")));
        assert!(login(&db, &svc, COST, "ada", "pw").await.is_ok());

        let again = create_account(&db, COST, "ada\t", "other").await;
        assert!(matches!(again, Err(ServiceError::UsernameTaken)));
    }

    #[tokio::test]
    async fn test_blank_username_is_rejected() {
        let db = Db::in_memory();
        for name in ["", "   ", "\t\n"] {
            let result = create_account(&db, COST, name, "pw").await;
            assert!(matches!(result, Err(ServiceError::Invalid(_))), "{:?}", name);
        }
        let result = login(&db, &tokens(), COST, "   ", "pw").await;
        assert!(matches!(result, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_user_is_checked_against_cached_dummy_hash() {
        let first = dummy_hash(COST).await.unwrap();
        assert!(first.starts_with(&format!("$2b${:02}$", COST)));
        assert_eq!(dummy_hash(COST).await.unwrap(), first);

        let db = Db::in_memory();
        let unknown = login(&db, &tokens(), COST, "nobody", "pw").await;
        assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_change_password_takes_effect() {
        let db = Db::in_memory();
        let caller = testing::user(&db, "ada").await;
        change_password(&db, COST, &caller, "new-pw").await.unwrap();

        let svc = tokens();
        assert!(login(&db, &svc, COST, "ada", "pw").await.is_err());
        assert!(login(&db, &svc, COST, "ada", "new-pw").await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_issues_access_token_only_for_existing_user() {
        let db = Db::in_memory();
        let caller = testing::user(&db, "ada").await;
        let svc = tokens();
        let access = refresh(&db, &svc, &caller).await.unwrap();
        assert_eq!(svc.verify_access(&access), Some(caller));

        let ghost = Identity::new("ghost");
        assert!(matches!(refresh(&db, &svc, &ghost).await, Err(ServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_promotion_code_is_single_use() {
        let db = Db::in_memory();
        let ada = testing::user(&db, "ada").await;
        let bob = testing::user(&db, "bob").await;
        let code = PromotionCode {
            id: Uuid::new_v4(),
            code: "AB12C".to_string(),
        };
        db.insert(&code).await.unwrap();

        assert!(matches!(
            promote_user(&db, &ada, "WRONG").await,
            Err(ServiceError::NotFound)
        ));
        let promoted = promote_user(&db, &ada, "AB12C").await.unwrap();
        assert!(promoted.producer);
        assert!(matches!(
            promote_user(&db, &bob, "AB12C").await,
            Err(ServiceError::NotFound)
        ));
        assert!(!current_user(&db, &bob).await.unwrap().producer);
    }

    #[tokio::test]
    async fn test_badge_progress_is_capped_and_awarded_once() {
        let db = Db::in_memory();
        let caller = testing::user(&db, "ada").await;
        let badge = Badge {
            id: Uuid::new_v4(),
            name: "Explorer".to_string(),
            description: None,
            cost: 10,
        };
        db.insert(&badge).await.unwrap();

        let info = add_badge_progress(&db, &caller, badge.id, 4).await.unwrap();
        assert_eq!(info.badge_progress[&badge.id], 4);
        assert!(info.badges.is_empty());

        let info = add_badge_progress(&db, &caller, badge.id, 25).await.unwrap();
        assert_eq!(info.badge_progress[&badge.id], 10);
        assert_eq!(info.badges.len(), 1);

        let info = add_badge_progress(&db, &caller, badge.id, 5).await.unwrap();
        assert_eq!(info.badge_progress[&badge.id], 10);
        assert_eq!(info.badges.len(), 1);

        assert!(matches!(
            add_badge_progress(&db, &caller, Uuid::new_v4(), 1).await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_choose_profile_picture() {
        let db = Db::in_memory();
        let caller = testing::user(&db, "ada").await;
        let picture = ProfilePicture {
            id: Uuid::new_v4(),
            name: "owl".to_string(),
            blob: None,
        };
        db.insert(&picture).await.unwrap();

        assert!(matches!(
            choose_profile_picture(&db, &caller, Uuid::new_v4()).await,
            Err(ServiceError::NotFound)
        ));
        let info = choose_profile_picture(&db, &caller, picture.id).await.unwrap();
        assert_eq!(info.profile_picture, Some(picture.id));
        let again = choose_profile_picture(&db, &caller, picture.id).await.unwrap();
        assert_eq!(again.profile_picture, Some(picture.id));
    }

    #[tokio::test]
    async fn test_delete_account_cascades_owned_content() {
        let db = Db::in_memory();
        let owner = testing::producer(&db, "owner").await;
        let visitor = testing::user(&db, "visitor").await;
        let owner_id = caller_user(&db, &owner).await.unwrap().id;
        let visitor_id = caller_user(&db, &visitor).await.unwrap().id;

        for search_id in ["t1", "t2"] {
            let tour = testing::tour(&db, &owner, search_id).await;
            let question = Question {
                id: Uuid::new_v4(),
                tour: tour.id,
                question: "Why?".to_string(),
                linked_objects: vec![],
                kind: QuestionKind::FreeText,
                created_at: Utc::now(),
            };
            db.insert(&question).await.unwrap();
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
        }

        delete_account(&db, &owner).await.unwrap();

        assert!(db.find::<Tour>(Filter::eq("owner", owner_id)).await.unwrap().is_empty());
        assert!(db.find::<Question>(Filter::And(vec![])).await.unwrap().is_empty());
        assert!(db.find::<Answer>(Filter::And(vec![])).await.unwrap().is_empty());
        assert!(find_user(&db, "owner").await.unwrap().is_none());
        assert!(find_user(&db, "visitor").await.unwrap().is_some());

        // Repeating the delete is harmless.
        delete_account(&db, &owner).await.unwrap();
    }
}
