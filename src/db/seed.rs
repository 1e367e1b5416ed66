//! Reference data loading (badges, profile pictures, museum objects, codes).

use serde::Deserialize;
use std::path::Path;

use super::models::{Badge, MuseumObject, ProfilePicture, PromotionCode};
use super::{Db, Document};
use crate::error::StoreError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedData {
    pub badges: Vec<Badge>,
    pub profile_pictures: Vec<ProfilePicture>,
    pub museum_objects: Vec<MuseumObject>,
    pub promotion_codes: Vec<PromotionCode>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

async fn insert_missing<T: Document>(
    db: &Db,
    docs: &[T],
    report: &mut SeedReport,
) -> Result<(), StoreError> {
    for doc in docs {
        if db.get::<T>(doc.id()).await?.is_some() {
            report.skipped += 1;
            continue;
        }
        match db.insert(doc).await {
            Ok(()) => report.inserted += 1,
            // Same natural key seeded under another id.
            Err(e) if e.is_conflict() => report.skipped += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Insert every record whose id is not yet stored. Safe to run on each start.
pub async fn apply(db: &Db, data: &SeedData) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();
    insert_missing(db, &data.badges, &mut report).await?;
    insert_missing(db, &data.profile_pictures, &mut report).await?;
    insert_missing(db, &data.museum_objects, &mut report).await?;
    insert_missing(db, &data.promotion_codes, &mut report).await?;
    Ok(report)
}

pub async fn load_file(db: &Db, path: &Path) -> Result<SeedReport, SeedError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let data: SeedData = serde_json::from_str(&raw)?;
    let report = apply(db, &data).await?;
    tracing::info!(
        path = %path.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "seed data applied"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let db = Db::in_memory();
        let data: SeedData = serde_json::from_value(json!({
            "badges": [{
                "id": "8f6c1a4e-2d0b-4c1e-9a55-0d7f6a3b2c11",
                "name": "Explorer",
                "description": null,
                "cost": 10
            }],
            "promotionCodes": [{
                "id": "1b2c3d4e-5f60-4718-8a9b-0c1d2e3f4a5b",
                "code": "AB12C"
            }]
        }))
        .unwrap();

        let first = apply(&db, &data).await.unwrap();
        assert_eq!(first, SeedReport { inserted: 2, skipped: 0 });

        let second = apply(&db, &data).await.unwrap();
        assert_eq!(second, SeedReport { inserted: 0, skipped: 2 });
    }

    #[tokio::test]
    async fn test_load_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        let err = load_file(&Db::in_memory(), &path).await.unwrap_err();
        assert!(matches!(err, SeedError::Parse(_)));
    }
}
