//! Museum object search and stored picture lookup.

use serde::Deserialize;
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::db::models::{BlobRef, MuseumObject, Picture, ProfilePicture};
use crate::db::{Db, Filter};
use crate::error::{ServiceError, ServiceResult};

/// Exact-match search attributes; unset attributes match anything.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectQuery {
    pub object_id: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub art_type: Option<String>,
    pub creator: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
    pub location: Option<String>,
}

impl ObjectQuery {
    fn filter(self) -> Filter {
        let fields = [
            ("objectId", self.object_id),
            ("category", self.category),
            ("subCategory", self.sub_category),
            ("title", self.title),
            ("year", self.year),
            ("artType", self.art_type),
            ("creator", self.creator),
            ("material", self.material),
            ("size", self.size),
            ("location", self.location),
        ];
        Filter::And(
            fields
                .into_iter()
                .filter_map(|(field, value)| value.map(|v| Filter::eq(field, v)))
                .collect(),
        )
    }
}

pub async fn search_objects(db: &Db, query: ObjectQuery) -> ServiceResult<Vec<MuseumObject>> {
    Ok(db.find::<MuseumObject>(query.filter()).await?)
}

/// Image bytes of a tour picture or a profile picture.
pub async fn picture_bytes(
    db: &Db,
    blobs: &BlobStore,
    picture_id: Uuid,
) -> ServiceResult<(BlobRef, Vec<u8>)> {
    let blob = match db.get::<Picture>(picture_id).await? {
        Some(picture) => picture.blob,
        None => db
            .get::<ProfilePicture>(picture_id)
            .await?
            .and_then(|p| p.blob)
            .ok_or(ServiceError::NotFound)?,
    };
    let bytes = blobs.get(&blob.key).await?;
    Ok((blob, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(object_id: &str, category: &str, creator: Option<&str>) -> MuseumObject {
        MuseumObject {
            id: Uuid::new_v4(),
            object_id: object_id.to_string(),
            category: Some(category.to_string()),
            creator: creator.map(str::to_string),
            ..MuseumObject::default()
        }
    }

    #[tokio::test]
    async fn test_search_combines_attributes() {
        let db = Db::in_memory();
        db.insert(&object("1", "bronze", Some("unknown"))).await.unwrap();
        db.insert(&object("2", "bronze", None)).await.unwrap();
        db.insert(&object("3", "stone", Some("unknown"))).await.unwrap();

        let all = search_objects(&db, ObjectQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let bronze = search_objects(
            &db,
            ObjectQuery {
                category: Some("bronze".into()),
                ..ObjectQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(bronze.len(), 2);

        let narrowed = search_objects(
            &db,
            ObjectQuery {
                category: Some("bronze".into()),
                creator: Some("unknown".into()),
                ..ObjectQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].object_id, "1");
    }

    #[tokio::test]
    async fn test_picture_bytes() {
        let db = Db::in_memory();
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(dir.path(), 1024);
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let picture = Picture {
            id: Uuid::new_v4(),
            description: None,
            blob: blobs.put(&png).await.unwrap(),
        };
        db.insert(&picture).await.unwrap();

        let (blob, bytes) = picture_bytes(&db, &blobs, picture.id).await.unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(bytes, png);
        assert!(matches!(
            picture_bytes(&db, &blobs, Uuid::new_v4()).await,
            Err(ServiceError::NotFound)
        ));
    }
}
