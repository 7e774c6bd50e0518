use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    error::ApiError,
    state::AppState,
    storage::StorageClient,
    users::dto::UserFields,
};

/// Multipart field that may carry the user's photo.
pub const PHOTO_FIELD: &str = "photo";
/// Mount path of stored uploads; stored photo paths start with it.
pub const PUBLIC_DIR: &str = "uploads";

pub struct PhotoUpload {
    pub file_name: String,
    pub body: Bytes,
}

/// Body of a create/update request, JSON or multipart.
///
/// For multipart requests the photo, if any, is already written to storage
/// when extraction finishes and `photo` holds its relative path.
#[derive(Debug)]
pub struct UserForm {
    pub fields: UserFields,
    pub photo: Option<String>,
}

#[async_trait]
impl FromRequest<AppState> for UserForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !multipart {
            let Json(fields) = Json::<UserFields>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Ok(Self {
                fields,
                photo: None,
            });
        }

        let mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let (fields, upload) = read_multipart(mp).await?;
        let photo = match upload {
            Some(upload) => Some(store_photo(state.storage.as_ref(), upload).await?),
            None => None,
        };
        Ok(Self { fields, photo })
    }
}

async fn read_multipart(mut mp: Multipart) -> Result<(UserFields, Option<PhotoUpload>), ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.to_string());

    let mut fields = UserFields::default();
    let mut upload = None;
    while let Some(field) = mp.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            if name != PHOTO_FIELD {
                return Err(ApiError::BadRequest(format!("Unexpected file field '{name}'")));
            }
            if upload.is_some() {
                return Err(ApiError::BadRequest(format!(
                    "Only one file is allowed under field '{PHOTO_FIELD}'"
                )));
            }
            let body = field.bytes().await.map_err(bad)?;
            upload = Some(PhotoUpload { file_name, body });
            continue;
        }

        let value = field.text().await.map_err(bad)?;
        match name.as_str() {
            "email" => fields.email = Some(value),
            "password" => fields.password = Some(value),
            "name" => fields.name = Some(value),
            other => debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok((fields, upload))
}

/// `<millis>-<client file name without whitespace>`, keeping only the last
/// path component of the client name.
pub fn storage_file_name(original: &str, millis: i128) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        format!("{millis}-upload")
    } else {
        format!("{millis}-{cleaned}")
    }
}

/// Writes the upload and returns its relative path (`uploads/<file>`).
pub async fn store_photo(
    storage: &dyn StorageClient,
    upload: PhotoUpload,
) -> anyhow::Result<String> {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let key = storage_file_name(&upload.file_name, millis);
    let size = upload.body.len();
    storage
        .put_object(&key, upload.body)
        .await
        .with_context(|| format!("store photo {key}"))?;
    info!(file = %key, bytes = size, "photo stored");
    Ok(format!("{PUBLIC_DIR}/{key}"))
}
