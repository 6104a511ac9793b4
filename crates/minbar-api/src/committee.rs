use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::warn;
use uuid::Uuid;

use minbar_db::models::CommitteeMemberRow;
use minbar_media::{ImageFile, NewMember};
use minbar_types::api::{ImageUpload, NewCommitteeMemberRequest, UpdateCommitteeMemberRequest};
use minbar_types::models::{CommitteeMember, MediaState};

use crate::auth::AppState;
use crate::error::ApiError;

/// GET /committee — public roster of active members, oldest first.
pub async fn list_members(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommitteeMember>>, ApiError> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_active_members())
        .await
        .map_err(ApiError::backend)?
        .map_err(ApiError::backend)?;

    Ok(Json(rows.into_iter().map(to_response).collect()))
}

/// POST /committee — admin only. The optional image rides along as base64
/// and goes through the two-phase upload in the media layer.
pub async fn add_member(
    State(state): State<AppState>,
    Json(req): Json<NewCommitteeMemberRequest>,
) -> Result<(StatusCode, Json<CommitteeMember>), ApiError> {
    let name = validate_text(&req.name, "name")?;
    let designation = validate_text(&req.designation, "designation")?;
    let image = req.image.map(decode_image).transpose()?;

    let row = state
        .media
        .create_member(
            NewMember {
                name,
                designation,
                phone: req.phone,
                is_active: req.is_active,
            },
            image,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(row))))
}

/// PUT /committee/{id} — admin only, partial field update plus optional
/// replacement image.
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCommitteeMemberRequest>,
) -> Result<Json<CommitteeMember>, ApiError> {
    let id = id.to_string();

    let existing = {
        let db = state.db.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || db.get_member(&id))
            .await
            .map_err(ApiError::backend)?
            .map_err(ApiError::backend)?
    }
    .ok_or(ApiError::NotFound)?;

    let name = validate_text(&req.name.unwrap_or(existing.name), "name")?;
    let designation = validate_text(&req.designation.unwrap_or(existing.designation), "designation")?;
    let phone = req.phone.or(existing.phone);
    let is_active = req.is_active.unwrap_or(existing.is_active);

    {
        let db = state.db.clone();
        let id = id.clone();
        let changed = tokio::task::spawn_blocking(move || {
            db.update_member_fields(&id, &name, &designation, phone.as_deref(), is_active)
        })
        .await
        .map_err(ApiError::backend)?
        .map_err(ApiError::backend)?;
        if !changed {
            return Err(ApiError::NotFound);
        }
    }

    let row = match req.image {
        Some(upload) => {
            let image = decode_image(upload)?;
            state.media.update_member_image(&id, image).await?
        }
        None => {
            let db = state.db.clone();
            let id = id.clone();
            tokio::task::spawn_blocking(move || db.get_member(&id))
                .await
                .map_err(ApiError::backend)?
                .map_err(ApiError::backend)?
                .ok_or(ApiError::NotFound)?
        }
    };

    Ok(Json(to_response(row)))
}

/// DELETE /committee/{id} — admin only. The media layer removes the blob
/// best-effort and the record unconditionally.
pub async fn delete_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.media.delete_member(&id.to_string()).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_text(value: &str, field: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn decode_image(upload: ImageUpload) -> Result<ImageFile, ApiError> {
    let bytes = B64
        .decode(upload.data.as_bytes())
        .map_err(|_| ApiError::Validation("image data is not valid base64".into()))?;
    Ok(ImageFile {
        filename: upload.filename,
        content_type: upload.content_type,
        bytes,
    })
}

pub(crate) fn to_response(row: CommitteeMemberRow) -> CommitteeMember {
    let id = row.id.parse().unwrap_or_else(|e| {
        warn!("Corrupt member id '{}': {}", row.id, e);
        Uuid::default()
    });
    let media_state = MediaState::parse(&row.media_state).unwrap_or_else(|| {
        warn!("Corrupt media_state '{}' on member '{}'", row.media_state, row.id);
        MediaState::None
    });
    let created_at = crate::parse_db_timestamp(&row.created_at, "member", &row.id);

    CommitteeMember {
        id,
        name: row.name,
        image_url: row.image_url,
        media_state,
        designation: row.designation,
        phone: row.phone,
        is_active: row.is_active,
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ctx;

    fn new_member_req(image: Option<ImageUpload>) -> NewCommitteeMemberRequest {
        NewCommitteeMemberRequest {
            name: "Abdul Karim".to_string(),
            designation: "Chairman".to_string(),
            phone: Some("01711-000000".to_string()),
            is_active: true,
            image,
        }
    }

    fn png_upload() -> ImageUpload {
        ImageUpload {
            filename: "portrait.png".to_string(),
            content_type: "image/png".to_string(),
            data: B64.encode([1u8, 2, 3]),
        }
    }

    #[tokio::test]
    async fn add_member_without_image() {
        let ctx = ctx().await;
        let (status, Json(member)) =
            add_member(State(ctx.state.clone()), Json(new_member_req(None)))
                .await
                .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(member.image_url, None);
        assert_eq!(member.media_state, MediaState::None);
    }

    #[tokio::test]
    async fn add_member_with_image_ends_committed() {
        let ctx = ctx().await;
        let (_, Json(member)) = add_member(
            State(ctx.state.clone()),
            Json(new_member_req(Some(png_upload()))),
        )
        .await
        .unwrap();

        assert_eq!(member.media_state, MediaState::Committed);
        let url = member.image_url.as_deref().unwrap();
        assert!(url.contains(&member.id.to_string()));
    }

    #[tokio::test]
    async fn blank_name_and_bad_base64_are_validation_errors() {
        let ctx = ctx().await;

        let mut req = new_member_req(None);
        req.name = "  ".to_string();
        let err = add_member(State(ctx.state.clone()), Json(req))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let mut upload = png_upload();
        upload.data = "not base64!!!".to_string();
        let err = add_member(State(ctx.state.clone()), Json(new_member_req(Some(upload))))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn update_member_merges_fields_and_keeps_image() {
        let ctx = ctx().await;
        let (_, Json(member)) = add_member(
            State(ctx.state.clone()),
            Json(new_member_req(Some(png_upload()))),
        )
        .await
        .unwrap();

        let Json(updated) = update_member(
            State(ctx.state.clone()),
            Path(member.id),
            Json(UpdateCommitteeMemberRequest {
                name: None,
                designation: Some("Secretary".to_string()),
                phone: None,
                is_active: None,
                image: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Abdul Karim");
        assert_eq!(updated.designation, "Secretary");
        assert_eq!(updated.image_url, member.image_url);
    }

    #[tokio::test]
    async fn update_of_missing_member_is_not_found() {
        let ctx = ctx().await;
        let err = update_member(
            State(ctx.state.clone()),
            Path(Uuid::new_v4()),
            Json(UpdateCommitteeMemberRequest {
                name: Some("X".to_string()),
                designation: None,
                phone: None,
                is_active: None,
                image: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn delete_member_removes_the_record() {
        let ctx = ctx().await;
        let (_, Json(member)) = add_member(
            State(ctx.state.clone()),
            Json(new_member_req(Some(png_upload()))),
        )
        .await
        .unwrap();

        let status = delete_member(State(ctx.state.clone()), Path(member.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(
            ctx.state
                .db
                .get_member(&member.id.to_string())
                .unwrap()
                .is_none()
        );

        let err = delete_member(State(ctx.state.clone()), Path(member.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
