use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use minbar_db::Database;
use minbar_db::models::CommitteeMemberRow;
use minbar_types::models::MediaState;

use crate::MediaError;
use crate::store::BlobStore;

/// 5 MB upload limit for committee member images
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub struct ImageFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct NewMember {
    pub name: String,
    pub designation: String,
    pub phone: Option<String>,
    pub is_active: bool,
}

/// Keeps a committee member's image blob and its `image_url` column
/// consistent across create/update/delete.
///
/// Creation uses a two-phase key: the blob is uploaded under a temporary
/// key (the record id does not exist yet), and re-keyed to the permanent
/// `{member_id}-{millis}.{ext}` form after the insert succeeds. A failed
/// re-key leaves the record `pending` on the temp URL — still resolvable,
/// never dangling — and [`MediaLifecycle::reconcile_pending`] retries it.
pub struct MediaLifecycle {
    db: Arc<Database>,
    store: Arc<BlobStore>,
    op_timeout: Duration,
}

impl MediaLifecycle {
    pub fn new(db: Arc<Database>, store: Arc<BlobStore>, op_timeout: Duration) -> Self {
        Self {
            db,
            store,
            op_timeout,
        }
    }

    pub async fn create_member(
        &self,
        fields: NewMember,
        image: Option<ImageFile>,
    ) -> Result<CommitteeMemberRow, MediaError> {
        let member_id = Uuid::new_v4().to_string();

        let Some(image) = image else {
            let id = member_id.clone();
            return self
                .db_call(move |db| {
                    db.insert_member(
                        &id,
                        &fields.name,
                        None,
                        MediaState::None.as_str(),
                        &fields.designation,
                        fields.phone.as_deref(),
                        fields.is_active,
                    )?;
                    db.get_member(&id)?.context("member row missing after insert")
                })
                .await;
        };

        let ext = validate(&image)?;

        // Critical path: the temp upload must succeed before the DB is touched.
        let temp_key = temp_key(&ext);
        let temp_url = self
            .with_timeout(self.store.upload(&temp_key, &image.bytes))
            .await?;

        let insert = {
            let id = member_id.clone();
            let url = temp_url.clone();
            self.db_call(move |db| {
                db.insert_member(
                    &id,
                    &fields.name,
                    Some(&url),
                    MediaState::Pending.as_str(),
                    &fields.designation,
                    fields.phone.as_deref(),
                    fields.is_active,
                )?;
                Ok(())
            })
            .await
        };
        if let Err(e) = insert {
            // The insert failed, so the temp blob is referenced by nothing.
            self.delete_best_effort(&temp_key, "temp blob after failed insert")
                .await;
            return Err(e);
        }

        // Re-key to the permanent id. On failure the record keeps the temp
        // URL and stays pending for the reconcile sweep; no rollback.
        match self.commit_image(&member_id, &temp_key, &ext).await {
            Ok(row) => Ok(row),
            Err(e) => {
                warn!("Re-key failed for member {}, keeping temp image: {e}", member_id);
                let id = member_id.clone();
                self.db_call(move |db| {
                    db.get_member(&id)?.context("member row missing after insert")
                })
                .await
            }
        }
    }

    /// Replace a member's image. Uploads the new blob first and deletes the
    /// old one last, so a failed upload never leaves the member imageless.
    /// The permanent record id is known here, so there is no temp phase.
    pub async fn update_member_image(
        &self,
        member_id: &str,
        image: ImageFile,
    ) -> Result<CommitteeMemberRow, MediaError> {
        let ext = validate(&image)?;

        let existing = {
            let id = member_id.to_string();
            self.db_call(move |db| db.get_member(&id)).await?
        }
        .ok_or(MediaError::NotFound)?;
        let old_key = existing
            .image_url
            .as_deref()
            .map(|url| BlobStore::key_from_url(url).to_string());

        let perm_key = permanent_key(member_id, &ext);
        let perm_url = self
            .with_timeout(self.store.upload(&perm_key, &image.bytes))
            .await?;

        let updated = {
            let id = member_id.to_string();
            let url = perm_url.clone();
            self.db_call(move |db| {
                if !db.set_member_image(&id, Some(&url), MediaState::Committed.as_str())? {
                    anyhow::bail!("member {id} vanished during image update");
                }
                db.get_member(&id)?.context("member row missing after image update")
            })
            .await
        };

        match updated {
            Ok(row) => {
                if let Some(old) = old_key {
                    self.delete_best_effort(&old, "replaced image").await;
                }
                Ok(row)
            }
            Err(e) => {
                // Record still points at the old blob; drop the new one.
                self.delete_best_effort(&perm_key, "new image after failed update")
                    .await;
                Err(e)
            }
        }
    }

    /// Delete a member and their image. The record deletion is the operation
    /// of record; a blob that refuses to die never blocks it.
    pub async fn delete_member(&self, member_id: &str) -> Result<(), MediaError> {
        let existing = {
            let id = member_id.to_string();
            self.db_call(move |db| db.get_member(&id)).await?
        }
        .ok_or(MediaError::NotFound)?;

        if let Some(url) = existing.image_url.as_deref() {
            let key = BlobStore::key_from_url(url).to_string();
            self.delete_best_effort(&key, "image of deleted member").await;
        }

        let id = member_id.to_string();
        let deleted = self.db_call(move |db| db.delete_member(&id)).await?;
        if !deleted {
            return Err(MediaError::NotFound);
        }
        Ok(())
    }

    /// Idempotent sweep over members still referencing a temporary blob:
    /// retries the re-key for each and reports how many were committed.
    /// Safe to re-run after any partial failure.
    pub async fn reconcile_pending(&self) -> Result<usize, MediaError> {
        let pending = self.db_call(|db| db.pending_media_members()).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut committed = 0;
        for member in pending {
            let Some(url) = member.image_url.as_deref() else {
                // Pending without a URL cannot come from the create path.
                let id = member.id.clone();
                let cleared = self
                    .db_call(move |db| {
                        db.set_member_image(&id, None, MediaState::None.as_str())?;
                        Ok(())
                    })
                    .await;
                if let Err(e) = cleared {
                    warn!("Reconcile: could not clear media state for {}: {e}", member.id);
                }
                continue;
            };

            let temp_key = BlobStore::key_from_url(url).to_string();
            let ext = temp_key
                .rsplit_once('.')
                .map(|(_, e)| e.to_string())
                .unwrap_or_else(|| "img".into());

            match self.commit_image(&member.id, &temp_key, &ext).await {
                Ok(_) => {
                    info!("Reconcile: committed image for member {}", member.id);
                    committed += 1;
                }
                Err(e) => warn!("Reconcile: re-key for member {} failed: {e}", member.id),
            }
        }
        Ok(committed)
    }

    /// Copy the temp blob to its permanent key, point the record at it, then
    /// drop the temp blob. Fails atomically from the record's point of view:
    /// on error the record still references the temp blob.
    async fn commit_image(
        &self,
        member_id: &str,
        temp_key: &str,
        ext: &str,
    ) -> Result<CommitteeMemberRow, MediaError> {
        let perm_key = permanent_key(member_id, ext);
        self.with_timeout(self.store.copy(temp_key, &perm_key)).await?;
        let perm_url = self.store.public_url(&perm_key);

        let updated = {
            let id = member_id.to_string();
            let url = perm_url.clone();
            self.db_call(move |db| {
                if !db.set_member_image(&id, Some(&url), MediaState::Committed.as_str())? {
                    anyhow::bail!("member {id} vanished during re-key");
                }
                db.get_member(&id)?.context("member row missing after re-key")
            })
            .await
        };

        match updated {
            Ok(row) => {
                self.delete_best_effort(temp_key, "temp blob after re-key").await;
                Ok(row)
            }
            Err(e) => {
                // The record never saw the permanent URL; remove the copy.
                self.delete_best_effort(&perm_key, "permanent blob after failed re-key")
                    .await;
                Err(e)
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, MediaError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(res) => res.map_err(MediaError::Backend),
            Err(_) => Err(MediaError::BackendUnavailable),
        }
    }

    /// Cleanup deletes are logged and swallowed; they never gate the
    /// user-visible outcome.
    async fn delete_best_effort(&self, key: &str, what: &str) {
        match tokio::time::timeout(self.op_timeout, self.store.delete(&[key])).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Cleanup failed, {} {} left behind: {e}", what, key),
            Err(_) => warn!("Cleanup timed out, {} {} left behind", what, key),
        }
    }

    async fn db_call<T, F>(&self, f: F) -> Result<T, MediaError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| MediaError::Backend(anyhow!("DB task join error: {e}")))?
            .map_err(MediaError::Backend)
    }
}

fn validate(image: &ImageFile) -> Result<String, MediaError> {
    if !image.content_type.starts_with("image/") {
        return Err(MediaError::InvalidImage(
            "file must be an image".to_string(),
        ));
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::InvalidImage(
            "image must be 5 MB or smaller".to_string(),
        ));
    }
    Ok(extension(image))
}

/// File extension for the blob key: taken from the filename when it looks
/// sane, otherwise from the MIME subtype.
fn extension(image: &ImageFile) -> String {
    image
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| {
            image
                .content_type
                .strip_prefix("image/")
                .unwrap_or("img")
                .to_ascii_lowercase()
        })
}

fn temp_key(ext: &str) -> String {
    format!("temp-{}.{}", Utc::now().timestamp_millis(), ext)
}

fn permanent_key(member_id: &str, ext: &str) -> String {
    format!("{}-{}.{}", member_id, Utc::now().timestamp_millis(), ext)
}
