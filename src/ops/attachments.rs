//! File attachments on items and comments.

use std::fs;
use std::path::{Path, PathBuf};

use super::{Engine, OpError};
use crate::core::event::AttachmentAddPayload;
use crate::core::{Attachment, AttachmentId, CommentId, EntityKind, EventType};
use crate::store::io_err;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentTarget {
    Item(String),
    Comment(String),
}

impl Engine {
    /// Copy `src` into the workspace and record it against `target`.
    ///
    /// Item attachments need edit rights on the item; comment attachments
    /// need the comment's author to answer to the same human.
    pub fn add_attachment(
        &mut self,
        target: &AttachmentTarget,
        src: &Path,
        title: Option<&str>,
        alt: Option<&str>,
    ) -> Result<Attachment, OpError> {
        let (entity_kind, entity_id, actor) = match target {
            AttachmentTarget::Item(raw) => {
                let id = self.item(raw)?.id.clone();
                let actor = self.require_item_edit(&id)?;
                (EntityKind::Item, id.to_string(), actor)
            }
            AttachmentTarget::Comment(raw) => {
                let id = CommentId::parse(raw.trim())?;
                let author = self
                    .state
                    .comments
                    .get(&id)
                    .map(|c| c.author_id.clone())
                    .ok_or_else(|| OpError::not_found("comment", &id))?;
                let actor = self.require_container_edit(&author, id.as_str())?;
                (EntityKind::Comment, id.to_string(), actor)
            }
        };
        let blob = self
            .store
            .store_attachment(src, self.options.attachment_max_bytes)?;
        let id = self.state.next_id::<AttachmentId>();
        self.emit(
            &actor,
            EventType::AttachmentAdd,
            id.as_str(),
            AttachmentAddPayload {
                entity_kind,
                entity_id,
                relative_path: blob.relative_path,
                title: title.map(str::to_string),
                alt: alt.map(str::to_string),
                bytes: blob.bytes,
                sha256: blob.sha256,
                original_name: blob.original_name,
            },
        )?;
        tracing::info!(attachment = %id, bytes = blob.bytes, "attachment stored");
        self.attachment(id.as_str()).cloned()
    }

    pub fn list_attachments(&self, target: &AttachmentTarget) -> Result<Vec<&Attachment>, OpError> {
        let (kind, id) = match target {
            AttachmentTarget::Item(raw) => (EntityKind::Item, self.item(raw)?.id.to_string()),
            AttachmentTarget::Comment(raw) => {
                let id = CommentId::parse(raw.trim())?;
                if !self.state.comments.contains_key(&id) {
                    return Err(OpError::not_found("comment", &id));
                }
                (EntityKind::Comment, id.to_string())
            }
        };
        Ok(self
            .state
            .attachments
            .values()
            .filter(|a| a.entity_kind == kind && a.entity_id == id)
            .collect())
    }

    /// Copy the stored blob out to `dest`; a directory receives the
    /// original file name.
    pub fn export_attachment(&self, raw: &str, dest: &Path) -> Result<PathBuf, OpError> {
        let attachment = self.attachment(raw)?;
        let src = self.store.attachment_abs_path(attachment)?;
        let dest = if dest.is_dir() {
            let name = Path::new(&attachment.original_name)
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(attachment.id.as_str()));
            dest.join(name)
        } else {
            dest.to_path_buf()
        };
        fs::copy(&src, &dest).map_err(|source| io_err(&src, source))?;
        Ok(dest)
    }

    /// Forget the record. The blob stays; identical content may be shared.
    pub fn remove_attachment(&mut self, raw: &str) -> Result<Attachment, OpError> {
        let attachment = self.attachment(raw)?.clone();
        let actor = self.require_container_edit(&attachment.created_by, attachment.id.as_str())?;
        self.emit(
            &actor,
            EventType::AttachmentRemove,
            attachment.id.as_str(),
            serde_json::json!({}),
        )?;
        Ok(attachment)
    }

    pub fn attachment(&self, raw: &str) -> Result<&Attachment, OpError> {
        let id = AttachmentId::parse(raw.trim())?;
        self.state
            .attachments
            .get(&id)
            .ok_or_else(|| OpError::not_found("attachment", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActorKind;
    use crate::ops::testkit::{self, act_as};
    use crate::ops::NewItem;

    #[test]
    fn add_export_remove() {
        let mut fx = testkit::seeded();
        let item = fx
            .create_item(NewItem {
                title: "x".into(),
                ..Default::default()
            })
            .unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let src = scratch.path().join("Notes.TXT");
        fs::write(&src, b"hello").unwrap();

        let target = AttachmentTarget::Item(item.id.to_string());
        let att = fx.add_attachment(&target, &src, Some("notes"), None).unwrap();
        assert_eq!(att.bytes, 5);
        assert_eq!(att.original_name, "Notes.TXT");
        assert!(att.relative_path.starts_with("resources/attachments/"));
        assert!(att.relative_path.ends_with(".txt"));
        assert_eq!(fx.list_attachments(&target).unwrap().len(), 1);

        let out = scratch.path().join("out");
        fs::create_dir(&out).unwrap();
        let written = fx.export_attachment(att.id.as_str(), &out).unwrap();
        assert_eq!(fs::read(written).unwrap(), b"hello");

        fx.create_identity(ActorKind::Human, "Bo", None, false).unwrap();
        act_as(&mut fx, "Bo");
        assert!(matches!(
            fx.remove_attachment(att.id.as_str()),
            Err(OpError::PermissionDenied(_))
        ));
        act_as(&mut fx, "Hana");
        fx.remove_attachment(att.id.as_str()).unwrap();
        assert!(fx.list_attachments(&target).unwrap().is_empty());
    }

    #[test]
    fn size_limit_is_enforced() {
        let mut fx = testkit::seeded();
        fx.engine.options.attachment_max_bytes = Some(2);
        let item = fx
            .create_item(NewItem {
                title: "x".into(),
                ..Default::default()
            })
            .unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let src = scratch.path().join("big.bin");
        fs::write(&src, b"too big").unwrap();
        let err = fx
            .add_attachment(&AttachmentTarget::Item(item.id.to_string()), &src, None, None)
            .unwrap_err();
        assert!(matches!(err, OpError::Store(_)));
        assert!(fx.state().attachments.is_empty());
    }
}
