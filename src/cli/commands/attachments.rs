use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::json;

use super::super::{Ctx, envelope};
use crate::Result;
use crate::ops::AttachmentTarget;

#[derive(Subcommand, Debug)]
pub enum AttachmentsCmd {
    /// Copy a file into the workspace and attach it.
    Add {
        path: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        title: Option<String>,
        /// Alternative text for images.
        #[arg(long)]
        alt: Option<String>,
    },
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Copy an attachment out; DEST may be a directory.
    Export { attachment: String, dest: PathBuf },
    /// Detach; the stored file is kept.
    #[command(alias = "rm")]
    Remove { attachment: String },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    #[arg(long)]
    pub item: Option<String>,
    #[arg(long)]
    pub comment: Option<String>,
}

impl TargetArgs {
    fn target(self) -> AttachmentTarget {
        match (self.item, self.comment) {
            (Some(item), _) => AttachmentTarget::Item(item),
            (None, Some(comment)) => AttachmentTarget::Comment(comment),
            // clap's required group guarantees one of them
            (None, None) => AttachmentTarget::Item(String::new()),
        }
    }
}

pub(crate) fn handle(ctx: &Ctx, cmd: AttachmentsCmd) -> Result<()> {
    match cmd {
        AttachmentsCmd::Add {
            path,
            target,
            title,
            alt,
        } => {
            let target = target.target();
            ctx.write(|engine| {
                envelope(engine.add_attachment(&target, &path, title.as_deref(), alt.as_deref())?)
            })
        }
        AttachmentsCmd::List { target } => {
            let target = target.target();
            ctx.read(|engine| {
                let attachments = engine.list_attachments(&target)?;
                Ok(envelope(&attachments)?.with_meta("count", attachments.len())?)
            })
        }
        AttachmentsCmd::Export { attachment, dest } => ctx.read(|engine| {
            let written = engine.export_attachment(&attachment, &dest)?;
            envelope(json!({ "id": attachment, "path": written }))
        }),
        AttachmentsCmd::Remove { attachment } => {
            ctx.write(|engine| envelope(engine.remove_attachment(&attachment)?))
        }
    }
}
