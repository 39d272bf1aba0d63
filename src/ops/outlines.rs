//! Outlines and their status definitions.

use super::{Engine, OpError};
use crate::core::event::{
    ArchivePayload, OutlineCreatePayload, StatusAddPayload, StatusRemovePayload,
    StatusReorderPayload, StatusUpdatePayload,
};
use crate::core::{ActorId, EventType, Outline, OutlineId, OutlineStatusDef, StatusId};

/// Changes to one status definition; `None` leaves a field alone.
#[derive(Clone, Debug, Default)]
pub struct StatusPatch {
    pub label: Option<String>,
    pub is_end_state: Option<bool>,
    pub require_note: Option<bool>,
}

impl Engine {
    pub fn create_outline(
        &mut self,
        project: Option<&str>,
        name: Option<&str>,
    ) -> Result<Outline, OpError> {
        let project = self.project_or_current(project)?.clone();
        let actor = self.require_container_edit(&project.created_by, project.id.as_str())?;
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        let id = self.state.next_id::<OutlineId>();
        self.emit(
            &actor,
            EventType::OutlineCreate,
            id.as_str(),
            OutlineCreatePayload {
                project_id: project.id.clone(),
                name,
                status_defs: OutlineStatusDef::defaults(),
            },
        )?;
        Ok(self.outline(id.as_str())?.clone())
    }

    pub fn outlines(
        &self,
        project: Option<&str>,
        include_archived: bool,
    ) -> Result<Vec<&Outline>, OpError> {
        let project = self.project_or_current(project)?.id.clone();
        Ok(self
            .state
            .outlines
            .values()
            .filter(|o| o.project_id == project && (include_archived || !o.archived))
            .collect())
    }

    /// The outline new items land in when none is named: the project's first
    /// non-archived outline.
    pub fn default_outline(&self, project: Option<&str>) -> Result<&Outline, OpError> {
        let project = self.project_or_current(project)?;
        self.state
            .outlines
            .values()
            .find(|o| o.project_id == project.id && !o.archived)
            .ok_or_else(|| OpError::not_found("outline", format!("default outline of {}", project.id)))
    }

    pub fn archive_outline(&mut self, raw: &str, archived: bool) -> Result<Outline, OpError> {
        let outline = self.outline(raw)?.clone();
        let actor = self.require_outline_edit(&outline)?;
        if outline.archived != archived {
            self.emit(
                &actor,
                EventType::OutlineArchive,
                outline.id.as_str(),
                ArchivePayload { archived },
            )?;
        }
        Ok(self.outline(outline.id.as_str())?.clone())
    }

    // =========================================================================
    // Status definitions
    // =========================================================================

    pub fn add_status(
        &mut self,
        outline: &str,
        label: &str,
        is_end_state: bool,
        require_note: bool,
        position: Option<usize>,
    ) -> Result<Outline, OpError> {
        let outline = self.outline(outline)?.clone();
        let actor = self.require_outline_edit(&outline)?;
        let label = label.trim();
        if label.is_empty() {
            return Err(OpError::invalid("label", "must not be empty"));
        }
        if outline.resolve_status(label).is_some() {
            return Err(OpError::Conflict(format!(
                "outline {} already has a status labelled {label}",
                outline.id
            )));
        }
        let id = unique_status_id(&outline, label);
        self.emit(
            &actor,
            EventType::OutlineStatusAdd,
            outline.id.as_str(),
            StatusAddPayload {
                status_def: OutlineStatusDef {
                    id,
                    label: label.to_string(),
                    is_end_state,
                    require_note,
                },
                position,
            },
        )?;
        Ok(self.outline(outline.id.as_str())?.clone())
    }

    pub fn update_status(
        &mut self,
        outline: &str,
        status: &str,
        patch: StatusPatch,
    ) -> Result<Outline, OpError> {
        let outline = self.outline(outline)?.clone();
        let actor = self.require_outline_edit(&outline)?;
        let status_id = resolve_status(&outline, status)?;
        let label = match patch.label {
            Some(label) if label.trim().is_empty() => {
                return Err(OpError::invalid("label", "must not be empty"));
            }
            other => other.map(|l| l.trim().to_string()),
        };
        self.emit(
            &actor,
            EventType::OutlineStatusUpdate,
            outline.id.as_str(),
            StatusUpdatePayload {
                status_id,
                label,
                is_end_state: patch.is_end_state,
                require_note: patch.require_note,
            },
        )?;
        Ok(self.outline(outline.id.as_str())?.clone())
    }

    /// Refused while any item of the outline uses the status.
    pub fn remove_status(&mut self, outline: &str, status: &str) -> Result<Outline, OpError> {
        let outline = self.outline(outline)?.clone();
        let actor = self.require_outline_edit(&outline)?;
        let status_id = resolve_status(&outline, status)?;
        self.emit(
            &actor,
            EventType::OutlineStatusRemove,
            outline.id.as_str(),
            StatusRemovePayload { status_id },
        )?;
        Ok(self.outline(outline.id.as_str())?.clone())
    }

    /// `order` must name every status of the outline exactly once.
    pub fn reorder_statuses(&mut self, outline: &str, order: &[String]) -> Result<Outline, OpError> {
        let outline = self.outline(outline)?.clone();
        let actor = self.require_outline_edit(&outline)?;
        let order = order
            .iter()
            .map(|raw| resolve_status(&outline, raw))
            .collect::<Result<Vec<_>, _>>()?;
        self.emit(
            &actor,
            EventType::OutlineStatusReorder,
            outline.id.as_str(),
            StatusReorderPayload { order },
        )?;
        Ok(self.outline(outline.id.as_str())?.clone())
    }

    fn require_outline_edit(&self, outline: &Outline) -> Result<ActorId, OpError> {
        self.require_container_edit(&outline.created_by, outline.id.as_str())
    }
}

pub(crate) fn resolve_status(outline: &Outline, raw: &str) -> Result<StatusId, OpError> {
    outline
        .resolve_status(raw)
        .map(|def| def.id.clone())
        .ok_or_else(|| OpError::not_found("status", format!("{raw} in {}", outline.id)))
}

/// Slug of the label, suffixed until it does not collide.
fn unique_status_id(outline: &Outline, label: &str) -> StatusId {
    let base = StatusId::slug_from_label(label);
    if outline.status(&base).is_none() {
        return base;
    }
    (2u32..)
        .map(|n| StatusId::slug_from_label(&format!("{} {n}", base.as_str())))
        .find(|candidate| outline.status(candidate).is_none())
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::testkit;

    fn labels(outline: &Outline) -> Vec<&str> {
        outline.status_defs.iter().map(|d| d.label.as_str()).collect()
    }

    #[test]
    fn status_lifecycle() {
        let mut fx = testkit::seeded();
        let outline = fx.add_status("out-1", "Review", false, true, Some(2)).unwrap();
        assert_eq!(labels(&outline), vec!["TODO", "DOING", "Review", "DONE"]);
        assert!(outline.resolve_status("review").unwrap().require_note);

        let outline = fx
            .update_status(
                "out-1",
                "review",
                StatusPatch {
                    label: Some("In review".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(outline.status(&StatusId::parse("review").unwrap()).unwrap().label, "In review");

        let order: Vec<String> = ["done", "In review", "doing", "todo"].map(String::from).to_vec();
        let outline = fx.reorder_statuses("out-1", &order).unwrap();
        assert_eq!(labels(&outline), vec!["DONE", "In review", "DOING", "TODO"]);

        let outline = fx.remove_status("out-1", "review").unwrap();
        assert_eq!(outline.status_defs.len(), 3);
    }

    #[test]
    fn duplicate_labels_and_partial_reorders_are_refused() {
        let mut fx = testkit::seeded();
        assert!(matches!(
            fx.add_status("out-1", "done", true, false, None),
            Err(OpError::Conflict(_))
        ));
        let partial = vec!["todo".to_string(), "done".to_string()];
        assert!(matches!(
            fx.reorder_statuses("out-1", &partial),
            Err(OpError::Conflict(_))
        ));
    }

    #[test]
    fn archived_outlines_are_hidden_and_skipped_as_default() {
        let mut fx = testkit::seeded();
        let second = fx.create_outline(None, Some("Later")).unwrap();
        fx.archive_outline("out-1", true).unwrap();
        assert_eq!(fx.default_outline(None).unwrap().id, second.id);
        assert_eq!(fx.outlines(None, false).unwrap().len(), 1);
        assert_eq!(fx.outlines(None, true).unwrap().len(), 2);
    }
}
