//! Projects.

use serde::Serialize;

use super::{Engine, OpError};
use crate::core::event::{
    ArchivePayload, OutlineCreatePayload, ProjectCreatePayload, ProjectUpdatePayload,
};
use crate::core::{EventType, Outline, OutlineId, OutlineStatusDef, Project, ProjectId};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProject {
    pub project: Project,
    /// Default outline created alongside.
    pub outline: Outline,
}

impl Engine {
    /// Create a project with its default outline and make it current.
    pub fn create_project(&mut self, name: &str) -> Result<CreatedProject, OpError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OpError::invalid("name", "must not be empty"));
        }
        let actor = self.current_actor_id()?;
        let project_id = self.state.next_id::<ProjectId>();
        self.emit(
            &actor,
            EventType::ProjectCreate,
            project_id.as_str(),
            ProjectCreatePayload {
                name: name.to_string(),
            },
        )?;
        let outline_id = self.state.next_id::<OutlineId>();
        self.emit(
            &actor,
            EventType::OutlineCreate,
            outline_id.as_str(),
            OutlineCreatePayload {
                project_id: project_id.clone(),
                name: None,
                status_defs: OutlineStatusDef::defaults(),
            },
        )?;
        self.state.current_project_id = Some(project_id.clone());
        tracing::info!(project = %project_id, outline = %outline_id, "project created");
        Ok(CreatedProject {
            project: self.project(project_id.as_str())?.clone(),
            outline: self.outline(outline_id.as_str())?.clone(),
        })
    }

    pub fn projects(&self, include_archived: bool) -> Vec<&Project> {
        self.state
            .projects
            .values()
            .filter(|p| include_archived || !p.archived)
            .collect()
    }

    /// Make a project current. Local to this workspace copy; no event.
    pub fn use_project(&mut self, raw: &str) -> Result<Project, OpError> {
        let project = self.project(raw)?.clone();
        self.state.current_project_id = Some(project.id.clone());
        Ok(project)
    }

    pub fn current_project(&self) -> Result<&Project, OpError> {
        self.project_or_current(None)
    }

    pub fn rename_project(&mut self, raw: &str, name: &str) -> Result<Project, OpError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OpError::invalid("name", "must not be empty"));
        }
        let project = self.project(raw)?.clone();
        let actor = self.require_container_edit(&project.created_by, project.id.as_str())?;
        self.emit(
            &actor,
            EventType::ProjectUpdate,
            project.id.as_str(),
            ProjectUpdatePayload {
                name: Some(name.to_string()),
            },
        )?;
        Ok(self.project(project.id.as_str())?.clone())
    }

    pub fn archive_project(&mut self, raw: &str, archived: bool) -> Result<Project, OpError> {
        let project = self.project(raw)?.clone();
        let actor = self.require_container_edit(&project.created_by, project.id.as_str())?;
        if project.archived != archived {
            self.emit(
                &actor,
                EventType::ProjectArchive,
                project.id.as_str(),
                ArchivePayload { archived },
            )?;
        }
        Ok(self.project(project.id.as_str())?.clone())
    }
}
