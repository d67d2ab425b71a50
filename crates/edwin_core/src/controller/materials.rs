//! crates/edwin_core/src/controller/materials.rs
//!
//! Uploaded course materials: PDF upload, listing and deletion.

use std::sync::Arc;
use tracing::{error, info};

use super::control::BusyGuard;
use crate::domain::{CourseContext, Material, MaterialId, PdfUpload};
use crate::ports::{Control, HostPage, PanelView, PortError, PortResult, StatusArea, StatusKind};
use crate::settings::ClientSettings;
use crate::state::ClientState;

/// Checks a chosen file before any upload is attempted.
pub fn validate_upload(upload: Option<&PdfUpload>, settings: &ClientSettings) -> PortResult<()> {
    let Some(upload) = upload else {
        return Err(PortError::Validation("Please select a PDF file first".into()));
    };
    if !upload.file_name.to_lowercase().ends_with(".pdf") {
        return Err(PortError::Validation("Only PDF files are allowed".into()));
    }
    if upload.data.len() as u64 > settings.max_upload_bytes {
        return Err(PortError::Validation(format!(
            "File too large (max {}MB)",
            settings.max_upload_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

pub struct MaterialsController {
    state: Arc<ClientState>,
    view: Arc<dyn PanelView>,
}

impl MaterialsController {
    pub fn new(state: Arc<ClientState>, view: Arc<dyn PanelView>) -> Self {
        Self { state, view }
    }

    fn course(&self, page: &dyn HostPage, area: StatusArea) -> PortResult<Option<CourseContext>> {
        let ctx = self.state.course_context(page)?;
        if ctx.is_none() {
            self.view.show_status(
                area,
                StatusKind::Error,
                "Please navigate to a Canvas course page",
            );
        }
        Ok(ctx)
    }

    /// Uploads a PDF, then refreshes the material list. Returns whether it succeeded.
    pub async fn upload_pdf(&self, page: &dyn HostPage, upload: Option<&PdfUpload>) -> PortResult<bool> {
        if let Err(e) = validate_upload(upload, &self.state.settings) {
            self.view
                .show_status(StatusArea::Upload, StatusKind::Error, &e.to_string());
            return Ok(false);
        }
        let Some(upload) = upload else {
            return Ok(false);
        };
        let Some(ctx) = self.course(page, StatusArea::Upload)? else {
            return Ok(false);
        };

        let result = {
            let _busy = BusyGuard::engage(self.view.as_ref(), Control::UploadPdf, "Uploading...");
            self.view.show_status(
                StatusArea::Upload,
                StatusKind::Info,
                &format!("Uploading {}...", upload.file_name),
            );
            self.state.backend.upload_pdf(&ctx, upload).await
        };

        match result {
            Ok(message) => {
                info!(file = %upload.file_name, "PDF uploaded");
                self.view
                    .show_status(StatusArea::Upload, StatusKind::Success, &message);
                self.view.notify(&format!("PDF uploaded: {}", upload.file_name));
                self.list(page).await?;
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, file = %upload.file_name, "PDF upload failed");
                self.view.show_status(
                    StatusArea::Upload,
                    StatusKind::Error,
                    &format!("Upload failed: {}", e),
                );
                Ok(false)
            }
        }
    }

    pub async fn list(&self, page: &dyn HostPage) -> PortResult<Vec<Material>> {
        let Some(ctx) = self.course(page, StatusArea::Materials)? else {
            return Ok(Vec::new());
        };

        match self.state.backend.get_materials(ctx.course_id).await {
            Ok(materials) => {
                self.view.render_materials(&materials);
                Ok(materials)
            }
            Err(e) => {
                error!(error = %e, "Failed to load materials");
                self.view.show_status(
                    StatusArea::Materials,
                    StatusKind::Error,
                    &format!("Failed to load materials: {}", e),
                );
                Ok(Vec::new())
            }
        }
    }

    /// Deletes one material and every quiz generated from it.
    pub async fn delete(&self, page: &dyn HostPage, material: &Material) -> PortResult<bool> {
        let result = {
            let _busy = BusyGuard::engage(self.view.as_ref(), Control::DeleteMaterial, "Deleting...");
            self.state.backend.delete_material(&material.id).await
        };

        if let Err(e) = result {
            return self.report_delete_failure(e);
        }

        let removed = self.state.storage.remove_quiz_topics_for(&material.id)?;
        info!(material = %material.id, quizzes_removed = removed, "Material deleted");
        self.view.notify(&format!("Deleted \"{}\"", material.title));
        self.list(page).await?;
        Ok(true)
    }

    /// Deletes every material of the course and clears the quiz catalogue.
    pub async fn delete_all(&self, page: &dyn HostPage) -> PortResult<bool> {
        let Some(ctx) = self.course(page, StatusArea::Materials)? else {
            return Ok(false);
        };

        let result = {
            let _busy = BusyGuard::engage(self.view.as_ref(), Control::DeleteAllMaterials, "Deleting...");
            self.state.backend.delete_all_materials(ctx.course_id).await
        };

        if let Err(e) = result {
            return self.report_delete_failure(e);
        }

        self.state.storage.clear_quiz_topics()?;
        info!(course_id = ctx.course_id, "All materials deleted");
        self.view.notify("All materials deleted successfully");
        self.list(page).await?;
        Ok(true)
    }

    fn report_delete_failure(&self, e: PortError) -> PortResult<bool> {
        error!(error = %e, "Failed to delete materials");
        self.view.show_status(
            StatusArea::Materials,
            StatusKind::Error,
            &format!("Failed to delete materials: {}", e),
        );
        Ok(false)
    }

    /// Looks a material up by id in the current course listing.
    pub async fn find(&self, page: &dyn HostPage, id: &MaterialId) -> PortResult<Option<Material>> {
        Ok(self.list(page).await?.into_iter().find(|m| &m.id == id))
    }
}
