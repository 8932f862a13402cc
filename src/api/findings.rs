//! Finding API endpoints: submission and history browsing.

use std::collections::HashMap;

use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse};
use chrono::NaiveDate;
use futures_util::StreamExt;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{
    DraftAttachment, Finding, FindingDraft, MaintenanceType, Pagination, PaginationParams,
};
use crate::services::submission::GENERIC_FAILURE_MESSAGE;
use crate::services::{Storage, SubmissionWorkflow, SubmitError, SubmitOutcome};

/// Finding list response.
#[derive(Serialize, ToSchema)]
pub struct FindingListResponse {
    pub findings: Vec<Finding>,
    pub pagination: Pagination,
}

/// Configure finding routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_findings)
        .service(create_finding)
        .service(get_finding);
}

/// Submit a new finding.
///
/// POST /findings
/// Content-Type: multipart/form-data
///
/// Text parts carry the draft fields; the optional `signature` part is a
/// rendered PNG and the optional `file` part is the attachment.
#[utoipa::path(
    post,
    path = "/api/v1/findings",
    tag = "Findings",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Finding saved", body = Finding),
        (status = 400, description = "Missing or malformed required fields", body = ErrorResponse),
        (status = 500, description = "Upload or persistence failed", body = ErrorResponse)
    )
)]
#[post("/findings")]
pub async fn create_finding(
    mut payload: Multipart,
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    max_upload_size: web::Data<usize>,
) -> AppResult<HttpResponse> {
    let parts = collect_draft_parts(&mut payload, *max_upload_size.get_ref()).await?;
    let draft = draft_from_parts(parts);

    // One workflow per request: each request is its own form session.
    let workflow = SubmissionWorkflow::new(storage.get_ref().clone(), pool.get_ref().clone());

    match workflow.submit(&draft).await {
        Ok(SubmitOutcome::Saved(model)) => {
            Ok(HttpResponse::Created().json(Finding::from(model)))
        }
        Ok(SubmitOutcome::AlreadySubmitting) => Ok(HttpResponse::Conflict().json(ErrorResponse {
            error: "SUBMISSION_IN_PROGRESS".to_string(),
            message: "A submission is already in progress.".to_string(),
        })),
        Err(SubmitError::ValidationFailed(message)) => Err(AppError::InvalidInput(message)),
        // Technical detail is logged by the workflow; the caller only sees
        // a generic retry invitation.
        Err(SubmitError::UploadFailed { .. }) | Err(SubmitError::PersistFailed(_)) => {
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "SUBMIT_FAILED".to_string(),
                message: GENERIC_FAILURE_MESSAGE.to_string(),
            }))
        }
    }
}

/// List findings, newest first.
///
/// GET /findings?page=1&limit=20
#[utoipa::path(
    get,
    path = "/api/v1/findings",
    tag = "Findings",
    params(
        ("page" = Option<u32>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u32>, Query, description = "Items per page (default: 100, max: 100)")
    ),
    responses(
        (status = 200, description = "Findings ordered by creation date descending", body = FindingListResponse)
    )
)]
#[get("/findings")]
pub async fn list_findings(
    pool: web::Data<DbPool>,
    query: web::Query<PaginationParams>,
) -> AppResult<HttpResponse> {
    let (models, total) = pool.list_findings(&query).await?;
    let pagination = Pagination::new(query.page(), query.clamped_limit(), total);

    Ok(HttpResponse::Ok().json(FindingListResponse {
        findings: models.into_iter().map(Finding::from).collect(),
        pagination,
    }))
}

/// Get finding details by ID.
///
/// GET /findings/{id}
#[utoipa::path(
    get,
    path = "/api/v1/findings/{id}",
    tag = "Findings",
    params(
        ("id" = String, Path, description = "Finding UUID")
    ),
    responses(
        (status = 200, description = "Finding details", body = Finding),
        (status = 404, description = "Finding not found", body = ErrorResponse)
    )
)]
#[get("/findings/{id}")]
pub async fn get_finding(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = Uuid::parse_str(&path.into_inner())?;

    let finding = pool
        .get_finding_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Finding {}", id)))?;

    Ok(HttpResponse::Ok().json(Finding::from(finding)))
}

/// Multipart parts of a finding submission, before draft assembly.
struct DraftParts {
    fields: HashMap<String, String>,
    signature: Option<Vec<u8>>,
    attachment: Option<DraftAttachment>,
}

/// Read all multipart parts into memory, enforcing the total size cap.
async fn collect_draft_parts(
    payload: &mut Multipart,
    max_upload_size: usize,
) -> AppResult<DraftParts> {
    let mut fields = HashMap::new();
    let mut signature = None;
    let mut attachment = None;
    let mut total: usize = 0;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::InvalidInput("Missing content disposition".to_string()))?;

        let name = content_disposition
            .get_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("Unnamed multipart part".to_string()))?;
        let filename = content_disposition
            .get_filename()
            .map(|f| f.replace('\\', "/"));
        let content_type = field.content_type().map(|m| m.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
            total += chunk.len();
            if total > max_upload_size {
                return Err(AppError::PayloadTooLarge(format!(
                    "Submission exceeds the {} byte limit",
                    max_upload_size
                )));
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "signature" => signature = Some(data),
            "file" => {
                let filename = filename
                    .ok_or_else(|| AppError::InvalidInput("File part without filename".to_string()))?;
                // Prevent path traversal in storage keys
                if filename.contains("..") || filename.starts_with('/') {
                    return Err(AppError::InvalidInput("Invalid filename".to_string()));
                }
                attachment = Some(DraftAttachment {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {
                let value = String::from_utf8(data).map_err(|_| {
                    AppError::InvalidInput(format!("Field '{}' must be UTF-8 text", name))
                })?;
                fields.insert(name, value);
            }
        }
    }

    Ok(DraftParts {
        fields,
        signature,
        attachment,
    })
}

/// Assemble a draft from collected parts. Malformed enum or date values
/// become absent fields; validation then names them as missing.
fn draft_from_parts(parts: DraftParts) -> FindingDraft {
    let text = |key: &str| parts.fields.get(key).cloned().unwrap_or_default();
    let date = |key: &str| {
        parts
            .fields
            .get(key)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
    };

    FindingDraft {
        checklist_name: text("checklist_name"),
        equipment: text("equipment"),
        horometer: text("horometer"),
        maintenance_type: parts
            .fields
            .get("maintenance_type")
            .and_then(|s| MaintenanceType::parse(s.trim())),
        start_date: date("start_date"),
        end_date: date("end_date"),
        supervisor: text("supervisor"),
        technician: text("technician"),
        description: text("description"),
        inspection_type: parts.fields.get("inspection_type").cloned(),
        signature: parts.signature,
        attachment: parts.attachment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_with(fields: &[(&str, &str)]) -> DraftParts {
        DraftParts {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            signature: None,
            attachment: None,
        }
    }

    #[test]
    fn test_draft_from_complete_parts() {
        let parts = parts_with(&[
            ("checklist_name", "PM Checklist A"),
            ("equipment", "Excavator 12"),
            ("horometer", "4500"),
            ("maintenance_type", "PM1"),
            ("start_date", "2024-01-10"),
            ("end_date", "2024-01-12"),
            ("supervisor", "Juan Pérez"),
            ("technician", "Pedro López"),
            ("description", "Hose wear detected"),
            ("inspection_type", "Mangueras"),
        ]);

        let draft = draft_from_parts(parts);
        assert_eq!(draft.checklist_name, "PM Checklist A");
        assert_eq!(draft.maintenance_type, Some(MaintenanceType::Pm1));
        assert_eq!(
            draft.start_date,
            NaiveDate::from_ymd_opt(2024, 1, 10)
        );
        assert_eq!(draft.inspection_type.as_deref(), Some("Mangueras"));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_draft_from_empty_parts_fails_validation() {
        let draft = draft_from_parts(parts_with(&[]));
        assert!(draft.inspection_type.is_none());
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_malformed_date_and_enum_become_absent() {
        let parts = parts_with(&[
            ("maintenance_type", "PM3"),
            ("start_date", "10/01/2024"),
            ("end_date", "2024-01-12"),
        ]);

        let draft = draft_from_parts(parts);
        assert!(draft.maintenance_type.is_none());
        assert!(draft.start_date.is_none());
        assert_eq!(draft.end_date, NaiveDate::from_ymd_opt(2024, 1, 12));
    }
}
