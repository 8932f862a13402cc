//! Database queries for findings.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::finding::{self, ActiveModel, Column, Entity as Finding};
use crate::error::{AppError, AppResult};
use crate::models::{NewFinding, PaginationParams};
use crate::services::submission::FindingStore;

use super::DbPool;

impl DbPool {
    /// Insert a new finding; id and created_at are assigned here.
    pub async fn insert_finding(&self, record: NewFinding) -> AppResult<finding::Model> {
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            created_at: Set(Utc::now()),
            checklist_name: Set(record.checklist_name),
            equipment: Set(record.equipment),
            horometer: Set(record.horometer),
            maintenance_type: Set(record.maintenance_type),
            start_date: Set(record.start_date),
            end_date: Set(record.end_date),
            supervisor: Set(record.supervisor),
            technician: Set(record.technician),
            description: Set(record.description),
            inspection_type: Set(record.inspection_type),
            signature_url: Set(record.signature_url),
            file_url: Set(record.file_url),
        };

        let result = model
            .insert(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert finding: {}", e)))?;

        Ok(result)
    }

    /// Get a finding by ID.
    pub async fn get_finding_by_id(&self, id: Uuid) -> AppResult<Option<finding::Model>> {
        let result = Finding::find_by_id(id)
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get finding: {}", e)))?;

        Ok(result)
    }

    /// List findings ordered by creation date, newest first.
    pub async fn list_findings(
        &self,
        params: &PaginationParams,
    ) -> AppResult<(Vec<finding::Model>, u64)> {
        let select = Finding::find();

        // Count total before pagination
        let total = select
            .clone()
            .count(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count findings: {}", e)))?;

        let findings = select
            .order_by_desc(Column::CreatedAt)
            .offset(params.offset() as u64)
            .limit(params.clamped_limit() as u64)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list findings: {}", e)))?;

        Ok((findings, total))
    }
}

#[async_trait::async_trait]
impl FindingStore for DbPool {
    async fn insert(&self, record: NewFinding) -> AppResult<finding::Model> {
        self.insert_finding(record).await
    }
}
