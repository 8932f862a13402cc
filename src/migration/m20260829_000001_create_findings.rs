//! Migration: Create findings table.
//!
//! A finding is immutable once written: there is no update or delete path,
//! so the table carries no updated_at or soft-delete columns.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE findings (
                    id UUID PRIMARY KEY,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                    checklist_name TEXT NOT NULL,
                    equipment TEXT NOT NULL,
                    horometer BIGINT NOT NULL,
                    maintenance_type VARCHAR(10) NOT NULL
                        CHECK (maintenance_type IN ('PM1', 'PM2')),

                    -- Stored as plain calendar dates (no time component)
                    start_date DATE NOT NULL,
                    end_date DATE NOT NULL,

                    supervisor TEXT NOT NULL,
                    technician TEXT NOT NULL,
                    description TEXT NOT NULL,
                    inspection_type TEXT NOT NULL,

                    -- Public URLs of uploaded artifacts, absent when none
                    signature_url TEXT,
                    file_url TEXT
                );

                -- History listing orders by creation date, newest first
                CREATE INDEX idx_findings_created_at ON findings(created_at DESC);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS findings;")
            .await?;

        Ok(())
    }
}
