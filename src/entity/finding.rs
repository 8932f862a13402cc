//! Finding entity for persisted inspection findings.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "findings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTimeUtc,
    pub checklist_name: String,
    pub equipment: String,
    pub horometer: i64,
    pub maintenance_type: String,
    pub start_date: Date,
    pub end_date: Date,
    pub supervisor: String,
    pub technician: String,
    pub description: String,
    pub inspection_type: String,
    pub signature_url: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
