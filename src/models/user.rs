use crate::permission::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub pen_name: Option<String>,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    pub email_verification_expires: Option<DateTime>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poem::Entity")]
    Poems,
}

impl Related<super::poem::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Pen name when set, real name otherwise.
    pub fn display_name(&self) -> &str {
        self.pen_name
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.name)
    }
}
