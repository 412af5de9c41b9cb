use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per (poem, user); the unique index makes likes a set.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poem_likes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub poem_id: i32,
    pub user_id: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poem::Entity",
        from = "Column::PoemId",
        to = "super::poem::Column::Id"
    )]
    Poem,
}

impl Related<super::poem::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
