use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pass_usage")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub pass_id: Uuid,
    pub user_id: String,
    pub location: Option<String>,
    pub scanned_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pass::Entity",
        from = "Column::PassId",
        to = "super::pass::Column::Id"
    )]
    Pass,
}

impl Related<super::pass::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pass.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
