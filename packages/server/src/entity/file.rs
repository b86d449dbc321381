use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per completed upload.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file")]
pub struct Model {
    /// 12-character base64url public id.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Original upload filename.
    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Bytes written, as observed by the server.
    pub size: i64,

    /// Hex SHA-512 of the content; many rows may share one.
    #[sea_orm(indexed)]
    pub checksum: String,

    pub created_at: DateTimeUtc,

    #[sea_orm(indexed)]
    pub expires_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
