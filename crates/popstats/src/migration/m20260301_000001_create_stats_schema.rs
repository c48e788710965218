//! Initial migration creating the owner and detail tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_owners(manager).await?;
        self.create_details(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Details::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Owners::Table).to_owned())
            .await?;
        Ok(())
    }
}

/// Counter columns shared by both tables.
fn counter(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}

fn weekday_averages(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .json()
        .not_null()
        .default(Expr::cust("'[0,0,0,0,0,0,0]'"))
        .to_owned()
}

fn timestamp(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

impl Migration {
    async fn create_owners(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Owners::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Owners::Id).uuid().not_null().primary_key())
                    // Identity
                    .col(ColumnDef::new(Owners::Source).string().not_null())
                    .col(ColumnDef::new(Owners::Name).string().not_null())
                    .col(ColumnDef::new(Owners::NameNormalized).string().not_null())
                    // Aggregates
                    .col(&mut counter(Owners::StarCount))
                    .col(&mut counter(Owners::ContributorCount))
                    .col(&mut counter(Owners::DependentCount))
                    .col(&mut counter(Owners::DownloadCount))
                    .col(&mut weekday_averages(Owners::DayOfWeekAverages))
                    // Tracking
                    .col(&mut timestamp(Owners::CreatedAt))
                    .col(&mut timestamp(Owners::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_owners_source_name")
                    .table(Owners::Table)
                    .col(Owners::Source)
                    .col(Owners::NameNormalized)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_details(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Details::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Details::Id).uuid().not_null().primary_key())
                    // Identity
                    .col(ColumnDef::new(Details::Source).string().not_null())
                    .col(ColumnDef::new(Details::Owner).string().not_null())
                    .col(ColumnDef::new(Details::OwnerNormalized).string().not_null())
                    .col(ColumnDef::new(Details::Name).string().not_null())
                    .col(ColumnDef::new(Details::NameNormalized).string().not_null())
                    // Counters
                    .col(&mut counter(Details::StarCount))
                    .col(&mut counter(Details::ContributorCount))
                    .col(&mut counter(Details::DependentCount))
                    .col(&mut counter(Details::DownloadCount))
                    .col(&mut weekday_averages(Details::DayOfWeekAverages))
                    // Tracking
                    .col(&mut timestamp(Details::CreatedAt))
                    .col(&mut timestamp(Details::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Composite natural key
        manager
            .create_index(
                Index::create()
                    .name("idx_details_source_owner_name")
                    .table(Details::Table)
                    .col(Details::Source)
                    .col(Details::OwnerNormalized)
                    .col(Details::NameNormalized)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // "All details for owner" scans
        manager
            .create_index(
                Index::create()
                    .name("idx_details_source_owner")
                    .table(Details::Table)
                    .col(Details::Source)
                    .col(Details::OwnerNormalized)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "owners")]
enum Owners {
    Table,
    Id,
    Source,
    Name,
    NameNormalized,
    StarCount,
    ContributorCount,
    DependentCount,
    DownloadCount,
    DayOfWeekAverages,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "details")]
enum Details {
    Table,
    Id,
    Source,
    Owner,
    OwnerNormalized,
    Name,
    NameNormalized,
    StarCount,
    ContributorCount,
    DependentCount,
    DownloadCount,
    DayOfWeekAverages,
    CreatedAt,
    UpdatedAt,
}
