//! Initial schema.
//!
//! - `accounts`: balances, never negative
//! - `transactions`: append-only log of committed transfers

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const BALANCE_CONSTRAINT: &str = "accounts_balance_non_negative";
const AMOUNT_CONSTRAINT: &str = "transactions_amount_positive";

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Balance,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    SourceAccountId,
    DestinationAccountId,
    Amount,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    // The optimistic transfer path relies on this constraint
                    // to reject overdrafts and recognises it by name.
                    .col(
                        ColumnDef::new(Accounts::Balance)
                            .decimal()
                            .not_null()
                            .extra(format!(
                                "CONSTRAINT {BALANCE_CONSTRAINT} CHECK (balance >= 0)"
                            )),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::SourceAccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::DestinationAccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Amount)
                            .decimal()
                            .not_null()
                            .extra(format!(
                                "CONSTRAINT {AMOUNT_CONSTRAINT} CHECK (amount > 0)"
                            )),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-source_account_id")
                            .from(Transactions::Table, Transactions::SourceAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-destination_account_id")
                            .from(Transactions::Table, Transactions::DestinationAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-source_account_id")
                    .table(Transactions::Table)
                    .col(Transactions::SourceAccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-destination_account_id")
                    .table(Transactions::Table)
                    .col(Transactions::DestinationAccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
