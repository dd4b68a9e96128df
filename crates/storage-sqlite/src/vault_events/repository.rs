use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::debug;
use std::sync::Arc;

use vaultledger_core::vault::{AuditMatch, AuditStatus, VaultAuditRecord, VaultAuditRepositoryTrait};
use vaultledger_core::{Error, Result};

use super::model::VaultEventDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::vault_events;
use crate::schema::vault_events::dsl::*;
use crate::utils::format_timestamp;

pub struct VaultAuditRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl VaultAuditRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        VaultAuditRepository { pool, writer }
    }
}

/// Flips an orphaned row to matched. A row that is already matched (or was
/// never orphaned) means another writer got there first.
pub(crate) fn mark_matched(conn: &mut SqliteConnection, audit_match: &AuditMatch) -> Result<()> {
    let affected = diesel::update(
        vault_events
            .filter(event_id.eq(&audit_match.event_id))
            .filter(status.eq(AuditStatus::Orphaned.as_str())),
    )
    .set((
        status.eq(AuditStatus::Matched.as_str()),
        matched_transaction_id.eq(Some(audit_match.transaction_id.as_str())),
        reconciled_at.eq(Some(format_timestamp(audit_match.reconciled_at))),
    ))
    .execute(conn)
    .into_core()?;
    if affected == 1 {
        Ok(())
    } else {
        Err(Error::conflict("vault event", audit_match.event_id.clone()))
    }
}

fn into_domain(rows: Vec<VaultEventDB>) -> Result<Vec<VaultAuditRecord>> {
    rows.into_iter().map(VaultAuditRecord::try_from).collect()
}

#[async_trait]
impl VaultAuditRepositoryTrait for VaultAuditRepository {
    async fn record_events(&self, records: Vec<VaultAuditRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows = records
            .iter()
            .map(VaultEventDB::from_domain)
            .collect::<Result<Vec<_>>>()?;
        let total = rows.len();
        let inserted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for row in &rows {
                    inserted += diesel::insert_or_ignore_into(vault_events::table)
                        .values(row)
                        .execute(conn)
                        .into_core()?;
                }
                Ok(inserted)
            })
            .await?;
        if inserted < total {
            debug!("{} of {} vault events were already recorded", total - inserted, total);
        }
        Ok(inserted)
    }

    fn get_event(&self, id: &str) -> Result<Option<VaultAuditRecord>> {
        let mut conn = get_connection(&self.pool)?;
        vault_events
            .find(id)
            .select(VaultEventDB::as_select())
            .first::<VaultEventDB>(&mut conn)
            .optional()
            .into_core()?
            .map(VaultAuditRecord::try_from)
            .transpose()
    }

    fn list_by_status(
        &self,
        wanted: AuditStatus,
        vault: Option<&str>,
    ) -> Result<Vec<VaultAuditRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = vault_events
            .filter(status.eq(wanted.as_str()))
            .into_boxed();
        if let Some(vault) = vault {
            query = query.filter(vault_address.eq(vault));
        }
        let rows = query
            .order((block_number.asc(), log_index.asc()))
            .select(VaultEventDB::as_select())
            .load::<VaultEventDB>(&mut conn)
            .into_core()?;
        into_domain(rows)
    }

    fn list_orphans_by_tx_hash(&self, vault: &str, hash: &str) -> Result<Vec<VaultAuditRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = vault_events
            .filter(tx_hash.eq(hash))
            .filter(status.eq(AuditStatus::Orphaned.as_str()))
            .filter(vault_address.eq(vault))
            .order((block_number.asc(), log_index.asc()))
            .select(VaultEventDB::as_select())
            .load::<VaultEventDB>(&mut conn)
            .into_core()?;
        into_domain(rows)
    }

    fn list_events(
        &self,
        wanted_network: &str,
        vault: &str,
        limit: i64,
    ) -> Result<Vec<VaultAuditRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = vault_events
            .filter(network.eq(wanted_network))
            .filter(vault_address.eq(vault))
            .order((block_number.desc(), log_index.desc()))
            .limit(limit)
            .select(VaultEventDB::as_select())
            .load::<VaultEventDB>(&mut conn)
            .into_core()?;
        into_domain(rows)
    }
}
