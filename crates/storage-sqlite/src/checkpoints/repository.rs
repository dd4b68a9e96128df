use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;

use vaultledger_core::vault::{CheckpointRepositoryTrait, ScanCheckpoint};
use vaultledger_core::Result;

use super::model::ScanCheckpointDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::scan_checkpoints;
use crate::schema::scan_checkpoints::dsl::*;

pub struct CheckpointRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl CheckpointRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        CheckpointRepository { pool, writer }
    }
}

fn find(
    conn: &mut SqliteConnection,
    wanted_network: &str,
    vault: &str,
) -> Result<Option<ScanCheckpoint>> {
    scan_checkpoints
        .find((wanted_network, vault))
        .select(ScanCheckpointDB::as_select())
        .first::<ScanCheckpointDB>(conn)
        .optional()
        .into_core()?
        .map(ScanCheckpoint::try_from)
        .transpose()
}

#[async_trait]
impl CheckpointRepositoryTrait for CheckpointRepository {
    fn get_checkpoint(&self, wanted_network: &str, vault: &str) -> Result<Option<ScanCheckpoint>> {
        let mut conn = get_connection(&self.pool)?;
        find(&mut conn, wanted_network, vault)
    }

    async fn advance_checkpoint(
        &self,
        wanted_network: &str,
        vault: &str,
        block: u64,
    ) -> Result<ScanCheckpoint> {
        let wanted_network = wanted_network.to_string();
        let vault = vault.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<ScanCheckpoint> {
                // Read and write under the same write transaction so the
                // stored block never moves backwards.
                if let Some(current) = find(conn, &wanted_network, &vault)? {
                    if current.last_processed_block >= block {
                        return Ok(current);
                    }
                }
                let checkpoint = ScanCheckpoint {
                    network: wanted_network,
                    vault_address: vault,
                    last_processed_block: block,
                    updated_at: Utc::now(),
                };
                let row = ScanCheckpointDB::from_domain(&checkpoint)?;
                diesel::insert_into(scan_checkpoints::table)
                    .values(&row)
                    .on_conflict((network, vault_address))
                    .do_update()
                    .set((
                        last_processed_block.eq(row.last_processed_block),
                        updated_at.eq(&row.updated_at),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(checkpoint)
            })
            .await
    }
}
