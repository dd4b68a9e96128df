use diesel::prelude::*;

use vaultledger_core::vault::ScanCheckpoint;
use vaultledger_core::{Error, Result};

use crate::utils::{format_timestamp, from_db_u64, parse_timestamp, to_db_u64};

#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(primary_key(network, vault_address))]
#[diesel(table_name = crate::schema::scan_checkpoints)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScanCheckpointDB {
    pub network: String,
    pub vault_address: String,
    pub last_processed_block: i64,
    pub updated_at: String,
}

impl ScanCheckpointDB {
    pub fn from_domain(checkpoint: &ScanCheckpoint) -> Result<Self> {
        Ok(Self {
            network: checkpoint.network.clone(),
            vault_address: checkpoint.vault_address.clone(),
            last_processed_block: to_db_u64(
                "scan_checkpoints.last_processed_block",
                checkpoint.last_processed_block,
            )?,
            updated_at: format_timestamp(checkpoint.updated_at),
        })
    }
}

impl TryFrom<ScanCheckpointDB> for ScanCheckpoint {
    type Error = Error;

    fn try_from(db: ScanCheckpointDB) -> Result<Self> {
        Ok(Self {
            last_processed_block: from_db_u64(
                "scan_checkpoints.last_processed_block",
                db.last_processed_block,
            )?,
            updated_at: parse_timestamp("scan_checkpoints.updated_at", &db.updated_at)?,
            network: db.network,
            vault_address: db.vault_address,
        })
    }
}
