use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;

use vaultledger_core::goals::{Goal, GoalRepositoryTrait};
use vaultledger_core::ledger::VersionedUpdate;
use vaultledger_core::{Error, Result};

use super::model::GoalDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::goals;
use crate::schema::goals::dsl::*;

pub struct GoalRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl GoalRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        GoalRepository { pool, writer }
    }
}

/// Rewrites a goal row if its stored version is still the expected one.
pub(crate) fn update_versioned(
    conn: &mut SqliteConnection,
    update: &VersionedUpdate<Goal>,
) -> Result<()> {
    let row = GoalDB::from(&update.entity);
    let affected = diesel::update(
        goals
            .filter(id.eq(&row.id))
            .filter(version.eq(update.expected_version)),
    )
    .set(&row)
    .execute(conn)
    .into_core()?;
    if affected == 1 {
        return Ok(());
    }
    let exists = goals
        .filter(id.eq(&row.id))
        .count()
        .get_result::<i64>(conn)
        .into_core()?
        > 0;
    if exists {
        Err(Error::conflict("goal", row.id))
    } else {
        Err(Error::not_found("goal", row.id))
    }
}

#[async_trait]
impl GoalRepositoryTrait for GoalRepository {
    fn get_goal(&self, goal_id: &str) -> Result<Goal> {
        let mut conn = get_connection(&self.pool)?;
        goals
            .find(goal_id)
            .select(GoalDB::as_select())
            .first::<GoalDB>(&mut conn)
            .optional()
            .into_core()?
            .ok_or_else(|| Error::not_found("goal", goal_id))
            .and_then(Goal::try_from)
    }

    fn list_goals_for_owner(&self, owner: &str) -> Result<Vec<Goal>> {
        let mut conn = get_connection(&self.pool)?;
        goals
            .filter(owner_id.eq(owner))
            .order((created_at.asc(), id.asc()))
            .select(GoalDB::as_select())
            .load::<GoalDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(Goal::try_from)
            .collect()
    }

    fn find_quick_save_goal(&self, owner: &str) -> Result<Option<Goal>> {
        let mut conn = get_connection(&self.pool)?;
        goals
            .filter(owner_id.eq(owner))
            .filter(is_quick_save.eq(true))
            .select(GoalDB::as_select())
            .first::<GoalDB>(&mut conn)
            .optional()
            .into_core()?
            .map(Goal::try_from)
            .transpose()
    }

    async fn insert_goal(&self, goal: Goal) -> Result<Goal> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Goal> {
                let row = GoalDB::from(&goal);
                diesel::insert_into(goals::table)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                Ok(goal)
            })
            .await
    }

    async fn delete_goal(&self, goal_id: &str, expected_version: i64) -> Result<()> {
        let goal_id = goal_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let deleted = diesel::delete(
                    goals
                        .filter(id.eq(&goal_id))
                        .filter(version.eq(expected_version)),
                )
                .execute(conn)
                .into_core()?;
                if deleted == 1 {
                    return Ok(());
                }
                let exists = goals
                    .filter(id.eq(&goal_id))
                    .count()
                    .get_result::<i64>(conn)
                    .into_core()?
                    > 0;
                if exists {
                    Err(Error::conflict("goal", goal_id))
                } else {
                    Err(Error::not_found("goal", goal_id))
                }
            })
            .await
    }
}
