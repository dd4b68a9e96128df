use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use std::collections::HashMap;
use std::sync::Arc;

use vaultledger_core::group_goals::{GroupGoal, GroupGoalRepositoryTrait, MemberStatus};
use vaultledger_core::ledger::VersionedUpdate;
use vaultledger_core::{Error, Result};

use super::model::{GroupGoalDB, GroupGoalMemberDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::{group_goal_members, group_goals};
use crate::utils::chunk_for_sqlite;

pub struct GroupGoalRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl GroupGoalRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        GroupGoalRepository { pool, writer }
    }
}

fn load_members(
    conn: &mut SqliteConnection,
    rows: &[GroupGoalDB],
) -> Result<HashMap<String, Vec<GroupGoalMemberDB>>> {
    let mut by_group: HashMap<String, Vec<GroupGoalMemberDB>> = HashMap::new();
    let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
    for chunk in chunk_for_sqlite(&ids) {
        let members = group_goal_members::table
            .filter(group_goal_members::group_goal_id.eq_any(chunk))
            .order((
                group_goal_members::group_goal_id.asc(),
                group_goal_members::position.asc(),
            ))
            .select(GroupGoalMemberDB::as_select())
            .load::<GroupGoalMemberDB>(conn)
            .into_core()?;
        for member in members {
            by_group
                .entry(member.group_goal_id.clone())
                .or_default()
                .push(member);
        }
    }
    Ok(by_group)
}

fn assemble(conn: &mut SqliteConnection, rows: Vec<GroupGoalDB>) -> Result<Vec<GroupGoal>> {
    let mut members = load_members(conn, &rows)?;
    rows.into_iter()
        .map(|row| {
            let group_members = members.remove(&row.id).unwrap_or_default();
            row.into_domain(group_members)
        })
        .collect()
}

fn write_members(conn: &mut SqliteConnection, group_goal: &GroupGoal) -> Result<()> {
    for (position, member) in group_goal.members.iter().enumerate() {
        let row = GroupGoalMemberDB::from_domain(member, position)?;
        diesel::insert_into(group_goal_members::table)
            .values(&row)
            .on_conflict(group_goal_members::id)
            .do_update()
            .set(&row)
            .execute(conn)
            .into_core()?;
    }
    Ok(())
}

/// Rewrites a group goal and its member records if the stored version is
/// still the expected one.
pub(crate) fn update_versioned(
    conn: &mut SqliteConnection,
    update: &VersionedUpdate<GroupGoal>,
) -> Result<()> {
    let row = GroupGoalDB::from_domain(&update.entity)?;
    let affected = diesel::update(
        group_goals::table
            .filter(group_goals::id.eq(&row.id))
            .filter(group_goals::version.eq(update.expected_version)),
    )
    .set(&row)
    .execute(conn)
    .into_core()?;
    if affected != 1 {
        let exists = group_goals::table
            .filter(group_goals::id.eq(&row.id))
            .count()
            .get_result::<i64>(conn)
            .into_core()?
            > 0;
        return if exists {
            Err(Error::conflict("group goal", row.id))
        } else {
            Err(Error::not_found("group goal", row.id))
        };
    }
    write_members(conn, &update.entity)
}

#[async_trait]
impl GroupGoalRepositoryTrait for GroupGoalRepository {
    fn get_group_goal(&self, group_goal_id: &str) -> Result<GroupGoal> {
        let mut conn = get_connection(&self.pool)?;
        let row = group_goals::table
            .find(group_goal_id)
            .select(GroupGoalDB::as_select())
            .first::<GroupGoalDB>(&mut conn)
            .optional()
            .into_core()?
            .ok_or_else(|| Error::not_found("group goal", group_goal_id))?;
        assemble(&mut conn, vec![row])?
            .pop()
            .ok_or_else(|| Error::not_found("group goal", group_goal_id))
    }

    fn list_group_goals_for_user(&self, user_id: &str) -> Result<Vec<GroupGoal>> {
        let mut conn = get_connection(&self.pool)?;
        let closed = vec![
            MemberStatus::Left.as_str().to_string(),
            MemberStatus::Removed.as_str().to_string(),
        ];
        let group_ids: Vec<String> = group_goal_members::table
            .filter(group_goal_members::user_id.eq(user_id))
            .filter(group_goal_members::status.ne_all(closed))
            .select(group_goal_members::group_goal_id)
            .distinct()
            .load::<String>(&mut conn)
            .into_core()?;

        let mut rows = Vec::with_capacity(group_ids.len());
        for chunk in chunk_for_sqlite(&group_ids) {
            rows.extend(
                group_goals::table
                    .filter(group_goals::id.eq_any(chunk))
                    .select(GroupGoalDB::as_select())
                    .load::<GroupGoalDB>(&mut conn)
                    .into_core()?,
            );
        }
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        assemble(&mut conn, rows)
    }

    async fn insert_group_goal(&self, group_goal: GroupGoal) -> Result<GroupGoal> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<GroupGoal> {
                let row = GroupGoalDB::from_domain(&group_goal)?;
                diesel::insert_into(group_goals::table)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                write_members(conn, &group_goal)?;
                Ok(group_goal)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SqliteLedgerStore;
    use crate::testing::{group_goal, setup};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use vaultledger_core::group_goals::{GroupGoalMember, MemberRole};
    use vaultledger_core::ledger::{LedgerBatch, LedgerStoreTrait};

    fn with_member(mut group: GroupGoal, user_id: &str) -> GroupGoal {
        let member = GroupGoalMember::new(
            &group.id,
            user_id,
            MemberRole::Member,
            MemberStatus::Active,
            Utc::now(),
        );
        group.members.push(member);
        group.active_members += 1;
        group
    }

    #[tokio::test]
    async fn test_group_goal_round_trips_with_ordered_members() {
        let db = setup();
        let repo = GroupGoalRepository::new(db.pool.clone(), db.writer.clone());
        let group = with_member(with_member(group_goal("gg1", "alice"), "bob"), "carol");
        repo.insert_group_goal(group.clone()).await.unwrap();

        let loaded = repo.get_group_goal("gg1").unwrap();
        assert_eq!(loaded, group);
        let users: Vec<&str> = loaded.members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_list_for_user_skips_closed_memberships() {
        let db = setup();
        let repo = GroupGoalRepository::new(db.pool.clone(), db.writer.clone());
        let store = SqliteLedgerStore::new(db.writer.clone());
        let stored = repo
            .insert_group_goal(with_member(group_goal("gg1", "alice"), "bob"))
            .await
            .unwrap();
        repo.insert_group_goal(group_goal("gg2", "bob")).await.unwrap();
        assert_eq!(repo.list_group_goals_for_user("bob").unwrap().len(), 2);

        let mut left = stored.clone();
        let now = Utc::now();
        if let Some(member) = left.member_mut("bob") {
            member.status = MemberStatus::Left;
            member.left_at = Some(now);
        }
        left.active_members -= 1;
        let mut batch = LedgerBatch::new();
        batch.update_group_goal(left, now);
        store.commit(batch).await.unwrap();

        let groups = repo.list_group_goals_for_user("bob").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, "gg2");
        assert_eq!(repo.get_group_goal("gg1").unwrap().members.len(), 2);
    }

    #[tokio::test]
    async fn test_update_adds_new_members_and_checks_version() {
        let db = setup();
        let repo = GroupGoalRepository::new(db.pool.clone(), db.writer.clone());
        let store = SqliteLedgerStore::new(db.writer.clone());
        let stored = repo.insert_group_goal(group_goal("gg1", "alice")).await.unwrap();

        let mut grown = with_member(stored.clone(), "dave");
        grown.current_amount = dec!(40);
        let mut batch = LedgerBatch::new();
        batch.update_group_goal(grown, Utc::now());
        store.commit(batch).await.unwrap();

        let loaded = repo.get_group_goal("gg1").unwrap();
        assert_eq!(loaded.members.len(), 2);
        assert_eq!(loaded.members[1].user_id, "dave");
        assert_eq!(loaded.current_amount, dec!(40));

        let mut stale = LedgerBatch::new();
        stale.update_group_goal(stored, Utc::now());
        assert!(store.commit(stale).await.unwrap_err().is_conflict());
    }
}
