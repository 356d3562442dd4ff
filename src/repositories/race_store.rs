//! Races and their player entries, kept in `races` and `race_players`.
//!
//! Every write spans the primary row and the join rows and runs as one
//! [`UnitOfWork`]. Join rows are replaced wholesale on update.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::store_error;
use super::traits::{PlayerLookup, StoreAdapter};
use crate::db::UnitOfWork;
use crate::error::{AppError, AppResult};
use crate::events::{EventSink, RepositoryEvent};
use crate::models::{Entity, EntityId, Race, RaceChanges, RacePlayer, RaceRow};
use crate::schema::{race_players, races};

pub struct RaceStore {
    players: Arc<dyn PlayerLookup>,
    sink: Arc<dyn EventSink>,
}

impl RaceStore {
    pub fn new(players: Arc<dyn PlayerLookup>, sink: Arc<dyn EventSink>) -> Self {
        Self { players, sink }
    }

    /// Builds a race from its row, keeping only players that still resolve.
    fn assemble(&self, row: RaceRow, player_ids: Vec<EntityId>) -> AppResult<Race> {
        let mut race = Race::new(row.engine_type);
        race.assign_id(row.id);

        for player_id in player_ids {
            if self.players.find_player(player_id)?.is_some() {
                race.add_player(player_id);
            } else {
                self.sink.record(&RepositoryEvent::DanglingReference {
                    race_id: row.id,
                    player_id,
                });
            }
        }

        if usize::try_from(row.player_count).ok() != Some(race.player_count()) {
            tracing::debug!(
                race_id = row.id,
                stored = row.player_count,
                resolved = race.player_count(),
                "Stored player count differs from resolved players"
            );
        }
        Ok(race)
    }

    fn player_ids(conn: &mut SqliteConnection, race_id: EntityId) -> AppResult<Vec<EntityId>> {
        race_players::table
            .filter(race_players::race_id.eq(race_id))
            .select(race_players::player_id)
            .order(race_players::player_id)
            .load(conn)
            .map_err(store_error("race.fetch_players"))
    }

    /// Every referenced player must exist before a new race is written.
    fn check_references(&self, race: &Race) -> AppResult<()> {
        for player_id in &race.players {
            if self.players.find_player(*player_id)?.is_none() {
                return Err(AppError::validation(
                    "players",
                    format!("player {} does not exist", player_id),
                ));
            }
        }
        Ok(())
    }

    /// Reference check for an update of an existing race.
    ///
    /// A player that no longer resolves but is already linked to the race in
    /// `linked` is a dangling reference: it is dropped from the written race
    /// and reported. Any other unresolved player rejects the write.
    fn prune_dangling(
        &self,
        race_id: EntityId,
        race: &Race,
        linked: &BTreeSet<EntityId>,
    ) -> AppResult<Race> {
        let mut pruned = race.clone();
        for player_id in &race.players {
            if self.players.find_player(*player_id)?.is_some() {
                continue;
            }
            if !linked.contains(player_id) {
                return Err(AppError::validation(
                    "players",
                    format!("player {} does not exist", player_id),
                ));
            }
            pruned.remove_player(*player_id);
            self.sink.record(&RepositoryEvent::DanglingReference {
                race_id,
                player_id: *player_id,
            });
        }
        Ok(pruned)
    }

    fn insert_players(
        conn: &mut SqliteConnection,
        race_id: EntityId,
        players: &BTreeSet<EntityId>,
    ) -> AppResult<()> {
        for player_id in players {
            diesel::insert_into(race_players::table)
                .values(RacePlayer {
                    race_id,
                    player_id: *player_id,
                })
                .execute(conn)
                .map_err(store_error("race.insert_player"))?;
        }
        Ok(())
    }

    fn delete_players(conn: &mut SqliteConnection, race_id: EntityId) -> AppResult<usize> {
        diesel::delete(race_players::table.filter(race_players::race_id.eq(race_id)))
            .execute(conn)
            .map_err(store_error("race.delete_players"))
    }
}

impl StoreAdapter for RaceStore {
    type Entity = Race;

    const NAME: &'static str = "race";

    fn fetch_one(&self, conn: &mut SqliteConnection, id: EntityId) -> AppResult<Option<Race>> {
        let row = races::table
            .find(id)
            .select(RaceRow::as_select())
            .first(conn)
            .optional()
            .map_err(store_error("race.fetch_one"))?;

        match row {
            Some(row) => {
                let player_ids = Self::player_ids(conn, id)?;
                self.assemble(row, player_ids).map(Some)
            }
            None => Ok(None),
        }
    }

    fn fetch_all(&self, conn: &mut SqliteConnection) -> AppResult<Vec<Race>> {
        let rows = races::table
            .select(RaceRow::as_select())
            .order(races::id)
            .load(conn)
            .map_err(store_error("race.fetch_all"))?;

        let links: Vec<RacePlayer> = race_players::table
            .select(RacePlayer::as_select())
            .order((race_players::race_id, race_players::player_id))
            .load(conn)
            .map_err(store_error("race.fetch_all_players"))?;

        let mut by_race: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        for link in links {
            by_race.entry(link.race_id).or_default().push(link.player_id);
        }

        rows.into_iter()
            .map(|row| {
                let player_ids = by_race.remove(&row.id).unwrap_or_default();
                self.assemble(row, player_ids)
            })
            .collect()
    }

    fn insert(&self, conn: &mut SqliteConnection, race: &Race) -> AppResult<Race> {
        self.check_references(race)?;
        let changes = RaceChanges::try_from(race)?;

        let race_id = UnitOfWork::run(conn, "race.insert", self.sink.as_ref(), |conn| {
            let race_id: EntityId = diesel::insert_into(races::table)
                .values(changes)
                .returning(races::id)
                .get_result(conn)
                .map_err(store_error("race.insert"))?;
            Self::insert_players(conn, race_id, &race.players)?;
            Ok(race_id)
        })?;

        let mut saved = race.clone();
        saved.assign_id(race_id);
        Ok(saved)
    }

    fn update(
        &self,
        conn: &mut SqliteConnection,
        id: EntityId,
        race: &Race,
    ) -> AppResult<Option<Race>> {
        let linked: BTreeSet<EntityId> = Self::player_ids(conn, id)?.into_iter().collect();
        let race = self.prune_dangling(id, race, &linked)?;
        let changes = RaceChanges::try_from(&race)?;

        let found = UnitOfWork::run(conn, "race.update", self.sink.as_ref(), |conn| {
            let updated = diesel::update(races::table.find(id))
                .set(changes)
                .execute(conn)
                .map_err(store_error("race.update"))?;
            if updated == 0 {
                return Ok(false);
            }
            Self::delete_players(conn, id)?;
            Self::insert_players(conn, id, &race.players)?;
            Ok(true)
        })?;

        Ok(found.then_some(race))
    }

    fn remove(&self, conn: &mut SqliteConnection, id: EntityId) -> AppResult<Option<Race>> {
        let Some(existing) = self.fetch_one(conn, id)? else {
            return Ok(None);
        };

        UnitOfWork::run(conn, "race.delete", self.sink.as_ref(), |conn| {
            Self::delete_players(conn, id)?;
            diesel::delete(races::table.find(id))
                .execute(conn)
                .map_err(store_error("race.delete"))?;
            Ok(())
        })?;

        Ok(Some(existing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadingStrategy;
    use crate::db::UnitOfWorkState;
    use crate::events::MemoryEventSink;
    use crate::models::Player;
    use crate::repositories::test_support::TestStore;
    use crate::repositories::{Repositories, Repository};
    use proptest::prelude::*;

    struct Fixture {
        store: TestStore,
        repos: Repositories,
        sink: Arc<MemoryEventSink>,
    }

    impl Fixture {
        fn new(strategy: LoadingStrategy) -> Self {
            let store = TestStore::new();
            let sink = Arc::new(MemoryEventSink::new());
            let repos = Repositories::new(store.provider(), strategy, sink.clone()).unwrap();
            Self { store, repos, sink }
        }

        fn player(&self, name: &str) -> EntityId {
            let player = Player::new(name, "1110001110001", 3);
            self.repos.players.save(&player).unwrap().unwrap().id.unwrap()
        }

        /// Fresh repositories over the same file, with empty caches.
        fn reopen(&self) -> Repositories {
            Repositories::new(self.store.provider(), LoadingStrategy::Lazy, self.sink.clone())
                .unwrap()
        }

        fn reject_join_rows_for(&self, player_id: EntityId) {
            self.store.execute(&format!(
                "CREATE TRIGGER reject_join BEFORE INSERT ON race_players \
                 WHEN NEW.player_id = {} BEGIN SELECT RAISE(ABORT, 'join row rejected'); END",
                player_id
            ));
        }

        fn join_rows(&self, race_id: EntityId) -> i64 {
            self.store.count(&format!(
                "SELECT COUNT(*) AS n FROM race_players WHERE race_id = {}",
                race_id
            ))
        }

        fn stored_count(&self, race_id: EntityId) -> i64 {
            self.store.count(&format!(
                "SELECT player_count AS n FROM races WHERE id = {}",
                race_id
            ))
        }

        fn uow_states(&self, operation: &str) -> Vec<UnitOfWorkState> {
            self.sink
                .events()
                .into_iter()
                .filter_map(|event| match event {
                    RepositoryEvent::UnitOfWork { operation: op, state } if op == operation => {
                        Some(state)
                    }
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_save_writes_row_and_join_rows() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let (p1, p2) = (fx.player("Jeremy Clarkson"), fx.player("James May"));

        let race = fx.repos.races.save(&Race::new(1).with_players([p1, p2])).unwrap().unwrap();
        let race_id = race.id.unwrap();

        assert_eq!(race.player_count(), 2);
        assert_eq!(fx.join_rows(race_id), 2);
        assert_eq!(fx.stored_count(race_id), 2);
        assert_eq!(
            fx.uow_states("race.insert"),
            vec![
                UnitOfWorkState::Started,
                UnitOfWorkState::Committing,
                UnitOfWorkState::Committed
            ]
        );

        let connects = fx.store.connects();
        assert_eq!(fx.repos.races.find_one(race_id).unwrap(), Some(race));
        assert_eq!(fx.store.connects(), connects);
    }

    #[test]
    fn test_load_assembles_players_from_store() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let (p1, p2) = (fx.player("Jeremy Clarkson"), fx.player("James May"));
        let saved = fx.repos.races.save(&Race::new(4).with_players([p1, p2])).unwrap().unwrap();

        let reopened = fx.reopen();
        let loaded = reopened.races.find_one(saved.id.unwrap()).unwrap().expect("stored race");

        assert_eq!(loaded, saved);
        let names: Vec<String> = loaded
            .resolve_players(&reopened.players)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Jeremy Clarkson", "James May"]);
        assert_eq!(reopened.races.find_all().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_race_is_absent() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        assert_eq!(fx.repos.races.find_one(1).unwrap(), None);
        assert_eq!(fx.repos.races.delete(1).unwrap(), None);
    }

    #[test]
    fn test_unknown_player_rejected_before_writing() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let p1 = fx.player("Jeremy Clarkson");

        let result = fx.repos.races.save(&Race::new(1).with_players([p1, 404]));

        assert!(matches!(result, Err(AppError::Validation { .. })));
        assert_eq!(fx.store.count("SELECT COUNT(*) AS n FROM races"), 0);
        assert!(fx.uow_states("race.insert").is_empty());
    }

    #[test]
    fn test_failed_save_rolls_back_primary_row() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let (p1, p2) = (fx.player("Jeremy Clarkson"), fx.player("James May"));
        fx.reject_join_rows_for(p2);

        let result = fx.repos.races.save(&Race::new(1).with_players([p1, p2]));

        assert!(matches!(result, Err(AppError::Database { .. })));
        assert_eq!(fx.store.count("SELECT COUNT(*) AS n FROM races"), 0);
        assert_eq!(fx.store.count("SELECT COUNT(*) AS n FROM race_players"), 0);
        assert_eq!(fx.repos.races.cached_len(), 0);
        assert_eq!(
            fx.uow_states("race.insert"),
            vec![
                UnitOfWorkState::Started,
                UnitOfWorkState::RollingBack,
                UnitOfWorkState::Failed
            ]
        );
    }

    #[test]
    fn test_failed_update_keeps_previous_state() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let (p1, p2) = (fx.player("Jeremy Clarkson"), fx.player("James May"));
        let original = fx.repos.races.save(&Race::new(1).with_players([p1])).unwrap().unwrap();
        let race_id = original.id.unwrap();
        fx.reject_join_rows_for(p2);

        let mut changed = original.clone();
        changed.engine_type = 5;
        changed.add_player(p2);
        assert!(fx.repos.races.update(&changed).is_err());

        assert_eq!(
            fx.store.count(&format!("SELECT engine_type AS n FROM races WHERE id = {}", race_id)),
            1
        );
        assert_eq!(fx.join_rows(race_id), 1);
        assert_eq!(fx.stored_count(race_id), 1);
        assert_eq!(fx.repos.races.find_one(race_id).unwrap(), Some(original.clone()));
        assert_eq!(fx.reopen().races.find_one(race_id).unwrap(), Some(original));
    }

    #[test]
    fn test_failed_delete_keeps_rows_and_cache() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let p1 = fx.player("Jeremy Clarkson");
        let race = fx.repos.races.save(&Race::new(1).with_players([p1])).unwrap().unwrap();
        let race_id = race.id.unwrap();
        fx.store.execute(
            "CREATE TRIGGER reject_delete BEFORE DELETE ON races \
             BEGIN SELECT RAISE(ABORT, 'race delete rejected'); END",
        );

        assert!(fx.repos.races.delete(race_id).is_err());

        assert_eq!(fx.join_rows(race_id), 1);
        assert!(fx.repos.races.is_cached(race_id));
        assert_eq!(
            fx.uow_states("race.delete"),
            vec![
                UnitOfWorkState::Started,
                UnitOfWorkState::RollingBack,
                UnitOfWorkState::Failed
            ]
        );
    }

    #[test]
    fn test_delete_removes_join_rows() {
        let fx = Fixture::new(LoadingStrategy::Eager);
        let p1 = fx.player("Jeremy Clarkson");
        let race = fx.repos.races.save(&Race::new(1).with_players([p1])).unwrap().unwrap();
        let race_id = race.id.unwrap();

        assert_eq!(fx.repos.races.delete(race_id).unwrap(), Some(race));
        assert_eq!(fx.join_rows(race_id), 0);
        assert_eq!(fx.store.count("SELECT COUNT(*) AS n FROM races"), 0);
        assert_eq!(fx.repos.races.find_one(race_id).unwrap(), None);
    }

    #[test]
    fn test_update_replaces_all_join_rows() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let (p1, p2, p3) = (fx.player("Jeremy"), fx.player("James"), fx.player("Richard"));
        let mut race = fx.repos.races.save(&Race::new(1).with_players([p1, p2])).unwrap().unwrap();
        let race_id = race.id.unwrap();

        race.players = [p3].into_iter().collect();
        assert_eq!(fx.repos.races.update(&race).unwrap(), Some(race.clone()));

        assert_eq!(fx.join_rows(race_id), 1);
        assert_eq!(
            fx.store.count(&format!(
                "SELECT COUNT(*) AS n FROM race_players WHERE race_id = {} AND player_id = {}",
                race_id, p3
            )),
            1
        );
        assert_eq!(
            fx.store.count(&format!(
                "SELECT COUNT(*) AS n FROM race_players WHERE player_id IN ({}, {})",
                p1, p2
            )),
            0
        );
        assert_eq!(fx.stored_count(race_id), 1);
    }

    #[test]
    fn test_dangling_reference_is_dropped() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let (p1, p2) = (fx.player("Jeremy Clarkson"), fx.player("James May"));
        let race = fx.repos.races.save(&Race::new(1).with_players([p1, p2])).unwrap().unwrap();
        let race_id = race.id.unwrap();

        fx.repos.players.delete(p2).unwrap().expect("player existed");
        fx.repos.races.evict(race_id);

        let loaded = fx.repos.races.find_one(race_id).unwrap().expect("race still loads");
        assert_eq!(loaded.players, [p1].into_iter().collect());
        assert_eq!(loaded.player_count(), 1);
        assert!(fx.sink.events().contains(&RepositoryEvent::DanglingReference {
            race_id,
            player_id: p2,
        }));
    }

    #[test]
    fn test_update_after_player_deleted_drops_dangling() {
        for strategy in [LoadingStrategy::Lazy, LoadingStrategy::Eager] {
            let fx = Fixture::new(strategy);
            let (p1, p2) = (fx.player("Jeremy Clarkson"), fx.player("James May"));
            let race = fx.repos.races.save(&Race::new(1).with_players([p1, p2])).unwrap().unwrap();
            let race_id = race.id.unwrap();

            fx.repos.players.delete(p2).unwrap().expect("player existed");

            let mut cached = fx.repos.races.find_one(race_id).unwrap().expect("cached race");
            cached.engine_type = 5;
            let written = fx.repos.races.update(&cached).unwrap().expect("race exists");

            assert_eq!(written.engine_type, 5);
            assert_eq!(written.players, [p1].into_iter().collect());
            assert_eq!(fx.join_rows(race_id), 1);
            assert_eq!(fx.stored_count(race_id), 1);
            assert_eq!(fx.repos.races.find_one(race_id).unwrap(), Some(written));
            assert!(fx.sink.events().contains(&RepositoryEvent::DanglingReference {
                race_id,
                player_id: p2,
            }));
        }
    }

    #[test]
    fn test_update_with_unknown_new_player_rejected() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let p1 = fx.player("Jeremy Clarkson");
        let mut race = fx.repos.races.save(&Race::new(1).with_players([p1])).unwrap().unwrap();
        let race_id = race.id.unwrap();

        race.add_player(404);
        match fx.repos.races.update(&race) {
            Err(AppError::Validation { field, .. }) => assert_eq!(field, "players"),
            other => panic!("Expected Validation error, got {:?}", other),
        }
        assert_eq!(fx.join_rows(race_id), 1);
        assert!(fx.uow_states("race.update").is_empty());
    }

    #[test]
    fn test_join_row_to_missing_player_is_skipped() {
        for strategy in [
            LoadingStrategy::Lazy,
            LoadingStrategy::Eager,
            LoadingStrategy::Passthrough,
        ] {
            let fx = Fixture::new(strategy);
            let p1 = fx.player("Jeremy Clarkson");
            let race = fx.repos.races.save(&Race::new(1).with_players([p1])).unwrap().unwrap();
            let race_id = race.id.unwrap();
            fx.store.execute(&format!(
                "INSERT INTO race_players (race_id, player_id) VALUES ({}, 999)",
                race_id
            ));

            let repos = Repositories::new(fx.store.provider(), strategy, fx.sink.clone()).unwrap();
            let loaded = repos.races.find_one(race_id).unwrap().expect("race still loads");

            assert_eq!(loaded.players, [p1].into_iter().collect());
            assert_eq!(loaded.player_count(), 1);
            assert_eq!(repos.races.find_all().unwrap()[&race_id], loaded);
            assert!(fx.sink.events().contains(&RepositoryEvent::DanglingReference {
                race_id,
                player_id: 999,
            }));
        }
    }

    #[test]
    fn test_duplicate_pair_collapses() {
        let fx = Fixture::new(LoadingStrategy::Lazy);
        let p1 = fx.player("Jeremy Clarkson");

        let mut race = fx.repos.races.save(&Race::new(1).with_players([p1])).unwrap().unwrap();
        assert!(!race.add_player(p1));
        fx.repos.races.update(&race).unwrap().unwrap();

        assert_eq!(fx.join_rows(race.id.unwrap()), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_player_count_matches_set(
            first in prop::collection::btree_set(0..4usize, 0..4),
            second in prop::collection::btree_set(0..4usize, 0..4),
        ) {
            let fx = Fixture::new(LoadingStrategy::Lazy);
            let ids: Vec<EntityId> = ["A", "B", "C", "D"].iter().map(|n| fx.player(n)).collect();

            let mut race = fx.repos.races
                .save(&Race::new(1).with_players(first.iter().map(|i| ids[*i])))
                .unwrap()
                .unwrap();
            let race_id = race.id.unwrap();
            prop_assert_eq!(fx.stored_count(race_id), first.len() as i64);

            race.players = second.iter().map(|i| ids[*i]).collect();
            let updated = fx.repos.races.update(&race).unwrap().unwrap();
            prop_assert_eq!(updated.player_count(), second.len());
            prop_assert_eq!(fx.stored_count(race_id), second.len() as i64);
            prop_assert_eq!(fx.join_rows(race_id), second.len() as i64);

            let loaded = fx.reopen().races.find_one(race_id).unwrap().unwrap();
            prop_assert_eq!(loaded.player_count(), loaded.players.len());
            prop_assert_eq!(loaded, updated);
        }
    }
}
