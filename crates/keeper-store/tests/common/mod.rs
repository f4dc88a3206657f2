#![allow(dead_code, missing_docs, unused_results)]

use std::sync::Arc;

use keeper_core::{Account, AccountCreationInput, Item, ItemCreationInput, User, UserCreationInput};
use keeper_settings::{DatabaseSettings, Provider};
use keeper_store::sqlite::{ConnectionConfig, new_file};
use keeper_store::{ConnectionPool, IdRetrievalStrategy, Querier, QueryBuilder, Sqlite, StreamOptions};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// A migrated file-backed querier plus a side pool onto the same database.
pub struct Harness {
    pub querier: Querier,
    pub pool: ConnectionPool,
    pub cancel: CancellationToken,
    _dir: TempDir,
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("keeper.db").to_string_lossy().into_owned()
}

pub async fn harness() -> Harness {
    harness_with(Arc::new(Sqlite::new())).await
}

/// Harness over `builder`, with the strategy its inserts call for.
pub async fn harness_with(builder: Arc<dyn QueryBuilder>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir);
    let config = ConnectionConfig::default();
    let strategy = IdRetrievalStrategy::for_dialect(builder.as_ref());
    let querier = Querier::with_strategy(new_file(&path, &config).unwrap(), builder, Provider::Sqlite, strategy)
        .unwrap()
        .with_stream_options(StreamOptions { batch_size: 10, concurrency: 4 });
    let cancel = CancellationToken::new();
    querier.migrate(&cancel, 1, None).await.unwrap();
    Harness {
        querier,
        pool: new_file(&path, &config).unwrap(),
        cancel,
        _dir: dir,
    }
}

pub fn settings_in(dir: &TempDir) -> DatabaseSettings {
    DatabaseSettings {
        connection_details: db_path(dir),
        ..DatabaseSettings::default()
    }
}

impl Harness {
    pub async fn user(&self, username: &str) -> User {
        self.querier
            .create_user(
                &self.cancel,
                &UserCreationInput {
                    username: username.into(),
                    hashed_password: "hashed".into(),
                    two_factor_secret: "secret".into(),
                    service_roles: vec![],
                },
            )
            .await
            .unwrap()
    }

    pub async fn account(&self, user: &User) -> Account {
        self.querier
            .create_account(
                &self.cancel,
                &AccountCreationInput {
                    name: format!("{}'s account", user.username),
                    belongs_to_user: user.id,
                },
            )
            .await
            .unwrap()
    }

    /// A user plus their account.
    pub async fn tenant(&self) -> (User, Account) {
        let user = self.user("tenant").await;
        let account = self.account(&user).await;
        (user, account)
    }

    pub async fn item(&self, account: &Account, created_by: u64, name: &str) -> Item {
        self.querier
            .create_item(
                &self.cancel,
                &ItemCreationInput {
                    name: name.into(),
                    details: format!("details of {name}"),
                    belongs_to_account: account.id,
                },
                created_by,
            )
            .await
            .unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    pub fn exec(&self, sql: &str) {
        self.pool.get().unwrap().execute_batch(sql).unwrap();
    }
}
