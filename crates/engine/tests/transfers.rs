use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rand::Rng;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    FromQueryResult, MockDatabase, Statement,
    sqlx::{Connection, Executor, SqliteConnection},
};

use engine::{
    Amount, Engine, EngineError, LockOrdered, NewAccountCmd, OptimisticRetry, RetryPolicy,
    StoreFailure, StrategyKind, TransferCmd, TransferStrategy,
};
use migration::MigratorTrait;

/// SQLite in memory by default. Set `TRANSFERS_TEST_DATABASE_URL` to run the
/// same suite against PostgreSQL.
async fn connect() -> DatabaseConnection {
    let mut options = match std::env::var("TRANSFERS_TEST_DATABASE_URL") {
        Ok(url) => {
            let mut options = ConnectOptions::new(url);
            options.max_connections(20);
            options
        }
        // Every connection to `sqlite::memory:` opens its own database.
        Err(_) => {
            let mut options = ConnectOptions::new("sqlite::memory:");
            options.max_connections(1);
            options
        }
    };
    options.sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

async fn engine_with_db(kind: StrategyKind) -> (Engine, DatabaseConnection) {
    let db = connect().await;
    let engine = Engine::builder()
        .database(db.clone())
        .strategy(kind)
        .retry_policy(RetryPolicy {
            max_attempts: 20,
            initial_backoff: Duration::from_millis(5),
            jitter: Duration::from_millis(20),
        })
        .build();
    (engine, db)
}

/// Ids are random so the suite can share one PostgreSQL database.
fn fresh_ids() -> (i64, i64) {
    let mut rng = rand::thread_rng();
    let a = rng.gen_range(1..i64::MAX / 2);
    (a, a + 1)
}

async fn open(engine: &Engine, id: i64, balance: &str) {
    engine
        .create_account(NewAccountCmd::new(id, balance))
        .await
        .unwrap();
}

async fn balance(engine: &Engine, id: i64) -> Amount {
    engine.account(id).await.unwrap().balance
}

#[derive(Debug, FromQueryResult)]
struct Row {
    source_account_id: i64,
    destination_account_id: i64,
    amount: String,
}

async fn records(db: &DatabaseConnection, a: i64, b: i64) -> Vec<(i64, i64, Amount)> {
    let backend = db.get_database_backend();
    let sql = format!(
        "SELECT source_account_id, destination_account_id, CAST(amount AS TEXT) AS amount \
         FROM transactions WHERE source_account_id IN ({a}, {b}) ORDER BY id"
    );
    Row::find_by_statement(Statement::from_string(backend, sql))
        .all(db)
        .await
        .unwrap()
        .into_iter()
        .map(|row| {
            (
                row.source_account_id,
                row.destination_account_id,
                row.amount.trim().parse().unwrap(),
            )
        })
        .collect()
}

const KINDS: [StrategyKind; 2] = [StrategyKind::LockOrdered, StrategyKind::Optimistic];

#[tokio::test]
async fn create_and_read_account() {
    let (engine, _db) = engine_with_db(StrategyKind::default()).await;
    let (a, _) = fresh_ids();

    let account = engine
        .create_account(NewAccountCmd::new(a, "100.123456"))
        .await
        .unwrap();
    assert_eq!(account.balance.to_string(), "100.12346");
    assert_eq!(balance(&engine, a).await, account.balance);
}

#[tokio::test]
async fn reads_rows_written_outside_the_engine() {
    let (engine, db) = engine_with_db(StrategyKind::default()).await;
    let (a, _) = fresh_ids();
    db.execute_unprepared(&format!(
        "INSERT INTO accounts (id, balance) VALUES ({a}, 12.5)"
    ))
    .await
    .unwrap();

    let account = engine.account(a).await.unwrap();
    assert_eq!(account.id, a);
    assert_eq!(account.balance.to_string(), "12.50000");
}

#[tokio::test]
async fn create_account_rejects_bad_input() {
    let (engine, _db) = engine_with_db(StrategyKind::default()).await;
    let (a, _) = fresh_ids();
    open(&engine, a, "1").await;

    let err = engine
        .create_account(NewAccountCmd::new(a, "5"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::ExistingAccount(a));

    let err = engine
        .create_account(NewAccountCmd::new(0, "5"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidId(0));

    let (b, _) = fresh_ids();
    let err = engine
        .create_account(NewAccountCmd::new(b, "-0.5"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NegativeBalance("-0.5".to_string()));

    let err = engine
        .create_account(NewAccountCmd::new(b, "ten"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidAmount("ten".to_string()));
    assert_eq!(
        engine.account(b).await.unwrap_err(),
        EngineError::AccountNotFound(b)
    );
}

#[tokio::test]
async fn transfer_moves_money_and_records_it() {
    for kind in KINDS {
        let (engine, db) = engine_with_db(kind).await;
        let (a, b) = fresh_ids();
        open(&engine, a, "10").await;
        open(&engine, b, "0.5").await;

        let record = engine
            .transfer(TransferCmd::new(a, b, "2.25"))
            .await
            .unwrap();
        assert_eq!(record.source_account_id, a);
        assert_eq!(record.destination_account_id, b);
        assert_eq!(record.amount.to_string(), "2.25000");

        assert_eq!(balance(&engine, a).await, Amount::from_ratio(31, 4), "{kind:?}");
        assert_eq!(balance(&engine, b).await, Amount::from_ratio(11, 4), "{kind:?}");
        assert_eq!(
            records(&db, a, b).await,
            vec![(a, b, Amount::from_ratio(9, 4))],
            "{kind:?}"
        );
    }
}

#[tokio::test]
async fn transfer_can_empty_the_source() {
    for kind in KINDS {
        let (engine, _db) = engine_with_db(kind).await;
        let (a, b) = fresh_ids();
        open(&engine, a, "4").await;
        open(&engine, b, "0").await;

        engine.transfer(TransferCmd::new(a, b, "4")).await.unwrap();
        assert!(balance(&engine, a).await.is_zero(), "{kind:?}");
        assert_eq!(balance(&engine, b).await, Amount::from_integer(4));
    }
}

#[tokio::test]
async fn insufficient_balance_changes_nothing() {
    for kind in KINDS {
        let (engine, db) = engine_with_db(kind).await;
        let (a, b) = fresh_ids();
        open(&engine, a, "1").await;
        open(&engine, b, "1").await;

        let err = engine
            .transfer(TransferCmd::new(a, b, "1.5"))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::InsufficientBalance, "{kind:?}");

        assert_eq!(balance(&engine, a).await, Amount::from_integer(1));
        assert_eq!(balance(&engine, b).await, Amount::from_integer(1));
        assert!(records(&db, a, b).await.is_empty());
    }
}

#[tokio::test]
async fn missing_accounts_are_reported() {
    for kind in KINDS {
        let (engine, db) = engine_with_db(kind).await;
        let (a, missing) = fresh_ids();
        open(&engine, a, "5").await;

        let err = engine
            .transfer(TransferCmd::new(missing, a, "1"))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::AccountNotFound(missing), "{kind:?}");

        let err = engine
            .transfer(TransferCmd::new(a, missing, "1"))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::AccountNotFound(missing), "{kind:?}");

        assert_eq!(balance(&engine, a).await, Amount::from_integer(5));
        assert!(records(&db, a, missing).await.is_empty());
    }
}

#[tokio::test]
async fn validation_runs_before_any_lookup() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let engine = Engine::builder().database(db.clone()).build();

    for amount in ["0", "-1", "0.000001", "NaN", "Inf", "10/1", "invalid"] {
        let err = engine
            .transfer(TransferCmd::new(1, 2, amount))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidAmount(amount.to_string()));
    }

    let err = engine
        .transfer(TransferCmd::new(3, 3, "1"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::SameAccount(3));

    // The amount is checked before the accounts.
    let err = engine
        .transfer(TransferCmd::new(3, 3, "0"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidAmount("0".to_string()));

    let err = engine
        .create_account(NewAccountCmd::new(0, "1"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::InvalidId(0));
    let err = engine
        .create_account(NewAccountCmd::new(5, "-1"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NegativeBalance("-1".to_string()));

    assert!(db.into_transaction_log().is_empty());
}

#[tokio::test]
async fn only_the_balance_check_means_insufficient_balance() {
    let (engine, db) = engine_with_db(StrategyKind::default()).await;
    let (a, b) = fresh_ids();
    open(&engine, a, "1").await;
    open(&engine, b, "1").await;

    let err = db
        .execute_unprepared(&format!("UPDATE accounts SET balance = -1 WHERE id = {a}"))
        .await
        .unwrap_err();
    assert_eq!(
        StoreFailure::of(&EngineError::Database(err)),
        StoreFailure::BalanceCheck
    );

    let err = db
        .execute_unprepared(&format!(
            "INSERT INTO transactions (source_account_id, destination_account_id, amount) \
             VALUES ({a}, {b}, 0)"
        ))
        .await
        .unwrap_err();
    assert_eq!(
        StoreFailure::of(&EngineError::Database(err)),
        StoreFailure::Other
    );

    assert_eq!(balance(&engine, a).await, Amount::from_integer(1));
    assert!(records(&db, a, b).await.is_empty());
}

/// An optimistic engine over a file-backed SQLite database whose connection
/// fails at once while another connection holds the write lock.
async fn engine_with_file_db(policy: RetryPolicy) -> (Engine, String, PathBuf) {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join(format!("engine_{}.db", rand::random::<u64>()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let mut options = ConnectOptions::new(url.clone());
    options
        .max_connections(1)
        .sqlx_logging(false)
        .map_sqlx_sqlite_opts(|opts| opts.busy_timeout(Duration::ZERO));
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let engine = Engine::builder()
        .database(db)
        .strategy(StrategyKind::Optimistic)
        .retry_policy(policy)
        .build();
    (engine, url, path)
}

async fn hold_write_lock(url: &str) -> SqliteConnection {
    let mut writer = SqliteConnection::connect(url).await.unwrap();
    writer.execute("BEGIN IMMEDIATE").await.unwrap();
    writer
}

fn remove_db(path: &Path) {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[tokio::test]
async fn persistent_conflict_surfaces_as_storage_error() {
    let (engine, url, path) = engine_with_file_db(RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        jitter: Duration::ZERO,
    })
    .await;
    open(&engine, 1, "10").await;
    open(&engine, 2, "0").await;

    let mut writer = hold_write_lock(&url).await;
    let err = engine
        .transfer(TransferCmd::new(1, 2, "4"))
        .await
        .unwrap_err();
    assert!(err.is_storage(), "{err:?}");
    assert_eq!(StoreFailure::of(&err), StoreFailure::Conflict, "{err:?}");
    writer.execute("ROLLBACK").await.unwrap();

    assert_eq!(balance(&engine, 1).await, Amount::from_integer(10));
    assert!(balance(&engine, 2).await.is_zero());
    remove_db(&path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transfer_succeeds_once_the_conflict_clears() {
    let (engine, url, path) = engine_with_file_db(RetryPolicy {
        max_attempts: 20,
        initial_backoff: Duration::from_millis(10),
        jitter: Duration::ZERO,
    })
    .await;
    open(&engine, 1, "10").await;
    open(&engine, 2, "0").await;

    let mut writer = hold_write_lock(&url).await;
    let transfer = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.transfer(TransferCmd::new(1, 2, "4")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    writer.execute("ROLLBACK").await.unwrap();

    let record = transfer.await.unwrap().unwrap();
    assert_eq!(record.amount, Amount::from_integer(4));
    assert_eq!(balance(&engine, 1).await, Amount::from_integer(6));
    assert_eq!(balance(&engine, 2).await, Amount::from_integer(4));
    remove_db(&path);
}

#[tokio::test]
async fn strategies_produce_the_same_outcome() {
    let script = [
        ("a", "b", "3", true),
        ("b", "a", "0.5", true),
        ("a", "b", "100", false),
        ("b", "a", "2.5", true),
        ("a", "b", "7.25", true),
        ("b", "a", "8", false),
    ];

    let mut outcomes = Vec::new();
    for strategy in [
        Arc::new(LockOrdered) as Arc<dyn TransferStrategy>,
        Arc::new(OptimisticRetry::new(RetryPolicy::default())) as Arc<dyn TransferStrategy>,
    ] {
        let (engine, db) = engine_with_db(StrategyKind::default()).await;
        let (a, b) = fresh_ids();
        open(&engine, a, "10").await;
        open(&engine, b, "0").await;

        for (from, to, amount, succeeds) in script {
            let id = |name: &str| if name == "a" { a } else { b };
            let result = engine
                .transfer_with(strategy.as_ref(), TransferCmd::new(id(from), id(to), amount))
                .await;
            assert_eq!(result.is_ok(), succeeds, "{strategy:?} {from}->{to} {amount}");
        }

        let log: Vec<_> = records(&db, a, b)
            .await
            .into_iter()
            .map(|(source, _, amount)| (source == a, amount))
            .collect();
        outcomes.push((balance(&engine, a).await, balance(&engine, b).await, log));
    }

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0].0, Amount::from_ratio(11, 4));
    assert_eq!(outcomes[0].1, Amount::from_ratio(29, 4));
}

/// Concurrent transfers in both directions over the same pair: `n` moves of 2
/// from A to B and `n` moves of 1 from B to A, starting from `2n` each.
async fn concurrent_opposite_transfers(kind: StrategyKind) {
    const N: i64 = 50;
    let (engine, db) = engine_with_db(kind).await;
    let (a, b) = fresh_ids();
    let start = (2 * N).to_string();
    open(&engine, a, &start).await;
    open(&engine, b, &start).await;

    let mut handles = Vec::new();
    for _ in 0..N {
        let forward = engine.clone();
        handles.push(tokio::spawn(async move {
            forward.transfer(TransferCmd::new(a, b, "2")).await
        }));
        let backward = engine.clone();
        handles.push(tokio::spawn(async move {
            backward.transfer(TransferCmd::new(b, a, "1")).await
        }));
    }

    let mut errors = Vec::new();
    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            errors.push(err);
        }
    }
    assert!(errors.is_empty(), "{kind:?}: {errors:?}");

    assert_eq!(balance(&engine, a).await, Amount::from_integer(N));
    assert_eq!(balance(&engine, b).await, Amount::from_integer(3 * N));
    assert_eq!(records(&db, a, b).await.len(), 2 * N as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_with_row_locks() {
    concurrent_opposite_transfers(StrategyKind::LockOrdered).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_with_optimistic_retry() {
    concurrent_opposite_transfers(StrategyKind::Optimistic).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_conserve_the_total() {
    for kind in KINDS {
        let (engine, _db) = engine_with_db(kind).await;
        let (a, b) = fresh_ids();
        let c = b + 1;
        for id in [a, b, c] {
            open(&engine, id, "3").await;
        }

        let pairs = [(a, b), (b, c), (c, a), (b, a), (c, b), (a, c)];
        let mut handles = Vec::new();
        for round in 0..10 {
            for (source, destination) in pairs {
                let engine = engine.clone();
                let amount = if round % 2 == 0 { "1" } else { "0.5" };
                handles.push(tokio::spawn(async move {
                    engine
                        .transfer(TransferCmd::new(source, destination, amount))
                        .await
                }));
            }
        }

        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) | Err(EngineError::InsufficientBalance) => {}
                Err(err) => panic!("{kind:?}: unexpected {err:?}"),
            }
        }

        let mut total = Amount::zero();
        for id in [a, b, c] {
            let balance = balance(&engine, id).await;
            assert!(!balance.is_negative(), "{kind:?}");
            total = &total + &balance;
        }
        assert_eq!(total, Amount::from_integer(9), "{kind:?}");
    }
}
