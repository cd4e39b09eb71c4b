use log::*;
use relay_engine::SqliteLedger;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

pub fn random_db_path() -> String {
    format!("sqlite://{}/relay_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

/// Creates a fresh scratch database at `url` and returns a migrated ledger connected to it.
pub async fn prepare_test_ledger(url: &str) -> SqliteLedger {
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        debug!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let ledger = SqliteLedger::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(ledger.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Test ledger ready at {url}");
    ledger
}
