use chrono::{Duration, Utc};
use log::*;
use relay_engine::{LedgerApi, SqliteLedger};
use tokio::task::JoinHandle;

/// Starts the delivery retention worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_retention_worker(ledger: SqliteLedger, retention: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(3600));
        let api = LedgerApi::new(ledger);
        info!("🕰️ Delivery retention worker started (retention: {} days)", retention.num_days());
        loop {
            timer.tick().await;
            let cutoff = Utc::now() - retention;
            debug!("🕰️ Purging delivery fingerprints seen before {cutoff}");
            match api.purge_deliveries_before(cutoff).await {
                Ok(0) => debug!("🕰️ No delivery fingerprints to purge"),
                Ok(n) => info!("🕰️ Purged {n} old delivery fingerprints"),
                Err(e) => error!("🕰️ Error running delivery retention job: {e}"),
            }
        }
    })
}
