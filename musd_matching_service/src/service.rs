use log::*;
use musd_payment_engine::{EvmLedger, MatchingApi, PaymentWatcher};

use crate::{config::ServiceConfig, errors::ServiceError};

/// Wires the ledger client, matcher and watcher together and runs until the event stream closes
/// or the process receives ctrl-c.
pub async fn run_service(config: ServiceConfig) -> Result<(), ServiceError> {
    let ledger = EvmLedger::connect(
        &config.rpc_url,
        &config.matcher_key,
        config.payment_factory_address,
        config.solver_registry_address,
    )
    .await?
    .with_receipt_timeout(config.receipt_timeout)
    .with_poll_interval(config.event_poll_interval);
    verify_chain(&ledger, &config).await?;
    info!(
        "⛓️ Escrow: {}, solver registry: {}, settlement token: {}",
        config.payment_factory_address, config.solver_registry_address, config.musd_address
    );
    let api = MatchingApi::new(ledger);
    let watcher = PaymentWatcher::new(api, config.max_concurrent_matches);
    tokio::select! {
        result = watcher.run() => result.map_err(ServiceError::from),
        _ = tokio::signal::ctrl_c() => {
            info!("🛎️ Shutdown signal received. Bye!");
            Ok(())
        },
    }
}

async fn verify_chain(ledger: &EvmLedger, config: &ServiceConfig) -> Result<(), ServiceError> {
    if config.skip_chain_check {
        warn!("⛓️ Chain id verification is disabled. The service will happily talk to the wrong network.");
        return Ok(());
    }
    let chain_id = ledger.chain_id().await?;
    if chain_id != config.chain_id {
        return Err(ServiceError::InitializeError(format!(
            "Connected to chain {chain_id}, but expected {}. Check MPG_RPC_URL.",
            config.chain_id
        )));
    }
    info!("⛓️ Connected to chain {chain_id}");
    Ok(())
}
