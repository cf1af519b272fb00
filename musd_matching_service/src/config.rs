use std::{env, time::Duration};

use alloy_primitives::Address;
use log::*;
use mpg_common::{helpers::parse_boolean_flag, Secret};
use musd_payment_engine::DEFAULT_MAX_CONCURRENT_MATCHES;

use crate::errors::ServiceError;

const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EVENT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Mezo testnet.
const DEFAULT_CHAIN_ID: u64 = 31611;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// JSON-RPC endpoint of the chain hosting the escrow contracts.
    pub rpc_url: String,
    /// Hex-encoded private key used to sign assignment transactions.
    pub matcher_key: Secret<String>,
    /// The escrow contract holding payments.
    pub payment_factory_address: Address,
    /// The solver registry contract.
    pub solver_registry_address: Address,
    /// The settlement-asset token contract.
    pub musd_address: Address,
    /// The chain id the service expects to be talking to.
    pub chain_id: u64,
    /// If true, the startup chain-id verification is skipped. **DANGER**: only useful against
    /// local development nodes with made-up chain ids.
    pub skip_chain_check: bool,
    /// Cap on matching attempts running at the same time.
    pub max_concurrent_matches: usize,
    /// Per-attempt deadline when waiting for an assignment receipt.
    pub receipt_timeout: Duration,
    /// Interval for the payment-created log filter poller.
    pub event_poll_interval: Duration,
}

impl ServiceConfig {
    /// Builds the configuration from `MPG_*` environment variables. The RPC endpoint, signing
    /// key and the three contract addresses are required; everything else falls back to a
    /// sensible default with a log line.
    pub fn try_from_env() -> Result<Self, ServiceError> {
        let rpc_url = require_env("MPG_RPC_URL")?;
        let matcher_key = Secret::new(require_env("MPG_MATCHER_KEY")?);
        let payment_factory_address = parse_address(env::var("MPG_PAYMENT_FACTORY_ADDRESS").ok(), "MPG_PAYMENT_FACTORY_ADDRESS")?;
        let solver_registry_address = parse_address(env::var("MPG_SOLVER_REGISTRY_ADDRESS").ok(), "MPG_SOLVER_REGISTRY_ADDRESS")?;
        let musd_address = parse_address(env::var("MPG_MUSD_ADDRESS").ok(), "MPG_MUSD_ADDRESS")?;
        let chain_id = parse_number(env::var("MPG_CHAIN_ID").ok(), "MPG_CHAIN_ID", DEFAULT_CHAIN_ID);
        let skip_chain_check = parse_boolean_flag(env::var("MPG_SKIP_CHAIN_CHECK").ok(), false);
        let max_concurrent_matches = parse_number(
            env::var("MPG_MAX_CONCURRENT_MATCHES").ok(),
            "MPG_MAX_CONCURRENT_MATCHES",
            DEFAULT_MAX_CONCURRENT_MATCHES,
        );
        let receipt_timeout =
            parse_seconds(env::var("MPG_RECEIPT_TIMEOUT").ok(), "MPG_RECEIPT_TIMEOUT", DEFAULT_RECEIPT_TIMEOUT);
        let event_poll_interval = parse_seconds(
            env::var("MPG_EVENT_POLL_INTERVAL").ok(),
            "MPG_EVENT_POLL_INTERVAL",
            DEFAULT_EVENT_POLL_INTERVAL,
        );
        Ok(Self {
            rpc_url,
            matcher_key,
            payment_factory_address,
            solver_registry_address,
            musd_address,
            chain_id,
            skip_chain_check,
            max_concurrent_matches,
            receipt_timeout,
            event_poll_interval,
        })
    }
}

fn require_env(name: &str) -> Result<String, ServiceError> {
    env::var(name).map_err(|e| ServiceError::ConfigurationError(format!("{e} [{name}]")))
}

fn parse_address(value: Option<String>, name: &str) -> Result<Address, ServiceError> {
    let value = value.ok_or_else(|| ServiceError::ConfigurationError(format!("{name} is not set")))?;
    value
        .trim()
        .parse()
        .map_err(|e| ServiceError::ConfigurationError(format!("Invalid address in {name}: {e}")))
}

fn parse_number<N>(value: Option<String>, name: &str, default: N) -> N
where N: std::str::FromStr + Copy + std::fmt::Display,
      N::Err: std::fmt::Display
{
    match value {
        Some(s) => s.trim().parse().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        None => default,
    }
}

fn parse_seconds(value: Option<String>, name: &str, default: Duration) -> Duration {
    match value {
        Some(s) => match s.trim().parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(e) => {
                warn!(
                    "🪛️ {s} is not a valid number of seconds for {name}. {e} Using the default, {}s, instead.",
                    default.as_secs()
                );
                default
            },
        },
        None => default,
    }
}
