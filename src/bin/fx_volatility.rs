use std::error::Error;

use tracing::{error, info};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

use fx_volatility::config::ServiceConfig;
use fx_volatility::converter::CurrencyConverter;
use fx_volatility::exposure::Exposure;
use fx_volatility::service::VolatilityService;

const USAGE: &str = "usage:
  fx_volatility <FROM> <TO> [<FROM> <TO> ...]
  fx_volatility convert <AMOUNT> <FROM> <TO>
  fx_volatility exposure <AMOUNT> <FROM> <TO> <DAYS>";

/// Log timestamps in UTC, the same calendar the daily cache runs on.
struct UtcTimer;

impl FormatTime for UtcTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

#[tokio::main]
async fn main() {
    // RUST_LOG wins; "info" otherwise.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_timer(UtcTimer)
        .init();

    // Fail fast on a missing or invalid config.
    let cfg = match ServiceConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!("❌ Critical Error: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&cfg, &args).await {
        error!("❌ {}", e);
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }
}

async fn run(cfg: &ServiceConfig, args: &[String]) -> Result<(), Box<dyn Error>> {
    match args.first().map(String::as_str) {
        Some("convert") => convert(cfg, &args[1..]).await,
        Some("exposure") => exposure(cfg, &args[1..]).await,
        Some(_) => volatility(cfg, args).await,
        None => Err("no currency pair given".into()),
    }
}

async fn volatility(cfg: &ServiceConfig, args: &[String]) -> Result<(), Box<dyn Error>> {
    if args.len() % 2 != 0 {
        return Err("currencies must come in FROM TO pairs".into());
    }

    let pairs: Vec<(&str, &str)> = args
        .chunks(2)
        .map(|c| (c[0].as_str(), c[1].as_str()))
        .collect();

    info!("🚀 Resolving volatility for {} pair(s)...", pairs.len());
    let service = VolatilityService::from_config(cfg);

    for result in service.get_volatility_many(&pairs).await {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    info!("\n{}", service.stats().generate_report());
    Ok(())
}

async fn convert(cfg: &ServiceConfig, args: &[String]) -> Result<(), Box<dyn Error>> {
    let [amount, from, to] = args else {
        return Err("convert takes AMOUNT FROM TO".into());
    };
    let amount: f64 = amount.parse()?;

    let conversion = CurrencyConverter::new(&cfg.converter)
        .convert(amount, from, to)
        .await?;
    println!("{}", serde_json::to_string_pretty(&conversion)?);
    Ok(())
}

async fn exposure(cfg: &ServiceConfig, args: &[String]) -> Result<(), Box<dyn Error>> {
    let [amount, from, to, days] = args else {
        return Err("exposure takes AMOUNT FROM TO DAYS".into());
    };
    let amount: f64 = amount.parse()?;
    let horizon_days: u32 = days.parse()?;

    let conversion = CurrencyConverter::new(&cfg.converter)
        .convert(1.0, from, to)
        .await?;
    let service = VolatilityService::from_config(cfg);
    let volatility = service.get_volatility(from, to).await;
    info!(
        "📊 {} volatility {:.1}% ({})",
        volatility.pair(),
        volatility.volatility(),
        volatility.source()
    );

    let metrics = Exposure {
        amount,
        rate: conversion.rate,
        volatility_pct: volatility.volatility(),
        horizon_days,
    }
    .assess()?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
