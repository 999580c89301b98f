//! `herd fetch` - repeated JSON calls through one coordinator

use anyhow::Context;
use herd_coordinator::{ExecuteOptions, JsonCoordinator};
use herd_foundation::CoordinatorConfig;
use serde_json::Value;
use std::time::{Duration, Instant};

pub struct FetchArgs {
    pub url: String,
    pub payload: Option<String>,
    pub repeat: u32,
    pub interval_ms: u64,
    pub force: bool,
}

/// GET without a payload, POST with one
async fn call(
    client: reqwest::Client,
    url: String,
    payload: Option<Value>,
) -> Result<Value, String> {
    let request = match &payload {
        Some(body) => client.post(&url).json(body),
        None => client.get(&url),
    };

    let response = request.send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("HTTP {}: {}", status.as_u16(), body));
    }

    response.json::<Value>().await.map_err(|e| e.to_string())
}

fn summarize(value: &Value, max: usize) -> String {
    let text = value.to_string();
    if text.chars().count() <= max {
        text
    } else {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

pub async fn run(config: &CoordinatorConfig, args: FetchArgs) -> anyhow::Result<()> {
    let payload = args
        .payload
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("--payload is not valid JSON")?;
    let key_payload = payload.clone().unwrap_or(Value::Null);

    let coordinator: JsonCoordinator<String> = JsonCoordinator::with_config(config);
    let options = ExecuteOptions::from(config).with_force(args.force);
    let client = reqwest::Client::new();

    for i in 1..=args.repeat {
        let started = Instant::now();
        let producer = {
            let (client, url, payload) = (client.clone(), args.url.clone(), payload.clone());
            move || call(client, url, payload)
        };

        match coordinator
            .execute_traced(&args.url, &key_payload, producer, options)
            .await
        {
            Ok(resolved) => println!(
                "#{:<3} {:<10} {:>8.1?}  {}",
                i,
                resolved.resolution,
                started.elapsed(),
                summarize(&resolved.value, 80)
            ),
            Err(error) => println!(
                "#{:<3} {:<10} {:>8.1?}  {}",
                i,
                "failed",
                started.elapsed(),
                error
            ),
        }

        if i < args.repeat && args.interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    let stats = coordinator.stats();
    println!(
        "\nhits={} joins={} throttled={} dispatches={} failures={}",
        stats.hits, stats.joins, stats.throttled, stats.dispatches, stats.failures
    );

    Ok(())
}
