//! Reachability probe command

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::time::Duration;
use url::Url;
use verifier_lib::{PollConfig, ReachabilityPoller};

use crate::output::{print_info, print_json, print_success, OutputFormat};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ProbeSummary<'a> {
    url: &'a str,
    reachable: bool,
    attempts: u32,
}

fn parse_target(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Unsupported URL scheme '{}', expected http or https", url.scheme());
    }
    Ok(url)
}

/// Poll `url` until it answers 200 with `expect` in the body
pub async fn probe_url(
    url: &str,
    expect: &str,
    attempts: u32,
    interval: Duration,
    format: OutputFormat,
) -> Result<()> {
    let target = parse_target(url)?;
    let poll = PollConfig {
        max_attempts: attempts,
        interval,
        ..PollConfig::default()
    };
    let poller =
        ReachabilityPoller::http(poll, PROBE_TIMEOUT).context("Failed to create HTTP probe")?;

    if matches!(format, OutputFormat::Table) {
        print_info(&format!(
            "Polling {} up to {} times every {}s",
            target,
            attempts,
            interval.as_secs()
        ));
    }

    let used = poller.poll_until_reachable(target.as_str(), expect).await?;

    match format {
        OutputFormat::Json => print_json(&ProbeSummary {
            url: target.as_str(),
            reachable: true,
            attempts: used,
        })?,
        OutputFormat::Table => {
            print_success(&format!("{} reachable after {} attempt(s)", target, used));
        }
    }

    Ok(())
}
