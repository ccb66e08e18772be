use std::time::Duration;

use clap::Parser;
use nomad_events::{EventTypeList, FilterConfig};

/// Forwards Nomad allocation task events to Discord webhooks.
#[derive(Debug, Clone, Parser)]
#[command(name = "nomad_relay")]
#[command(version)]
pub struct Args {
    /// Nomad HTTP API address.
    #[arg(long, env = "NOMAD_ADDR", default_value = "http://localhost:4646")]
    pub nomad_addr: String,

    /// ACL token sent as `X-Nomad-Token`.
    #[arg(long, env = "NOMAD_TOKEN", hide_env_values = true)]
    pub nomad_token: Option<String>,

    /// Namespace filter for the event stream (`*` for all namespaces).
    #[arg(long, env = "NOMAD_NAMESPACE", default_value = "*")]
    pub namespace: String,

    /// Discord webhook URL; repeat the flag or comma-separate to fan out.
    #[arg(
        long = "webhook-url",
        env = "DISCORD_WEBHOOK_URL",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub webhook_urls: Vec<String>,

    /// Task event types to notify about (comma-separated). Empty allows all.
    #[arg(long = "allow", env = "TASK_EVENT_TYPE_ALLOWLIST", default_value = "")]
    pub allowlist: String,

    /// Task event types never notified about (comma-separated). Wins over `--allow`.
    #[arg(long = "deny", env = "TASK_EVENT_TYPE_DENYLIST", default_value = "")]
    pub denylist: String,

    /// Exit when no heartbeat arrives for this many seconds. 0 disables the watchdog.
    #[arg(long, env = "HEARTBEAT_TIMEOUT_SECS")]
    pub heartbeat_timeout_secs: Option<u64>,
}

impl Args {
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            allowlist: EventTypeList::parse(&self.allowlist),
            denylist: EventTypeList::parse(&self.denylist),
        }
    }

    pub fn webhook_urls(&self) -> Vec<String> {
        self.webhook_urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn heartbeat_timeout(&self) -> Option<Duration> {
        self.heartbeat_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_filter_config() {
        let args = Args::try_parse_from([
            "nomad_relay",
            "--nomad-addr",
            "http://nomad:4646",
            "--allow",
            "Terminated, Restart Signaled",
            "--deny",
            "Received",
            "--webhook-url",
            "https://a.example/hook, https://b.example/hook",
            "--heartbeat-timeout-secs",
            "60",
        ])
        .unwrap();

        let config = args.filter_config();
        assert!(config.allowlist.contains("Restart Signaled"));
        assert!(config.denylist.contains("Received"));
        assert_eq!(
            args.webhook_urls(),
            vec!["https://a.example/hook", "https://b.example/hook"]
        );
        assert_eq!(args.heartbeat_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_timeout_disables_watchdog() {
        let args =
            Args::try_parse_from(["nomad_relay", "--heartbeat-timeout-secs", "0"]).unwrap();
        assert_eq!(args.heartbeat_timeout(), None);
    }
}
