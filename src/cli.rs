use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Url;
use std::path::PathBuf;
use timekeeper_config::Role;
use timekeeper_model::{MAX_PAGE_SIZE, ScanId, Status};

/// Submits URLs to an external scanner and tracks the results.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, global = true, env = "TIMEKEEPER_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the sweepers until interrupted.
    Run {
        /// Sweeper to run; repeat for both. Defaults to the configured roles.
        #[arg(long = "role")]
        roles: Vec<Role>,
    },
    /// Run a single sweep and exit.
    Sweep {
        #[arg(value_enum)]
        kind: SweepKind,
    },
    /// Request a scan of a URL.
    Create {
        #[arg(long)]
        user: String,
        #[arg(value_parser = parse_url)]
        url: String,
    },
    /// Show one of a user's scans.
    Get {
        #[arg(long)]
        user: String,
        #[arg(value_parser = parse_scan_id)]
        id: ScanId,
    },
    /// List a user's scans, newest first.
    List {
        #[arg(long)]
        user: String,
        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,
        #[arg(long, default_value_t = 0)]
        page: u32,
        /// Capped at 20.
        #[arg(long, default_value_t = MAX_PAGE_SIZE)]
        page_size: u32,
    },
    /// Delete one of a user's scans.
    Delete {
        #[arg(long)]
        user: String,
        #[arg(value_parser = parse_scan_id)]
        id: ScanId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SweepKind {
    /// Send newly requested scans to the provider.
    Submission,
    /// Poll the provider for finished scans.
    Status,
}

/// Only absolute http(s) URLs can be scanned.
fn parse_url(value: &str) -> Result<String, String> {
    let url = Url::parse(value.trim()).map_err(|err| format!("invalid URL: {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {:?}, expected http or https", url.scheme()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err("URL has no host".to_string());
    }
    Ok(url.to_string())
}

fn parse_scan_id(value: &str) -> Result<ScanId, String> {
    value
        .trim()
        .parse::<i64>()
        .map(ScanId::from)
        .map_err(|err| format!("invalid scan ID: {err}"))
}

fn parse_status(value: &str) -> Result<Status, String> {
    value.parse::<Status>().map_err(|_| {
        let expected: Vec<String> = Status::ALL.iter().map(|status| status.as_str().to_ascii_lowercase()).collect();
        format!("unknown status {value:?}, expected one of {}", expected.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.com", "https://example.com/")]
    #[case("http://example.com/path?q=1", "http://example.com/path?q=1")]
    #[case("  https://EXAMPLE.com/a  ", "https://example.com/a")]
    fn test_valid_urls(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse_url(input).unwrap(), expected);
    }

    #[rstest]
    #[case("example.com")]
    #[case("ftp://example.com")]
    #[case("file:///etc/passwd")]
    #[case("javascript:alert(1)")]
    #[case("")]
    fn test_invalid_urls(#[case] input: &str) {
        assert!(parse_url(input).is_err());
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from([
            "timekeeper",
            "list",
            "--user",
            "alice",
            "--status",
            "failed",
            "--page-size",
            "50",
        ])
        .unwrap();
        let Command::List {
            user,
            status,
            page,
            page_size,
        } = cli.command
        else {
            panic!("expected the list command");
        };
        assert_eq!(user, "alice");
        assert_eq!(status, Some(Status::Failed));
        assert_eq!(page, 0);
        assert_eq!(page_size, 50);
    }

    #[test]
    fn test_parse_run_roles() {
        let cli = Cli::try_parse_from(["timekeeper", "run", "--role", "poller", "--role", "submitter"]).unwrap();
        let Command::Run { roles } = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(roles, vec![Role::Poller, Role::Submitter]);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["timekeeper", "get", "--user", "alice", "abc"]).is_err());
        assert!(Cli::try_parse_from(["timekeeper", "run", "--role", "sweeper"]).is_err());
        assert!(Cli::try_parse_from(["timekeeper", "create", "--user", "alice", "ftp://example.com"]).is_err());
        assert!(Cli::try_parse_from(["timekeeper", "list", "--user", "alice", "--status", "queued"]).is_err());
    }

    #[test]
    fn test_unknown_status_lists_choices() {
        assert_eq!(
            parse_status("queued").unwrap_err(),
            r#"unknown status "queued", expected one of submitted, processing, done, failed"#
        );
    }
}
