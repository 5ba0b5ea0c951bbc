// ⚙️ Config - command-line/environment settings shared by both binaries

use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_DATA_PATH: &str = "fisio-clinic.db";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Where the clinic's local storage file lives
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// SQLite file holding the stored collections
    #[arg(long, env = "FISIO_DATA", default_value = DEFAULT_DATA_PATH, global = true)]
    pub data: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Address the HTTP server listens on
    #[arg(long, env = "FISIO_BIND", default_value = DEFAULT_BIND)]
    pub bind: String,

    #[command(flatten)]
    pub data: DataArgs,
}

/// Install env_logger. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

/// Local calendar date
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        server: ServerArgs,
    }

    #[test]
    fn test_defaults() {
        std::env::remove_var("FISIO_DATA");
        std::env::remove_var("FISIO_BIND");
        let cli = TestCli::try_parse_from(["fisio-server"]).unwrap();
        assert_eq!(cli.server.bind, DEFAULT_BIND);
        assert_eq!(cli.server.data.data, PathBuf::from(DEFAULT_DATA_PATH));
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::try_parse_from([
            "fisio-server",
            "--bind",
            "0.0.0.0:8080",
            "--data",
            "/tmp/clinic.db",
        ])
        .unwrap();
        assert_eq!(cli.server.bind, "0.0.0.0:8080");
        assert_eq!(cli.server.data.data, PathBuf::from("/tmp/clinic.db"));
    }
}
