//! Command line

use std::path::PathBuf;

use ax25_modem::RadioMode;
use clap::Parser;

/// Gateway between AX.25/APRS packet radio and IRC
#[derive(Debug, Parser)]
#[command(name = "ax25irc", version, about)]
pub struct Cli {
    /// Radio mode: kiss, rtlfm, stdin or sound
    pub mode: Option<RadioMode>,

    /// Backend configuration: KISS `host:port` or `device[@baud]`, RTL_FM
    /// frequency, or the SOUND modem command line
    pub backend: Option<String>,

    /// IRC listen address
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Remove RF stations silent for this long
    #[arg(long, value_name = "MS")]
    pub idle_timeout_ms: Option<u64>,

    /// Nick allowed to use #CONTROL (repeatable)
    #[arg(long = "operator", value_name = "NICK")]
    pub operators: Vec<String>,

    /// Digipeater path for originated APRS packets, comma separated
    #[arg(long, value_name = "PATH", value_delimiter = ',')]
    pub aprs_path: Vec<String>,

    /// Settings file (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// List serial ports and exit
    #[arg(long)]
    pub list_ports: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "ax25irc",
            "kiss",
            "/dev/ttyUSB0@1200",
            "--listen",
            "127.0.0.1:6697",
            "--idle-timeout-ms",
            "60000",
            "--operator",
            "alice",
            "--operator",
            "KB1ABC",
            "--aprs-path",
            "WIDE2-2,RELAY",
        ])
        .unwrap();

        assert_eq!(cli.mode, Some(RadioMode::Kiss));
        assert_eq!(cli.backend.as_deref(), Some("/dev/ttyUSB0@1200"));
        assert_eq!(cli.listen.as_deref(), Some("127.0.0.1:6697"));
        assert_eq!(cli.idle_timeout_ms, Some(60_000));
        assert_eq!(cli.operators, vec!["alice", "KB1ABC"]);
        assert_eq!(cli.aprs_path, vec!["WIDE2-2", "RELAY"]);
    }

    #[test]
    fn test_mode_names() {
        let cli = Cli::try_parse_from(["ax25irc", "RTL_FM", "144.800M"]).unwrap();
        assert_eq!(cli.mode, Some(RadioMode::RtlFm));
        assert!(Cli::try_parse_from(["ax25irc", "morse"]).is_err());
    }

    #[test]
    fn test_list_ports_needs_no_mode() {
        let cli = Cli::try_parse_from(["ax25irc", "--list-ports"]).unwrap();
        assert!(cli.list_ports);
        assert_eq!(cli.mode, None);
    }
}
