use clap::Parser;

use crate::game::DEFAULT_K_FACTOR;

/// Server settings, from the command line or the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "chess_arena")]
#[command(about = "Two-player chess games with Elo ratings over HTTP")]
pub struct ServerConfig {
    /// HTTP listen address.
    #[arg(long, env = "CHESS_BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// Elo K-factor applied when a rated game finishes.
    #[arg(
        long,
        env = "CHESS_K_FACTOR",
        default_value_t = DEFAULT_K_FACTOR,
        value_parser = clap::value_parser!(i32).range(1..=400)
    )]
    pub k_factor: i32,

    /// Number of HTTP worker threads. Defaults to one per core.
    #[arg(long, env = "CHESS_WORKERS")]
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["chess_arena"]).unwrap();
        assert_eq!(config.k_factor, 32);
        assert!(config.workers.is_none());
    }

    #[test]
    fn test_k_factor_range() {
        let config =
            ServerConfig::try_parse_from(["chess_arena", "--k-factor", "16", "--workers", "2"])
                .unwrap();
        assert_eq!(config.k_factor, 16);
        assert_eq!(config.workers, Some(2));
        assert!(ServerConfig::try_parse_from(["chess_arena", "--k-factor", "0"]).is_err());
    }
}
