//! Tests for command line argument parsing

use std::path::PathBuf;

use clap::Parser;
use swr_coupler::cli::commands::swr::RetentionArg;
use swr_coupler::cli::{Cli, Commands};
use swr_coupler::domain::models::{Config, RetentionPolicy};
use swr_coupler::domain::parse_timestamp;

#[test]
fn test_swr_defaults_come_from_config() {
    let cli = Cli::try_parse_from(["swr-coupler", "swr", "papa.yaml"]).unwrap();
    match cli.command {
        Commands::Swr(args) => {
            assert_eq!(args.experiment, PathBuf::from("papa.yaml"));
            let config = Config::default();
            let params = args.params(&config);
            assert_eq!(params.max_iters, 30);
            assert_eq!(params.rel_tol, 1e-5);
            assert!(params.stop_at_convergence);
            assert_eq!(args.retention(&config), RetentionPolicy::KeepAll);
        }
        other => panic!("expected swr command, got {other:?}"),
    }
    assert!(!cli.json);
    assert!(cli.config.is_none());
}

#[test]
fn test_swr_overrides() {
    let cli = Cli::try_parse_from([
        "swr-coupler",
        "swr",
        "papa.yaml",
        "--max-iters",
        "12",
        "--rel-tol",
        "1e-4",
        "--no-stop-at-convergence",
        "--retention",
        "keep-first-and-final",
    ])
    .unwrap();
    match cli.command {
        Commands::Swr(args) => {
            assert_eq!(args.retention, Some(RetentionArg::KeepFirstAndFinal));
            let config = Config::default();
            let params = args.params(&config);
            assert_eq!(params.max_iters, 12);
            assert_eq!(params.rel_tol, 1e-4);
            assert!(!params.stop_at_convergence);
            assert_eq!(args.retention(&config), RetentionPolicy::KeepFirstAndFinal);
        }
        other => panic!("expected swr command, got {other:?}"),
    }
}

#[test]
fn test_swr_requires_experiment() {
    assert!(Cli::try_parse_from(["swr-coupler", "swr"]).is_err());
}

#[test]
fn test_unknown_retention_is_rejected() {
    let result = Cli::try_parse_from(["swr-coupler", "swr", "papa.yaml", "--retention", "keep-some"]);
    assert!(result.is_err());
}

#[test]
fn test_naive_command() {
    let cli = Cli::try_parse_from(["swr-coupler", "naive", "exp/papa.yaml"]).unwrap();
    match cli.command {
        Commands::Naive(args) => assert_eq!(args.experiment, PathBuf::from("exp/papa.yaml")),
        other => panic!("expected naive command, got {other:?}"),
    }
}

#[test]
fn test_offset_command_parses_timestamps() {
    let cli = Cli::try_parse_from([
        "swr-coupler",
        "offset",
        "--target",
        "2014-07-01 18:00",
        "--forcing-start",
        "2014-07-01T00:00:00",
        "--frequency-hours",
        "6",
    ])
    .unwrap();
    match cli.command {
        Commands::Offset(args) => {
            assert_eq!(args.target, parse_timestamp("2014-07-01T18:00:00").unwrap());
            assert_eq!(args.forcing_start, parse_timestamp("2014-07-01T00:00").unwrap());
            assert_eq!(args.frequency_hours, 6);
        }
        other => panic!("expected offset command, got {other:?}"),
    }
}

#[test]
fn test_offset_rejects_bad_timestamp() {
    let result = Cli::try_parse_from([
        "swr-coupler",
        "offset",
        "--target",
        "yesterday",
        "--forcing-start",
        "2014-07-01T00:00",
        "--frequency-hours",
        "6",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_summary_root_is_optional() {
    let cli = Cli::try_parse_from(["swr-coupler", "summary"]).unwrap();
    match cli.command {
        Commands::Summary(args) => assert!(args.root.is_none()),
        other => panic!("expected summary command, got {other:?}"),
    }

    let cli = Cli::try_parse_from(["swr-coupler", "summary", "/scratch/ensemble"]).unwrap();
    match cli.command {
        Commands::Summary(args) => assert_eq!(args.root, Some(PathBuf::from("/scratch/ensemble"))),
        other => panic!("expected summary command, got {other:?}"),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "swr-coupler",
        "naive",
        "papa.yaml",
        "--json",
        "--config",
        "site.yaml",
    ])
    .unwrap();
    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("site.yaml")));
}
