//! `enrich-contacts`: run or inspect contact enrichment for one owner.
//!
//! Usage:
//!   enrich-contacts run <owner-id> [--force]
//!   enrich-contacts status <owner-id>

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use contact_enrichment::apollo::ApolloClient;
use contact_enrichment::db::EnrichmentDb;
use contact_enrichment::enrichment::{BatchResult, RunOptions};
use contact_enrichment::provider::IdentityProvider;
use contact_enrichment::state::{spawn_enrichment_run, RunRegistry, RunStatus};
use contact_enrichment::types::{load_config, Config};

const USAGE: &str = "Usage:\n  enrich-contacts run <owner-id> [--force]\n  enrich-contacts status <owner-id>";

enum Command {
    Run { owner_id: String, force: bool },
    Status { owner_id: String },
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args {
        [cmd, owner_id, rest @ ..] if cmd == "run" => {
            let mut force = false;
            for flag in rest {
                match flag.as_str() {
                    "--force" | "-f" => force = true,
                    other => return Err(format!("Unknown flag: {}", other)),
                }
            }
            Ok(Command::Run { owner_id: owner_id.clone(), force })
        }
        [cmd, owner_id] if cmd == "status" => Ok(Command::Status { owner_id: owner_id.clone() }),
        _ => Err(USAGE.to_string()),
    }
}

fn db_path(config: &Config) -> Result<PathBuf, String> {
    match &config.database_path {
        Some(path) => Ok(path.clone()),
        None => EnrichmentDb::db_path().map_err(|e| e.to_string()),
    }
}

fn print_result(result: &BatchResult) {
    println!(
        "total={} enriched={} skipped={} errors={} credits_used={} cache_hits={} organizations_enriched={}",
        result.total,
        result.enriched,
        result.skipped,
        result.errors,
        result.credits_used,
        result.cache_hits,
        result.organizations_enriched
    );
    if let Some(message) = &result.error_message {
        println!("{}", message);
    }
}

fn run(owner_id: String, force: bool, config: Config) -> Result<(), String> {
    let client = ApolloClient::new(&config.apollo)
        .map_err(|e| format!("{} ({})", e, e.recovery_suggestion()))?;
    let provider: Arc<dyn IdentityProvider> = Arc::new(client);

    let db_path = db_path(&config)?;
    let registry = Arc::new(RunRegistry::new());
    let options = RunOptions { force, settings: config.enrichment };
    let join = spawn_enrichment_run(db_path, provider, Arc::clone(&registry), owner_id.clone(), options)
        .map_err(|e| e.to_string())?;

    join.join().map_err(|_| "Enrichment thread panicked".to_string())?;

    let snapshot = registry
        .snapshot(&owner_id)
        .ok_or_else(|| "Run finished without a snapshot".to_string())?;
    print_result(&snapshot.result);
    match snapshot.status {
        RunStatus::Failed => Err(snapshot.failure.unwrap_or_else(|| "Run failed".to_string())),
        _ => Ok(()),
    }
}

fn status(owner_id: &str, config: &Config) -> Result<(), String> {
    let db = EnrichmentDb::open_at(db_path(config)?).map_err(|e| e.to_string())?;
    let coverage = db.enrichment_coverage(owner_id).map_err(|e| e.to_string())?;
    println!(
        "owner={} total={} never_attempted={} matched={} no_match={}",
        owner_id, coverage.total, coverage.never_attempted, coverage.matched, coverage.no_match
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match command {
        Command::Run { owner_id, force } => run(owner_id, force, config),
        Command::Status { owner_id } => status(&owner_id, &config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_run_with_force() {
        match parse_args(&args(&["run", "u1", "--force"])).expect("parse") {
            Command::Run { owner_id, force } => {
                assert_eq!(owner_id, "u1");
                assert!(force);
            }
            Command::Status { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_status() {
        assert!(matches!(
            parse_args(&args(&["status", "u1"])).expect("parse"),
            Command::Status { owner_id } if owner_id == "u1"
        ));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["run"])).is_err());
        assert!(parse_args(&args(&["run", "u1", "--turbo"])).is_err());
        assert!(parse_args(&args(&["status", "u1", "extra"])).is_err());
    }
}
