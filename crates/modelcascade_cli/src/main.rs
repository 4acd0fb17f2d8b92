//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `modelcascade_core` linkage with deterministic output.
//! - Dump the first Object Lake page of a database as JSON when given a path.
//!
//! Usage: `modelcascade_cli [DB_PATH]`. Without an argument the path falls
//! back to `MODELCASCADE_DB_PATH`; without either only the ping and version lines print.

use log::info;
use modelcascade_core::{
    core_version, init_logging_from_config, open_db_with_timeout, ping, CoreConfig, LakeFilters,
    ServiceContext,
};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("modelcascade_core ping={}", ping());
    println!("modelcascade_core version={}", core_version());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    init_logging_from_config(&config).map_err(|err| err.to_string())?;

    let Some(db_path) = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.db_path.clone())
    else {
        return Ok(());
    };

    let conn = open_db_with_timeout(&db_path, config.busy_timeout()).map_err(|err| err.to_string())?;
    let ctx = ServiceContext::new(&conn).with_page_limits(config.page_limits());
    let response = ctx
        .lake()
        .query_object_lake(&LakeFilters::default())
        .map_err(|err| err.to_string())?;
    info!(
        "event=cli_lake_dump module=cli status=ok objects={} total={}",
        response.objects.len(),
        response.meta.total_count
    );

    let rendered = serde_json::to_string_pretty(&response).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(())
}
