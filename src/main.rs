//!
//! rolesync binary
//! ---------------
//! Copies one security role from the source cluster to the destination cluster,
//! rewriting Kibana space resources through the configured space map.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use rolesync::{AppConfig, ClusterSession, RoleSyncOrchestrator, RoleTransformer};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--role <name>] [--space-map-file <path> | --space-map <json>] [--empty-applications keep|exclude_role] [--timeout-secs N] [--dry-run]\n\nEnvironment:\n  SOURCE_ES_HOST, SOURCE_ES_API_KEY    source cluster URL and API key (required)\n  DEST_ES_HOST, DEST_ES_API_KEY        destination cluster URL and API key (required)\n  ROLE_NAME                            role to copy (default my_role)\n  ROLESYNC_SPACE_MAP                   inline JSON space map, e.g. {{\"space1\": \"*\", \"space2\": \"!\"}}\n  ROLESYNC_SPACE_MAP_FILE              path to a JSON space map (wins over ROLESYNC_SPACE_MAP)\n  ROLESYNC_EMPTY_APPLICATIONS          keep (default) | exclude_role\n  ROLESYNC_TIMEOUT_SECS                HTTP request timeout (default 30)\n  ROLESYNC_DRY_RUN                     print the body instead of writing it\n\nSpace map values:\n  \"!\"      drop every Kibana grant that references the space\n  \"*\"      replace the space with space:*\n  <id>     rename the space to <id>\n\nCommand-line flags override the environment."
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid RUST_LOG filter")?;
    fmt().with_env_filter(filter).init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "rolesync".to_string());
    let args: Vec<String> = args.collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(&program);
        return Ok(());
    }

    let cfg = AppConfig::load(&args)?;
    info!(
        target: "rolesync",
        "rolesync starting: role='{}', source={}, destination={}, mapped_spaces={}, empty_applications={:?}, dry_run={}",
        cfg.role_name, cfg.source.host, cfg.destination.host, cfg.space_map.len(), cfg.empty_applications, cfg.dry_run
    );

    let source = ClusterSession::connect(&cfg.source).context("connecting to source cluster")?;
    let dest = match ClusterSession::connect(&cfg.destination) {
        Ok(d) => d,
        Err(e) => {
            source.close();
            return Err(e.context("connecting to destination cluster"));
        }
    };

    let outcome = {
        let transformer = RoleTransformer::new(&cfg.space_map).with_empty_policy(cfg.empty_applications);
        let orchestrator = RoleSyncOrchestrator::new(&source, &dest, transformer).with_dry_run(cfg.dry_run);
        orchestrator.sync_role(&cfg.role_name).await
    };

    source.close();
    dest.close();

    if outcome.is_failed() {
        std::process::exit(1);
    }
    Ok(())
}
