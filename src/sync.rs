//! One-shot migration of a single role: fetch from the source cluster, rewrite its
//! Kibana spaces, write it to the destination.
//!
//! Every run ends in exactly one `SyncOutcome`. Collaborator failures are returned as
//! `SyncOutcome::Failed` with the stage they happened in; nothing is retried.

use std::fmt::{Display, Formatter};

use tracing::{error, info};

use crate::cluster::{RoleReader, RoleWriter, WriteResult};
use crate::error::SyncError;
use crate::role::RoleDocument;
use crate::transform::RoleTransformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    Fetching,
    Transforming,
    Writing,
}

impl Display for SyncStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStage::Fetching => "fetch",
            SyncStage::Transforming => "transform",
            SyncStage::Writing => "write",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum SyncOutcome {
    Done(WriteResult),
    /// Transformation excluded the whole role; nothing was written.
    Skipped,
    /// Body that would have been written.
    DryRun(RoleDocument),
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_failed(&self) -> bool { matches!(self, SyncOutcome::Failed(_)) }
}

pub struct RoleSyncOrchestrator<'a, R: ?Sized, W: ?Sized> {
    source: &'a R,
    dest: &'a W,
    transformer: RoleTransformer<'a>,
    dry_run: bool,
}

impl<'a, R, W> RoleSyncOrchestrator<'a, R, W>
where
    R: RoleReader + ?Sized,
    W: RoleWriter + ?Sized,
{
    pub fn new(source: &'a R, dest: &'a W, transformer: RoleTransformer<'a>) -> Self {
        Self { source, dest, transformer, dry_run: false }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn sync_role(&self, role_name: &str) -> SyncOutcome {
        match self.run(role_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("[!] Sync failed for {} during {}: {}", role_name, e.stage(), e);
                error!(target: "rolesync::sync", role = role_name, stage = %e.stage(), "sync failed: {}", e);
                SyncOutcome::Failed(e)
            }
        }
    }

    async fn run(&self, role_name: &str) -> Result<SyncOutcome, SyncError> {
        println!("[*] Fetching permissions for: {}", role_name);
        let role = self
            .source
            .get_role_permissions(role_name)
            .await
            .map_err(|source| SyncError::Fetch { role: role_name.to_string(), source })?;
        info!(target: "rolesync::sync", role = role_name, fields = role.as_map().len(), "fetched role");

        println!("[*] Rewriting Kibana spaces for: {}", role_name);
        let transformed = self
            .transformer
            .transform(role)
            .map_err(|source| SyncError::Precondition { role: role_name.to_string(), source })?;
        let Some(transformed) = transformed else {
            println!("[-] Skipping {}: every application grant was excluded", role_name);
            info!(target: "rolesync::sync", role = role_name, "role excluded; nothing written");
            return Ok(SyncOutcome::Skipped);
        };

        let body = transformed.strip_cluster_managed();
        if self.dry_run {
            let rendered = serde_json::to_string_pretty(&body).unwrap_or_default();
            println!("[*] Dry run, not writing {}:\n{}", role_name, rendered);
            return Ok(SyncOutcome::DryRun(body));
        }

        println!("[*] Applying permissions to destination...");
        let result = self
            .dest
            .update_role(role_name, body)
            .await
            .map_err(|source| SyncError::Write { role: role_name.to_string(), source })?;
        let verb = if result.created { "created" } else { "updated" };
        println!("[+] Successfully synced role: {} ({})", role_name, verb);
        info!(target: "rolesync::sync", role = role_name, created = result.created, "role written");
        Ok(SyncOutcome::Done(result))
    }
}
