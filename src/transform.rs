//! Rewrites the Kibana application grants of a role for the destination space layout.
//!
//! Each `space:<id>` resource of a Kibana grant is looked up in the space map:
//! `"*"` widens it to `space:*`, any other value renames it, a missing id is kept, and
//! `"!"` drops the entire grant. Exclusion stops the walk over that grant's resources,
//! so nothing after the excluded space is examined.

use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::TransformPrecondition;
use crate::role::{ApplicationGrant, RoleDocument};
use crate::space::{self, SpaceMappingTable};

/// What to do with a role whose grants were all excluded, leaving `applications` empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyApplicationsPolicy {
    /// Write the role with `applications: []`.
    #[default]
    Keep,
    /// Do not write the role at all.
    ExcludeRole,
}

impl FromStr for EmptyApplicationsPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(EmptyApplicationsPolicy::Keep),
            "exclude_role" | "exclude-role" | "exclude" => Ok(EmptyApplicationsPolicy::ExcludeRole),
            other => Err(anyhow!("unknown empty applications policy '{}' (expected keep|exclude_role)", other)),
        }
    }
}

pub struct RoleTransformer<'a> {
    space_map: &'a SpaceMappingTable,
    empty_policy: EmptyApplicationsPolicy,
}

impl<'a> RoleTransformer<'a> {
    pub fn new(space_map: &'a SpaceMappingTable) -> Self {
        Self { space_map, empty_policy: EmptyApplicationsPolicy::default() }
    }

    pub fn with_empty_policy(mut self, policy: EmptyApplicationsPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Returns None when the whole role should be skipped; that only happens under
    /// `EmptyApplicationsPolicy::ExcludeRole`.
    pub fn transform(&self, mut role: RoleDocument) -> Result<Option<RoleDocument>, TransformPrecondition> {
        let Some(apps) = role.applications_mut() else { return Ok(Some(role)); };
        let Value::Array(grants) = apps else { return Err(TransformPrecondition::ApplicationsNotArray); };

        let mut kept: Vec<Value> = Vec::with_capacity(grants.len());
        let mut excluded = 0usize;
        for (index, mut grant) in std::mem::take(grants).into_iter().enumerate() {
            let mut view = ApplicationGrant::new(index, &mut grant)?;
            if !view.is_kibana() {
                kept.push(grant);
                continue;
            }
            match self.rewrite_resources(&view)? {
                Some(resources) => {
                    view.set_resources(resources);
                    kept.push(grant);
                }
                None => {
                    debug!(target: "rolesync::transform", "excluding grant #{} application='{}'", index, view.application());
                    excluded += 1;
                }
            }
        }
        let all_excluded = kept.is_empty() && excluded > 0;
        *grants = kept;

        if all_excluded && self.empty_policy == EmptyApplicationsPolicy::ExcludeRole {
            debug!(target: "rolesync::transform", "every application grant excluded; dropping role");
            return Ok(None);
        }
        Ok(Some(role))
    }

    /// New resource list for a Kibana grant, or None if the grant is excluded.
    fn rewrite_resources(&self, grant: &ApplicationGrant<'_>) -> Result<Option<Vec<String>>, TransformPrecondition> {
        let items = grant.resources()?;
        let mut out: Vec<String> = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let Some(resource) = item.as_str() else {
                return Err(TransformPrecondition::ResourceNotString { application: grant.application().to_string(), index });
            };
            let Some(id) = space::space_id(resource) else {
                out.push(resource.to_string());
                continue;
            };
            match space::decide(id, self.space_map).rewrite(resource) {
                Some(r) => out.push(r),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
