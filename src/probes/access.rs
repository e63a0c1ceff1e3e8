use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;

use super::{FnProbe, ProbeBuilder, ProbeCheck, ProbeContext, ProbeDetail, SecurityControl};

pub const ADMIN_PATHS: &[&str] = &[
    "/admin",
    "/admin/",
    "/wp-admin/",
    "/phpmyadmin/",
    "/actuator",
    "/console",
    "/manage",
];

pub const SENSITIVE_PATHS: &[&str] = &[
    "/.env",
    "/.git/config",
    "/.aws/credentials",
    "/config.json",
    "/backup.sql",
    "/server-status",
];

pub const LISTING_PATHS: &[&str] = &["/", "/static/", "/uploads/", "/images/"];

const LISTING_MARKERS: &[&str] = &["Index of /", "Directory listing for", "<title>Index of"];

/// Requests every path and collects the ones answered with `exposed(status, body)`.
async fn scan_paths<F>(ctx: &ProbeContext, paths: &[&str], exposed: F) -> anyhow::Result<(u32, Vec<String>)>
where
    F: Fn(StatusCode, &str) -> bool,
{
    let mut checked = 0u32;
    let mut found = Vec::new();

    for path in paths {
        if ctx.abort.is_aborted() {
            anyhow::bail!(
                "interrupted by emergency stop after {} of {} paths",
                checked,
                paths.len()
            );
        }
        let url = ctx.url(path)?;
        let response = ctx.get(url).await.with_context(|| format!("GET {}", path))?;
        checked += 1;

        let status = response.status();
        let body = if status.is_success() {
            response.text().await.with_context(|| format!("reading body of {}", path))?
        } else {
            String::new()
        };
        if exposed(status, &body) {
            found.push(path.to_string());
        }
    }
    Ok((checked, found))
}

fn access_check(checked: u32, exposed: Vec<String>) -> ProbeCheck {
    ProbeCheck::new(exposed.is_empty(), ProbeDetail::AccessControl { checked, exposed })
}

/// Administrative consoles must not answer unauthenticated requests.
pub fn admin_endpoints(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("admin-endpoints")
        .control(SecurityControl::AccessRestriction)
        .timeout(timeout)
        .run(|ctx| async move {
            let (checked, exposed) = scan_paths(&ctx, ADMIN_PATHS, |status, _| status.is_success()).await?;
            Ok(access_check(checked, exposed))
        })
}

/// Secrets and backups must not be downloadable.
pub fn sensitive_files(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("sensitive-files")
        .control(SecurityControl::AccessRestriction)
        .timeout(timeout)
        .run(|ctx| async move {
            let (checked, exposed) = scan_paths(&ctx, SENSITIVE_PATHS, |status, body| {
                status.is_success() && !body.trim().is_empty()
            })
            .await?;
            Ok(access_check(checked, exposed))
        })
}

/// Web server directory indexes must be disabled.
pub fn directory_listing(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("directory-listing")
        .control(SecurityControl::AccessRestriction)
        .timeout(timeout)
        .run(|ctx| async move {
            let (checked, exposed) = scan_paths(&ctx, LISTING_PATHS, |status, body| {
                status.is_success() && LISTING_MARKERS.iter().any(|m| body.contains(m))
            })
            .await?;
            Ok(access_check(checked, exposed))
        })
}
