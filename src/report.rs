//! Mailbox usage report.
//!
//! Walks every domain, asks for the largest mailboxes and renders them either
//! for people or as `address,bytes` lines for scripts.

use std::io::Write;

use anyhow::{Context, Result};
use mailadmin_rpc::admin::AdminApi;
use mailadmin_rpc::models::{Domain, ListPage, User};
use mailadmin_rpc::SessionClient;
use tracing::{debug, warn};

/// Output flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    /// One `address,bytes` line per user.
    Scripted,
}

/// Collect the report for every domain and write it to `out`.
pub async fn run<W: Write>(
    session: &mut SessionClient,
    limit: u64,
    format: ReportFormat,
    out: &mut W,
) -> Result<()> {
    let mut api = AdminApi::new(session);
    let domains = api.domains(&["id", "name"]).await?;
    debug!("Reporting on {} domains", domains.len());

    for domain in &domains {
        let page = api.top_users_by_usage(&domain.id, limit).await?;
        write_domain(out, domain, &page, format)?;
    }
    Ok(())
}

/// Write the lines for one domain and flush them.
pub fn write_domain<W: Write>(
    out: &mut W,
    domain: &Domain,
    page: &ListPage<User>,
    format: ReportFormat,
) -> Result<()> {
    for line in domain_lines(domain, page, format) {
        writeln!(out, "{}", line).context("Failed to write report")?;
    }
    out.flush().context("Failed to write report")
}

/// Lines for one domain.
pub fn domain_lines(domain: &Domain, page: &ListPage<User>, format: ReportFormat) -> Vec<String> {
    let mut lines = Vec::new();
    if format == ReportFormat::Human {
        lines.push(format!(" - Domain {}", domain.name));
    }

    if page.total_items == 0 || page.list.is_empty() {
        if format == ReportFormat::Human {
            lines.push("   ! No users in this domain.\n".to_string());
        }
        return lines;
    }

    lines.extend(
        page.list
            .iter()
            .map(|user| user_line(user, &domain.name, format)),
    );
    lines
}

fn user_line(user: &User, domain: &str, format: ReportFormat) -> String {
    let address = user.address(domain);
    match format {
        ReportFormat::Human => {
            let (value, units) = user
                .consumed_size
                .map(|size| (size.value, size.units.as_str()))
                .unwrap_or((0.0, "Bytes"));
            format!(
                "   * {} ({}) consumes {} {}.",
                address, user.full_name, value as i64, units
            )
        }
        ReportFormat::Scripted => {
            let bytes = match user.consumed_size {
                Some(size) => size.bytes().unwrap_or_else(|| {
                    warn!("Unknown size unit for {}, reporting 0 bytes", address);
                    0
                }),
                None => 0,
            };
            format!("{},{}", address, bytes)
        }
    }
}
