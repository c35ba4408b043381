//! Provider feature matrix (Markdown)

use super::{Capability, CapabilityFlag, CapabilityRegistry};

/// Column heading and the capability behind it, in display order
const COLUMNS: &[(&str, Capability)] = &[
    ("Official Support", Capability::DocOfficiallySupported),
    ("Concurrency Verified", Capability::CanConcur),
    ("`ALIAS`", Capability::CanUseAlias),
    ("`AUTODNSSEC`", Capability::CanAutoDnssec),
    ("`CAA`", Capability::CanUseCaa),
    ("`DHCID`", Capability::CanUseDhcid),
    ("`DNAME`", Capability::CanUseDname),
    ("`DNSKEY`", Capability::CanUseDnskey),
    ("`DS`", Capability::CanUseDs),
    ("`HTTPS`", Capability::CanUseHttps),
    ("`LOC`", Capability::CanUseLoc),
    ("`NAPTR`", Capability::CanUseNaptr),
    ("`PTR`", Capability::CanUsePtr),
    ("`SOA`", Capability::CanUseSoa),
    ("`SRV`", Capability::CanUseSrv),
    ("`SSHFP`", Capability::CanUseSshfp),
    ("`SVCB`", Capability::CanUseSvcb),
    ("`TLSA`", Capability::CanUseTlsa),
    ("dual host", Capability::DocDualHost),
    ("create-domains", Capability::DocCreateDomains),
    ("get-zones", Capability::CanGetZones),
];

fn cell(flag: &CapabilityFlag) -> &'static str {
    match flag {
        CapabilityFlag::Can(_) => "✅",
        CapabilityFlag::Cannot(_) => "❌",
        CapabilityFlag::Unimplemented(_) | CapabilityFlag::Unknown => "❔",
    }
}

/// Render every registered provider against the documented capabilities
///
/// Rows are sorted by provider name; columns are padded so the raw
/// Markdown stays readable.
pub fn render_feature_matrix(registry: &CapabilityRegistry) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();

    let mut header = vec!["Provider name".to_string()];
    header.extend(COLUMNS.iter().map(|(title, _)| title.to_string()));
    rows.push(header);

    for provider in registry.providers() {
        let mut row = vec![format!("`{}`", provider)];
        row.extend(
            COLUMNS
                .iter()
                .map(|(_, capability)| cell(&registry.note(provider, *capability)).to_string()),
        );
        rows.push(row);
    }

    let widths: Vec<usize> = (0..rows[0].len())
        .map(|col| {
            rows.iter()
                .map(|row| row[col].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |row: &[String]| {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(value, width)| {
                let pad = width.saturating_sub(value.chars().count());
                format!("{}{}", value, " ".repeat(pad))
            })
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut out = String::new();
    out.push_str(&render_row(&rows[0]));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
    out.push_str(&format!("|-{}-|", rule.join("-|-")));
    out.push('\n');
    for row in &rows[1..] {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}
