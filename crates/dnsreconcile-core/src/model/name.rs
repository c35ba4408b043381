//! Owner-name and hostname canonicalization
//!
//! Every name stored in the model is lowercase ASCII without a trailing dot.
//! The root name is kept as `"."` so a null target (e.g. `MX 0 .`) survives.

use crate::error::{Error, Result};

/// Canonicalize a zone name (`Example.COM.` -> `example.com`)
pub fn canonical_zone(zone: &str) -> Result<String> {
    let zone = zone.trim().trim_end_matches('.').to_ascii_lowercase();
    validate_name(&zone)?;
    Ok(zone)
}

/// Resolve a hostname as written in a record value against the zone origin
///
/// - `@` is the zone apex
/// - a trailing dot marks an absolute name
/// - anything else is relative to `origin`
pub fn canonical_host(value: &str, origin: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::config("Hostname cannot be empty"));
    }
    if value == "." {
        return Ok(".".to_string());
    }

    let host = if value == "@" {
        origin.to_string()
    } else if let Some(absolute) = value.strip_suffix('.') {
        absolute.to_string()
    } else {
        format!("{}.{}", value, origin)
    };

    let host = host.to_ascii_lowercase();
    validate_name(&host)?;
    Ok(host)
}

/// Build the FQDN for a label inside `zone`
///
/// `@` and the empty label map to the apex. A label with a trailing dot is
/// taken as already fully qualified.
pub fn fqdn_for_label(label: &str, zone: &str) -> Result<String> {
    let label = label.trim();
    let fqdn = if label.is_empty() || label == "@" {
        zone.to_string()
    } else if let Some(absolute) = label.strip_suffix('.') {
        absolute.to_ascii_lowercase()
    } else {
        format!("{}.{}", label.to_ascii_lowercase(), zone)
    };

    validate_name(&fqdn)?;
    if !in_zone(&fqdn, zone) {
        return Err(Error::config(format!(
            "Name {} is outside of zone {}",
            fqdn, zone
        )));
    }
    Ok(fqdn)
}

/// Label of `fqdn` relative to `zone` (`@` for the apex)
pub fn label_for_fqdn(fqdn: &str, zone: &str) -> Option<String> {
    if fqdn == zone {
        return Some("@".to_string());
    }
    fqdn.strip_suffix(zone)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
}

/// Whether `fqdn` is the apex of or below `zone`
pub fn in_zone(fqdn: &str, zone: &str) -> bool {
    label_for_fqdn(fqdn, zone).is_some()
}

/// Render a canonical hostname in presentation format (absolute, trailing dot)
pub fn presentation(host: &str) -> String {
    if host == "." {
        ".".to_string()
    } else {
        format!("{}.", host)
    }
}

/// Basic RFC 1035 shape check
///
/// Underscores and a leading `*` label are accepted since SRV, TLSA and
/// wildcard owners use them.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    if name.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            name.len(),
            name
        )));
    }

    for (index, label) in name.split('.').enumerate() {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{}'",
                name
            )));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if index == 0 && label == "*" {
            continue;
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}
