//! DNS records, record-set keys and record sets
//!
//! Values are parsed into [`RecordData`] once, at the boundary. After that
//! equality is structural: two values that differ only in hostname case,
//! trailing dots or TXT quoting compare equal.

use crate::error::{Error, Result};
use crate::model::name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Longest character-string allowed inside TXT/CAA rdata
const MAX_CHARACTER_STRING: usize = 255;

/// DNS record type
///
/// Variants are declared in lexicographic order of their mnemonic so the
/// derived `Ord` matches sorting by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordType {
    A,
    Aaaa,
    Alias,
    Caa,
    Cname,
    Dhcid,
    Dname,
    Dnskey,
    Ds,
    Https,
    Loc,
    Mx,
    Naptr,
    Ns,
    Ptr,
    Soa,
    Srv,
    Sshfp,
    Svcb,
    Tlsa,
    Txt,
}

impl RecordType {
    /// Every supported record type
    pub const ALL: [RecordType; 21] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Alias,
        RecordType::Caa,
        RecordType::Cname,
        RecordType::Dhcid,
        RecordType::Dname,
        RecordType::Dnskey,
        RecordType::Ds,
        RecordType::Https,
        RecordType::Loc,
        RecordType::Mx,
        RecordType::Naptr,
        RecordType::Ns,
        RecordType::Ptr,
        RecordType::Soa,
        RecordType::Srv,
        RecordType::Sshfp,
        RecordType::Svcb,
        RecordType::Tlsa,
        RecordType::Txt,
    ];

    /// Mnemonic as used in zone files and provider APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Alias => "ALIAS",
            RecordType::Caa => "CAA",
            RecordType::Cname => "CNAME",
            RecordType::Dhcid => "DHCID",
            RecordType::Dname => "DNAME",
            RecordType::Dnskey => "DNSKEY",
            RecordType::Ds => "DS",
            RecordType::Https => "HTTPS",
            RecordType::Loc => "LOC",
            RecordType::Mx => "MX",
            RecordType::Naptr => "NAPTR",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Soa => "SOA",
            RecordType::Srv => "SRV",
            RecordType::Sshfp => "SSHFP",
            RecordType::Svcb => "SVCB",
            RecordType::Tlsa => "TLSA",
            RecordType::Txt => "TXT",
        }
    }

    /// Types whose value is a single hostname
    fn is_host_target(&self) -> bool {
        matches!(
            self,
            RecordType::Alias
                | RecordType::Cname
                | RecordType::Dname
                | RecordType::Ns
                | RecordType::Ptr
        )
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        RecordType::ALL
            .iter()
            .copied()
            .find(|rtype| rtype.as_str() == wanted)
            .ok_or_else(|| Error::config(format!("Unknown record type: {}", s)))
    }
}

impl TryFrom<String> for RecordType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecordType> for String {
    fn from(rtype: RecordType) -> Self {
        rtype.as_str().to_string()
    }
}

/// Parsed, canonical record payload
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordData {
    /// IPv4 address
    A(Ipv4Addr),
    /// IPv6 address
    Aaaa(Ipv6Addr),
    /// Single hostname target (CNAME, ALIAS, NS, PTR, DNAME)
    Host(String),
    /// Mail exchanger
    Mx { preference: u16, exchange: String },
    /// Service locator
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    /// Certification authority authorization
    Caa { flags: u8, tag: String, value: String },
    /// Text, stored unquoted with segments concatenated
    Txt(String),
    /// Any other type, kept as whitespace-normalized presentation text
    Generic(String),
}

impl RecordData {
    /// Parse a presentation-format value for `rtype`
    ///
    /// Relative hostnames are resolved against `origin`.
    pub fn parse(rtype: RecordType, value: &str, origin: &str) -> Result<Self> {
        let value = value.trim();
        let invalid = |reason: &str| {
            Error::config(format!("Invalid {} value '{}': {}", rtype, value, reason))
        };

        match rtype {
            RecordType::A => value
                .parse()
                .map(RecordData::A)
                .map_err(|_| invalid("not an IPv4 address")),
            RecordType::Aaaa => value
                .parse()
                .map(RecordData::Aaaa)
                .map_err(|_| invalid("not an IPv6 address")),
            t if t.is_host_target() => Ok(RecordData::Host(name::canonical_host(value, origin)?)),
            RecordType::Mx => {
                let parts: Vec<&str> = value.split_whitespace().collect();
                let [preference, exchange] = parts[..] else {
                    return Err(invalid("expected '<preference> <exchange>'"));
                };
                Ok(RecordData::Mx {
                    preference: preference.parse().map_err(|_| invalid("bad preference"))?,
                    exchange: name::canonical_host(exchange, origin)?,
                })
            }
            RecordType::Srv => {
                let parts: Vec<&str> = value.split_whitespace().collect();
                let [priority, weight, port, target] = parts[..] else {
                    return Err(invalid("expected '<priority> <weight> <port> <target>'"));
                };
                Ok(RecordData::Srv {
                    priority: priority.parse().map_err(|_| invalid("bad priority"))?,
                    weight: weight.parse().map_err(|_| invalid("bad weight"))?,
                    port: port.parse().map_err(|_| invalid("bad port"))?,
                    target: name::canonical_host(target, origin)?,
                })
            }
            RecordType::Caa => {
                let mut parts = value.splitn(3, char::is_whitespace);
                let (Some(flags), Some(tag), Some(rest)) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(invalid("expected '<flags> <tag> <value>'"));
                };
                Ok(RecordData::Caa {
                    flags: flags.parse().map_err(|_| invalid("bad flags"))?,
                    tag: tag.to_ascii_lowercase(),
                    value: parse_character_strings(rest).map_err(|e| invalid(&e))?,
                })
            }
            RecordType::Txt => parse_character_strings(value)
                .map(RecordData::Txt)
                .map_err(|e| invalid(&e)),
            _ => {
                let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
                if collapsed.is_empty() {
                    return Err(invalid("value cannot be empty"));
                }
                Ok(RecordData::Generic(collapsed))
            }
        }
    }

    /// Whether this payload is the shape `rtype` expects
    pub fn matches_type(&self, rtype: RecordType) -> bool {
        match self {
            RecordData::A(_) => rtype == RecordType::A,
            RecordData::Aaaa(_) => rtype == RecordType::Aaaa,
            RecordData::Host(_) => rtype.is_host_target(),
            RecordData::Mx { .. } => rtype == RecordType::Mx,
            RecordData::Srv { .. } => rtype == RecordType::Srv,
            RecordData::Caa { .. } => rtype == RecordType::Caa,
            RecordData::Txt(_) => rtype == RecordType::Txt,
            RecordData::Generic(_) => !matches!(
                rtype,
                RecordType::A
                    | RecordType::Aaaa
                    | RecordType::Mx
                    | RecordType::Srv
                    | RecordType::Caa
                    | RecordType::Txt
            ) && !rtype.is_host_target(),
        }
    }
}

/// Presentation-format rdata (what provider APIs accept)
impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordData::A(ip) => write!(f, "{}", ip),
            RecordData::Aaaa(ip) => write!(f, "{}", ip),
            RecordData::Host(host) => f.write_str(&name::presentation(host)),
            RecordData::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, name::presentation(exchange)),
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(
                f,
                "{} {} {} {}",
                priority,
                weight,
                port,
                name::presentation(target)
            ),
            RecordData::Caa { flags, tag, value } => {
                write!(f, "{} {} {}", flags, tag, quote_character_strings(value))
            }
            RecordData::Txt(text) => f.write_str(&quote_character_strings(text)),
            RecordData::Generic(text) => f.write_str(text),
        }
    }
}

/// Parse one or more quoted character-strings and concatenate them
///
/// Unquoted input is taken verbatim.
fn parse_character_strings(input: &str) -> std::result::Result<String, String> {
    let input = input.trim();
    if !input.starts_with('"') {
        return Ok(input.to_string());
    }

    let mut out = String::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => return Ok(out),
            Some('"') => {}
            Some(other) => return Err(format!("unexpected '{}' between strings", other)),
        }
        loop {
            match chars.next() {
                None => return Err("unterminated quoted string".to_string()),
                Some('"') => break,
                Some('\\') => match chars.next() {
                    Some(escaped) => out.push(escaped),
                    None => return Err("dangling escape".to_string()),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

/// Quote text as one or more character-strings of at most 255 bytes
fn quote_character_strings(text: &str) -> String {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if current.len() + c.len_utf8() > MAX_CHARACTER_STRING {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }

    chunks
        .iter()
        .map(|chunk| {
            let escaped = chunk.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\"", escaped)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The grouping and comparison unit: `(FQDN, type)`
///
/// Ordering is lexicographic by FQDN, then by type mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordSetKey {
    /// Canonical fully qualified owner name
    pub fqdn: String,
    /// Record type
    pub rtype: RecordType,
}

impl RecordSetKey {
    /// Create a key; the name is canonicalized
    pub fn new(fqdn: impl AsRef<str>, rtype: RecordType) -> Self {
        Self {
            fqdn: fqdn.as_ref().trim_end_matches('.').to_ascii_lowercase(),
            rtype,
        }
    }
}

impl fmt::Display for RecordSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.fqdn, self.rtype)
    }
}

/// One member of a record set's value bag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordValue {
    /// Parsed payload
    pub data: RecordData,
    /// Time-to-live in seconds
    pub ttl: u32,
}

/// One DNS resource record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Owner name relative to the zone (`@` for the apex)
    pub label: String,
    /// Canonical fully qualified owner name
    pub fqdn: String,
    /// Record type
    pub rtype: RecordType,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Parsed payload
    pub data: RecordData,
}

impl Record {
    /// Build a record from a zone-relative label and a presentation value
    pub fn new(zone: &str, label: &str, rtype: RecordType, value: &str, ttl: u32) -> Result<Self> {
        let zone = name::canonical_zone(zone)?;
        let fqdn = name::fqdn_for_label(label, &zone)?;
        Self::build(&zone, fqdn, rtype, value, ttl)
    }

    /// Build a record from a fully qualified owner name (provider side)
    pub fn from_fqdn(zone: &str, fqdn: &str, rtype: RecordType, value: &str, ttl: u32) -> Result<Self> {
        let zone = name::canonical_zone(zone)?;
        let fqdn = fqdn.trim().trim_end_matches('.').to_ascii_lowercase();
        name::validate_name(&fqdn)?;
        Self::build(&zone, fqdn, rtype, value, ttl)
    }

    fn build(zone: &str, fqdn: String, rtype: RecordType, value: &str, ttl: u32) -> Result<Self> {
        let label = name::label_for_fqdn(&fqdn, zone).ok_or_else(|| {
            Error::config(format!("Name {} is outside of zone {}", fqdn, zone))
        })?;
        let data = RecordData::parse(rtype, value, zone)?;
        Ok(Self {
            label,
            fqdn,
            rtype,
            ttl,
            data,
        })
    }

    /// The record set this record belongs to
    pub fn key(&self) -> RecordSetKey {
        RecordSetKey {
            fqdn: self.fqdn.clone(),
            rtype: self.rtype,
        }
    }

    /// The comparable member of the record set's value bag
    pub fn value(&self) -> RecordValue {
        RecordValue {
            data: self.data.clone(),
            ttl: self.ttl,
        }
    }

    /// Structural validation against the owning zone
    pub fn validate(&self, zone: &str) -> Result<()> {
        name::validate_name(&self.fqdn)?;
        if !name::in_zone(&self.fqdn, zone) {
            return Err(Error::config(format!(
                "Record {} is outside of zone {}",
                self.key(),
                zone
            )));
        }
        if !self.data.matches_type(self.rtype) {
            return Err(Error::config(format!(
                "Record {} carries a value of the wrong shape: {}",
                self.key(),
                self.data
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} ttl={}", self.fqdn, self.rtype, self.data, self.ttl)
    }
}

/// All records sharing one key, replaced atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// Owner name and type
    pub key: RecordSetKey,
    /// Value bag, compared as a set
    pub values: BTreeSet<RecordValue>,
}

impl RecordSet {
    /// An empty set for `key` (applying it deletes the record set)
    pub fn empty(key: RecordSetKey) -> Self {
        Self {
            key,
            values: BTreeSet::new(),
        }
    }

    /// Add a member; duplicates collapse
    pub fn insert(&mut self, value: RecordValue) {
        self.values.insert(value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// TTL to send for the whole set
    ///
    /// Members normally share a TTL; if they disagree the largest wins.
    pub fn ttl(&self) -> Option<u32> {
        self.values.iter().map(|value| value.ttl).max()
    }

    /// Presentation-format rdata of every member, in bag order
    pub fn rdata(&self) -> Vec<String> {
        self.values.iter().map(|value| value.data.to_string()).collect()
    }

    /// Expand back into individual records
    pub fn records(&self, zone: &str) -> Vec<Record> {
        let label = name::label_for_fqdn(&self.key.fqdn, zone).unwrap_or_else(|| self.key.fqdn.clone());
        self.values
            .iter()
            .map(|value| Record {
                label: label.clone(),
                fqdn: self.key.fqdn.clone(),
                rtype: self.key.rtype,
                ttl: value.ttl,
                data: value.data.clone(),
            })
            .collect()
    }
}

/// `[v1, v2] ttl=N` when the TTL is uniform, `[v1 ttl=a, v2 ttl=b]` otherwise
impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uniform = self
            .values
            .iter()
            .map(|value| value.ttl)
            .collect::<BTreeSet<_>>();

        if let (1, Some(ttl)) = (uniform.len(), uniform.first()) {
            write!(f, "[{}] ttl={}", self.rdata().join(", "), ttl)
        } else {
            let members: Vec<String> = self
                .values
                .iter()
                .map(|value| format!("{} ttl={}", value.data, value.ttl))
                .collect();
            write!(f, "[{}]", members.join(", "))
        }
    }
}
