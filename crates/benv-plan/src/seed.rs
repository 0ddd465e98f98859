//! Seed and freeze file parsing.
//!
//! A seed file lists the user's initial package requirements, one per line:
//!
//! ```text
//! -- comment
//! aeson +ordered-keymap ==2.2.3.0
//! lens
//! allow-newer: aeson:base, *:template-haskell
//! ```
//!
//! A freeze file pins versions in the native tool's own format
//! (`constraints:` clauses with `any.name ==version` entries).

use std::collections::BTreeMap;

use benv_core::{Error, Result};

use crate::unit::{AllowNewer, FlagName, PkgSpec, PkgSpecs, UnitSpec, UnitSpecs};

/// Parsed seed requirements.
#[derive(Debug, Clone, Default)]
pub struct Seeds {
    pub units: UnitSpecs,
    pub allow_newer: AllowNewer,
}

impl Seeds {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Parse a whole seed file.
pub fn parse_seed_file(contents: &str) -> Result<Seeds> {
    let mut seeds = Seeds::default();
    for (lineno, line) in contents.lines().enumerate() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("allow-newer:") {
            parse_allow_newer(rest, &mut seeds.allow_newer)
                .map_err(|e| at_line(e, lineno + 1))?;
            continue;
        }
        parse_seed_requirement(line, &mut seeds.units).map_err(|e| at_line(e, lineno + 1))?;
    }
    Ok(seeds)
}

/// Parse one seed requirement (`name [+flag|-flag]* [constraint...]`) and
/// merge it into the requirement set.
pub fn parse_seed_requirement(text: &str, units: &mut UnitSpecs) -> Result<()> {
    let mut tokens = text.split_whitespace();
    let name = tokens
        .next()
        .ok_or_else(|| Error::parse("empty seed requirement"))?;
    if name.starts_with('+') || name.starts_with('-') {
        return Err(Error::parse(format!(
            "seed requirement must start with a package name: {}",
            text
        )));
    }

    let entry = units.entry(name.into()).or_insert_with(UnitSpec::default);

    let mut constraint_parts: Vec<&str> = Vec::new();
    for token in tokens {
        if let Some(flag) = token.strip_prefix('+') {
            entry.spec.flags.set(FlagName::from(flag), true);
        } else if let Some(flag) = token.strip_prefix('-') {
            entry.spec.flags.set(FlagName::from(flag), false);
        } else {
            constraint_parts.push(token);
        }
    }

    if !constraint_parts.is_empty() {
        entry.spec.constraints = constraint_parts.join(" ");
    }

    Ok(())
}

/// Parse a freeze file into version pins.
pub fn parse_freeze_file(contents: &str) -> Result<PkgSpecs> {
    // Constraint clauses may span lines; normalize to one comma-separated
    // stream first.
    let mut entries = String::new();
    for line in contents.lines() {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        let line = line.strip_prefix("constraints:").unwrap_or(line).trim();
        if !entries.is_empty() {
            entries.push(',');
        }
        entries.push_str(line);
    }

    let mut pins: PkgSpecs = BTreeMap::new();
    for entry in entries.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut tokens = entry.split_whitespace();
        let name = tokens.next().expect("non-empty entry has a first token");
        let name = name.strip_prefix("any.").unwrap_or(name);

        let spec = pins.entry(name.into()).or_insert_with(PkgSpec::default);
        let mut constraint_parts: Vec<&str> = Vec::new();
        for token in tokens {
            if let Some(flag) = token.strip_prefix('+') {
                spec.flags.set(FlagName::from(flag), true);
            } else if let Some(flag) = token.strip_prefix('-') {
                spec.flags.set(FlagName::from(flag), false);
            } else {
                constraint_parts.push(token);
            }
        }
        if !constraint_parts.is_empty() {
            spec.constraints = constraint_parts.join(" ");
        }
    }

    Ok(pins)
}

/// Parse an `allow-newer:` directive body (`a:b` pairs, `*` wildcards).
pub fn parse_allow_newer(text: &str, out: &mut AllowNewer) -> Result<()> {
    for entry in text.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((depender, dependee)) => out.insert(depender.trim(), dependee.trim()),
            None if entry == "*" => out.insert("*", "*"),
            // A bare package relaxes that package's bounds everywhere.
            None => out.insert("*", entry),
        }
    }
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    let line = line.split("--").next().unwrap_or(line);
    line.split('#').next().unwrap_or(line)
}

fn at_line(error: Error, lineno: usize) -> Error {
    match error {
        Error::Parse { message, path } => Error::Parse {
            message: format!("line {}: {}", lineno, message),
            path,
        },
        other => other,
    }
}
