//! Dummy project generation.
//!
//! To make the native tool compute a plan for an arbitrary set of seeds we
//! hand it a throwaway project: a `dummy-package` depending on every seed,
//! plus a project file carrying constraints, flag choices and allow-newer
//! directives. The resolver then produces a plan whose only artifact of the
//! dummy is a synthetic unit that is dropped at tagging time.

use std::fmt::Write as _;
use std::path::Path;

use benv_core::{Error, Result};

use crate::unit::{AllowNewer, PkgSpecs, UnitSpecs, DUMMY_PACKAGE};

/// Render the dummy package description.
pub fn dummy_cabal_file(units: &UnitSpecs) -> String {
    let mut out = String::new();
    out.push_str("cabal-version: 2.4\n");
    let _ = writeln!(out, "name: {}", DUMMY_PACKAGE);
    out.push_str("version: 0\n\nlibrary\n");

    if units.is_empty() {
        return out;
    }

    out.push_str("  build-depends:\n");
    for (idx, name) in units.keys().enumerate() {
        let sep = if idx == 0 { ' ' } else { ',' };
        let _ = writeln!(out, "    {} {}", sep, name);
    }
    out
}

/// Render the project file: package locations, constraints, flag stanzas
/// and allow-newer directives.
pub fn cabal_project_file(units: &UnitSpecs, pins: &PkgSpecs, allow_newer: &AllowNewer) -> String {
    let mut out = String::new();
    out.push_str("packages: ./\n");
    for spec in units.values() {
        if let Some(ref path) = spec.src {
            let _ = writeln!(out, "          {}", path.display());
        }
    }

    let mut constraint_lines: Vec<String> = Vec::new();
    for (name, spec) in units {
        if !spec.spec.constraints.is_empty() {
            constraint_lines.push(format!("{} {}", name, spec.spec.constraints));
        }
    }
    for (name, spec) in pins {
        if !spec.constraints.is_empty() {
            constraint_lines.push(format!("any.{} {}", name, spec.constraints));
        }
        if !spec.flags.is_empty() {
            constraint_lines.push(format!("{} {}", name, spec.flags.assignments().join(" ")));
        }
    }
    if !constraint_lines.is_empty() {
        out.push_str("\nconstraints:\n");
        for (idx, line) in constraint_lines.iter().enumerate() {
            let sep = if idx + 1 == constraint_lines.len() { "" } else { "," };
            let _ = writeln!(out, "    {}{}", line, sep);
        }
    }

    if !allow_newer.is_empty() {
        let rendered: Vec<String> = allow_newer
            .iter()
            .map(|(depender, dependee)| {
                if depender == "*" && dependee == "*" {
                    "*".to_string()
                } else {
                    format!("{}:{}", depender, dependee)
                }
            })
            .collect();
        let _ = writeln!(out, "\nallow-newer: {}", rendered.join(", "));
    }

    for (name, spec) in units {
        if spec.spec.flags.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\npackage {}", name);
        let _ = writeln!(out, "  flags: {}", spec.spec.flags.assignments().join(" "));
    }

    out
}

/// Write the dummy project into `dir`.
pub fn write_dummy_project(
    dir: &Path,
    units: &UnitSpecs,
    pins: &PkgSpecs,
    allow_newer: &AllowNewer,
) -> Result<()> {
    let cabal_path = dir.join(format!("{}.cabal", DUMMY_PACKAGE));
    std::fs::write(&cabal_path, dummy_cabal_file(units))
        .map_err(|e| Error::io_at("failed to write dummy package description", &cabal_path, e))?;

    let project_path = dir.join("cabal.project");
    std::fs::write(&project_path, cabal_project_file(units, pins, allow_newer))
        .map_err(|e| Error::io_at("failed to write project file", &project_path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::parse_seed_file;
    use crate::unit::{FlagName, PkgSpec};

    #[test]
    fn test_dummy_cabal_file_lists_seeds() {
        let seeds = parse_seed_file("aeson\nlens\n").unwrap();
        let rendered = dummy_cabal_file(&seeds.units);
        assert!(rendered.contains("name: dummy-package"));
        assert!(rendered.contains("version: 0"));
        assert!(rendered.contains("aeson"));
        assert!(rendered.contains(", lens"));
    }

    #[test]
    fn test_project_file_constraints_and_flags() {
        let seeds = parse_seed_file("aeson +ordered-keymap ==2.2.3.0\n").unwrap();
        let mut pins = PkgSpecs::new();
        pins.insert(
            "text".into(),
            PkgSpec {
                constraints: "==2.1.1".to_string(),
                flags: Default::default(),
            },
        );

        let rendered = cabal_project_file(&seeds.units, &pins, &AllowNewer::universal());
        assert!(rendered.starts_with("packages: ./\n"));
        assert!(rendered.contains("aeson ==2.2.3.0"));
        assert!(rendered.contains("any.text ==2.1.1"));
        assert!(rendered.contains("allow-newer: *"));
        assert!(rendered.contains("package aeson"));
        assert!(rendered.contains("flags: +ordered-keymap"));
    }

    #[test]
    fn test_project_file_local_packages() {
        let mut units = UnitSpecs::new();
        let mut spec = crate::unit::UnitSpec::default();
        spec.src = Some("/src/mylib".into());
        units.insert("mylib".into(), spec);

        let rendered = cabal_project_file(&units, &PkgSpecs::new(), &AllowNewer::new());
        assert!(rendered.contains("/src/mylib"));
    }

    #[test]
    fn test_write_dummy_project() {
        let tmp = tempfile::tempdir().unwrap();
        let seeds = parse_seed_file("lens\n").unwrap();
        write_dummy_project(tmp.path(), &seeds.units, &PkgSpecs::new(), &AllowNewer::new())
            .unwrap();
        assert!(tmp.path().join("dummy-package.cabal").exists());
        assert!(tmp.path().join("cabal.project").exists());
    }

    #[test]
    fn test_seed_flags_reach_flag_spec() {
        let seeds = parse_seed_file("pkg +x\n").unwrap();
        let spec = &seeds.units[&crate::unit::PkgName::from("pkg")];
        assert_eq!(spec.spec.flags.0.get(&FlagName::from("x")), Some(&true));
    }
}
