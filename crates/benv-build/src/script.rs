//! Portable shell script emission.
//!
//! In script mode nothing is executed; instead every command the engine
//! would have run is rendered into a POSIX `sh` script that reproduces the
//! build against the same fetch and install directories.

use std::path::Path;

use benv_core::{CommandSpec, Error, Result, PATH_SEPARATOR};

/// Quote `text` for a POSIX shell, leaving plain words untouched.
pub fn sh_quote(text: &str) -> String {
    let safe = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_%+=:,./@^-".contains(c));
    if safe {
        return text.to_string();
    }
    // Single-quote, escaping embedded single quotes.
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Accumulates command invocations and environment mutations as a shell
/// script.
#[derive(Debug, Clone)]
pub struct ScriptBuffer {
    lines: Vec<String>,
}

impl Default for ScriptBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptBuffer {
    /// Create a buffer with the script preamble.
    pub fn new() -> Self {
        Self {
            lines: vec![
                "#!/bin/sh".to_string(),
                "set -eu".to_string(),
                String::new(),
            ],
        }
    }

    /// Append a comment line.
    pub fn comment(&mut self, text: &str) {
        self.lines.push(format!("# {}", text));
    }

    /// Append a blank line.
    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Append a raw shell line verbatim.
    pub fn raw(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Append a rendered command invocation.
    ///
    /// Working directory changes and environment mutations are scoped to a
    /// subshell so they do not leak into later commands.
    pub fn command(&mut self, spec: &CommandSpec) {
        let mut parts: Vec<String> = Vec::new();

        if !spec.extra_path.is_empty() {
            let prepend = spec
                .extra_path
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(PATH_SEPARATOR);
            parts.push(format!("PATH={}{}\"$PATH\"", sh_quote(&prepend), PATH_SEPARATOR));
        }
        for (key, value) in &spec.extra_env {
            parts.push(format!("{}={}", key, sh_quote(value)));
        }

        parts.push(sh_quote(&spec.prog));
        parts.extend(spec.args.iter().map(|a| sh_quote(a)));
        let invocation = parts.join(" ");

        match &spec.cwd {
            Some(dir) => self.lines.push(format!(
                "( cd {} && {} )",
                sh_quote(&dir.to_string_lossy()),
                invocation
            )),
            None => self.lines.push(invocation),
        }
    }

    /// Render the accumulated script.
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Append the buffer to the file at `path`, creating it if needed.
    pub fn append_to(&self, path: &Path) -> Result<()> {
        use std::io::Write as _;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io_at("failed to open script file", path, e))?;
        file.write_all(self.render().as_bytes())
            .map_err(|e| Error::io_at("failed to write script file", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_sh_quote_plain() {
        assert_eq!(sh_quote("abc"), "abc");
        assert_eq!(sh_quote("--prefix=/opt/benv"), "--prefix=/opt/benv");
    }

    #[test]
    fn test_sh_quote_whitespace_and_quotes() {
        assert_eq!(sh_quote("a b"), "'a b'");
        assert_eq!(sh_quote("it's"), "'it'\\''s'");
        assert_eq!(sh_quote(""), "''");
    }

    #[test]
    fn test_command_rendering() {
        let mut buf = ScriptBuffer::new();
        let spec = CommandSpec::new("ghc")
            .arg("--make")
            .arg("Setup.hs")
            .current_dir("/work/foo-1.0");
        buf.command(&spec);
        let rendered = buf.render();
        assert!(rendered.starts_with("#!/bin/sh\nset -eu\n"));
        assert!(rendered.contains("( cd /work/foo-1.0 && ghc --make Setup.hs )"));
    }

    #[test]
    fn test_command_rendering_env_and_path() {
        let mut buf = ScriptBuffer::new();
        let spec = CommandSpec::new("Setup")
            .arg("build")
            .prepend_path("/stage/opt/bin")
            .env("LANG", "C");
        buf.command(&spec);
        let rendered = buf.render();
        assert!(rendered.contains("PATH=/stage/opt/bin:\"$PATH\" LANG=C Setup build"));
    }

    #[test]
    fn test_append_to_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path: PathBuf = tmp.path().join("out.sh");
        std::fs::write(&path, "# existing\n").unwrap();

        let mut buf = ScriptBuffer::new();
        buf.comment("from benv");
        buf.append_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# existing\n#!/bin/sh"));
        assert!(contents.contains("# from benv"));
    }
}
