//! Per-user mount policy
//!
//! Parses `jk_mount.ini` style files using toml. Each section is named after
//! a user, or `DEFAULT`:
//!
//! ```toml
//! [DEFAULT]
//! mountproc = 0
//!
//! [bob]
//! mountproc = 1
//! mountdevpts = 1
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Default location of the mount policy file
pub const DEFAULT_POLICY_PATH: &str = "/etc/jailkit/jk_mount.ini";

/// Section used when a user has none of their own
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Which special filesystems to mount into a user's jail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JailMountConfig {
    pub mountproc: bool,
    pub mountsys: bool,
    pub mountdevpts: bool,
}

impl JailMountConfig {
    /// No optional mount is enabled
    pub fn is_empty(&self) -> bool {
        !(self.mountproc || self.mountsys || self.mountdevpts)
    }
}

/// A flag as it may be spelled in the file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl FlagValue {
    /// Only 1 enables a stage, anything else leaves it off
    fn enabled(&self) -> bool {
        match self {
            FlagValue::Int(v) => *v == 1,
            FlagValue::Bool(b) => *b,
            FlagValue::Text(s) => s.trim() == "1",
        }
    }
}

/// Raw section as deserialized; unknown keys are ignored
#[derive(Debug, Clone, Default, Deserialize)]
struct SectionDef {
    mountproc: Option<FlagValue>,
    mountsys: Option<FlagValue>,
    mountdevpts: Option<FlagValue>,
}

impl From<SectionDef> for JailMountConfig {
    fn from(def: SectionDef) -> Self {
        let on = |v: &Option<FlagValue>| v.as_ref().is_some_and(FlagValue::enabled);
        Self {
            mountproc: on(&def.mountproc),
            mountsys: on(&def.mountsys),
            mountdevpts: on(&def.mountdevpts),
        }
    }
}

/// Parsed policy, one entry per section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPolicy {
    sections: BTreeMap<String, JailMountConfig>,
}

impl MountPolicy {
    /// Parse policy text. Lines starting with `;` are INI comments.
    pub fn parse(content: &str) -> Result<Self> {
        let content: String = content
            .lines()
            .map(|line| match line.trim_start().strip_prefix(';') {
                Some(comment) => format!("#{}\n", comment),
                None => format!("{}\n", line),
            })
            .collect();
        let table: toml::Table = toml::from_str(&content)?;
        let mut sections = BTreeMap::new();
        collect_sections(&table, None, &mut sections)?;
        Ok(Self { sections })
    }

    /// Insert or replace a section
    #[cfg(test)]
    pub fn with_section(mut self, name: impl Into<String>, config: JailMountConfig) -> Self {
        self.sections.insert(name.into(), config);
        self
    }

    /// Resolve the policy for `user`: their own section, else `DEFAULT`,
    /// else nothing enabled. Keys missing from the chosen section are off;
    /// they are not looked up in `DEFAULT`.
    pub fn resolve(&self, user: &str) -> JailMountConfig {
        self.sections
            .get(user)
            .or_else(|| self.sections.get(DEFAULT_SECTION))
            .copied()
            .unwrap_or_default()
    }
}

/// Walk the parsed document. Dotted headers such as `[john.doe]` come back
/// from toml as nested tables and are joined into their dotted name again.
fn collect_sections(
    table: &toml::Table,
    parent: Option<&str>,
    out: &mut BTreeMap<String, JailMountConfig>,
) -> Result<()> {
    for (key, value) in table {
        let toml::Value::Table(inner) = value else {
            // Keys outside any section carry no meaning
            continue;
        };
        let name = match parent {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };

        let has_flags = inner.values().any(|v| !v.is_table());
        if has_flags || inner.is_empty() {
            let def: SectionDef = toml::Value::Table(inner.clone()).try_into().map_err(
                |e: toml::de::Error| {
                    Error::ConfigValidation(format!("section [{}]: {}", name, e))
                },
            )?;
            out.insert(name.clone(), def.into());
        }
        collect_sections(inner, Some(&name), out)?;
    }
    Ok(())
}

/// Source of mount policy, consulted once per mount run
pub trait PolicySource {
    fn load(&self) -> Result<MountPolicy>;
}

/// Policy read from a file on every load
#[derive(Debug, Clone)]
pub struct PolicyFile {
    path: PathBuf,
}

impl PolicyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PolicySource for PolicyFile {
    /// A missing file behaves like an empty policy
    fn load(&self) -> Result<MountPolicy> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no mount policy at {}, nothing optional mounted", self.path.display());
                return Ok(MountPolicy::default());
            }
            Err(e) => {
                return Err(Error::ConfigRead {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        MountPolicy::parse(&content)
    }
}

impl PolicySource for MountPolicy {
    fn load(&self) -> Result<MountPolicy> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# jk_mount.ini
[DEFAULT]
mountproc = 0
mountdevpts = 1

[bob]
mountproc = 1

[carol]
mountproc = true
mountsys = "1"
mountdevpts = 2
"#;

    #[test]
    fn test_user_section_wins() {
        let policy = MountPolicy::parse(SAMPLE).unwrap();
        let bob = policy.resolve("bob");
        assert!(bob.mountproc);
        assert!(!bob.mountsys);
        // Missing keys are not inherited from DEFAULT
        assert!(!bob.mountdevpts);
    }

    #[test]
    fn test_default_section_fallback() {
        let policy = MountPolicy::parse(SAMPLE).unwrap();
        let dave = policy.resolve("dave");
        assert!(!dave.mountproc);
        assert!(dave.mountdevpts);
    }

    #[test]
    fn test_flag_spellings() {
        let policy = MountPolicy::parse(SAMPLE).unwrap();
        let carol = policy.resolve("carol");
        assert!(carol.mountproc);
        assert!(carol.mountsys);
        assert!(!carol.mountdevpts);
    }

    #[test]
    fn test_no_sections() {
        let policy = MountPolicy::parse("").unwrap();
        assert!(policy.resolve("bob").is_empty());
    }

    #[test]
    fn test_dotted_username() {
        let policy = MountPolicy::parse("[john.doe]\nmountsys = 1\n").unwrap();
        assert!(policy.resolve("john.doe").mountsys);
        assert!(policy.resolve("john").is_empty());
    }

    #[test]
    fn test_ini_semicolon_comments() {
        let policy = MountPolicy::parse("; jailkit mounts\n[bob]\n  ; proc only\nmountproc = 1\n").unwrap();
        assert!(policy.resolve("bob").mountproc);
    }

    #[test]
    fn test_invalid_flag_type() {
        let err = MountPolicy::parse("[bob]\nmountproc = [1]\n").unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(_)));
    }

    #[test]
    fn test_missing_file_is_empty_policy() {
        let dir = tempfile::tempdir().unwrap();
        let source = PolicyFile::new(dir.path().join("jk_mount.ini"));
        assert_eq!(source.load().unwrap(), MountPolicy::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jk_mount.ini");
        std::fs::write(&path, SAMPLE).unwrap();
        let policy = PolicyFile::new(&path).load().unwrap();
        assert!(policy.resolve("bob").mountproc);
    }
}
