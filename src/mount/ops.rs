//! Filesystem and mount operations used while setting up a jail
//!
//! Everything the mount sequence does to the host goes through
//! [`MountOps`], so the sequence itself can run against a recording fake
//! or in dry-run mode.

use crate::error::{Error, Result};
use crate::mount::table::MountTable;
use crate::policy::JailMountConfig;
use nix::mount::{mount, MsFlags};
use nix::sys::stat::Mode;
use std::fmt;
use std::path::Path;

/// Kernel virtual filesystems that may be mounted into a jail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialFs {
    Proc,
    Sysfs,
    Devpts,
}

impl SpecialFs {
    /// Mount order
    pub const ALL: [SpecialFs; 3] = [SpecialFs::Proc, SpecialFs::Sysfs, SpecialFs::Devpts];

    /// Source argument handed to mount(2)
    pub fn source(self) -> &'static str {
        match self {
            SpecialFs::Proc => "none",
            SpecialFs::Sysfs => "sys",
            SpecialFs::Devpts => "devpts",
        }
    }

    /// Filesystem type handed to mount(2)
    pub fn fstype(self) -> &'static str {
        match self {
            SpecialFs::Proc => "proc",
            SpecialFs::Sysfs => "sysfs",
            SpecialFs::Devpts => "devpts",
        }
    }

    /// Mount point as seen inside the jail
    pub fn jail_path(self) -> &'static str {
        match self {
            SpecialFs::Proc => "/proc",
            SpecialFs::Sysfs => "/sys",
            SpecialFs::Devpts => "/dev/pts",
        }
    }

    /// Whether `config` asks for this filesystem
    pub fn enabled_in(self, config: &JailMountConfig) -> bool {
        match self {
            SpecialFs::Proc => config.mountproc,
            SpecialFs::Sysfs => config.mountsys,
            SpecialFs::Devpts => config.mountdevpts,
        }
    }
}

impl fmt::Display for SpecialFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fstype())
    }
}

/// Host side effects of the mount sequence
pub trait MountOps {
    /// Whether something is mounted exactly at `path`
    fn is_mounted(&self, path: &Path) -> Result<bool>;

    /// Whether `path` is an existing directory (symlinks followed)
    fn dir_exists(&self, path: &Path) -> bool;

    /// Create a single directory accessible to its owner only
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Bind mount `source` onto `target`
    fn bind(&self, source: &Path, target: &Path) -> Result<()>;

    /// Mount a fresh instance of `fs` onto `target`
    fn mount_special(&self, fs: SpecialFs, target: &Path) -> Result<()>;
}

/// The real thing: mount(2) and mkdir(2) on the host
#[derive(Debug, Clone, Default)]
pub struct HostMounts {
    table: MountTable,
}

impl HostMounts {
    pub fn new(table: MountTable) -> Self {
        Self { table }
    }
}

impl MountOps for HostMounts {
    fn is_mounted(&self, path: &Path) -> Result<bool> {
        self.table.is_mounted(path)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        nix::unistd::mkdir(path, Mode::S_IRWXU).map_err(|source| Error::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("created {}", path.display());
        Ok(())
    }

    fn bind(&self, source: &Path, target: &Path) -> Result<()> {
        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(|e| Error::Mount {
            what: source.display().to_string(),
            target: target.to_path_buf(),
            source: e,
        })?;
        log::info!("bind mounted {} to {}", source.display(), target.display());
        Ok(())
    }

    fn mount_special(&self, fs: SpecialFs, target: &Path) -> Result<()> {
        mount(
            Some(fs.source()),
            target,
            Some(fs.fstype()),
            MsFlags::empty(),
            None::<&str>,
        )
        .map_err(|e| Error::Mount {
            what: fs.fstype().to_string(),
            target: target.to_path_buf(),
            source: e,
        })?;
        log::info!("mounted {} at {}", fs, target.display());
        Ok(())
    }
}

/// Answers queries from the host but only reports what it would change
pub struct DryRun<'a> {
    host: &'a dyn MountOps,
}

impl<'a> DryRun<'a> {
    pub fn new(host: &'a dyn MountOps) -> Self {
        Self { host }
    }
}

impl MountOps for DryRun<'_> {
    fn is_mounted(&self, path: &Path) -> Result<bool> {
        self.host.is_mounted(path)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.host.dir_exists(path)
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        println!("Would create {} (mode 0700)", path.display());
        Ok(())
    }

    fn bind(&self, source: &Path, target: &Path) -> Result<()> {
        println!("Would bind mount {} to {}", source.display(), target.display());
        Ok(())
    }

    fn mount_special(&self, fs: SpecialFs, target: &Path) -> Result<()> {
        println!("Would mount {} at {}", fs, target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Counting {
        mutations: RefCell<usize>,
    }

    impl MountOps for Counting {
        fn is_mounted(&self, path: &Path) -> Result<bool> {
            Ok(path == Path::new("/mounted"))
        }
        fn dir_exists(&self, _path: &Path) -> bool {
            true
        }
        fn create_dir(&self, _path: &Path) -> Result<()> {
            *self.mutations.borrow_mut() += 1;
            Ok(())
        }
        fn bind(&self, _source: &Path, _target: &Path) -> Result<()> {
            *self.mutations.borrow_mut() += 1;
            Ok(())
        }
        fn mount_special(&self, _fs: SpecialFs, _target: &Path) -> Result<()> {
            *self.mutations.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_special_fs_table() {
        assert_eq!(SpecialFs::Proc.source(), "none");
        assert_eq!(SpecialFs::Sysfs.source(), "sys");
        assert_eq!(SpecialFs::Devpts.fstype(), "devpts");
        assert_eq!(SpecialFs::Devpts.jail_path(), "/dev/pts");
        assert_eq!(SpecialFs::ALL[0], SpecialFs::Proc);
    }

    #[test]
    fn test_enabled_in() {
        let config = JailMountConfig {
            mountproc: true,
            mountsys: false,
            mountdevpts: true,
        };
        let enabled: Vec<_> = SpecialFs::ALL
            .into_iter()
            .filter(|fs| fs.enabled_in(&config))
            .collect();
        assert_eq!(enabled, vec![SpecialFs::Proc, SpecialFs::Devpts]);
    }

    #[test]
    fn test_dry_run_never_mutates() {
        let host = Counting::default();
        let dry = DryRun::new(&host);

        assert!(dry.is_mounted(Path::new("/mounted")).unwrap());
        dry.create_dir(Path::new("/jail/proc")).unwrap();
        dry.bind(Path::new("/home/bob"), Path::new("/jail/home/bob")).unwrap();
        dry.mount_special(SpecialFs::Proc, Path::new("/jail/proc")).unwrap();

        assert_eq!(*host.mutations.borrow(), 0);
    }

    #[test]
    fn test_host_create_dir_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proc");
        let host = HostMounts::default();
        host.create_dir(&path).unwrap();

        assert!(host.dir_exists(&path));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_host_create_dir_failure() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostMounts::default();
        let err = host
            .create_dir(&dir.path().join("missing/parent"))
            .unwrap_err();
        assert!(matches!(err, Error::CreateDir { .. }));
    }
}
