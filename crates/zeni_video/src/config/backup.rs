//! Configuration backup and recovery
//!
//! The video configuration lives in two scopes, a user-writable one under the
//! platform's application data directory and a local one next to the
//! executable's working directory. Each scope has a `current` file, the one
//! read at startup, and a `backup` file that only ever holds a configuration
//! which produced a working device.
//!
//! [`ConfigGuardian::snapshot`] runs after the first successful device
//! construction and refreshes the backups. [`ConfigGuardian::heal`] runs after
//! a failed construction and prepares the *next* attempt: it restores a backup
//! or, when none exists, writes conservative defaults. Neither operation ever
//! fails; outcomes are returned as reports and logged.

use std::fmt;
use std::path::{Path, PathBuf};

use super::{Config, ConfigError, ConfigFormat, VideoConfig};
use crate::foundation::fs::{FileSystem, StdFileSystem};

/// Which of the two configuration locations a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// Per-user application data directory
    User,
    /// Relative to the working directory
    Local,
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// The current/backup pair of one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePaths {
    /// File consulted at startup
    pub current: PathBuf,
    /// Last configuration known to have produced a device
    pub backup: PathBuf,
}

impl ScopePaths {
    /// Pair a current file with its `.bak` sibling
    pub fn new(current: impl Into<PathBuf>) -> Self {
        let current = current.into();
        let mut backup = current.clone().into_os_string();
        backup.push(".bak");
        Self {
            current,
            backup: PathBuf::from(backup),
        }
    }
}

/// All four configuration paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Application data root, e.g. `~/.local/share/<app>/`
    pub appdata: PathBuf,
    /// `<appdata>/config/`
    pub user_dir: PathBuf,
    /// `<appdata>/config/zenilib.toml` and its backup
    pub user: ScopePaths,
    /// `config/zenilib.toml` and its backup
    pub local: ScopePaths,
}

impl ConfigPaths {
    /// File name of the persisted configuration in both scopes
    pub const FILE_NAME: &'static str = "zenilib.toml";

    /// Build the paths from an application data root and a local root
    pub fn new(appdata: impl Into<PathBuf>, local_root: impl AsRef<Path>) -> Self {
        let appdata = appdata.into();
        let user_dir = appdata.join("config");
        Self {
            user: ScopePaths::new(user_dir.join(Self::FILE_NAME)),
            local: ScopePaths::new(local_root.as_ref().join("config").join(Self::FILE_NAME)),
            appdata,
            user_dir,
        }
    }

    /// Paths for `app_name`, using the platform data directory and the working directory
    pub fn for_application(app_name: &str) -> Result<Self, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoAppData)?;
        Ok(Self::new(data_dir.join(app_name), "."))
    }

    /// Serialization format of the configuration files
    pub fn format(&self) -> ConfigFormat {
        ConfigFormat::from_path(&self.user.current).unwrap_or(ConfigFormat::Toml)
    }

    /// Paths of one scope
    pub fn scope(&self, scope: ConfigScope) -> &ScopePaths {
        match scope {
            ConfigScope::User => &self.user,
            ConfigScope::Local => &self.local,
        }
    }
}

/// Outcome of [`ConfigGuardian::heal`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealReport {
    /// A backup was copied over the current file of `scope`
    Restored {
        /// Scope whose backup was restored
        scope: ConfigScope,
        /// Whether the backup file was deleted afterwards
        backup_removed: bool,
    },
    /// No backup could be restored; conservative defaults were written
    Defaults {
        /// Whether the user-scope current file was written
        user_written: bool,
        /// Whether the local-scope current file was written
        local_written: bool,
    },
}

/// One copy performed by [`ConfigGuardian::snapshot`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRecord {
    /// Source file
    pub from: PathBuf,
    /// Destination file
    pub to: PathBuf,
    /// Whether the copy succeeded
    pub ok: bool,
}

/// Outcome of [`ConfigGuardian::snapshot`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    /// Whether the user-scope directory tree exists
    pub user_dir_ready: bool,
    /// Scope whose current file was propagated, if any was readable
    pub source: Option<ConfigScope>,
    /// Every copy attempted, in order
    pub copies: Vec<CopyRecord>,
}

/// Runs the backup and recovery protocol over a [`FileSystem`]
pub struct ConfigGuardian {
    paths: ConfigPaths,
    fs: Box<dyn FileSystem>,
}

impl fmt::Debug for ConfigGuardian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigGuardian").field("paths", &self.paths).finish_non_exhaustive()
    }
}

impl ConfigGuardian {
    /// Guard `paths` using the real file system
    pub fn new(paths: ConfigPaths) -> Self {
        Self::with_file_system(paths, Box::new(StdFileSystem))
    }

    /// Guard `paths` using a custom file system
    pub fn with_file_system(paths: ConfigPaths, fs: Box<dyn FileSystem>) -> Self {
        Self { paths, fs }
    }

    /// The guarded paths
    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Read the current configuration, preferring the user scope
    ///
    /// Unreadable or unparsable files are skipped with a warning.
    pub fn load_current(&self) -> Option<(ConfigScope, VideoConfig)> {
        [ConfigScope::User, ConfigScope::Local].into_iter().find_map(|scope| {
            let config = self.read_scope(scope)?;
            log::debug!("Loaded video configuration from '{}'", self.paths.scope(scope).current.display());
            Some((scope, config))
        })
    }

    fn read_scope(&self, scope: ConfigScope) -> Option<VideoConfig> {
        let path = &self.paths.scope(scope).current;
        let contents = self.fs.read_file(path)?;
        VideoConfig::from_config_str(&contents, self.paths.format())
            .map_err(|e| log::warn!("Ignoring unreadable configuration '{}': {}", path.display(), e))
            .ok()
    }

    /// Recover from a failed device construction
    ///
    /// Restores the user backup, else the local backup, else writes the
    /// conservative defaults to both scopes. Never fails.
    pub fn heal(&self) -> HealReport {
        for scope in [ConfigScope::User, ConfigScope::Local] {
            let pair = self.paths.scope(scope);
            if !self.fs.exists(&pair.backup) {
                continue;
            }

            if self.fs.copy_file(&pair.backup, &pair.current) {
                let backup_removed = self.fs.delete_file(&pair.backup);
                log::warn!(
                    "'{}' backup restored due to initialization failure.",
                    pair.current.display()
                );
                if !backup_removed {
                    log::warn!("Could not remove '{}' after restoring it", pair.backup.display());
                }
                return HealReport::Restored { scope, backup_removed };
            }

            log::error!(
                "Could not restore '{}' from '{}'",
                pair.current.display(),
                pair.backup.display()
            );
        }

        self.write_defaults()
    }

    fn write_defaults(&self) -> HealReport {
        let contents = match VideoConfig::conservative().to_config_string(self.paths.format()) {
            Ok(contents) => contents,
            Err(e) => {
                log::error!("Could not render default video configuration: {}", e);
                return HealReport::Defaults {
                    user_written: false,
                    local_written: false,
                };
            }
        };

        let user_written = self.create_user_dir() && self.fs.write_file(&self.paths.user.current, &contents);
        if user_written {
            log::warn!("'{}' reset due to initialization failure.", self.paths.user.current.display());
        } else {
            log::error!("Could not reset '{}'", self.paths.user.current.display());
        }

        let local_written = self.fs.write_file(&self.paths.local.current, &contents);
        if local_written {
            log::warn!("'{}' reset due to initialization failure.", self.paths.local.current.display());
        } else {
            log::error!("Could not reset '{}'", self.paths.local.current.display());
        }

        HealReport::Defaults {
            user_written,
            local_written,
        }
    }

    /// Record the configuration that just produced a working device
    ///
    /// Only a current file that parses is propagated, the same one
    /// [`ConfigGuardian::load_current`] would pick.
    pub fn snapshot(&self) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        let (user, local) = (&self.paths.user, &self.paths.local);

        if self.create_user_dir() {
            report.user_dir_ready = true;
            if self.read_scope(ConfigScope::User).is_some() && self.copy(&user.current, &user.backup, &mut report) {
                report.source = Some(ConfigScope::User);
                self.copy(&user.current, &local.current, &mut report);
                self.copy(&user.current, &local.backup, &mut report);
            } else if self.read_scope(ConfigScope::Local).is_some()
                && self.copy(&local.current, &user.current, &mut report)
            {
                report.source = Some(ConfigScope::Local);
                self.copy(&local.current, &user.backup, &mut report);
            }
        } else if self.read_scope(ConfigScope::Local).is_some() && self.copy(&local.current, &local.backup, &mut report) {
            report.source = Some(ConfigScope::Local);
        }

        match report.source {
            Some(scope) => log::info!("Backed up {} video configuration", scope),
            None => log::debug!("No video configuration to back up"),
        }
        report
    }

    fn create_user_dir(&self) -> bool {
        self.fs.create_directory(&self.paths.appdata) && self.fs.create_directory(&self.paths.user_dir)
    }

    fn copy(&self, from: &Path, to: &Path, report: &mut SnapshotReport) -> bool {
        // Copying a file onto itself would truncate it
        let ok = from != to && self.fs.copy_file(from, to);
        report.copies.push(CopyRecord {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            ok,
        });
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_text(width: i32) -> String {
        let mut config = VideoConfig::conservative();
        config.zenilib.video.resolution.width = width;
        config.to_config_string(ConfigFormat::Toml).unwrap()
    }

    fn guardian() -> (tempfile::TempDir, ConfigGuardian) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path().join("appdata"), dir.path().join("app"));
        std::fs::create_dir_all(paths.local.current.parent().unwrap()).unwrap();
        (dir, ConfigGuardian::new(paths))
    }

    #[test]
    fn test_scope_paths_append_bak() {
        let pair = ScopePaths::new("config/zenilib.toml");
        assert_eq!(pair.backup, PathBuf::from("config/zenilib.toml.bak"));
    }

    #[test]
    fn test_paths_layout() {
        let paths = ConfigPaths::new("/data/app", "/work");
        assert_eq!(paths.user.current, PathBuf::from("/data/app/config/zenilib.toml"));
        assert_eq!(paths.local.backup, PathBuf::from("/work/config/zenilib.toml.bak"));
        assert_eq!(paths.format(), ConfigFormat::Toml);
    }

    #[test]
    fn test_snapshot_without_any_config() {
        let (_dir, guardian) = guardian();
        let report = guardian.snapshot();

        assert!(report.user_dir_ready);
        assert_eq!(report.source, None);
        assert!(report.copies.iter().all(|c| !c.ok));
        assert!(!guardian.paths().user.backup.exists());
    }

    #[test]
    fn test_snapshot_propagates_local_config() {
        let (_dir, guardian) = guardian();
        let paths = guardian.paths().clone();
        let local = config_text(640);
        std::fs::write(&paths.local.current, &local).unwrap();

        let report = guardian.snapshot();

        assert_eq!(report.source, Some(ConfigScope::Local));
        assert_eq!(std::fs::read_to_string(&paths.user.current).unwrap(), local);
        assert_eq!(std::fs::read_to_string(&paths.user.backup).unwrap(), local);
    }

    #[test]
    fn test_snapshot_prefers_user_config() {
        let (_dir, guardian) = guardian();
        let paths = guardian.paths().clone();
        std::fs::create_dir_all(&paths.user_dir).unwrap();
        let user = config_text(1024);
        std::fs::write(&paths.user.current, &user).unwrap();
        std::fs::write(&paths.local.current, config_text(640)).unwrap();

        let report = guardian.snapshot();

        assert_eq!(report.source, Some(ConfigScope::User));
        for path in [&paths.user.backup, &paths.local.current, &paths.local.backup] {
            assert_eq!(std::fs::read_to_string(path).unwrap(), user);
        }
    }

    #[test]
    fn test_snapshot_skips_unparsable_user_config() {
        let (_dir, guardian) = guardian();
        let paths = guardian.paths().clone();
        let local = config_text(640);
        std::fs::create_dir_all(&paths.user_dir).unwrap();
        std::fs::write(&paths.user.current, "garbage = = =").unwrap();
        std::fs::write(&paths.local.current, &local).unwrap();

        let report = guardian.snapshot();

        assert_eq!(report.source, Some(ConfigScope::Local));
        for path in [&paths.user.current, &paths.user.backup, &paths.local.current] {
            assert_eq!(std::fs::read_to_string(path).unwrap(), local);
        }
        assert!(!paths.local.backup.exists());
    }

    #[test]
    fn test_heal_restores_local_backup_when_no_user_backup() {
        let (_dir, guardian) = guardian();
        let paths = guardian.paths().clone();
        std::fs::write(&paths.local.current, "broken").unwrap();
        std::fs::write(&paths.local.backup, "good").unwrap();

        let report = guardian.heal();

        assert_eq!(
            report,
            HealReport::Restored {
                scope: ConfigScope::Local,
                backup_removed: true
            }
        );
        assert_eq!(std::fs::read_to_string(&paths.local.current).unwrap(), "good");
        assert!(!paths.local.backup.exists());
    }

    #[test]
    fn test_load_current_skips_unparsable_user_file() {
        let (_dir, guardian) = guardian();
        let paths = guardian.paths().clone();
        std::fs::create_dir_all(&paths.user_dir).unwrap();
        std::fs::write(&paths.user.current, "this is = = not toml").unwrap();

        let mut config = VideoConfig::conservative();
        config.zenilib.video.full_screen = true;
        config.save_to_file(&paths.local.current).unwrap();

        let (scope, loaded) = guardian.load_current().unwrap();
        assert_eq!(scope, ConfigScope::Local);
        assert!(loaded.zenilib.video.full_screen);
    }
}
