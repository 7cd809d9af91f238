use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TermailError};
use crate::model::FolderConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    #[default]
    None,
    Starttls,
    Wrapper,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: SmtpTls,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            tls: SmtpTls::None,
            skip_tls_verify: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AppSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    app: AppSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    smtp: Option<SmtpSettings>,
    #[serde(default, rename = "folder")]
    folders: Vec<FolderConfig>,
}

/// Durable folder configuration, persisted as TOML on every mutation.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    file: ConfigFile,
}

impl Config {
    /// Reads the config at `path`, creating an empty one (mode 0600) when absent.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            check_permissions(&path)?;
            let content = fs::read_to_string(&path)?;
            let file: ConfigFile = toml::from_str(&content)
                .map_err(|e| TermailError::Config(format!("{}: {}", path.display(), e)))?;
            debug!(
                "loaded config {} folders={}",
                path.display(),
                file.folders.len()
            );
            return Ok(Self { path, file });
        }
        let config = Self {
            path,
            file: ConfigFile::default(),
        };
        config.save()?;
        debug!("created config {}", config.path.display());
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All folder configs in declared order.
    pub fn folders(&self) -> &[FolderConfig] {
        &self.file.folders
    }

    pub fn folder(&self, name: &str) -> Result<FolderConfig> {
        self.file
            .folders
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .ok_or_else(|| TermailError::FolderNotFound(name.to_string()))
    }

    pub fn add_folder(&mut self, folder: FolderConfig) -> Result<()> {
        if self.file.folders.iter().any(|f| f.name == folder.name) {
            return Err(TermailError::FolderExists(folder.name));
        }
        self.file.folders.push(folder);
        self.save()
    }

    /// Replaces the stored fields of `folder.name`. Returns whether anything changed.
    pub fn update_folder(&mut self, folder: FolderConfig) -> Result<bool> {
        let existing = self
            .file
            .folders
            .iter_mut()
            .find(|f| f.name == folder.name)
            .ok_or_else(|| TermailError::FolderNotFound(folder.name.clone()))?;
        if *existing == folder {
            return Ok(false);
        }
        *existing = folder;
        self.save()?;
        Ok(true)
    }

    pub fn remove_folder(&mut self, name: &str) -> Result<FolderConfig> {
        let index = self
            .file
            .folders
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| TermailError::FolderNotFound(name.to_string()))?;
        let removed = self.file.folders.remove(index);
        self.save()?;
        Ok(removed)
    }

    /// Picks the folders a listing command should read.
    ///
    /// Without a pattern this is every primary folder (or every folder with
    /// `all`). With a pattern, folders whose name contains all terms are
    /// matched; primary matches win over non-primary ones unless `all` is set.
    pub fn select_folders(&self, pattern: &[String], all: bool) -> Result<Vec<FolderConfig>> {
        if pattern.is_empty() {
            let folders: Vec<FolderConfig> = self
                .file
                .folders
                .iter()
                .filter(|f| all || f.primary)
                .cloned()
                .collect();
            if folders.is_empty() {
                return Err(TermailError::NoFolders { primary_only: !all });
            }
            return Ok(folders);
        }

        let matches: Vec<FolderConfig> = self
            .file
            .folders
            .iter()
            .filter(|f| pattern.iter().all(|p| f.name.contains(p.as_str())))
            .cloned()
            .collect();
        if matches.is_empty() {
            return Err(TermailError::NoFolderMatch);
        }
        if all || !matches.iter().any(|f| f.primary) {
            return Ok(matches);
        }
        Ok(matches.into_iter().filter(|f| f.primary).collect())
    }

    /// Default sender address for outgoing mail.
    pub fn email(&self) -> Result<&str> {
        self.file
            .app
            .email
            .as_deref()
            .ok_or(TermailError::EmailNotConfigured)
    }

    pub fn set_email(&mut self, email: &str) -> Result<()> {
        self.file.app.email = Some(email.to_string());
        self.save()
    }

    pub fn smtp(&self) -> SmtpSettings {
        self.file.smtp.clone().unwrap_or_default()
    }

    fn save(&self) -> Result<()> {
        let content =
            toml::to_string_pretty(&self.file).map_err(|e| TermailError::Config(e.to_string()))?;
        write_private_atomic(&self.path, &content)
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(TermailError::ConfigUnsafe {
            path: path.to_path_buf(),
            mode: mode & 0o7777,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn write_private_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&tmp)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{Config, SmtpTls};
    use crate::error::TermailError;
    use crate::model::FolderConfig;

    fn temp_config_path() -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir()
            .join(format!("termail-config-{}-{}", std::process::id(), ts))
            .join("termail.toml")
    }

    fn folder(name: &str, primary: bool) -> FolderConfig {
        let mut f = FolderConfig::new(name, "imap.example.com", "me", "secret");
        f.primary = primary;
        f
    }

    fn cleanup(path: &PathBuf) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn load_creates_private_file_when_missing() -> anyhow::Result<()> {
        let path = temp_config_path();
        let config = Config::load(&path)?;
        assert!(path.exists());
        assert!(config.folders().is_empty());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path)?.permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }
        cleanup(&path);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn load_rejects_group_readable_file() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_config_path();
        Config::load(&path)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))?;
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, TermailError::ConfigUnsafe { mode: 0o644, .. }));
        cleanup(&path);
        Ok(())
    }

    #[test]
    fn mutations_persist_in_declared_order() -> anyhow::Result<()> {
        let path = temp_config_path();
        let mut config = Config::load(&path)?;
        config.add_folder(folder("work", true))?;
        config.add_folder(folder("archive", false))?;
        config.add_folder(folder("home", true))?;
        config.set_email("me@example.com")?;

        let reloaded = Config::load(&path)?;
        let names: Vec<&str> = reloaded.folders().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["work", "archive", "home"]);
        assert_eq!(reloaded.email()?, "me@example.com");
        assert!(!reloaded.folder("archive")?.primary);
        cleanup(&path);
        Ok(())
    }

    #[test]
    fn duplicate_and_missing_folders_are_reported() -> anyhow::Result<()> {
        let path = temp_config_path();
        let mut config = Config::load(&path)?;
        config.add_folder(folder("work", true))?;
        assert!(matches!(
            config.add_folder(folder("work", true)),
            Err(TermailError::FolderExists(_))
        ));
        assert!(matches!(
            config.folder("nope"),
            Err(TermailError::FolderNotFound(name)) if name == "nope"
        ));
        assert!(matches!(
            config.remove_folder("nope"),
            Err(TermailError::FolderNotFound(_))
        ));
        cleanup(&path);
        Ok(())
    }

    #[test]
    fn update_reports_whether_fields_changed() -> anyhow::Result<()> {
        let path = temp_config_path();
        let mut config = Config::load(&path)?;
        config.add_folder(folder("work", true))?;
        assert!(!config.update_folder(folder("work", true))?);

        let mut changed = folder("work", true);
        changed.folder = "Archive".to_string();
        assert!(config.update_folder(changed)?);
        assert_eq!(Config::load(&path)?.folder("work")?.folder, "Archive");

        config.remove_folder("work")?;
        assert!(Config::load(&path)?.folders().is_empty());
        cleanup(&path);
        Ok(())
    }

    #[test]
    fn select_folders_prefers_primary_matches() -> anyhow::Result<()> {
        let path = temp_config_path();
        let mut config = Config::load(&path)?;
        assert!(matches!(
            config.select_folders(&[], false),
            Err(TermailError::NoFolders { primary_only: true })
        ));
        config.add_folder(folder("work-inbox", true))?;
        config.add_folder(folder("work-archive", false))?;
        config.add_folder(folder("home-archive", false))?;

        let names = |folders: Vec<FolderConfig>| -> Vec<String> {
            folders.into_iter().map(|f| f.name).collect()
        };
        assert_eq!(names(config.select_folders(&[], false)?), vec!["work-inbox"]);
        assert_eq!(config.select_folders(&[], true)?.len(), 3);
        assert_eq!(
            names(config.select_folders(&["work".to_string()], false)?),
            vec!["work-inbox"]
        );
        assert_eq!(
            names(config.select_folders(&["work".to_string()], true)?),
            vec!["work-inbox", "work-archive"]
        );
        assert_eq!(
            names(config.select_folders(&["archive".to_string()], false)?),
            vec!["work-archive", "home-archive"]
        );
        assert_eq!(
            names(config.select_folders(&["home".to_string(), "archive".to_string()], false)?),
            vec!["home-archive"]
        );
        assert!(matches!(
            config.select_folders(&["xyz".to_string()], true),
            Err(TermailError::NoFolderMatch)
        ));
        cleanup(&path);
        Ok(())
    }

    #[test]
    fn smtp_defaults_to_unauthenticated_localhost() -> anyhow::Result<()> {
        let path = temp_config_path();
        let config = Config::load(&path)?;
        let smtp = config.smtp();
        assert_eq!(smtp.host, "localhost");
        assert_eq!(smtp.port, 25);
        assert_eq!(smtp.tls, SmtpTls::None);
        assert!(matches!(config.email(), Err(TermailError::EmailNotConfigured)));
        cleanup(&path);
        Ok(())
    }
}
