use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

use termail_core::{
    Chooser, Config, FolderConfig, Interaction, MutationCoordinator, SqliteMessageCache,
};
use termail_mail::ImapMailbox;

use crate::cli::Cli;
use crate::output;

pub(crate) fn xdg_config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub(crate) fn xdg_state_dir() -> PathBuf {
    std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Everything a command needs: config, cache, server access and output mode.
pub(crate) struct Context {
    pub(crate) config: Config,
    pub(crate) cache: SqliteMessageCache,
    pub(crate) remote: ImapMailbox,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
    pub(crate) interactive: bool,
}

impl Context {
    pub(crate) async fn open(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| xdg_config_dir().join("termail").join("termail.toml"));
        let config = Config::load(config_path)?;

        let db_path = cli
            .db
            .clone()
            .unwrap_or_else(|| xdg_state_dir().join("termail").join("cache.db"));
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db_str = db_path
            .to_str()
            .ok_or_else(|| anyhow!("invalid cache path {}", db_path.display()))?;
        let cache = SqliteMessageCache::connect(db_str).await?;
        cache.init().await?;

        Ok(Self {
            config,
            cache,
            remote: ImapMailbox::new(),
            verbose: cli.verbose && !cli.quiet,
            quiet: cli.quiet,
            interactive: !cli.non_interactive && std::io::stdin().is_terminal(),
        })
    }

    /// Progress line shown with `--verbose`.
    pub(crate) fn info(&self, message: &str) {
        if self.verbose {
            output::info(message);
        }
    }

    pub(crate) fn interaction<'a>(&self, chooser: &'a dyn Chooser) -> Interaction<'a> {
        if self.interactive {
            Interaction::Interactive(chooser)
        } else {
            Interaction::NonInteractive
        }
    }

    pub(crate) fn coordinator(&self) -> MutationCoordinator<'_> {
        MutationCoordinator::new(&self.remote, &self.cache, self.config.folders())
    }

    pub(crate) fn folder(&self, name: &str) -> Result<FolderConfig> {
        Ok(self.config.folder(name)?)
    }
}
