use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use termail_core::{DEFAULT_IMAP_PORT, SortKey};

/// Read, send and manage mail from the terminal.
///
/// Single message commands (read, details, flag, unflag, delete) target one
/// message, selected by matching PATTERN against subjects. Without a pattern
/// the last targeted message is used.
///
/// Listing commands (list, unread, flagged) list cached messages from the
/// primary folders, or from folders whose name matches PATTERN.
#[derive(Parser, Debug)]
#[command(name = "termail", version)]
pub(crate) struct Cli {
    /// Be verbose.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    /// Be quiet.
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,
    /// Log debugging information to stderr.
    #[arg(long, global = true)]
    pub(crate) debug: bool,
    /// Config file to use instead of the default.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,
    /// Message cache database to use instead of the default.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) db: Option<PathBuf>,
    /// Never prompt; fail when a choice would be needed.
    #[arg(long, global = true)]
    pub(crate) non_interactive: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Read a mail message.
    Read(ReadArgs),
    /// Show details of a mail message.
    Details(DetailsArgs),
    /// Flag a mail message.
    Flag(MessageArgs),
    /// Unflag a mail message.
    Unflag(MessageArgs),
    /// Delete a mail message.
    Delete(MessageArgs),
    /// List mail messages.
    List(ListArgs),
    /// List unread mail messages.
    Unread(ListArgs),
    /// List flagged mail messages.
    Flagged(ListArgs),
    /// Update the cache from all configured folders.
    Update(UpdateArgs),
    /// Send a new mail to RECIPIENT.
    Send(SendArgs),
    /// Manage folder configurations.
    #[command(subcommand)]
    Folder(FolderCommand),
    /// Inspect IMAP servers before configuring a folder.
    #[command(subcommand)]
    Server(ServerCommand),
    /// Manage application settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub(crate) struct MessageArgs {
    #[arg(value_name = "PATTERN")]
    pub(crate) pattern: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ReadArgs {
    #[arg(value_name = "PATTERN")]
    pub(crate) pattern: Vec<String>,
    /// Dump the message HTML instead of human friendly text.
    #[arg(long)]
    pub(crate) html: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DetailsArgs {
    #[arg(value_name = "PATTERN")]
    pub(crate) pattern: Vec<String>,
    /// Print message headers.
    #[arg(short = 'H', long)]
    pub(crate) headers: bool,
    /// Do not shorten long header values.
    #[arg(short = 'S', long)]
    pub(crate) no_shorten: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum SortArg {
    Date,
    Subject,
    From,
    Config,
}

impl From<SortArg> for SortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Date => SortKey::Date,
            SortArg::Subject => SortKey::Subject,
            SortArg::From => SortKey::Sender,
            SortArg::Config => SortKey::Folder,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    /// Terms that must all appear in a folder name.
    #[arg(value_name = "PATTERN")]
    pub(crate) pattern: Vec<String>,
    /// Update the cache before listing messages.
    #[arg(short, long)]
    pub(crate) update: bool,
    #[arg(short, long, value_enum, default_value_t = SortArg::Date)]
    pub(crate) sort: SortArg,
    /// Sort in descending order.
    #[arg(short, long)]
    pub(crate) desc: bool,
    /// Include non-primary folders.
    #[arg(short, long)]
    pub(crate) all: bool,
    /// Maximum number of messages listed, 0 for no limit.
    #[arg(short, long, default_value_t = 20)]
    pub(crate) limit: usize,
}

#[derive(Args, Debug)]
pub(crate) struct UpdateArgs {
    /// Maximum number of messages fetched from each folder, 0 for no limit.
    #[arg(short, long)]
    pub(crate) limit: Option<usize>,
}

#[derive(Args, Debug)]
pub(crate) struct SendArgs {
    pub(crate) recipient: String,
    #[arg(short, long)]
    pub(crate) subject: Option<String>,
    /// File to read the message text from, `-` for stdin.
    #[arg(short, long, default_value = "-")]
    pub(crate) message: String,
}

#[derive(Subcommand, Debug)]
pub(crate) enum FolderCommand {
    /// Add folder NAME, which references FOLDER on HOST.
    Add(FolderAdd),
    /// Change fields of an existing folder.
    Edit(FolderEdit),
    /// Remove the folder with the given NAME.
    Remove { name: String },
    /// List all folder names.
    List,
    /// Show details about a folder.
    Show {
        name: String,
        /// Show the password in plaintext.
        #[arg(short, long)]
        password: bool,
    },
}

#[derive(Args, Debug)]
pub(crate) struct FolderAdd {
    pub(crate) name: String,
    pub(crate) host: String,
    pub(crate) folder: String,
    #[arg(short, long)]
    pub(crate) user: Option<String>,
    /// Prompted for when omitted.
    #[arg(long)]
    pub(crate) password: Option<String>,
    #[arg(long, default_value_t = DEFAULT_IMAP_PORT)]
    pub(crate) port: u16,
    /// Do not mark this as a primary folder.
    #[arg(long)]
    pub(crate) not_primary: bool,
    #[arg(long)]
    pub(crate) skip_tls_verify: bool,
}

#[derive(Args, Debug)]
pub(crate) struct FolderEdit {
    pub(crate) name: String,
    #[arg(long)]
    pub(crate) host: Option<String>,
    #[arg(long)]
    pub(crate) folder: Option<String>,
    #[arg(short, long)]
    pub(crate) user: Option<String>,
    /// Prompt for a new password.
    #[arg(long)]
    pub(crate) password: bool,
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[arg(long, conflicts_with = "not_primary")]
    pub(crate) primary: bool,
    #[arg(long)]
    pub(crate) not_primary: bool,
    #[arg(long)]
    pub(crate) skip_tls_verify: Option<bool>,
}

#[derive(Args, Debug)]
pub(crate) struct ServerLogin {
    pub(crate) host: String,
    pub(crate) user: String,
    #[arg(long, default_value_t = DEFAULT_IMAP_PORT)]
    pub(crate) port: u16,
    /// Prompted for when omitted.
    #[arg(long)]
    pub(crate) password: Option<String>,
    #[arg(long)]
    pub(crate) skip_tls_verify: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ServerCommand {
    /// List all folders for USER on HOST.
    Folders(ServerLogin),
    /// List messages from FOLDER on HOST.
    Messages {
        #[command(flatten)]
        login: ServerLogin,
        folder: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ConfigCommand {
    /// Print the configured email address, or set it to EMAIL.
    Email { email: Option<String> },
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, FolderCommand, ServerCommand, SortArg};

    #[test]
    fn listing_defaults() {
        let cli = Cli::parse_from(["termail", "list"]);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.limit, 20);
        assert_eq!(args.sort, SortArg::Date);
        assert!(!args.desc && !args.all && !args.update);
    }

    #[test]
    fn globals_are_accepted_after_the_subcommand() {
        let cli = Cli::parse_from(["termail", "read", "Invoice", "March", "-v", "--html"]);
        assert!(cli.verbose);
        let Command::Read(args) = cli.command else {
            panic!("expected read");
        };
        assert_eq!(args.pattern, vec!["Invoice", "March"]);
        assert!(args.html);
    }

    #[test]
    fn details_uses_capital_short_flags() {
        let cli = Cli::parse_from(["termail", "details", "-H", "-S"]);
        let Command::Details(args) = cli.command else {
            panic!("expected details");
        };
        assert!(args.headers && args.no_shorten);
        assert!(args.pattern.is_empty());
    }

    #[test]
    fn server_messages_takes_folder_and_limit() {
        let cli = Cli::parse_from([
            "termail", "server", "messages", "imap.example.com", "me", "INBOX", "-l", "5",
        ]);
        let Command::Server(ServerCommand::Messages { login, folder, limit }) = cli.command else {
            panic!("expected server messages");
        };
        assert_eq!(login.host, "imap.example.com");
        assert_eq!(login.port, 993);
        assert_eq!(folder, "INBOX");
        assert_eq!(limit, 5);
    }

    #[test]
    fn folder_add_marks_primary_by_default() {
        let cli = Cli::parse_from([
            "termail", "folder", "add", "work", "imap.example.com", "INBOX", "-u", "me",
        ]);
        let Command::Folder(FolderCommand::Add(args)) = cli.command else {
            panic!("expected folder add");
        };
        assert!(!args.not_primary);
        assert_eq!(args.user.as_deref(), Some("me"));
        assert_eq!(args.password, None);
    }
}
