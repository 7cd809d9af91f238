use std::io::Read;

use anyhow::Result;
use crossterm::style::Stylize;

use termail_core::{
    CacheSynchronizer, CachedMessage, Flag, FolderConfig, MessageQuery, RemoteMailbox,
    SyncOutcome, SyncProgress, TermailError, select_message,
};
use termail_mail::{OutgoingMessage, send_message};

use crate::cli::{
    Command, ConfigCommand, DetailsArgs, FolderAdd, FolderCommand, FolderEdit, ListArgs,
    MessageArgs, ReadArgs, SendArgs, ServerCommand, ServerLogin, UpdateArgs,
};
use crate::context::Context;
use crate::output::{self, bail, header, info, section, shorten, warn};
use crate::prompt::{self, SelectChooser};

const DETAILS_WIDTH: usize = 30;
const SERVER_SUBJECT_WIDTH: usize = 80;

#[derive(Clone, Copy)]
enum Listing {
    All,
    Unread,
    Flagged,
}

impl Listing {
    fn keeps(self, message: &CachedMessage) -> bool {
        match self {
            Listing::All => true,
            Listing::Unread => !message.seen(),
            Listing::Flagged => message.flagged(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Listing::All => "",
            Listing::Unread => "unread ",
            Listing::Flagged => "flagged ",
        }
    }
}

pub(crate) async fn run(ctx: &mut Context, command: Command) -> Result<()> {
    match command {
        Command::Read(args) => read(ctx, args).await,
        Command::Details(args) => details(ctx, args).await,
        Command::Flag(args) => flag(ctx, args, true).await,
        Command::Unflag(args) => flag(ctx, args, false).await,
        Command::Delete(args) => delete(ctx, args).await,
        Command::List(args) => list(ctx, args, Listing::All).await,
        Command::Unread(args) => list(ctx, args, Listing::Unread).await,
        Command::Flagged(args) => list(ctx, args, Listing::Flagged).await,
        Command::Update(args) => update(ctx, args).await,
        Command::Send(args) => send(ctx, args).await,
        Command::Folder(cmd) => folder(ctx, cmd).await,
        Command::Server(cmd) => server(ctx, cmd).await,
        Command::Config(ConfigCommand::Email { email }) => config_email(ctx, email),
    }
}

async fn select(ctx: &Context, patterns: &[String]) -> Result<CachedMessage> {
    let chooser = SelectChooser;
    Ok(select_message(&ctx.cache, patterns, ctx.interaction(&chooser)).await?)
}

async fn read(ctx: &Context, args: ReadArgs) -> Result<()> {
    let mut message = select(ctx, &args.pattern).await?;
    ctx.coordinator().mark_read(&mut message).await?;
    if args.html {
        println!("{}", message.html);
        return Ok(());
    }

    let date = message
        .date()
        .map(|d| d.format("%d %b %Y %H:%M:%S %:z").to_string())
        .unwrap_or_else(|| message.date_str.clone());
    section("From", &message.from);
    section("To", &output::join_addresses(&message.to));
    section("Cc", &output::join_addresses(&message.cc));
    section("Bcc", &output::join_addresses(&message.bcc));
    section("Date", &date);
    section("Reply", &output::join_addresses(&message.reply_to));
    header(&message.subject);

    let marker = "LINK".dim().to_string();
    let text = termail_content::reading_text(&message.text, &message.html, &marker);
    if text.is_empty() {
        println!("<no plain text>");
    } else {
        println!("{}", text);
    }
    Ok(())
}

async fn details(ctx: &Context, args: DetailsArgs) -> Result<()> {
    let message = select(ctx, &args.pattern).await?;
    header(&shorten(&message.subject, DETAILS_WIDTH));
    if message.text.is_empty() {
        println!("No plain text content.");
    }
    println!("From: {}", message.from);
    println!("To: {}", output::join_addresses(&message.to));
    println!("CC: {}", output::join_addresses(&message.cc));
    println!("BCC: {}", output::join_addresses(&message.bcc));
    println!("Reply to: {}", output::join_addresses(&message.reply_to));
    println!("Date: {}", message.date_str);
    println!("Size: {}", message.size);

    if message.flags.is_empty() {
        println!("No flags.");
    } else {
        println!("Flags:\n  {}", message.flags.tokens().join("\n  "));
    }

    if args.headers && !message.headers.is_empty() {
        println!("Headers:");
        for (name, values) in &message.headers {
            let mut value = values.join(", ");
            if !args.no_shorten {
                value = shorten(&value, DETAILS_WIDTH);
            }
            println!("  {}: {}", name, value);
        }
    } else if args.headers {
        println!("No headers.");
    } else {
        println!("{} headers.", message.headers.len());
    }

    let attachments = ctx.cache.attachments(message.id).await?;
    if !attachments.is_empty() {
        println!("Attachments:");
        for attachment in attachments {
            println!(
                "  {} ({}, {} bytes)",
                attachment.filename, attachment.content_type, attachment.size
            );
        }
    }
    Ok(())
}

async fn flag(ctx: &Context, args: MessageArgs, value: bool) -> Result<()> {
    let mut message = select(ctx, &args.pattern).await?;
    let changed = ctx
        .coordinator()
        .set_flag(&mut message, Flag::Flagged, value)
        .await?;
    let verb = if value { "Flagged" } else { "Unflagged" };
    if changed {
        ctx.info(&format!("{} message \"{}\"", verb, message.subject));
    } else {
        ctx.info(&format!(
            "Message \"{}\" was already {}",
            message.subject,
            verb.to_lowercase()
        ));
    }
    Ok(())
}

async fn delete(ctx: &Context, args: MessageArgs) -> Result<()> {
    let message = select(ctx, &args.pattern).await?;
    ctx.coordinator().delete(&message).await?;
    ctx.cache.clear_last_selected().await?;
    ctx.info(&format!("Deleted message \"{}\"", message.subject));
    Ok(())
}

async fn list(ctx: &Context, args: ListArgs, listing: Listing) -> Result<()> {
    if args.update {
        synchronize(ctx, None).await?;
    }
    let folders = ctx.config.select_folders(&args.pattern, args.all)?;
    let names: Vec<String> = folders.iter().map(|f| f.name.clone()).collect();
    let fstr = names.join(", ");

    let query = MessageQuery {
        folders: Some(names),
        limit: Some(args.limit),
        sort: args.sort.into(),
        descending: args.desc,
    };
    let messages = ctx.cache.query(&query).await?;
    if messages.is_empty() {
        return Err(bail(format!(
            "No messages found in folders: {} (try running `termail update`)",
            fstr
        )));
    }

    let messages: Vec<CachedMessage> = messages
        .into_iter()
        .filter(|m| listing.keeps(m))
        .collect();
    ctx.info(&listing_summary(listing, messages.is_empty(), &fstr));
    output::print_messages(&messages);
    Ok(())
}

fn listing_summary(listing: Listing, empty: bool, folders: &str) -> String {
    if empty {
        format!("No {}messages in folders: {}", listing.label(), folders)
    } else {
        format!("Listing {}messages from folders: {}", listing.label(), folders)
    }
}

async fn update(ctx: &Context, args: UpdateArgs) -> Result<()> {
    synchronize(ctx, args.limit).await?;
    ctx.info("Updated all folders");
    Ok(())
}

async fn synchronize(ctx: &Context, limit: Option<usize>) -> Result<()> {
    let folders = ctx.config.folders();
    if folders.is_empty() {
        return Err(TermailError::NoFolders {
            primary_only: false,
        }
        .into());
    }
    let quiet = ctx.quiet;
    let verbose = ctx.verbose;
    let synchronizer = CacheSynchronizer::new(&ctx.remote, &ctx.cache);
    let outcome = synchronizer
        .synchronize(folders, limit, |progress| match progress {
            SyncProgress::Started { folder } if !quiet => {
                info(&format!("Fetching {}", folder));
            }
            SyncProgress::Finished { folder, fetched } if verbose => {
                info(&format!("Fetched {} messages from {}", fetched, folder));
            }
            _ => {}
        })
        .await?;
    match outcome {
        SyncOutcome::Replaced { messages, .. } => {
            ctx.info(&format!("Cached {} messages", messages));
        }
        SyncOutcome::Empty => {
            if !quiet {
                warn("No messages fetched, keeping the current cache");
            }
        }
    }
    Ok(())
}

fn read_body(source: &str) -> Result<String> {
    if source == "-" {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        return Ok(body);
    }
    Ok(std::fs::read_to_string(source)?)
}

async fn send(ctx: &Context, args: SendArgs) -> Result<()> {
    let from = ctx.config.email()?.to_string();
    let subject = match args.subject {
        Some(subject) => subject,
        None if ctx.interactive => prompt::text("Subject")?,
        None => return Err(bail("--subject is required when not interactive")),
    };
    let body = read_body(&args.message)?;
    let message = OutgoingMessage {
        from,
        to: args.recipient.clone(),
        subject,
        body,
    };
    send_message(&ctx.config.smtp(), &message).await?;
    ctx.info(&format!("Mail sent to {}", args.recipient));
    Ok(())
}

fn password_or_prompt(ctx: &Context, password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None if ctx.interactive => Ok(prompt::password(true)?),
        None => Err(bail("--password is required when not interactive")),
    }
}

fn folder_error(err: TermailError, name: &str) -> anyhow::Error {
    match err {
        TermailError::FolderNotFound(_) => bail(format!(
            "Folder \"{}\" not found (try `folder list` to see all folders)",
            name
        )),
        other => other.into(),
    }
}

async fn folder(ctx: &mut Context, command: FolderCommand) -> Result<()> {
    match command {
        FolderCommand::Add(args) => folder_add(ctx, args),
        FolderCommand::Edit(args) => folder_edit(ctx, args),
        FolderCommand::Remove { name } => {
            ctx.config
                .remove_folder(&name)
                .map_err(|err| folder_error(err, &name))?;
            ctx.info(&format!("Removed folder {}", name));
            Ok(())
        }
        FolderCommand::List => {
            let folders = ctx.config.folders();
            let width = folders.iter().map(|f| f.name.len()).max().unwrap_or(0);
            for f in folders {
                println!("{:<width$} ({})", f.name, f.host, width = width);
            }
            Ok(())
        }
        FolderCommand::Show { name, password } => folder_show(ctx, &name, password).await,
    }
}

fn folder_add(ctx: &mut Context, args: FolderAdd) -> Result<()> {
    let user = match args.user {
        Some(user) => user,
        None if ctx.interactive => prompt::text("User")?,
        None => return Err(bail("--user is required when not interactive")),
    };
    let password = password_or_prompt(ctx, args.password)?;
    let mut folder = FolderConfig::new(&args.name, &args.host, &user, &password);
    folder.folder = args.folder;
    folder.port = args.port;
    folder.primary = !args.not_primary;
    folder.skip_tls_verify = args.skip_tls_verify;
    ctx.config.add_folder(folder)?;
    ctx.info(&format!("Added folder {}", args.name));
    Ok(())
}

fn folder_edit(ctx: &mut Context, args: FolderEdit) -> Result<()> {
    let mut folder = ctx.folder(&args.name)?;
    if let Some(host) = args.host {
        folder.host = host;
    }
    if let Some(remote) = args.folder {
        folder.folder = remote;
    }
    if let Some(user) = args.user {
        folder.user = user;
    }
    if let Some(port) = args.port {
        folder.port = port;
    }
    if args.password {
        if !ctx.interactive {
            return Err(bail("cannot prompt for a password when not interactive"));
        }
        folder.password = prompt::password(true)?;
    }
    if args.primary {
        folder.primary = true;
    } else if args.not_primary {
        folder.primary = false;
    }
    if let Some(skip) = args.skip_tls_verify {
        folder.skip_tls_verify = skip;
    }
    if ctx.config.update_folder(folder)? {
        ctx.info(&format!("Updated folder {}", args.name));
    } else {
        ctx.info(&format!("Folder {} unchanged", args.name));
    }
    Ok(())
}

async fn folder_show(ctx: &Context, name: &str, show_password: bool) -> Result<()> {
    let folder = ctx
        .config
        .folder(name)
        .map_err(|err| folder_error(err, name))?;
    let cached = ctx.cache.count_for_folder(&folder.name).await?;
    let password = if show_password {
        folder.password.clone()
    } else {
        "*".repeat(folder.password.chars().count())
    };
    let rows = [
        ("Name", folder.name.clone()),
        ("Host", folder.host.clone()),
        ("Port", folder.port.to_string()),
        ("User", folder.user.clone()),
        ("Password", password),
        ("Folder", folder.folder.clone()),
        ("Primary", folder.primary.to_string()),
        ("Skip tls verify", folder.skip_tls_verify.to_string()),
        ("Cached msg", cached.to_string()),
    ];
    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in rows {
        println!("{:<width$} : {}", key, value, width = width);
    }
    Ok(())
}

fn login_folder(ctx: &Context, login: ServerLogin, remote_folder: &str) -> Result<FolderConfig> {
    let password = password_or_prompt(ctx, login.password)?;
    let mut folder = FolderConfig::new("server", &login.host, &login.user, &password);
    folder.port = login.port;
    folder.folder = remote_folder.to_string();
    folder.skip_tls_verify = login.skip_tls_verify;
    Ok(folder)
}

async fn server(ctx: &Context, command: ServerCommand) -> Result<()> {
    match command {
        ServerCommand::Folders(login) => {
            let folder = login_folder(ctx, login, termail_core::DEFAULT_REMOTE_FOLDER)?;
            ctx.info(&format!(
                "Logging into {} with user {}",
                folder.host, folder.user
            ));
            let names = ctx.remote.list_mailboxes(&folder).await?;
            println!("{}", names.join("\n"));
        }
        ServerCommand::Messages {
            login,
            folder,
            limit,
        } => {
            let folder = login_folder(ctx, login, &folder)?;
            ctx.info(&format!(
                "Logging into {} with user {}",
                folder.host, folder.user
            ));
            ctx.info(&format!("Fetching {} messages from {}", limit, folder.folder));
            let messages = ctx.remote.fetch(&folder, Some(limit), true).await?;
            for message in messages {
                println!(
                    "{:<width$} {}",
                    shorten(&message.subject, SERVER_SUBJECT_WIDTH),
                    message.from,
                    width = SERVER_SUBJECT_WIDTH
                );
            }
        }
    }
    Ok(())
}

fn config_email(ctx: &mut Context, email: Option<String>) -> Result<()> {
    match email {
        Some(email) => {
            ctx.config.set_email(&email)?;
            ctx.info(&format!("Email set to {}", email));
        }
        None => println!("{}", ctx.config.email()?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use termail_core::{CachedMessage, Flags};

    use super::{Listing, listing_summary};

    fn message(flags: &[&str]) -> CachedMessage {
        CachedMessage {
            id: 1,
            config_name: "work".to_string(),
            server: "imap.example.com".to_string(),
            folder: "INBOX".to_string(),
            uid: Some(1),
            subject: "Invoice".to_string(),
            from: "a@example.com".to_string(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            date_str: String::new(),
            timestamp: 0,
            text: String::new(),
            html: String::new(),
            flags: flags.iter().collect::<Flags>(),
            headers: Default::default(),
            size: 0,
            size_rfc822: 0,
        }
    }

    #[test]
    fn listings_filter_on_flags() {
        let unread = message(&[]);
        let seen_flagged = message(&["\\Seen", "\\Flagged"]);
        assert!(Listing::All.keeps(&unread));
        assert!(Listing::Unread.keeps(&unread));
        assert!(!Listing::Unread.keeps(&seen_flagged));
        assert!(Listing::Flagged.keeps(&seen_flagged));
        assert!(!Listing::Flagged.keeps(&unread));
    }

    #[test]
    fn listing_summary_names_the_filter() {
        assert_eq!(
            listing_summary(Listing::Unread, true, "work, home"),
            "No unread messages in folders: work, home"
        );
        assert_eq!(
            listing_summary(Listing::All, false, "work"),
            "Listing messages from folders: work"
        );
    }
}
