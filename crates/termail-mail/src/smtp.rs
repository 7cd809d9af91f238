use anyhow::{Result, anyhow};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use mailparse::{MailAddr, addrparse};
use tracing::{debug, info};

use termail_core::{SmtpSettings, SmtpTls, TermailError};

#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Sends one plain-text message. A single attempt, no queueing.
pub async fn send_message(
    smtp: &SmtpSettings,
    message: &OutgoingMessage,
) -> termail_core::Result<()> {
    send_smtp(smtp, message)
        .await
        .map_err(|e| TermailError::Send(format!("{:#}", e)))
}

async fn send_smtp(smtp: &SmtpSettings, message: &OutgoingMessage) -> Result<()> {
    let email = build_message(message)?;
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
        .port(smtp.port);
    builder = match smtp.tls {
        SmtpTls::None => builder.tls(Tls::None),
        SmtpTls::Starttls => builder.tls(Tls::Required(tls_parameters(smtp)?)),
        SmtpTls::Wrapper => builder.tls(Tls::Wrapper(tls_parameters(smtp)?)),
    };
    if let Some(username) = &smtp.username {
        let password = smtp.password.clone().unwrap_or_default();
        builder = builder.credentials(Credentials::new(username.clone(), password));
    }
    let mailer = builder.build();

    debug!(
        "smtp send host={} port={} tls={:?}",
        smtp.host, smtp.port, smtp.tls
    );
    mailer
        .send(email)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    info!("sent \"{}\" to {}", message.subject, message.to);
    Ok(())
}

fn tls_parameters(smtp: &SmtpSettings) -> Result<TlsParameters> {
    let mut tls_builder = TlsParameters::builder(smtp.host.clone());
    if smtp.skip_tls_verify {
        tls_builder = tls_builder
            .dangerous_accept_invalid_certs(true)
            .dangerous_accept_invalid_hostnames(true);
    }
    Ok(tls_builder.build()?)
}

fn build_message(message: &OutgoingMessage) -> Result<Message> {
    let to_addrs = parse_mailbox_list(&message.to)?;
    if to_addrs.is_empty() {
        return Err(anyhow!("No recipients"));
    }
    let mut builder = Message::builder()
        .from(parse_mailbox(&message.from)?)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    for addr in to_addrs {
        builder = builder.to(addr);
    }
    Ok(builder.body(message.body.clone())?)
}

fn parse_mailbox(input: &str) -> Result<Mailbox> {
    let trimmed = input.trim();
    if let (Some(start), Some(end)) = (trimmed.find('<'), trimmed.find('>')) {
        let name = trimmed[..start].trim().trim_matches('"');
        let addr = trimmed[start + 1..end].trim();
        let name = (!name.is_empty()).then(|| name.to_string());
        return Ok(Mailbox::new(name, addr.parse()?));
    }
    Ok(Mailbox::new(None, trimmed.parse()?))
}

fn parse_mailbox_list(input: &str) -> Result<Vec<Mailbox>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parsed = addrparse(trimmed)?;
    let mut out = Vec::new();
    for addr in parsed.iter() {
        match addr {
            MailAddr::Single(info) => {
                out.push(Mailbox::new(info.display_name.clone(), info.addr.parse()?));
            }
            MailAddr::Group(group) => {
                for info in &group.addrs {
                    out.push(Mailbox::new(info.display_name.clone(), info.addr.parse()?));
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{OutgoingMessage, build_message, parse_mailbox};

    fn outgoing(to: &str) -> OutgoingMessage {
        OutgoingMessage {
            from: "Me <me@example.com>".to_string(),
            to: to.to_string(),
            subject: "Hello".to_string(),
            body: "Just checking in.".to_string(),
        }
    }

    #[test]
    fn builds_plain_text_message() -> anyhow::Result<()> {
        let message = build_message(&outgoing("friend@example.com"))?;
        let raw = String::from_utf8(message.formatted())?;
        assert!(raw.contains("To: friend@example.com"));
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("Just checking in."));
        Ok(())
    }

    #[test]
    fn rejects_missing_recipient() {
        assert!(build_message(&outgoing("  ")).is_err());
    }

    #[test]
    fn parses_named_sender() -> anyhow::Result<()> {
        let mailbox = parse_mailbox("\"Me\" <me@example.com>")?;
        assert_eq!(mailbox.name.as_deref(), Some("Me"));
        assert_eq!(mailbox.email.to_string(), "me@example.com");
        Ok(())
    }
}
