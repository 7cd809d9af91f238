use anyhow::Result;
use linkify::{LinkFinder, LinkKind};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};

use termail_core::{FetchedAttachment, FetchedMessage, Headers};

const HTML_TEXT_WIDTH: usize = 80;

/// Parses a raw RFC 822 message into cacheable fields.
///
/// Server-side attributes (uid, flags, reported size) are left for the caller.
pub fn parse_message(raw: &[u8]) -> Result<FetchedMessage> {
    let parsed = mailparse::parse_mail(raw)?;
    let (text, html) = select_bodies(&parsed);
    let mut attachments = Vec::new();
    collect_attachments(&parsed, &mut attachments)?;

    Ok(FetchedMessage {
        uid: None,
        subject: parsed.headers.get_first_value("Subject").unwrap_or_default(),
        from: addresses(&parsed, "From").into_iter().next().unwrap_or_default(),
        to: addresses(&parsed, "To"),
        cc: addresses(&parsed, "Cc"),
        bcc: addresses(&parsed, "Bcc"),
        reply_to: addresses(&parsed, "Reply-To"),
        date_str: parsed.headers.get_first_value("Date").unwrap_or_default(),
        text,
        html,
        flags: Default::default(),
        headers: collect_headers(&parsed),
        size: raw.len() as i64,
        size_rfc822: raw.len() as i64,
        attachments,
    })
}

/// Body prepared for terminal reading.
///
/// Falls back to text rendered from `html` when there is no plain text.
/// `https` links are replaced by `link_marker`.
pub fn reading_text(text: &str, html: &str, link_marker: &str) -> String {
    let body = if text.trim().is_empty() && !html.trim().is_empty() {
        html_to_text(html)
    } else {
        text.to_string()
    };
    let body = replace_https_links(body.trim(), link_marker);
    collapse_blank_lines(&body)
}

/// Plain-text rendering of an html body.
pub fn html_to_text(html: &str) -> String {
    let sanitized = sanitize_html(html);
    let text = html2text::from_read(sanitized.as_bytes(), HTML_TEXT_WIDTH);
    html_escape::decode_html_entities(&text).to_string()
}

fn sanitize_html(html: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder.rm_clean_content_tags(["style"]);
    builder.clean(html).to_string()
}

fn select_bodies(parsed: &ParsedMail) -> (String, String) {
    let mut text_plain: Option<String> = None;
    let mut text_html: Option<String> = None;

    walk_parts(parsed, &mut |part| {
        if !part.subparts.is_empty() || is_attachment(part) {
            return;
        }
        let ctype = part.ctype.mimetype.to_lowercase();
        if ctype == "text/plain" && text_plain.is_none() {
            if let Ok(body) = part.get_body() {
                text_plain = Some(body);
            }
        }
        if ctype == "text/html" && text_html.is_none() {
            if let Ok(body) = part.get_body() {
                text_html = Some(body);
            }
        }
    });

    (text_plain.unwrap_or_default(), text_html.unwrap_or_default())
}

fn walk_parts<F>(parsed: &ParsedMail, cb: &mut F)
where
    F: FnMut(&ParsedMail),
{
    cb(parsed);
    for part in &parsed.subparts {
        walk_parts(part, cb);
    }
}

fn attachment_filename(part: &ParsedMail) -> Option<String> {
    part.get_content_disposition()
        .params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned())
}

fn is_attachment(part: &ParsedMail) -> bool {
    matches!(
        part.get_content_disposition().disposition,
        DispositionType::Attachment
    ) || attachment_filename(part).is_some()
}

fn collect_attachments(parsed: &ParsedMail, out: &mut Vec<FetchedAttachment>) -> Result<()> {
    if parsed.subparts.is_empty() {
        if !is_attachment(parsed) {
            return Ok(());
        }
        let payload = parsed.get_body_raw()?;
        let disposition = match parsed.get_content_disposition().disposition {
            DispositionType::Inline => "inline".to_string(),
            DispositionType::Attachment => "attachment".to_string(),
            DispositionType::FormData => "form-data".to_string(),
            DispositionType::Extension(other) => other,
        };
        let content_id = parsed
            .headers
            .get_first_value("Content-ID")
            .map(|v| {
                v.trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
            .unwrap_or_default();
        out.push(FetchedAttachment {
            filename: attachment_filename(parsed).unwrap_or_else(|| "attachment".to_string()),
            size: payload.len() as i64,
            payload,
            content_id,
            content_type: parsed.ctype.mimetype.to_lowercase(),
            content_disposition: disposition,
        });
        return Ok(());
    }

    for part in &parsed.subparts {
        collect_attachments(part, out)?;
    }
    Ok(())
}

fn addresses(parsed: &ParsedMail, name: &str) -> Vec<String> {
    let mut out = Vec::new();
    for header in parsed.headers.get_all_headers(name) {
        let Ok(list) = mailparse::addrparse_header(header) else {
            continue;
        };
        for addr in list.iter() {
            match addr {
                MailAddr::Single(info) => out.push(info.addr.clone()),
                MailAddr::Group(group) => {
                    out.extend(group.addrs.iter().map(|info| info.addr.clone()))
                }
            }
        }
    }
    out
}

fn collect_headers(parsed: &ParsedMail) -> Headers {
    let mut headers = Headers::new();
    for header in &parsed.headers {
        headers
            .entry(header.get_key().to_lowercase())
            .or_default()
            .push(header.get_value());
    }
    headers
}

fn replace_https_links(text: &str, marker: &str) -> String {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]);
    let mut out = String::with_capacity(text.len());
    let mut idx = 0;
    for link in finder.links(text) {
        if !link.as_str().starts_with("https://") {
            continue;
        }
        out.push_str(&text[idx..link.start()]);
        out.push_str(marker);
        idx = link.end();
    }
    out.push_str(&text[idx..]);
    out
}

fn collapse_blank_lines(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut out_lines: Vec<&str> = Vec::new();
    let mut prev_blank = false;
    for line in normalized.split('\n') {
        if line.trim().is_empty() {
            if !prev_blank {
                out_lines.push("");
            }
            prev_blank = true;
        } else {
            if prev_blank {
                if let Some(last) = out_lines.len().checked_sub(2) {
                    let prev: &str = out_lines[last];
                    out_lines[last] = prev.trim_end();
                }
            }
            prev_blank = false;
            out_lines.push(line);
        }
    }
    out_lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{parse_message, reading_text};

    const MULTIPART: &str = "From: \"Bart\" <bart@ya.ru>\r\n\
To: iam@goo.ru, friend@ya.ru\r\n\
Cc: cc@mail.ru\r\n\
Reply-To: reply@mail.ru\r\n\
Subject: Invoice 42\r\n\
Date: Tue, 03 Jan 2017 22:26:59 +0500\r\n\
Received: from 1.m.ru\r\n\
Received: from 2.m.ru\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hello there\r\n\
--XYZ\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<b>Hello there</b>\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"invoice.pdf\"\r\n\
Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n\
Content-ID: <part1@mail.ru>\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
AQID\r\n\
--XYZ--\r\n";

    #[test]
    fn parses_addresses_bodies_and_headers() -> anyhow::Result<()> {
        let message = parse_message(MULTIPART.as_bytes())?;
        assert_eq!(message.subject, "Invoice 42");
        assert_eq!(message.from, "bart@ya.ru");
        assert_eq!(message.to, vec!["iam@goo.ru", "friend@ya.ru"]);
        assert_eq!(message.cc, vec!["cc@mail.ru"]);
        assert!(message.bcc.is_empty());
        assert_eq!(message.reply_to, vec!["reply@mail.ru"]);
        assert_eq!(message.date_str, "Tue, 03 Jan 2017 22:26:59 +0500");
        assert_eq!(message.text.trim(), "Hello there");
        assert_eq!(message.html.trim(), "<b>Hello there</b>");
        assert_eq!(
            message.headers.get("received"),
            Some(&vec!["from 1.m.ru".to_string(), "from 2.m.ru".to_string()])
        );
        assert_eq!(message.size, MULTIPART.len() as i64);
        Ok(())
    }

    #[test]
    fn collects_attachments() -> anyhow::Result<()> {
        let message = parse_message(MULTIPART.as_bytes())?;
        assert_eq!(message.attachments.len(), 1);
        let attachment = &message.attachments[0];
        assert_eq!(attachment.filename, "invoice.pdf");
        assert_eq!(attachment.payload, vec![1, 2, 3]);
        assert_eq!(attachment.size, 3);
        assert_eq!(attachment.content_id, "part1@mail.ru");
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.content_disposition, "attachment");
        Ok(())
    }

    #[test]
    fn reading_text_trims_and_collapses_blank_lines() {
        let text = "\n\n  Hi,  \n\n\n \nsee https://example.com/a?b=c now\n\nbye\n\n";
        assert_eq!(
            reading_text(text, "", "LINK"),
            "Hi,\n\nsee LINK now\n\nbye"
        );
    }

    #[test]
    fn plain_http_links_are_kept() {
        assert_eq!(
            reading_text("go to http://example.com", "", "LINK"),
            "go to http://example.com"
        );
    }

    #[test]
    fn html_is_used_when_there_is_no_plain_text() {
        let text = reading_text("", "<p>Hello &amp; welcome</p>", "LINK");
        assert!(text.contains("Hello & welcome"), "{}", text);
    }
}
