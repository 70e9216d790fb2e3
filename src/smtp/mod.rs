//! Minimal SMTP session for local development.
//!
//! Supports HELO/EHLO, MAIL FROM, RCPT TO, DATA, RSET, NOOP, QUIT. A session
//! carries one message; a second MAIL FROM on the same connection is
//! answered with 421 and the connection is closed.

use crate::{
    models::mail::{MailItem, format_date},
    server::{SessionError, SessionParser},
    util::{collect_attachments, extract_bodies, header_value},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailparse::{ParsedMail, dateparse, parse_mail};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SmtpParser {
    hostname: String,
}

impl Default for SmtpParser {
    fn default() -> Self {
        Self::new("slurper")
    }
}

impl SmtpParser {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_owned(),
        }
    }
}

#[async_trait]
impl SessionParser for SmtpParser {
    async fn parse(&self, stream: TcpStream, peer: SocketAddr) -> Result<MailItem, SessionError> {
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        debug!(%peer, "smtp session opened");
        run_session(&self.hostname, &mut reader, &mut writer).await
    }
}

async fn reply<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

/// Runs the dialogue on any buffered reader/writer pair.
pub async fn run_session<R, W>(
    hostname: &str,
    reader: &mut R,
    writer: &mut W,
) -> Result<MailItem, SessionError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    reply(writer, &format!("220 {hostname} dev smtp")).await?;

    let mut mail_from: Option<String> = None;
    let mut rcpts: Vec<String> = Vec::new();
    let mut received: Option<MailItem> = None;
    let mut buf = String::new();

    loop {
        buf.clear();
        let n = reader.read_line(&mut buf).await?;
        if n == 0 {
            break;
        }
        let line = buf.trim_end_matches(['\r', '\n']);
        debug!("smtp <= {}", line);
        let upper = line.to_uppercase();

        if upper.starts_with("EHLO") || upper.starts_with("HELO") {
            reply(writer, &format!("250 {hostname}")).await?;
        } else if upper.starts_with("MAIL FROM:") {
            if received.is_some() {
                reply(writer, "421 one message per connection, closing").await?;
                break;
            }
            mail_from = Some(line[10..].trim().trim_matches(['<', '>']).to_string());
            rcpts.clear();
            reply(writer, "250 OK").await?;
        } else if upper.starts_with("RCPT TO:") {
            if mail_from.is_none() {
                reply(writer, "503 need MAIL FROM first").await?;
                continue;
            }
            rcpts.push(line[8..].trim().trim_matches(['<', '>']).to_string());
            reply(writer, "250 Accepted").await?;
        } else if upper == "DATA" {
            if mail_from.is_none() || rcpts.is_empty() {
                reply(writer, "503 need MAIL FROM and RCPT TO first").await?;
                continue;
            }
            reply(writer, "354 End data with <CR><LF>.<CR><LF>").await?;
            let data = read_data(reader).await?;
            let envelope_from = mail_from.take().unwrap_or_default();
            match build_mail_item(envelope_from, std::mem::take(&mut rcpts), &data) {
                Ok(item) => {
                    reply(writer, &format!("250 OK id={}", item.id)).await?;
                    received = Some(item);
                }
                Err(e) => {
                    reply(writer, "554 message could not be parsed").await?;
                    return Err(e);
                }
            }
        } else if upper == "RSET" {
            mail_from = None;
            rcpts.clear();
            reply(writer, "250 OK").await?;
        } else if upper == "NOOP" {
            reply(writer, "250 OK").await?;
        } else if upper == "QUIT" {
            reply(writer, "221 Bye").await?;
            break;
        } else {
            reply(writer, "502 Command not implemented").await?;
        }
    }

    received.ok_or(SessionError::Incomplete)
}

/// Read until a line with a single `.`, undoing dot-stuffing.
async fn read_data<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, SessionError> {
    let mut data = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(SessionError::Incomplete);
        }
        if line == ".\r\n" || line == ".\n" {
            break;
        }
        let unstuffed = if line.starts_with("..") { &line[1..] } else { line.as_str() };
        data.extend_from_slice(unstuffed.as_bytes());
    }
    Ok(data)
}

/// Turn a raw DATA payload plus the envelope into a mail item.
pub fn build_mail_item(
    envelope_from: String,
    envelope_to: Vec<String>,
    raw: &[u8],
) -> Result<MailItem, SessionError> {
    let parsed = parse_mail(raw).map_err(|e| SessionError::Malformed(e.to_string()))?;
    let mut item = MailItem::new();

    item.from_address = header_value(&parsed, "From").unwrap_or(envelope_from);
    item.to_addresses = if envelope_to.is_empty() {
        header_value(&parsed, "To")
            .map(|to| {
                to.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    } else {
        envelope_to
    };
    item.subject = header_value(&parsed, "Subject").unwrap_or_default();
    item.xmailer = header_value(&parsed, "X-Mailer").unwrap_or_default();
    if let Some(sent) = sent_at(&parsed) {
        item.date_sent = format_date(sent);
    }
    item.content_type = parsed.ctype.mimetype.clone();
    item.boundary = parsed.ctype.params.get("boundary").cloned().unwrap_or_default();

    let (text, html) = extract_bodies(&parsed);
    item.body = html.or(text).unwrap_or_default();

    collect_attachments(&parsed, &mut item.attachments);

    Ok(item)
}

fn sent_at(parsed: &ParsedMail<'_>) -> Option<DateTime<Utc>> {
    let header = header_value(parsed, "Date")?;
    let ts = dateparse(&header).ok()?;
    DateTime::from_timestamp(ts, 0)
}
