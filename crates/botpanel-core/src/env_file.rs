//! Notification channels stored in a bot's `.env` file.
//!
//! Channels are numbered slots: `TELEGRAM_NAME_<id>`, `TELEGRAM_PURPOSE_<id>`,
//! `TELEGRAM_TOKEN_<id>` and `TELEGRAM_CHAT_ID_<id>`. The parser also accepts
//! the keys without the `TELEGRAM_` prefix and two older single-channel
//! layouts. Rewrites keep every unrelated line as it was and move all channel
//! keys into one generated block at the end of the file.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PanelError, Result};

/// Header lines opening the generated block.
pub const MANAGED_HEADER: [&str; 4] = [
    "# ==========================================================",
    "# Telegram notification channels",
    "# Generated by the bot control panel. Manual edits are overwritten.",
    "# ==========================================================",
];

/// Single-channel keys written by older panel versions.
const LEGACY_KEYS: [&str; 6] = [
    "TELEGRAM_BOT_TOKEN_PRINCIPAL",
    "TELEGRAM_CHAT_ID_PRINCIPAL",
    "TELEGRAM_BOT_TOKEN_SECUNDARIO",
    "TELEGRAM_CHAT_ID_SECUNDARIO",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
];

/// One configured notification route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationChannel {
    /// Slot number, unique within one `.env` file.
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: u32,
    /// Display label.
    pub name: String,
    /// Tag the bot's code sends by. Empty means "use the name".
    #[serde(default)]
    pub purpose: String,
    /// Telegram bot token.
    pub token: String,
    /// Destination chat.
    pub chat_id: String,
}

impl NotificationChannel {
    /// Builds a channel.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        purpose: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            purpose: purpose.into(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Purpose tag the shim registers this channel under.
    pub fn routing_key(&self) -> &str {
        if self.purpose.trim().is_empty() {
            &self.name
        } else {
            &self.purpose
        }
    }

    /// Rejects channels that cannot be written as double-quoted values.
    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(PanelError::InvalidInput(
                "channel id must be a positive integer".to_string(),
            ));
        }
        for (field, value, required) in [
            ("name", &self.name, true),
            ("purpose", &self.purpose, false),
            ("token", &self.token, true),
            ("chatId", &self.chat_id, true),
        ] {
            if required && value.trim().is_empty() {
                return Err(PanelError::InvalidInput(format!("channel {field} is required")));
            }
            if value.contains(['"', '\n', '\r']) {
                return Err(PanelError::InvalidInput(format!(
                    "channel {field} must not contain quotes or line breaks"
                )));
            }
        }
        Ok(())
    }
}

fn id_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u32),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(n) => Ok(n),
        Id::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Purpose,
    Token,
    ChatId,
}

fn numbered_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:TELEGRAM_)?(NAME|PURPOSE|TOKEN|CHAT_ID)_(\d+)$")
            .expect("Invalid channel key pattern")
    })
}

fn classify(key: &str) -> Option<(Field, u32)> {
    let caps = numbered_key().captures(key)?;
    let field = match &caps[1] {
        "NAME" => Field::Name,
        "PURPOSE" => Field::Purpose,
        "TOKEN" => Field::Token,
        _ => Field::ChatId,
    };
    let id = caps[2].parse().ok()?;
    Some((field, id))
}

/// Splits a `KEY=VALUE` line, tolerating `export` and quoted values.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), unquote_value(value.trim())))
}

fn unquote_value(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn is_managed_line(line: &str) -> bool {
    let trimmed = line.trim();
    if MANAGED_HEADER.contains(&trimmed) {
        return true;
    }
    match split_assignment(line) {
        Some((key, _)) => classify(key).is_some() || LEGACY_KEYS.contains(&key),
        None => false,
    }
}

#[derive(Default)]
struct Partial {
    name: Option<String>,
    purpose: Option<String>,
    token: Option<String>,
    chat_id: Option<String>,
}

impl Partial {
    fn complete(self, id: u32) -> Option<NotificationChannel> {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());
        Some(NotificationChannel {
            id,
            name: present(self.name)?,
            purpose: self.purpose.unwrap_or_default(),
            token: present(self.token)?,
            chat_id: present(self.chat_id)?,
        })
    }
}

/// Parses the channels declared in `.env` text, ordered by id.
///
/// Groups missing a name, token or chat id are dropped. When no numbered
/// channel is found, the legacy layouts are tried.
pub fn parse_channels(text: &str) -> Vec<NotificationChannel> {
    let mut slots: BTreeMap<u32, Partial> = BTreeMap::new();
    let mut values: BTreeMap<&str, &str> = BTreeMap::new();

    for line in text.lines() {
        let Some((key, value)) = split_assignment(line) else {
            continue;
        };
        match classify(key) {
            Some((_, 0)) => {}
            Some((field, id)) => {
                let slot = slots.entry(id).or_default();
                let value = Some(value.to_string());
                match field {
                    Field::Name => slot.name = value,
                    Field::Purpose => slot.purpose = value,
                    Field::Token => slot.token = value,
                    Field::ChatId => slot.chat_id = value,
                }
            }
            None => {
                values.insert(key, value);
            }
        }
    }

    let channels: Vec<_> = slots
        .into_iter()
        .filter_map(|(id, partial)| partial.complete(id))
        .collect();
    if !channels.is_empty() {
        return channels;
    }
    legacy_channels(&values)
}

fn legacy_channels(values: &BTreeMap<&str, &str>) -> Vec<NotificationChannel> {
    let pair = |token: &str, chat: &str| match (values.get(token), values.get(chat)) {
        (Some(t), Some(c)) if !t.is_empty() && !c.is_empty() => Some((t.to_string(), c.to_string())),
        _ => None,
    };

    let mut channels = Vec::new();
    if let Some((token, chat_id)) = pair("TELEGRAM_BOT_TOKEN_PRINCIPAL", "TELEGRAM_CHAT_ID_PRINCIPAL") {
        channels.push(NotificationChannel::new(1, "Principal", "", token, chat_id));
    }
    if let Some((token, chat_id)) = pair("TELEGRAM_BOT_TOKEN_SECUNDARIO", "TELEGRAM_CHAT_ID_SECUNDARIO") {
        channels.push(NotificationChannel::new(2, "Secundario", "", token, chat_id));
    }
    if channels.is_empty() {
        if let Some((token, chat_id)) = pair("TELEGRAM_BOT_TOKEN", "TELEGRAM_CHAT_ID") {
            channels.push(NotificationChannel::new(1, "Default", "", token, chat_id));
        }
    }
    channels
}

/// Replaces the channel with the same id, or adds it.
pub fn upsert_channel(text: &str, channel: &NotificationChannel) -> String {
    let mut channels = parse_channels(text);
    match channels.iter_mut().find(|c| c.id == channel.id) {
        Some(existing) => *existing = channel.clone(),
        None => channels.push(channel.clone()),
    }
    regenerate(text, &channels)
}

/// Drops the channel with `id`.
pub fn remove_channel(text: &str, id: u32) -> String {
    let channels: Vec<_> = parse_channels(text)
        .into_iter()
        .filter(|c| c.id != id)
        .collect();
    regenerate(text, &channels)
}

/// Rewrites `text` with `channels` as the only notification configuration.
///
/// Unrelated lines keep their content and relative order. Blank lines are
/// collapsed only where removed channel lines had separated them. A file that
/// uses CRLF line endings keeps them.
pub fn regenerate(text: &str, channels: &[NotificationChannel]) -> String {
    let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut kept: Vec<&str> = Vec::new();
    let mut removed = false;
    for line in text.lines() {
        if is_managed_line(line) {
            removed = true;
            continue;
        }
        if line.trim().is_empty() {
            let after_blank = kept.last().map_or(true, |l| l.trim().is_empty());
            if removed && after_blank {
                continue;
            }
        } else {
            removed = false;
        }
        kept.push(line);
    }
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }

    let mut out = kept.join(eol);
    if !out.is_empty() {
        out.push_str(eol);
    }
    if channels.is_empty() {
        return out;
    }

    let mut sorted = channels.to_vec();
    sorted.sort_by_key(|c| c.id);
    sorted.dedup_by_key(|c| c.id);

    if !out.is_empty() {
        out.push_str(eol);
    }
    for line in MANAGED_HEADER {
        out.push_str(line);
        out.push_str(eol);
    }
    for channel in &sorted {
        out.push_str(eol);
        let id = channel.id;
        out.push_str(&format!("TELEGRAM_NAME_{id}=\"{}\"{eol}", channel.name));
        out.push_str(&format!("TELEGRAM_PURPOSE_{id}=\"{}\"{eol}", channel.purpose));
        out.push_str(&format!("TELEGRAM_TOKEN_{id}=\"{}\"{eol}", channel.token));
        out.push_str(&format!("TELEGRAM_CHAT_ID_{id}=\"{}\"{eol}", channel.chat_id));
    }
    out
}
