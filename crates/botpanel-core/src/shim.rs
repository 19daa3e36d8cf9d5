//! The generated notifier module and the edits made to a bot's main script.

use std::sync::OnceLock;

use regex::Regex;

/// npm packages the generated module depends on.
pub const SHIM_DEPENDENCIES: [&str; 2] = ["node-telegram-bot-api", "dotenv"];

const ENV_PLACEHOLDER: &str = "__ENV_FILE__";

const SHIM_TEMPLATE: &str = r#"// Generated by the bot control panel. Rewritten on every notification change; do not edit.
const path = require('path');
require('dotenv').config({ path: path.resolve(__dirname, __ENV_FILE__) });
const TelegramBot = require('node-telegram-bot-api');

const routes = {};
const seen = new Set();

// Keys may be written with or without the TELEGRAM_ prefix.
function setting(field, id) {
    return process.env[`TELEGRAM_${field}_${id}`] || process.env[`${field}_${id}`];
}

for (const key of Object.keys(process.env)) {
    const match = key.match(/^(?:TELEGRAM_)?NAME_(\d+)$/);
    if (!match || seen.has(match[1])) continue;
    const id = match[1];
    seen.add(id);
    const name = setting('NAME', id);
    const token = setting('TOKEN', id);
    const chatId = setting('CHAT_ID', id);
    const purpose = (setting('PURPOSE', id) || '').trim() || name;
    if (!name || !token || !chatId) continue;
    try {
        (routes[purpose] = routes[purpose] || []).push({ name, chatId, bot: new TelegramBot(token) });
    } catch (err) {
        console.error(`[notifier] cannot initialise channel "${name}":`, err.message);
    }
}

async function sendNotification(purpose, message) {
    const targets = routes[purpose];
    if (!targets || targets.length === 0) {
        console.error(`[notifier] no channel configured for purpose "${purpose}"`);
        return;
    }
    await Promise.all(targets.map(async ({ name, chatId, bot }) => {
        try {
            await bot.sendMessage(chatId, message);
        } catch (err) {
            console.error(`[notifier] sending to "${name}" failed:`, err.response ? err.response.body : err.message);
        }
    }));
}

module.exports = { sendNotification };
"#;

/// Renders the notifier module. `env_file` is the `.env` path relative to
/// the module's own directory.
pub fn render_shim(env_file: &str) -> String {
    let literal = serde_json::to_string(env_file).unwrap_or_else(|_| "'.env'".to_string());
    SHIM_TEMPLATE.replace(ENV_PLACEHOLDER, &literal)
}

/// Relative path from `from_dir` to `target`, both absolute and POSIX.
pub fn relative_path(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(&to[common..]);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// The statement importing the notifier module.
pub fn import_line(notifier_file: &str) -> String {
    format!("const {{ sendNotification }} = require('./{notifier_file}');")
}

/// Returns true if `script` already imports the notifier module.
pub fn has_import(script: &str, notifier_file: &str) -> bool {
    let single = format!("require('./{notifier_file}')");
    let double = format!("require(\"./{notifier_file}\")");
    script.contains(&single) || script.contains(&double)
}

fn legacy_require() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"require\(\s*['"]node-telegram-bot-api['"]\s*\)"#)
            .expect("Invalid legacy require pattern")
    })
}

fn legacy_constructor() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"new\s+TelegramBot\s*\(").expect("Invalid constructor pattern"))
}

fn purpose_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"sendNotification\(\s*['"]([^'"]+)['"]"#).expect("Invalid purpose pattern")
    })
}

/// Result of [`patch_main_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPatch {
    /// The script after patching.
    pub content: String,
    /// Whether the import line was added.
    pub import_added: bool,
    /// Number of direct Telegram client lines commented out.
    pub legacy_lines_disabled: usize,
}

impl ScriptPatch {
    /// Returns true if the script changed.
    pub fn modified(&self) -> bool {
        self.import_added || self.legacy_lines_disabled > 0
    }
}

/// Adds the notifier import and comments out direct uses of the Telegram
/// client. Running it on its own output changes nothing.
pub fn patch_main_script(script: &str, notifier_file: &str) -> ScriptPatch {
    let mut legacy_lines_disabled = 0;
    let mut lines: Vec<String> = script
        .split('\n')
        .map(|line| {
            let body = line.trim_start();
            let is_legacy = !body.starts_with("//")
                && (legacy_require().is_match(body) || legacy_constructor().is_match(body));
            if is_legacy {
                legacy_lines_disabled += 1;
                let indent = &line[..line.len() - body.len()];
                format!("{indent}// {body}")
            } else {
                line.to_string()
            }
        })
        .collect();

    let import_added = !has_import(script, notifier_file);
    if import_added {
        let at = import_position(&lines);
        lines.insert(at, import_line(notifier_file));
    }

    ScriptPatch {
        content: lines.join("\n"),
        import_added,
        legacy_lines_disabled,
    }
}

/// First line after a shebang and a `'use strict'` directive.
fn import_position(lines: &[String]) -> usize {
    let mut at = 0;
    if lines.first().is_some_and(|l| l.starts_with("#!")) {
        at = 1;
    }
    if lines.get(at).is_some_and(|l| {
        let l = l.trim();
        l.starts_with("'use strict'") || l.starts_with("\"use strict\"")
    }) {
        at += 1;
    }
    at
}

/// Purpose tags passed to `sendNotification` in `script`, deduplicated in
/// first-seen order.
pub fn find_purposes(script: &str) -> Vec<String> {
    let mut purposes: Vec<String> = Vec::new();
    for caps in purpose_call().captures_iter(script) {
        let purpose = &caps[1];
        if !purposes.iter().any(|p| p == purpose) {
            purposes.push(purpose.to_string());
        }
    }
    purposes
}
