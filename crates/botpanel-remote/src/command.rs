//! Shell command construction.
//!
//! Every identifier that ends up in a remote command (bot names, paths, URLs)
//! goes through [`quote`]. File content never touches the command line in
//! raw form: [`write_file`] ships it base64-encoded and decodes it remotely.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// POSIX single-quote wrapper for a shell token.
pub fn quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Joins path segments with `/`, the remote host being POSIX.
pub fn join_path(base: &str, child: &str) -> String {
    if child.starts_with('/') {
        return child.to_string();
    }
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches("./");
    if base.is_empty() {
        format!("/{child}")
    } else {
        format!("{base}/{child}")
    }
}

/// Returns the parent directory of a remote path.
pub fn parent_dir(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => ".".to_string(),
    }
}

/// Runs `command` with `dir` as the working directory.
pub fn in_dir(dir: &str, command: &str) -> String {
    format!("cd {} && {}", quote(dir), command)
}

/// Writes `content` to `path`, replacing the file.
pub fn write_file(path: &str, content: &str) -> String {
    let encoded = STANDARD.encode(content.as_bytes());
    format!(
        "printf '%s' '{}' | base64 --decode > {}",
        encoded,
        quote(path)
    )
}

/// Prints the content of `path`.
pub fn read_file(path: &str) -> String {
    format!("cat {}", quote(path))
}

/// Copies `from` over `to`.
pub fn copy_file(from: &str, to: &str) -> String {
    format!("cp {} {}", quote(from), quote(to))
}

/// Copies `from` to `to` unless `to` already exists.
pub fn copy_file_if_absent(from: &str, to: &str) -> String {
    format!("[ -e {to} ] || cp {from} {to}", from = quote(from), to = quote(to))
}

/// Recursively removes `path`; succeeds when it does not exist.
pub fn remove_dir_all(path: &str) -> String {
    format!("rm -rf {}", quote(path))
}

/// Exits 0 when `path` is a directory with entries, or any non-directory.
/// A missing path or an empty directory exits 1.
pub fn has_entries(path: &str) -> String {
    format!("test -n \"$(ls -A {} 2>/dev/null)\"", quote(path))
}

/// Exits 0 when `path` is a file.
pub fn file_exists(path: &str) -> String {
    format!("test -f {}", quote(path))
}

/// Exits 0 when `path` is a directory.
pub fn dir_exists(path: &str) -> String {
    format!("test -d {}", quote(path))
}

/// Returns a loggable form of a command, eliding base64 payloads.
pub fn redact(command: &str) -> String {
    match command.strip_prefix("printf '%s' '") {
        Some(rest) => match rest.split_once('\'') {
            Some((payload, tail)) => format!("printf '%s' <{} bytes>{}", payload.len(), tail),
            None => command.to_string(),
        },
        None => command.to_string(),
    }
}

/// Splits a command produced by [`write_file`] into its target path and
/// decoded content.
pub fn decode_write(command: &str) -> Option<(String, String)> {
    let rest = command.strip_prefix("printf '%s' '")?;
    let (payload, tail) = rest.split_once('\'')?;
    let target = tail.strip_prefix(" | base64 --decode > ")?;
    let bytes = STANDARD.decode(payload).ok()?;
    let content = String::from_utf8(bytes).ok()?;
    Some((unquote(target), content))
}

/// Reverses [`quote`] for a single token.
pub fn unquote(token: &str) -> String {
    let inner = token
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(token);
    inner.replace("'\\''", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain_and_empty() {
        assert_eq!(quote("bot"), "'bot'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(unquote(&quote("it's")), "it's");
    }

    #[test]
    fn test_quote_neutralises_substitution() {
        let q = quote("$(rm -rf /)");
        assert_eq!(q, "'$(rm -rf /)'");
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join_path("/root/x", "bot.js"), "/root/x/bot.js");
        assert_eq!(join_path("/root/x/", "./src/index.js"), "/root/x/src/index.js");
        assert_eq!(join_path("/root/x", "/abs/app.js"), "/abs/app.js");
        assert_eq!(parent_dir("/root/x/bot.js"), "/root/x");
        assert_eq!(parent_dir("/bot.js"), "/");
    }

    #[test]
    fn test_write_file_is_decodable() {
        let content = "A=\"it's $HOME\"\n`echo pwned`\n";
        let cmd = write_file("/root/my bot/.env", content);
        assert!(!cmd.contains("$HOME"));
        let (path, decoded) = decode_write(&cmd).unwrap();
        assert_eq!(path, "/root/my bot/.env");
        assert_eq!(decoded, content);
    }

    #[test]
    fn test_redact_hides_payload() {
        let cmd = write_file("/tmp/.env", "SECRET=1");
        let shown = redact(&cmd);
        assert!(!shown.contains(&STANDARD.encode("SECRET=1")));
        assert!(shown.contains("/tmp/.env"));
        assert_eq!(redact("pm2 jlist"), "pm2 jlist");
    }

    #[test]
    fn test_has_entries_quotes_path() {
        assert_eq!(
            has_entries("/root/my bot"),
            "test -n \"$(ls -A '/root/my bot' 2>/dev/null)\""
        );
    }

    #[test]
    fn test_copy_if_absent() {
        assert_eq!(
            copy_file_if_absent("/a/bot.js", "/a/bot.js.bak"),
            "[ -e '/a/bot.js.bak' ] || cp '/a/bot.js' '/a/bot.js.bak'"
        );
    }
}
