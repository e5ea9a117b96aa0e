//! Shell escaping and quoting utilities.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Escape single quotes the way the cf CLI expects inside `--var` values:
/// `'` becomes `'"'"'`.
pub fn bash_escape_single_quotes(value: &str) -> String {
    value.replace('\'', "'\"'\"'")
}

/// Quote a single argument for shell execution.
/// Empty strings become `''`; strings with shell metacharacters are wrapped
/// in single quotes.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join multiple arguments for shell execution.
pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

/// Split a whitespace separated parameter string as configured by users,
/// e.g. `--strategy rolling -t 120`.
pub fn split_params(params: &str) -> Vec<String> {
    params.split_whitespace().map(str::to_string).collect()
}

const SECRET_FLAGS: &[&str] = &["-p", "--password"];

/// Replace the value following a password flag, for log output.
pub fn mask_secrets(args: &[String]) -> Vec<String> {
    let mut masked = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            masked.push("********".to_string());
        } else {
            masked.push(arg.clone());
        }
        hide_next = SECRET_FLAGS.contains(&arg.as_str());
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arg_simple() {
        assert_eq!(quote_arg("push"), "push");
    }

    #[test]
    fn quote_arg_with_spaces() {
        assert_eq!(quote_arg("hello world"), "'hello world'");
    }

    #[test]
    fn quote_arg_with_single_quote() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
    }

    #[test]
    fn quote_arg_empty() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn quote_path_with_quote() {
        assert_eq!(quote_path("/home/it's"), "'/home/it'\\''s'");
    }

    #[test]
    fn bash_escape_replaces_every_quote() {
        assert_eq!(bash_escape_single_quotes("a'b'c"), "a'\"'\"'b'\"'\"'c");
        assert_eq!(bash_escape_single_quotes("plain"), "plain");
    }

    #[test]
    fn split_params_ignores_repeated_whitespace() {
        assert_eq!(
            split_params(" --strategy  rolling\t-t 120 "),
            vec!["--strategy", "rolling", "-t", "120"]
        );
        assert!(split_params("").is_empty());
    }

    #[test]
    fn mask_secrets_hides_password_values() {
        let args: Vec<String> = ["login", "-u", "me", "-p", "secret", "-o", "org"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            mask_secrets(&args),
            vec!["login", "-u", "me", "-p", "********", "-o", "org"]
        );
    }
}
