//! Source preprocessing and tokenizing: strip `//` comments, escape the semicolons embedded
//! in `c'...'...'...'...'` compute declarations so the top-level `;` split doesn't cut them
//! apart, then split on `;` into trimmed commands with line/command-number tracking.
//!
//! Grounded in `removeComments`, `preprocessComputeCommands`, and the tokenizing loop inside
//! `addProgram` in `original_source/program.c`.

use crate::error::Detail;

/// Strips `//` line comments, matching `removeComments`.
pub fn remove_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    out.push('\n');
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Replaces every `;` inside the 4 quoted sections of a `c'...'` compute declaration with
/// `\`, so the top-level command splitter treats the whole declaration as one token.
/// Mirrors `preprocessComputeCommands`; `addStep`'s compute branch reverses the substitution.
pub fn preprocess_compute_commands(source: &str) -> Result<String, Detail> {
    let bytes: Vec<char> = source.chars().collect();
    let mut out = bytes.clone();
    let mut i = 0usize;
    while i < bytes.len() {
        let at_boundary = i == 0 || bytes[i - 1] == ';' || bytes[i - 1].is_whitespace();
        if at_boundary && bytes[i] == 'c' && bytes.get(i + 1) == Some(&'\'') {
            i += 2;
            for _ in 0..4 {
                while i < bytes.len() && bytes[i] != '\'' {
                    if bytes[i] == '\\' {
                        return Err(Detail::BackslashInShader);
                    }
                    if bytes[i] == ';' {
                        out[i] = '\\';
                    }
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == '\'' {
                    i += 1;
                } else {
                    break;
                }
            }
        } else {
            i += 1;
        }
    }
    Ok(out.into_iter().collect())
}

/// One `;`-delimited command, trimmed, with its source location.
pub struct Command {
    pub text: String,
    pub linenum: u32,
    pub commandnum: u32,
}

/// Splits preprocessed source into commands, tracking 1-based line numbers and per-line
/// command numbers exactly as `addProgram`'s tokenizing loop does. Empty commands (from
/// adjacent `;;` or trailing whitespace) are dropped, but still advance line/command
/// counters so error locations on later commands stay accurate.
pub fn tokenize(source: &str) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut linenum = 1u32;
    let mut commandnum = 0u32;
    let mut rest = source;
    loop {
        let (chunk, has_semicolon, tail) = match rest.find(';') {
            Some(idx) => (&rest[..idx], true, &rest[idx + 1..]),
            None => (rest, false, ""),
        };
        linenum += chunk.matches('\n').count() as u32;
        if chunk.matches('\n').count() > 0 {
            commandnum = 0;
        }
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            commands.push(Command { text: trimmed.to_string(), linenum, commandnum });
        }
        if has_semicolon {
            commandnum += 1;
        }
        if tail.is_empty() && !has_semicolon {
            break;
        }
        rest = tail;
        if rest.is_empty() && !has_semicolon {
            break;
        }
        if rest.is_empty() {
            break;
        }
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_line_comments() {
        assert_eq!(remove_comments("1 2 +; // add them\n3"), "1 2 +; \n3");
    }

    #[test]
    fn escapes_semicolons_inside_compute_quotes() {
        let out = preprocess_compute_commands("c'a;b'c;d'e;f'g;h' 1 1 0 0").unwrap();
        assert_eq!(out, "c'a\\b'c\\d'e\\f'g\\h' 1 1 0 0");
    }

    #[test]
    fn rejects_literal_backslash_in_shader_text() {
        assert!(preprocess_compute_commands("c'a\\b''''' 1 1 0 0").is_err());
    }

    #[test]
    fn tokenizes_and_tracks_line_numbers() {
        let cmds = tokenize("1; 2;\n+ ;");
        let texts: Vec<_> = cmds.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "2", "+"]);
        assert_eq!(cmds[2].linenum, 2);
    }
}
