//! Shell-like argument tokenizer used by `utils.parseArgs` and `utils.command`.
//!
//! Rules:
//! - whitespace separates tokens
//! - `'single quotes'` keep everything literally
//! - `"double quotes"` keep everything except `\"` and `\\`, which unescape
//! - outside quotes, `\x` yields `x`
//! - a trailing lone `\` is kept as a literal backslash
//! - adjacent quoted and unquoted parts join into one token (`a"b c"` is `ab c`)

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Between,
    Token,
    Single,
    Double,
}

/// Splits `input` into arguments.
#[must_use]
pub fn tokenize(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut state = State::Between;
    let mut escaped = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }

        match state {
            State::Single => {
                if c == '\'' {
                    state = State::Token;
                } else {
                    current.push(c);
                }
            }
            State::Double => match c {
                '"' => state = State::Token,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => current.push('\\'),
                },
                _ => current.push(c),
            },
            State::Between | State::Token => match c {
                '\\' => {
                    escaped = true;
                    state = State::Token;
                }
                '\'' => state = State::Single,
                '"' => state = State::Double,
                c if c.is_whitespace() => {
                    if state == State::Token {
                        args.push(std::mem::take(&mut current));
                        state = State::Between;
                    }
                }
                c => {
                    current.push(c);
                    state = State::Token;
                }
            },
        }
    }

    if escaped {
        current.push('\\');
        args.push(current);
    } else if state != State::Between {
        args.push(current);
    }

    args
}
