//! Namelist text → [`Namelist`].
//!
//! Two passes: [`tokenize`] turns the text into line-tagged tokens, then
//! [`parse`] walks the tokens group by group. A key's value list runs until
//! the next `key =` pair or the end of the group.

use super::{Group, Namelist, NamelistError, Value};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    GroupStart(String),
    GroupEnd,
    Equals,
    Comma,
    Word(String),
    Quoted(String),
}

/// Parse namelist text.
pub(super) fn parse(text: &str) -> Result<Namelist, NamelistError> {
    let tokens = tokenize(text)?;
    let mut nml = Namelist::new();
    let mut pos = 0;

    while pos < tokens.len() {
        let (line, token) = &tokens[pos];
        let name = match token {
            Token::GroupStart(name) => name,
            other => {
                return Err(syntax(*line, format!("expected '&group', found {other:?}")));
            }
        };
        pos += 1;

        let mut group = Group::new(name);
        loop {
            let Some((line, token)) = tokens.get(pos) else {
                return Err(syntax(
                    tokens.last().map(|(l, _)| *l).unwrap_or(1),
                    format!("group '{name}' is not terminated with '/'"),
                ));
            };
            match token {
                Token::GroupEnd => {
                    pos += 1;
                    break;
                }
                Token::Comma => pos += 1,
                Token::Word(key) => {
                    if !matches!(tokens.get(pos + 1), Some((_, Token::Equals))) {
                        return Err(syntax(*line, format!("expected '=' after '{key}'")));
                    }
                    pos += 2;
                    let (values, next) = parse_values(&tokens, pos)?;
                    group.set(key, values);
                    pos = next;
                }
                other => {
                    return Err(syntax(*line, format!("expected a key, found {other:?}")));
                }
            }
        }
        nml.push_group(group);
    }

    Ok(nml)
}

/// Collect values starting at `pos`; returns the values and the index of the
/// first token that is not part of the list.
fn parse_values(
    tokens: &[(usize, Token)],
    mut pos: usize,
) -> Result<(Vec<Value>, usize), NamelistError> {
    let mut values = Vec::new();
    while let Some((line, token)) = tokens.get(pos) {
        match token {
            Token::Comma => pos += 1,
            Token::Quoted(s) => {
                values.push(Value::Str(s.clone()));
                pos += 1;
            }
            Token::Word(word) => {
                // start of the next assignment
                if matches!(tokens.get(pos + 1), Some((_, Token::Equals))) {
                    break;
                }
                expand_literal(word, *line, &mut values)?;
                pos += 1;
            }
            Token::GroupEnd => break,
            Token::Equals | Token::GroupStart(_) => {
                return Err(syntax(*line, format!("unexpected {token:?} in value list")));
            }
        }
    }
    Ok((values, pos))
}

/// Push one literal, expanding an `n*value` repeat.
fn expand_literal(word: &str, line: usize, out: &mut Vec<Value>) -> Result<(), NamelistError> {
    if let Some((count, literal)) = word.split_once('*') {
        let count: usize = count
            .parse()
            .map_err(|_| syntax(line, format!("invalid repeat count in '{word}'")))?;
        let value = parse_literal(literal);
        out.extend(std::iter::repeat(value).take(count));
    } else {
        out.push(parse_literal(word));
    }
    Ok(())
}

fn parse_literal(word: &str) -> Value {
    let lower = word.to_lowercase();
    match lower.as_str() {
        ".true." | ".t." | "t" | "true" => return Value::Bool(true),
        ".false." | ".f." | "f" | "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(v) = lower.parse::<i64>() {
        return Value::Int(v);
    }
    // Fortran double precision exponents use 'd'
    if let Ok(v) = lower.replace('d', "e").parse::<f64>() {
        return Value::Real(v);
    }
    Value::Str(word.to_string())
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, NamelistError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '!' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '=' => tokens.push((line, Token::Equals)),
            ',' => tokens.push((line, Token::Comma)),
            '/' => tokens.push((line, Token::GroupEnd)),
            '&' | '$' => {
                let name = take_word(&mut chars);
                if name.is_empty() {
                    return Err(syntax(line, "missing group name after '&'".to_string()));
                }
                let lower = name.to_lowercase();
                if lower == "end" {
                    tokens.push((line, Token::GroupEnd));
                } else {
                    tokens.push((line, Token::GroupStart(lower)));
                }
            }
            '\'' | '"' => {
                let start = line;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => {
                            // doubled quote is an escaped quote
                            if chars.peek() == Some(&c) {
                                chars.next();
                                s.push(c);
                            } else {
                                break;
                            }
                        }
                        Some(ch) => {
                            if ch == '\n' {
                                line += 1;
                            }
                            s.push(ch);
                        }
                        None => {
                            return Err(syntax(start, "unterminated string".to_string()));
                        }
                    }
                }
                tokens.push((start, Token::Quoted(s)));
            }
            c => {
                let mut word = c.to_string();
                word.push_str(&take_word(&mut chars));
                tokens.push((line, Token::Word(word)));
            }
        }
    }

    Ok(tokens)
}

fn take_word(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || matches!(c, '=' | ',' | '/' | '!' | '&' | '\'' | '"') {
            break;
        }
        word.push(c);
        chars.next();
    }
    word
}

fn syntax(line: usize, message: String) -> NamelistError {
    NamelistError::Syntax { line, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRF_NAMELIST: &str = r#"
 &time_control
 run_days                 = 0,
 run_hours                = 24,
 start_year               = 2014, 2014,
 history_outname          = 'wrfout_d<domain>_<date>', ! comment
 /

 &domains
 time_step                = 60,
 max_dom                  = 2,
 e_we                     = 100,   151,
 dx                       = 9000., 3000.,
 parent_time_step_ratio   = 1,     3,
 /

 &physics
 mp_physics               = 2*8,
 cudt                     = 5, 0,
 radt                     = 1.5d1
 /
"#;

    #[test]
    fn test_parses_groups_in_order() {
        let nml = parse(WRF_NAMELIST).unwrap();
        let names: Vec<_> = nml.groups().map(|g| g.name().to_string()).collect();
        assert_eq!(names, vec!["time_control", "domains", "physics"]);
    }

    #[test]
    fn test_parses_lists_reals_and_strings() {
        let nml = parse(WRF_NAMELIST).unwrap();
        assert_eq!(
            nml.get("domains", "e_we"),
            Some(&[Value::Int(100), Value::Int(151)][..])
        );
        assert_eq!(nml.get_for_domain("domains", "dx", 2), Some(&Value::Real(3000.0)));
        assert_eq!(
            nml.get("time_control", "history_outname"),
            Some(&[Value::Str("wrfout_d<domain>_<date>".to_string())][..])
        );
        assert_eq!(nml.get("physics", "radt"), Some(&[Value::Real(15.0)][..]));
    }

    #[test]
    fn test_expands_repeat_counts() {
        let nml = parse(WRF_NAMELIST).unwrap();
        assert_eq!(
            nml.get("physics", "mp_physics"),
            Some(&[Value::Int(8), Value::Int(8)][..])
        );
    }

    #[test]
    fn test_accepts_end_terminator_and_logicals() {
        let nml = parse("&wrfvar5\n check_max_iv = .true.,\n put_rand_seed = F\n&end\n").unwrap();
        assert_eq!(nml.get("wrfvar5", "check_max_iv"), Some(&[Value::Bool(true)][..]));
        assert_eq!(nml.get("wrfvar5", "put_rand_seed"), Some(&[Value::Bool(false)][..]));
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        let nml = parse("&record1\n obs_gts_filename = 'it''s.txt'\n/\n").unwrap();
        assert_eq!(
            nml.get("record1", "obs_gts_filename").unwrap()[0].as_str(),
            Some("it's.txt")
        );
    }

    #[test]
    fn test_empty_group_is_kept() {
        let nml = parse("&wrfvar4\n/\n&wrfvar6\n max_ext_its = 1\n/\n").unwrap();
        assert_eq!(nml.groups().count(), 2);
    }

    #[test]
    fn test_unterminated_group_is_an_error() {
        let err = parse("&domains\n time_step = 60\n").unwrap_err();
        assert!(matches!(err, NamelistError::Syntax { .. }));
    }

    #[test]
    fn test_missing_equals_reports_line() {
        let err = parse("&domains\n\n time_step 60\n/\n").unwrap_err();
        match err {
            NamelistError::Syntax { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
