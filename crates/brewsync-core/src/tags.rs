//! Embedded `[[Name: Value]]` directives in recipe comments.
//!
//! Comments are split into plain text and tag spans by a small tokenizer.
//! Recognized names become typed [`Tag`]s and their spans are removed from
//! the residual text; every other span is kept verbatim.

use thiserror::Error;

use crate::models::{FermentationStep, Milli};

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

const PUBLIC_TRUE_LITERALS: [&str; 5] = ["1", "true", "y", "yes", "ja"];

/// A malformed directive. The whole recipe translation is abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed tag fragment '{fragment}': {reason}")]
pub struct ParseError {
    pub fragment: String,
    pub reason: String,
}

impl ParseError {
    fn new(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Image(String),
    BjcpStyle(String),
    Public(bool),
    Fermentation(FermentationOverride),
}

/// Fermentation steps supplied by a comment tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FermentationOverride {
    /// Steps are appended to the intrinsic ones instead of replacing them
    pub append: bool,
    pub steps: Vec<FermentationStep>,
}

impl FermentationOverride {
    /// Merge with intrinsic steps according to the append flag.
    pub fn merge(&self, intrinsic: &[FermentationStep]) -> Vec<FermentationStep> {
        if self.append {
            intrinsic.iter().chain(&self.steps).cloned().collect()
        } else {
            self.steps.clone()
        }
    }
}

/// Tags found in a comment plus the comment with recognized spans removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedComment {
    pub tags: Vec<Tag>,
    pub residual: String,
}

impl ParsedComment {
    pub fn image(&self) -> Option<&str> {
        self.tags.iter().rev().find_map(|tag| match tag {
            Tag::Image(url) => Some(url.as_str()),
            _ => None,
        })
    }

    pub fn bjcp_style(&self) -> Option<&str> {
        self.tags.iter().rev().find_map(|tag| match tag {
            Tag::BjcpStyle(style) => Some(style.as_str()),
            _ => None,
        })
    }

    /// Visibility flag, `false` when absent.
    pub fn is_public(&self) -> bool {
        self.tags
            .iter()
            .rev()
            .find_map(|tag| match tag {
                Tag::Public(flag) => Some(*flag),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn fermentation(&self) -> Option<&FermentationOverride> {
        self.tags.iter().rev().find_map(|tag| match tag {
            Tag::Fermentation(fermentation) => Some(fermentation),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Directive {
        raw: &'a str,
        name: &'a str,
        value: &'a str,
    },
}

/// Split a comment into text and `[[name: value]]` directives.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find(OPEN) {
        let open = cursor + offset;
        let inner_start = open + OPEN.len();
        let Some(close_offset) = input[inner_start..].find(CLOSE) else {
            break;
        };
        let inner_end = inner_start + close_offset;
        let inner = &input[inner_start..inner_end];

        // A nested opener means this one is plain text.
        if let Some(nested) = inner.find(OPEN) {
            cursor = inner_start + nested;
            continue;
        }

        let Some((name, value)) = inner.split_once(':') else {
            cursor = inner_end + CLOSE.len();
            continue;
        };
        let name = name.trim();
        if name.is_empty() || name.contains('\n') {
            cursor = inner_end + CLOSE.len();
            continue;
        }

        if text_start < open {
            tokens.push(Token::Text(&input[text_start..open]));
        }
        let end = inner_end + CLOSE.len();
        tokens.push(Token::Directive {
            raw: &input[open..end],
            name,
            value: value.trim(),
        });
        text_start = end;
        cursor = end;
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

/// Parse every directive of a comment.
///
/// Unknown names stay in the residual text untouched. A recognized span is
/// removed together with one directly following line break.
pub fn parse_comment(comment: &str) -> Result<ParsedComment, ParseError> {
    let mut parsed = ParsedComment::default();
    let mut strip_newline = false;

    for token in tokenize(comment) {
        match token {
            Token::Text(text) => {
                let text = if strip_newline {
                    text.strip_prefix("\r\n")
                        .or_else(|| text.strip_prefix('\n'))
                        .unwrap_or(text)
                } else {
                    text
                };
                parsed.residual.push_str(text);
                strip_newline = false;
            }
            Token::Directive { raw, name, value } => match recognize(name, value)? {
                Some(tag) => {
                    parsed.tags.push(tag);
                    strip_newline = true;
                }
                None => {
                    parsed.residual.push_str(raw);
                    strip_newline = false;
                }
            },
        }
    }

    Ok(parsed)
}

fn recognize(name: &str, value: &str) -> Result<Option<Tag>, ParseError> {
    let tag = match name {
        "Image" => Tag::Image(value.to_string()),
        "BJCP-Style" => Tag::BjcpStyle(value.to_string()),
        "Public" => Tag::Public(parse_public(value)),
        "Fermentation" => Tag::Fermentation(parse_fermentation(value)?),
        _ => return Ok(None),
    };
    Ok(Some(tag))
}

/// Anything that is not a known true literal counts as false.
pub fn parse_public(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    PUBLIC_TRUE_LITERALS.contains(&value.as_str())
}

/// Parse `NAME:DAYS@TEMP` steps separated by commas. A leading empty element
/// turns the override into an append.
pub fn parse_fermentation(value: &str) -> Result<FermentationOverride, ParseError> {
    let mut elements = value.split(',').map(str::trim).peekable();
    let append = elements.next_if(|element| element.is_empty()).is_some();

    let steps = elements.map(parse_step).collect::<Result<Vec<_>, _>>()?;
    if steps.is_empty() {
        return Err(ParseError::new(value, "no fermentation steps"));
    }

    Ok(FermentationOverride { append, steps })
}

fn parse_step(element: &str) -> Result<FermentationStep, ParseError> {
    if element.is_empty() {
        return Err(ParseError::new(element, "empty fermentation step"));
    }
    let (head, temperature) = element
        .rsplit_once('@')
        .ok_or_else(|| ParseError::new(element, "expected NAME:DAYS@TEMP"))?;
    let (name, days) = head
        .rsplit_once(':')
        .ok_or_else(|| ParseError::new(element, "expected NAME:DAYS@TEMP"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::new(element, "missing step name"));
    }
    let days = days
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::new(element, format!("invalid day count '{}'", days.trim())))?;
    let temperature = temperature
        .trim()
        .parse::<Milli>()
        .map_err(|error| ParseError::new(element, error.to_string()))?;

    Ok(FermentationStep::new(name, days, temperature))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn recognized_tags_are_extracted_and_removed() {
        let comment = "Hoppy pale ale\n[[Image: https://img.example/pale.jpg]]\n[[BJCP-Style: 18B]]\n[[Public: True]]\nBrewed for the club.";
        let parsed = parse_comment(comment).unwrap();

        assert_eq!(parsed.image(), Some("https://img.example/pale.jpg"));
        assert_eq!(parsed.bjcp_style(), Some("18B"));
        assert!(parsed.is_public());
        assert_eq!(parsed.residual, "Hoppy pale ale\nBrewed for the club.");
    }

    #[test]
    fn unknown_tags_stay_verbatim() {
        let parsed = parse_comment("Notes [[Foo: Bar]] and [[Public: ja]] end").unwrap();
        assert_eq!(parsed.residual, "Notes [[Foo: Bar]] and  end");
        assert_eq!(parsed.tags, vec![Tag::Public(true)]);
    }

    #[test]
    fn names_are_case_sensitive() {
        let parsed = parse_comment("[[image: x]]").unwrap();
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.residual, "[[image: x]]");
    }

    #[test]
    fn public_defaults_to_false() {
        assert!(!parse_comment("no tags").unwrap().is_public());
        assert!(!parse_comment("[[Public: maybe]]").unwrap().is_public());
        assert!(parse_public(" YES "));
        assert!(parse_public("1"));
        assert!(!parse_public("nein"));
    }

    #[test]
    fn last_occurrence_wins() {
        let parsed = parse_comment("[[BJCP-Style: 1A]] [[BJCP-Style: 7B]]").unwrap();
        assert_eq!(parsed.bjcp_style(), Some("7B"));
    }

    #[test]
    fn unterminated_and_colonless_spans_are_text() {
        let parsed = parse_comment("[[Public]] and [[Image: open").unwrap();
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.residual, "[[Public]] and [[Image: open");
    }

    #[test]
    fn nested_opener_restarts_the_span() {
        let parsed = parse_comment("[[ [[Public: yes]]").unwrap();
        assert!(parsed.is_public());
        assert_eq!(parsed.residual, "[[ ");
    }

    #[test]
    fn fermentation_leading_separator_appends() {
        let parsed = parse_comment("[[Fermentation: ,Flaschengärung:14@22]]").unwrap();
        let fermentation = parsed.fermentation().unwrap();
        assert!(fermentation.append);

        let intrinsic = vec![FermentationStep::new("Primary", 7, Milli::from_int(20))];
        assert_eq!(
            fermentation.merge(&intrinsic),
            vec![
                FermentationStep::new("Primary", 7, Milli::from_int(20)),
                FermentationStep::new("Flaschengärung", 14, Milli::from_int(22)),
            ]
        );
    }

    #[test]
    fn fermentation_without_separator_replaces() {
        let fermentation = parse_fermentation("Primär:5@12.5, Lagerung:28@2").unwrap();
        assert!(!fermentation.append);
        let intrinsic = vec![FermentationStep::new("Primary", 7, Milli::from_int(20))];
        assert_eq!(
            fermentation.merge(&intrinsic),
            vec![
                FermentationStep::new("Primär", 5, Milli::from_raw(12_500)),
                FermentationStep::new("Lagerung", 28, Milli::from_int(2)),
            ]
        );
    }

    #[test]
    fn malformed_step_names_the_fragment() {
        let error = parse_comment("[[Fermentation: Primär:5@12, Lager:xx@2]]").unwrap_err();
        assert_eq!(error.fragment, "Lager:xx@2");

        let error = parse_fermentation("Primär:5@12,,Lager:3@2").unwrap_err();
        assert_eq!(error.fragment, "");

        let error = parse_fermentation("Primär 5 12").unwrap_err();
        assert_eq!(error.fragment, "Primär 5 12");

        assert!(parse_fermentation(",").is_err());
    }

    #[test]
    fn crlf_after_tag_is_consumed() {
        let parsed = parse_comment("[[Public: 1]]\r\nText").unwrap();
        assert_eq!(parsed.residual, "Text");
    }
}
