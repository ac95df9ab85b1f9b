//! Escape-sequence scanner for the inline markup language.
//!
//! Grammar:
//!
//! | escape | meaning |
//! |---|---|
//! | `\n`, raw newline | row break |
//! | `\t`, raw tab | one font-size wide cell |
//! | `\b` | bold |
//! | `\d` | strikethrough |
//! | `\u` | underline |
//! | `\0` | restore base style |
//! | `\f<name>\f` | font family |
//! | `\c<rgb or rrggbb>\c` | fill color |
//! | `\i<path>\i` | inline atlas frame |
//! | `\p<name>\p` | inline instantiable object |
//!
//! Paired directives only look a bounded number of characters ahead for their
//! closing escape. Anything the scanner cannot interpret is dropped (the `\`
//! and the letter after it) and recorded as a [`MarkupError`].

use smallvec::SmallVec;

use crate::error::MarkupError;
use crate::style::Color;

/// Longest font family accepted between `\f` markers.
pub const FONT_MAX_LENGTH: usize = 10;
/// Longest color payload searched between `\c` markers.
pub const COLOR_MAX_LENGTH: usize = 6;
/// Longest image path accepted between `\i` markers.
pub const IMAGE_MAX_LENGTH: usize = 20;
/// Longest object name accepted between `\p` markers.
pub const OBJECT_MAX_LENGTH: usize = 16;

/// Byte range into the source markup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Directive selected by the character following a backslash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Newline,
    Tab,
    Bold,
    Strike,
    Underline,
    Restore,
    Font,
    Color,
    Image,
    Object,
}

impl DirectiveKind {
    /// Map the escape letter to a directive.
    pub fn from_escape_char(ch: char) -> Option<Self> {
        Some(match ch {
            'n' => Self::Newline,
            't' => Self::Tab,
            'b' => Self::Bold,
            'd' => Self::Strike,
            'u' => Self::Underline,
            '0' => Self::Restore,
            'f' => Self::Font,
            'c' => Self::Color,
            'i' => Self::Image,
            'p' => Self::Object,
            _ => return None,
        })
    }

    /// Escape letter for this directive.
    pub fn escape_char(self) -> char {
        match self {
            Self::Newline => 'n',
            Self::Tab => 't',
            Self::Bold => 'b',
            Self::Strike => 'd',
            Self::Underline => 'u',
            Self::Restore => '0',
            Self::Font => 'f',
            Self::Color => 'c',
            Self::Image => 'i',
            Self::Object => 'p',
        }
    }

    /// Lookahead window (in characters) for paired directives.
    pub fn payload_window(self) -> Option<usize> {
        match self {
            Self::Font => Some(FONT_MAX_LENGTH),
            Self::Color => Some(COLOR_MAX_LENGTH),
            Self::Image => Some(IMAGE_MAX_LENGTH),
            Self::Object => Some(OBJECT_MAX_LENGTH),
            _ => None,
        }
    }
}

/// Token payload.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind<'a> {
    /// Plain text between directives.
    Literal(&'a str),
    Newline,
    Tab,
    SetBold,
    SetStrike,
    SetUnderline,
    SetFont(&'a str),
    SetColor(Color),
    Restore,
    InsertImage(&'a str),
    InsertObject(&'a str),
}

impl TokenKind<'_> {
    /// Whether this token only mutates the style state.
    pub fn is_style_directive(&self) -> bool {
        matches!(
            self,
            Self::SetBold
                | Self::SetStrike
                | Self::SetUnderline
                | Self::SetFont(_)
                | Self::SetColor(_)
                | Self::Restore
        )
    }
}

/// One scanned token with its source span.
#[derive(Clone, Debug, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind<'a>, start: usize, end: usize) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }
}

/// Start a single forward scan over `markup`.
pub fn scan(markup: &str) -> Scanner<'_> {
    Scanner::new(markup)
}

/// Lazy token iterator over one markup string.
///
/// The scanner is not restartable; scan again with [`scan`] to re-read.
#[derive(Clone, Debug)]
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    literal_start: usize,
    pending: Option<Token<'a>>,
    errors: SmallVec<[MarkupError; 2]>,
}

enum Escape<'a> {
    Directive(Token<'a>, usize),
    Dropped(MarkupError, usize),
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            literal_start: 0,
            pending: None,
            errors: SmallVec::new(),
        }
    }

    /// Problems recovered so far.
    pub fn errors(&self) -> &[MarkupError] {
        &self.errors
    }

    /// Drain the remaining tokens and return them with every recovered error.
    pub fn collect_with_errors(mut self) -> (Vec<Token<'a>>, Vec<MarkupError>) {
        let tokens = self.by_ref().collect();
        (tokens, self.errors.into_vec())
    }

    fn take_literal(&mut self, end: usize, resume: usize) -> Option<Token<'a>> {
        let src = self.src;
        let start = self.literal_start;
        self.literal_start = resume;
        (start < end).then(|| Token::new(TokenKind::Literal(&src[start..end]), start, end))
    }

    /// Flush text before `start`, queueing `directive` behind it if needed.
    fn emit(&mut self, start: usize, directive: Token<'a>) -> Token<'a> {
        match self.take_literal(start, self.pos) {
            Some(literal) => {
                self.pending = Some(directive);
                literal
            }
            None => directive,
        }
    }

    fn scan_escape(&self, start: usize, letter: char) -> Escape<'a> {
        let src = self.src;
        let after = start + 1 + letter.len_utf8();
        let Some(kind) = DirectiveKind::from_escape_char(letter) else {
            return Escape::Dropped(
                MarkupError::UnknownEscape {
                    found: letter,
                    span: Span::new(start, after),
                },
                after,
            );
        };
        let simple = match kind {
            DirectiveKind::Newline => Some(TokenKind::Newline),
            DirectiveKind::Tab => Some(TokenKind::Tab),
            DirectiveKind::Bold => Some(TokenKind::SetBold),
            DirectiveKind::Strike => Some(TokenKind::SetStrike),
            DirectiveKind::Underline => Some(TokenKind::SetUnderline),
            DirectiveKind::Restore => Some(TokenKind::Restore),
            _ => None,
        };
        if let Some(token) = simple {
            return Escape::Directive(Token::new(token, start, after), after);
        }

        let window = kind.payload_window().unwrap_or(0);
        let malformed = || {
            Escape::Dropped(
                MarkupError::MalformedDirective {
                    kind,
                    span: Span::new(start, after),
                },
                after,
            )
        };
        let Some((close, payload_chars)) = self.find_closing(after, letter, window) else {
            return malformed();
        };
        let payload = &src[after..close];
        let end = close + 1 + letter.len_utf8();

        let token = match kind {
            DirectiveKind::Color => {
                let color = (payload_chars == 3 || payload_chars == 6)
                    .then(|| Color::from_hex(payload))
                    .flatten();
                match color {
                    Some(color) => TokenKind::SetColor(color),
                    None => {
                        return Escape::Dropped(
                            MarkupError::InvalidColorPayload {
                                payload: payload.to_string(),
                                span: Span::new(start, end),
                            },
                            after,
                        )
                    }
                }
            }
            _ if payload.is_empty() => return malformed(),
            DirectiveKind::Font => TokenKind::SetFont(payload),
            DirectiveKind::Image => TokenKind::InsertImage(payload),
            _ => TokenKind::InsertObject(payload),
        };
        Escape::Directive(Token::new(token, start, end), end)
    }

    /// Find `\<marker>` starting within `window` characters of `from`.
    ///
    /// Returns the byte index of the closing backslash and the payload length
    /// in characters.
    fn find_closing(&self, from: usize, marker: char, window: usize) -> Option<(usize, usize)> {
        let mut chars = self.src[from..].char_indices().peekable();
        let mut count = 0usize;
        while let Some((offset, ch)) = chars.next() {
            if count > window {
                return None;
            }
            if ch == '\\' && chars.peek().is_some_and(|(_, next)| *next == marker) {
                return Some((from + offset, count));
            }
            count += 1;
        }
        None
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.take() {
            return Some(token);
        }
        loop {
            let Some(ch) = self.src[self.pos..].chars().next() else {
                let end = self.src.len();
                return self.take_literal(end, end);
            };
            let start = self.pos;
            match ch {
                '\n' | '\t' => {
                    self.pos += 1;
                    let kind = if ch == '\n' {
                        TokenKind::Newline
                    } else {
                        TokenKind::Tab
                    };
                    return Some(self.emit(start, Token::new(kind, start, start + 1)));
                }
                '\\' => {
                    let Some(letter) = self.src[start + 1..].chars().next() else {
                        // A trailing backslash is ordinary text.
                        self.pos += 1;
                        continue;
                    };
                    match self.scan_escape(start, letter) {
                        Escape::Directive(token, resume) => {
                            self.pos = resume;
                            return Some(self.emit(start, token));
                        }
                        Escape::Dropped(err, resume) => {
                            log::warn!("dropping markup escape: {}", err);
                            self.errors.push(err);
                            self.pos = resume;
                            if let Some(literal) = self.take_literal(start, resume) {
                                return Some(literal);
                            }
                        }
                    }
                }
                _ => self.pos += ch.len_utf8(),
            }
        }
    }
}
