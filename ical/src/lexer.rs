// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Character-level lexer for RFC 5545 content lines.
//!
//! Line folding (CRLF/LF/CR followed by a SPACE or TAB) is stripped by the
//! `logos` skip rule, so the token stream downstream of this module never
//! sees a folded continuation — callers get whole, unfolded lines.

use logos::Logos;

/// Tokenize `src`. Folded continuation lines are invisible to the returned
/// stream; the caller sees one logical content line per `Newline` token.
pub fn lex(src: &str) -> logos::Lexer<'_, Token<'_>> {
    Token::lexer(src)
}

/// A single lexical token within an unfolded iCalendar line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Logos)]
#[logos(skip r"\r\n[ \t]|\n[ \t]|\r[ \t]")]
pub enum Token<'a> {
    /// `:`
    #[token(":")]
    Colon,

    /// `;`
    #[token(";")]
    Semicolon,

    /// `=`
    #[token("=")]
    Equal,

    /// `,`
    #[token(",")]
    Comma,

    /// `"`
    #[token(r#"""#)]
    DQuote,

    /// `\r\n`, bare `\n`, or bare `\r` ending a logical line.
    #[regex(r"\r\n|\n|\r")]
    Newline,

    /// A run of characters that make up a property name, parameter name,
    /// parameter value, or unescaped value text.
    #[regex(r#"[^:;=,"\r\n]+"#)]
    Text(&'a str),
}
