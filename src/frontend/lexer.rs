use crate::frontend::token::{lookup_ident, Location, Token, TokenKind};

/// Char-based lexer for donkey source text.
///
/// The lexer never fails: unknown characters become `Illegal` tokens and an
/// unterminated string simply runs to end of input. Line and column are
/// tracked per character so every token carries its source location.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += 1;
        ch
    }

    fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if is_identifier_char(ch) {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn read_number(&mut self) -> String {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        digits
    }

    fn read_string(&mut self) -> String {
        self.advance(); // opening quote
        let mut string = String::new();
        while let Some(ch) = self.current() {
            if ch == '"' {
                break;
            }
            string.push(ch);
            self.advance();
        }
        self.advance(); // closing quote (or EOF)
        string
    }

    /// Produces the next token, consuming input.
    ///
    /// Returns an `Eof` token forever once the input is exhausted.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let loc = self.location();

        let ch = match self.current() {
            Some(ch) => ch,
            None => return Token::new(TokenKind::Eof, "", loc),
        };

        let token = match ch {
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::Eq, "==", loc)
                } else {
                    Token::new(TokenKind::Assign, "=", loc)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::NotEq, "!=", loc)
                } else {
                    Token::new(TokenKind::Bang, "!", loc)
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::LtEq, "<=", loc)
                } else {
                    Token::new(TokenKind::Lt, "<", loc)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::GtEq, ">=", loc)
                } else {
                    Token::new(TokenKind::Gt, ">", loc)
                }
            }
            '+' => Token::new(TokenKind::Plus, "+", loc),
            '-' => Token::new(TokenKind::Minus, "-", loc),
            '*' => Token::new(TokenKind::Asterisk, "*", loc),
            '/' => Token::new(TokenKind::Slash, "/", loc),
            ';' => Token::new(TokenKind::Semicolon, ";", loc),
            ':' => Token::new(TokenKind::Colon, ":", loc),
            ',' => Token::new(TokenKind::Comma, ",", loc),
            '(' => Token::new(TokenKind::Lparen, "(", loc),
            ')' => Token::new(TokenKind::Rparen, ")", loc),
            '{' => Token::new(TokenKind::Lbrace, "{", loc),
            '}' => Token::new(TokenKind::Rbrace, "}", loc),
            '[' => Token::new(TokenKind::Lbracket, "[", loc),
            ']' => Token::new(TokenKind::Rbracket, "]", loc),
            '"' => {
                let string = self.read_string();
                return Token::new(TokenKind::Str, string, loc);
            }
            _ => {
                if is_identifier_char(ch) {
                    let ident = self.read_identifier();
                    let kind = lookup_ident(&ident);
                    return Token::new(kind, ident, loc);
                } else if ch.is_ascii_digit() {
                    let digits = self.read_number();
                    return Token::new(TokenKind::Int, digits, loc);
                }
                Token::new(TokenKind::Illegal, ch.to_string(), loc)
            }
        };

        self.advance();
        token
    }

    /// Lexes the entire input, ending with an `Eof` token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }
}

/// Identifier characters: letters, plus the emoji ranges donkey accepts as
/// names. Digits and underscores are not identifier characters.
fn is_identifier_char(ch: char) -> bool {
    ch.is_alphabetic() || is_emoji(ch)
}

fn is_emoji(ch: char) -> bool {
    let code = ch as u32;
    (0x1F300..=0x1FAF6).contains(&code)
        || (126980..=127569).contains(&code)
        || (169..=174).contains(&code)
        || (8205..=12953).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_next_token_operators() {
        let source = "=+-!*/<> == != <= >=";
        let expected = vec![
            TokenKind::Assign,
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Bang,
            TokenKind::Asterisk,
            TokenKind::Slash,
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::Eq,
            TokenKind::NotEq,
            TokenKind::LtEq,
            TokenKind::GtEq,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn test_let_statement_tokens() {
        let source = "let five = 5;";
        let mut lexer = Lexer::new(source);

        let expected = vec![
            (TokenKind::Let, "let"),
            (TokenKind::Ident, "five"),
            (TokenKind::Assign, "="),
            (TokenKind::Int, "5"),
            (TokenKind::Semicolon, ";"),
            (TokenKind::Eof, ""),
        ];

        for (kind, literal) in expected {
            let token = lexer.next_token();
            assert_eq!(token.kind, kind, "kind mismatch for {:?}", literal);
            assert_eq!(token.literal, literal);
        }
    }

    #[test]
    fn test_function_tokens() {
        let source = "let add = fn(x, y) { x + y };";
        let expected = vec![
            TokenKind::Let,
            TokenKind::Ident,
            TokenKind::Assign,
            TokenKind::Function,
            TokenKind::Lparen,
            TokenKind::Ident,
            TokenKind::Comma,
            TokenKind::Ident,
            TokenKind::Rparen,
            TokenKind::Lbrace,
            TokenKind::Ident,
            TokenKind::Plus,
            TokenKind::Ident,
            TokenKind::Rbrace,
            TokenKind::Semicolon,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn test_string_token() {
        let mut lexer = Lexer::new("\"donkey\"");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Str);
        assert_eq!(token.literal, "donkey");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_collection_tokens() {
        let source = "[1, 2]; {3: 4}";
        let expected = vec![
            TokenKind::Lbracket,
            TokenKind::Int,
            TokenKind::Comma,
            TokenKind::Int,
            TokenKind::Rbracket,
            TokenKind::Semicolon,
            TokenKind::Lbrace,
            TokenKind::Int,
            TokenKind::Colon,
            TokenKind::Int,
            TokenKind::Rbrace,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn test_locations() {
        let source = "let x =\n  5;";
        let mut lexer = Lexer::new(source);

        let let_tok = lexer.next_token();
        assert_eq!(let_tok.location, Location { line: 1, column: 1 });

        let x_tok = lexer.next_token();
        assert_eq!(x_tok.location, Location { line: 1, column: 5 });

        lexer.next_token(); // =
        let five_tok = lexer.next_token();
        assert_eq!(five_tok.location, Location { line: 2, column: 3 });
    }

    #[test]
    fn test_emoji_identifier() {
        let mut lexer = Lexer::new("let 🐴 = 1;");
        lexer.next_token();
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Ident);
        assert_eq!(token.literal, "🐴");
    }

    #[test]
    fn test_illegal_token() {
        let mut lexer = Lexer::new("1 @ 2");
        lexer.next_token();
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Illegal);
        assert_eq!(token.literal, "@");
    }
}
