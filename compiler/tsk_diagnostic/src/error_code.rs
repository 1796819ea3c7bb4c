//! Error codes for every diagnostic the pipeline emits.

use std::fmt;

use crate::Stage;

/// Format `E####`; the first digit names the stage:
/// - E0xxx: lexer
/// - E1xxx: parser
/// - E2xxx: semantic analysis
/// - E3xxx: resolution
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    // Lexer (E0xxx)
    /// Unterminated string literal
    E0001,
    /// Unexpected character
    E0002,
    /// Number literal out of range
    E0003,
    /// Invalid escape sequence
    E0004,
    /// Invalid UTF-8 byte sequence
    E0005,

    // Parser (E1xxx)
    /// Unexpected token
    E1001,
    /// Expected a value
    E1002,
    /// Unclosed delimiter
    E1003,
    /// Malformed section header
    E1004,
    /// Expected a key
    E1005,
    /// Nesting too deep
    E1006,
    /// Range bound out of range
    E1007,

    // Semantic (E2xxx)
    /// Unknown operator
    E2001,
    /// Missing required operator argument
    E2002,
    /// Unknown operator argument (warning)
    E2003,
    /// Too many positional arguments
    E2004,
    /// Cyclic reference
    E2005,
    /// Mixed array element types (warning)
    E2006,
    /// Range minimum exceeds maximum
    E2007,
    /// Key declared twice in one section (warning)
    E2008,
    /// Argument given twice
    E2009,
    /// Reference to an undeclared key (warning)
    E2010,

    // Resolution (E3xxx)
    /// Unresolved reference
    E3001,
    /// Cyclic reference reached during resolution
    E3002,
    /// Constant folding failed; call left deferred (warning)
    E3003,
    /// `+=` applied to incompatible values (warning)
    E3004,
}

impl ErrorCode {
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::E0001,
        ErrorCode::E0002,
        ErrorCode::E0003,
        ErrorCode::E0004,
        ErrorCode::E0005,
        ErrorCode::E1001,
        ErrorCode::E1002,
        ErrorCode::E1003,
        ErrorCode::E1004,
        ErrorCode::E1005,
        ErrorCode::E1006,
        ErrorCode::E1007,
        ErrorCode::E2001,
        ErrorCode::E2002,
        ErrorCode::E2003,
        ErrorCode::E2004,
        ErrorCode::E2005,
        ErrorCode::E2006,
        ErrorCode::E2007,
        ErrorCode::E2008,
        ErrorCode::E2009,
        ErrorCode::E2010,
        ErrorCode::E3001,
        ErrorCode::E3002,
        ErrorCode::E3003,
        ErrorCode::E3004,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E0001 => "E0001",
            ErrorCode::E0002 => "E0002",
            ErrorCode::E0003 => "E0003",
            ErrorCode::E0004 => "E0004",
            ErrorCode::E0005 => "E0005",
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E1006 => "E1006",
            ErrorCode::E1007 => "E1007",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E2009 => "E2009",
            ErrorCode::E2010 => "E2010",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
        }
    }

    /// The stage that owns this code.
    pub fn stage(&self) -> Stage {
        match self.as_str().as_bytes()[1] {
            b'0' => Stage::Lex,
            b'1' => Stage::Parse,
            b'2' => Stage::Semantic,
            _ => Stage::Resolution,
        }
    }

    /// Codes that are reported as warnings.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ErrorCode::E2003
                | ErrorCode::E2006
                | ErrorCode::E2008
                | ErrorCode::E2010
                | ErrorCode::E3003
                | ErrorCode::E3004
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or(())
    }
}
