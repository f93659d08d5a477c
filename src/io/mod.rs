use std::error;
use std::fmt;

/// The type for errors occurring while reading puzzle descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    BadDimensions,
    BadCharacter(char),
    WrongCellCount { expected: usize, found: usize },
    AdjacentClues,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::BadDimensions => write!(f, "width and height must be at least 1"),
            ParseError::BadCharacter(c) => {
                write!(f, "puzzle may contain only digits, spaces, and newlines (found {:?})", c)
            }
            ParseError::WrongCellCount { expected, found } => write!(
                f,
                "puzzle must contain width * height numbers and spaces (expected {}, found {})",
                expected, found
            ),
            ParseError::AdjacentClues => write!(f, "puzzle contains vertically adjacent numbers"),
        }
    }
}

impl error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = ParseError::WrongCellCount {
            expected: 4,
            found: 3,
        };
        assert_eq!(
            e.to_string(),
            "puzzle must contain width * height numbers and spaces (expected 4, found 3)"
        );
        assert!(ParseError::BadCharacter('!').to_string().contains("'!'"));
    }
}
