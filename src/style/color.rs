use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("`{0}` is not a #rgb or #rrggbb color")]
pub struct ColorParseError(pub String);

/// Parse a CSS hex color (`#rgb` or `#rrggbb`) into its components.
pub fn parse_hex(color: &str) -> Result<(u8, u8, u8), ColorParseError> {
    let err = || ColorParseError(color.to_string());
    let hex = color.trim().strip_prefix('#').ok_or_else(err)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(err());
    }

    match hex.len() {
        3 => {
            // Each nibble doubles: #ccc == #cccccc
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map(|v| v * 17);
            Ok((
                nibble(0).map_err(|_| err())?,
                nibble(1).map_err(|_| err())?,
                nibble(2).map_err(|_| err())?,
            ))
        }
        6 => {
            let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
            Ok((
                byte(0).map_err(|_| err())?,
                byte(2).map_err(|_| err())?,
                byte(4).map_err(|_| err())?,
            ))
        }
        _ => Err(err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_form() {
        assert_eq!(parse_hex("#e0938d"), Ok((0xe0, 0x93, 0x8d)));
        assert_eq!(parse_hex("#8E342E"), Ok((0x8e, 0x34, 0x2e)));
    }

    #[test]
    fn test_short_form() {
        assert_eq!(parse_hex("#ccc"), Ok((0xcc, 0xcc, 0xcc)));
        assert_eq!(parse_hex("#f00"), Ok((255, 0, 0)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_hex("ccc").is_err());
        assert!(parse_hex("#cccc").is_err());
        assert!(parse_hex("#gg0000").is_err());
        assert!(parse_hex("red").is_err());
    }
}
