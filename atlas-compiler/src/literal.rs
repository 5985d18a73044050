//! Tensor literal parsing: bracketed nested lists (`[[1 2][3 4]]`), bare floats, and
//! single-quoted strings. Grounded in `parseTensorRecursive`/`determineShape`/`parseTensor`
//! and the string branch of `addStep` in `original_source/program.c`, and `tensorFromString`
//! in `original_source/tensor.c`.

use crate::error::Detail;
use atlas_tensor::Tensor;

/// Parses a nested-bracket tensor literal such as `[[1 2][3 4]]` into a `Tensor`. A single
/// forward pass collects the shape and flat data together (the original makes two passes —
/// `determineShape` then `parseTensorRecursive` — only because C needs the total element
/// count before it can allocate the data buffer; a `Vec` needs no such preallocation).
pub fn parse_tensor_literal(text: &str) -> Result<Tensor, Detail> {
    let mut chars = text.char_indices().peekable();
    let mut shape = [None; 4];
    let mut data = Vec::new();
    parse_bracket(text, &mut chars, 0, &mut shape, &mut data)?;
    skip_ws(text, &mut chars);
    if chars.peek().is_some() {
        return Err(Detail::TrailingCharacters);
    }
    let rank = shape.iter().rposition(Option::is_some).map(|i| i + 1).unwrap_or(0);
    for dim in shape.iter().take(rank) {
        if dim.is_none() {
            return Err(Detail::IncompleteShape);
        }
    }
    let dims: Vec<u32> = (0..rank).map(|i| shape[i].unwrap()).collect();
    let expected: u32 = dims.iter().product();
    if data.len() as u32 != expected {
        return Err(Detail::ElementCountMismatch);
    }
    Ok(Tensor::from_host(&dims, data))
}

type Chars<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn skip_ws(text: &str, chars: &mut Chars) {
    while let Some(&(_, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
    let _ = text;
}

fn parse_bracket(text: &str, chars: &mut Chars, depth: usize, shape: &mut [Option<u32>; 4], data: &mut Vec<f32>) -> Result<(), Detail> {
    skip_ws(text, chars);
    match chars.next() {
        Some((_, '[')) => {}
        _ => return Err(Detail::ExpectedOpenBracket),
    }
    skip_ws(text, chars);

    let mut count = 0u32;
    loop {
        match chars.peek().copied() {
            Some((_, ']')) | None => break,
            Some((_, '[')) => {
                if depth + 1 >= 4 {
                    return Err(Detail::TensorTooDeep);
                }
                parse_bracket(text, chars, depth + 1, shape, data)?;
                count += 1;
            }
            Some((start, _)) => {
                let end = chars
                    .clone()
                    .find(|&(_, c)| c == ']' || c.is_whitespace())
                    .map(|(i, _)| i)
                    .unwrap_or(text.len());
                let token = &text[start..end];
                let value: f32 = token.parse().map_err(|_| Detail::BadNumber)?;
                data.push(value);
                while chars.peek().map(|&(i, _)| i < end).unwrap_or(false) {
                    chars.next();
                }
                count += 1;
            }
        }
        skip_ws(text, chars);
    }

    match chars.next() {
        Some((_, ']')) => {}
        _ => return Err(Detail::ExpectedCloseBracket),
    }
    skip_ws(text, chars);

    match shape[depth] {
        None => shape[depth] = Some(count),
        Some(existing) if existing == count => {}
        Some(_) => return Err(Detail::InconsistentShape),
    }
    Ok(())
}

/// Parses a bare numeric literal, e.g. `3.5`.
pub fn parse_scalar(text: &str) -> Option<Tensor> {
    text.trim().parse::<f32>().ok().map(Tensor::scalar)
}

/// Decodes a `'...'`-quoted string body (backslash-escaped `\'`/`\\` already resolved by the
/// caller) into a rank-1 tensor of byte values, mirroring `tensorFromString`.
pub fn tensor_from_string(s: &str) -> Tensor {
    Tensor::vector(s.bytes().map(|b| b as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_flat_vector() {
        let t = parse_tensor_literal("[1 2 3]").unwrap();
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.get(&[1]).unwrap(), 2.0);
    }

    #[test]
    fn parses_nested_matrix() {
        let t = parse_tensor_literal("[[1 2][3 4]]").unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.get(&[1, 0]).unwrap(), 3.0);
    }

    #[test]
    fn rejects_inconsistent_rows() {
        let err = parse_tensor_literal("[[1 2][3]]").unwrap_err();
        assert!(matches!(err, Detail::InconsistentShape));
    }

    #[test]
    fn string_literal_becomes_byte_vector() {
        let t = tensor_from_string("hi");
        assert_eq!(t.get(&[0]).unwrap(), b'h' as f32);
        assert_eq!(t.get(&[1]).unwrap(), b'i' as f32);
    }
}
