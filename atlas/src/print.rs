//! Recursive ASCII-box tensor pretty-printer, used by the `print`/`printLine` steps.
//!
//! Grounded in `helper`/`formatTensorData`/`computeMaxNumLength` in
//! `original_source/tensorPrint.c`. The original builds one flat `\n`-joined C string; here
//! each block is a `Vec<String>` of lines, which composes more naturally in Rust and avoids
//! the original's manual byte-counting and `strcat` bookkeeping, but the layout algorithm
//! (horizontal boxes at even depth, vertical at odd depth, `%.2f`-padded numbers) is the same.

use atlas_tensor::Tensor;

/// Formats a tensor's contents as the boxed, depth-alternating layout `print` uses. Reads
/// the tensor through host memory; the caller is responsible for transferring a GPU tensor
/// first.
pub fn format_tensor(t: &Tensor) -> atlas_tensor::Result<String> {
    let max_len = max_num_length(t)?;
    let lines = helper(t, &outer_shape(t), 0, 0, 0, max_len)?;
    Ok(lines.join("\n"))
}

/// The original prepends a size-1 leading dimension before recursing, so a rank-0 scalar
/// still hits the same base case as every other rank; here that's just "iterate one extra,
/// always-length-1 level" expressed as an explicit shape vector.
fn outer_shape(t: &Tensor) -> Vec<u32> {
    let mut shape = vec![1u32];
    shape.extend_from_slice(t.shape());
    shape
}

fn max_num_length(t: &Tensor) -> atlas_tensor::Result<usize> {
    let mut max = 0usize;
    let total = t.size() as usize;
    let rank = t.rank();
    let mut indices = vec![0i64; rank.max(1)];
    for _ in 0..total.max(1) {
        let value = if rank == 0 { t.get(&[])? } else { t.get(&indices[..rank])? };
        max = max.max(format!("{value:.2}").len());
        if rank == 0 {
            break;
        }
        for i in (0..rank).rev() {
            indices[i] += 1;
            if (indices[i] as u32) < t.shape()[i] {
                break;
            }
            indices[i] = 0;
        }
    }
    Ok(max.max(1))
}

/// Renders the `dim_index`'th dimension of `shape` (the outer, size-1-prepended shape) as a
/// list of lines. `base` is a multi-index into the *real* tensor (one shorter than `shape`,
/// since the leading dimension is synthetic).
fn helper(
    t: &Tensor,
    shape: &[u32],
    dim_index: usize,
    depth: u32,
    base_linear: u32,
    max_len: usize,
) -> atlas_tensor::Result<Vec<String>> {
    let rank = t.rank();
    if dim_index == shape.len() - 1 {
        let count = shape[dim_index];
        let mut parts = Vec::with_capacity(count as usize);
        for i in 0..count {
            let linear = base_linear + i;
            let value = if rank == 0 { t.get(&[])? } else { t.get(&unflatten(linear, &shape[1..], rank))? };
            parts.push(format!("{value:<width$.2}", width = max_len));
        }
        return Ok(vec![parts.join(" ")]);
    }

    let inner_size: u32 = shape[dim_index + 1..].iter().product();
    let num_blocks = shape[dim_index];
    let mut blocks = Vec::with_capacity(num_blocks as usize);
    for i in 0..num_blocks {
        blocks.push(helper(t, shape, dim_index + 1, depth + 1, base_linear + i * inner_size, max_len)?);
    }

    let horizontal = depth % 2 == 0;
    let boxed: Vec<Vec<String>> = blocks.into_iter().map(box_lines).collect();
    Ok(if horizontal { combine_horizontal(boxed) } else { combine_vertical(boxed) })
}

/// Converts a flat index into the real tensor's multi-index, given the (one-shorter)
/// remaining shape below the leading synthetic dimension.
fn unflatten(linear: u32, shape: &[u32], rank: usize) -> Vec<i64> {
    let mut remaining = linear;
    let mut indices = vec![0i64; rank];
    for i in (0..rank).rev() {
        let dim = shape[i].max(1);
        indices[i] = (remaining % dim) as i64;
        remaining /= dim;
    }
    indices
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}

fn box_lines(lines: Vec<String>) -> Vec<String> {
    let width = lines.iter().map(|l| display_width(l)).max().unwrap_or(0);
    let fill = "-".repeat(width + 2);
    let mut boxed = Vec::with_capacity(lines.len() + 2);
    boxed.push(format!("+{fill}+"));
    for line in lines {
        let padding = width - display_width(&line);
        boxed.push(format!("| {line}{} |", " ".repeat(padding)).trim_end().to_string());
    }
    boxed.push(format!("+{fill}+"));
    boxed
}

fn combine_horizontal(blocks: Vec<Vec<String>>) -> Vec<String> {
    let max_height = blocks.iter().map(|b| b.len()).max().unwrap_or(0);
    let widths: Vec<usize> = blocks.iter().map(|b| b.first().map(|l| l.len()).unwrap_or(0)).collect();
    let mut combined = Vec::with_capacity(max_height);
    for row in 0..max_height {
        let mut parts = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            let line = block.get(row).cloned().unwrap_or_else(|| " ".repeat(widths[i]));
            parts.push(line);
        }
        combined.push(parts.join(" ").trim_end().to_string());
    }
    combined
}

fn combine_vertical(blocks: Vec<Vec<String>>) -> Vec<String> {
    let max_width = blocks.iter().flat_map(|b| b.iter()).map(|l| l.len()).max().unwrap_or(0);
    let mut combined = Vec::new();
    for block in blocks {
        for line in block {
            let padding = max_width.saturating_sub(line.len());
            combined.push(format!("{line}{}", " ".repeat(padding)));
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalar_formats_as_a_single_number() {
        let t = Tensor::scalar(7.0);
        assert_eq!(format_tensor(&t).unwrap(), "7.00");
    }

    #[test]
    fn vector_formats_as_one_line() {
        let t = Tensor::vector(vec![1.0, 2.5, -3.0]);
        let out = format_tensor(&t).unwrap();
        assert_eq!(out, "1.00  2.50 -3.00");
    }

    #[test]
    fn matrix_formats_as_boxed_rows() {
        let t = Tensor::from_host(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let out = format_tensor(&t).unwrap();
        assert!(out.contains('+'));
        assert!(out.contains('|'));
    }
}
