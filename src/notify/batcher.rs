//! Result batcher
//!
//! Packs variable-length result sets into bounded message chunks. `pack_results`
//! is deterministic: same items, chunk size, and marker produce the same
//! chunks. The cosmetic marker is generated by the caller (see
//! [`random_marker`]) so the packing itself stays a pure function.

use rand::Rng;
use std::ops::Range;

/// One outbound message unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Rendered message text, never exceeding the character budget
    pub text: String,
    /// Which input items this chunk carries (contiguous, in input order)
    pub item_indices: Range<usize>,
}

/// Generates a short cosmetic marker distinguishing one batch from the next
pub fn random_marker() -> String {
    let mut rng = rand::thread_rng();
    let n: u16 = rng.gen_range(1000..10000);
    format!("#{}", n)
}

/// Packs item text blocks into message chunks
///
/// Items are grouped in input order into chunks of `chunk_size`. Each chunk
/// is prefixed with a `part i of n` header carrying `marker`, and item
/// blocks are joined with a blank line. If a rendered chunk would exceed
/// `max_chars` it is split further (and a single oversize item is truncated),
/// so no returned chunk ever exceeds the character budget. With ordinary
/// item lengths the result is exactly `ceil(items / chunk_size)` chunks.
///
/// # Arguments
///
/// * `items` - Pre-formatted text blocks, one per listing
/// * `chunk_size` - Items per chunk
/// * `max_chars` - Hard character limit of the delivery transport
/// * `marker` - Cosmetic batch marker included in each header
pub fn pack_results(
    items: &[String],
    chunk_size: usize,
    max_chars: usize,
    marker: &str,
) -> Vec<Chunk> {
    if items.is_empty() {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);

    // Group by item count first, then split any group whose rendered text
    // would blow the character budget.
    let mut groups: Vec<Range<usize>> = (0..items.len())
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(items.len()))
        .collect();

    let header_allowance = max_header_len(marker);
    let mut i = 0;
    while i < groups.len() {
        let group = groups[i].clone();
        if render_len(items, &group, header_allowance) > max_chars && group.len() > 1 {
            let mid = group.start + group.len() / 2;
            groups[i] = group.start..mid;
            groups.insert(i + 1, mid..group.end);
            // Re-check the shrunken group before moving on
            continue;
        }
        i += 1;
    }

    let total = groups.len();
    groups
        .into_iter()
        .enumerate()
        .map(|(idx, group)| {
            let header = header(marker, idx + 1, total);
            let body = items[group.clone()].join("\n\n");
            let mut text = format!("{}\n\n{}", header, body);
            if text.len() > max_chars {
                // Only reachable when a single item alone exceeds the budget
                text = truncate_at_char_boundary(&text, max_chars);
            }
            Chunk {
                text,
                item_indices: group,
            }
        })
        .collect()
}

fn header(marker: &str, part: usize, total: usize) -> String {
    format!("{} part {} of {}", marker, part, total)
}

/// Upper bound of the header length for budget estimation
fn max_header_len(marker: &str) -> usize {
    // "{marker} part NNNN of NNNN" plus the blank-line separator
    marker.len() + " part 0000 of 0000".len() + 2
}

fn render_len(items: &[String], group: &Range<usize>, header_len: usize) -> usize {
    let body: usize = items[group.clone()].iter().map(|s| s.len()).sum();
    let separators = group.len().saturating_sub(1) * 2;
    header_len + body + separators
}

fn truncate_at_char_boundary(s: &str, max_len: usize) -> String {
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
