use unicode_segmentation::UnicodeSegmentation;

/// Packs paragraphs into chunks of at most `max_chunk_chars` graphemes.
///
/// Consecutive chunks share up to `overlap_chars` graphemes of trailing text,
/// cut forward to a word boundary. Paragraphs longer than a chunk are windowed.
pub fn chunk_document(body: &str, max_chunk_chars: usize, overlap_chars: usize) -> Vec<String> {
    let max_chunk_chars = max_chunk_chars.max(1);
    let overlap_chars = overlap_chars.min(max_chunk_chars / 2);

    let mut pieces = Vec::new();
    for paragraph in body.split("\n\n") {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }

        if width(trimmed) > max_chunk_chars {
            pieces.extend(window(trimmed, max_chunk_chars, overlap_chars));
        } else {
            pieces.push(trimmed.to_string());
        }
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        if !current.is_empty() && width(&current) + width(&piece) + 2 > max_chunk_chars {
            let tail = overlap_tail(&current, overlap_chars);
            chunks.push(std::mem::take(&mut current));
            if width(&tail) + width(&piece) + 2 <= max_chunk_chars {
                current = tail;
            }
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(&piece);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

fn width(text: &str) -> usize {
    text.graphemes(true).count()
}

fn window(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let graphemes = text.graphemes(true).collect::<Vec<_>>();
    let step = size.saturating_sub(overlap).max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    while start < graphemes.len() {
        let end = (start + size).min(graphemes.len());
        let piece = graphemes[start..end].concat();
        let piece = piece.trim();
        if !piece.is_empty() {
            windows.push(piece.to_string());
        }
        if end == graphemes.len() {
            break;
        }
        start += step;
    }
    windows
}

fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }

    let graphemes = text.graphemes(true).collect::<Vec<_>>();
    let start = graphemes.len().saturating_sub(overlap);
    let tail = graphemes[start..].concat();

    if start == 0 {
        return tail.trim().to_string();
    }

    // Skip the partial word at the cut.
    match tail.find(char::is_whitespace) {
        Some(idx) => tail[idx..].trim().to_string(),
        None => String::new(),
    }
}
