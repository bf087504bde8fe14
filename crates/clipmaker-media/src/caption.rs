//! Caption overlay rendering.
//!
//! Text is laid out with a fixed per-character width estimate rather than real
//! font metrics, so the output depends only on the input text and the style.
//! Each wrapped line gets its own rounded, semi-transparent box; the block of
//! lines is centered on the canvas.

use std::fmt::Write;

use clipmaker_core::CaptionStyle;

/// Estimated rendered width of `text` in pixels.
pub fn estimate_width(text: &str, style: &CaptionStyle) -> f32 {
    text.chars().count() as f32 * char_width(style)
}

fn char_width(style: &CaptionStyle) -> f32 {
    style.font_size * style.char_width_ratio
}

/// Largest number of characters whose estimated width fits in `max_width`.
fn max_chars(max_width: f32, style: &CaptionStyle) -> usize {
    let cw = char_width(style);
    if cw <= 0.0 || !cw.is_finite() {
        return usize::MAX;
    }
    if max_width <= 0.0 || !max_width.is_finite() {
        return 0;
    }
    let mut n = (max_width / cw).floor() as usize;
    while n > 0 && n as f32 * cw > max_width {
        n -= 1;
    }
    n
}

/// Greedy word wrap.
///
/// Words longer than a whole line are split into character chunks. No line
/// is empty and none is wider than `max_width`. Returns no lines when not even
/// one character fits.
pub fn wrap_lines(text: &str, max_width: f32, style: &CaptionStyle) -> Vec<String> {
    let limit = max_chars(max_width, style);
    if limit == 0 {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len <= limit {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
            continue;
        }

        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if word_len <= limit {
            current.push_str(word);
            current_len = word_len;
            continue;
        }

        let chars: Vec<char> = word.chars().collect();
        let mut chunks = chars.chunks(limit).peekable();
        while let Some(chunk) = chunks.next() {
            if chunks.peek().is_some() {
                lines.push(chunk.iter().collect());
            } else {
                current = chunk.iter().collect();
                current_len = chunk.len();
            }
        }
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Render the caption overlay for a `width` x `height` canvas as an SVG document.
pub fn render_caption_svg(width: u32, height: u32, text: &str, style: &CaptionStyle) -> String {
    let (w, h) = (width as f32, height as f32);
    let lines = wrap_lines(text, w * style.max_width_ratio, style);

    let (box_fill, box_opacity) = split_alpha(&style.box_fill);
    let box_fill = escape_xml(&box_fill);
    let text_fill = escape_xml(&style.text_fill);
    let box_h = style.font_size + style.padding_y;
    let start_y = (h - lines.len() as f32 * style.line_height) / 2.0;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">"#
    );

    for (i, line) in lines.iter().enumerate() {
        let center_y = start_y + (i as f32 + 0.5) * style.line_height;
        let box_w = estimate_width(line, style) + style.padding_x * 2.0;
        let box_x = (w - box_w) / 2.0;
        let box_y = center_y - box_h / 2.0;
        // Alphabetic baseline that puts the cap height roughly in the middle of the box.
        let baseline = center_y + style.font_size * 0.35;

        let _ = write!(
            svg,
            r#"<rect x="{box_x}" y="{box_y}" width="{box_w}" height="{box_h}" rx="{r}" ry="{r}" fill="{box_fill}""#,
            r = style.corner_radius,
        );
        if let Some(opacity) = box_opacity {
            let _ = write!(svg, r#" fill-opacity="{opacity:.3}""#);
        }
        svg.push_str("/>");

        let _ = write!(
            svg,
            r#"<text x="{x}" y="{baseline}" text-anchor="middle" font-family="{family}" font-size="{size}" font-weight="bold" fill="{fill}">{content}</text>"#,
            x = w / 2.0,
            family = escape_xml(&style.font_family),
            size = style.font_size,
            fill = text_fill,
            content = escape_xml(line),
        );
    }

    svg.push_str("</svg>");
    svg
}

/// Split `#rrggbbaa` into `#rrggbb` and an opacity; other colors pass through.
fn split_alpha(color: &str) -> (String, Option<f32>) {
    let hex = color.trim();
    if hex.len() == 9 && hex.starts_with('#') && hex.is_char_boundary(7) {
        if let Ok(alpha) = u8::from_str_radix(&hex[7..], 16) {
            return (hex[..7].to_string(), Some(f32::from(alpha) / 255.0));
        }
    }
    (hex.to_string(), None)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
