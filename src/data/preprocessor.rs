// ============================================================
// Layer 4 - Text Preprocessor
// ============================================================
// Normalises one record's text into a single TSV-safe line.
//
// Raw corpora (tweets, forum posts, news articles) carry:
//   - Non-breaking and zero-width spaces
//   - Carriage returns and embedded newlines
//   - Tab characters, which would break the TSV split files
//   - Control characters and runs of spaces
//
// Cleaning steps (applied in order):
//   1. Map Unicode whitespace variants, tabs, newlines and
//      control characters to a plain space
//   2. Collapse runs of spaces into one
//   3. Trim both ends

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw text string. The result never contains a tab
    /// or a newline.
    pub fn clean(&self, text: &str) -> String {

        // ── Step 1: Normalise individual characters ───────────────────────────
        let normalised = text.chars().map(|c| match c {
            '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
            c if c.is_whitespace() || c.is_control() => ' ',
            c => c,
        });

        // ── Step 2: Collapse runs of spaces ───────────────────────────────────
        let mut out        = String::with_capacity(text.len());
        let mut last_space = false;
        for c in normalised {
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        // ── Step 3: Trim ──────────────────────────────────────────────────────
        out.trim().to_string()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
