//! Positioned word tokens from a page content stream.
//!
//! Text-showing operators are replayed against the text and graphics state
//! so every shown word gets a page-space bounding box. Glyph metrics are not
//! read: widths use an average advance, which is enough to order words and
//! tell columns apart.

use lopdf::content::Operation;
use lopdf::Object;

use crate::layout::Token;

/// Average glyph advance as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// TJ adjustment, in thousandths of text space, that separates two words.
const WORD_GAP: f32 = 200.0;

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMatrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl TextMatrix {
    pub const IDENTITY: TextMatrix = TextMatrix::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`.
    pub fn multiply(&self, other: &TextMatrix) -> TextMatrix {
        TextMatrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Map a point through the matrix.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn y_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let n: Vec<f32> = operands.iter().take(6).filter_map(number).collect();
        (n.len() == 6).then(|| TextMatrix::new(n[0], n[1], n[2], n[3], n[4], n[5]))
    }
}

enum Piece {
    Text(String),
    Adjust(f32),
}

/// Replays content-stream operations and collects word tokens.
///
/// `decode` turns the bytes of a shown string into text given the current
/// font resource name.
pub struct TokenCollector<F> {
    decode: F,
    page_top: f32,
    ctm: TextMatrix,
    ctm_stack: Vec<TextMatrix>,
    tm: TextMatrix,
    tlm: TextMatrix,
    font: Vec<u8>,
    font_size: f32,
    leading: f32,
    h_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    tokens: Vec<Token>,
}

impl<F> TokenCollector<F>
where
    F: Fn(&[u8], &[u8]) -> String,
{
    /// `page_top` is the upper edge of the media box, used to flip y so it
    /// grows downward.
    pub fn new(page_top: f32, decode: F) -> Self {
        Self {
            decode,
            page_top,
            ctm: TextMatrix::IDENTITY,
            ctm_stack: Vec::new(),
            tm: TextMatrix::IDENTITY,
            tlm: TextMatrix::IDENTITY,
            font: Vec::new(),
            font_size: 12.0,
            leading: 0.0,
            h_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            tokens: Vec::new(),
        }
    }

    /// Replay all operations and return the collected tokens.
    pub fn run(mut self, operations: &[Operation]) -> Vec<Token> {
        for op in operations {
            self.apply(op);
        }
        self.tokens
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) {
        let args = &op.operands;
        match op.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = TextMatrix::from_operands(args) {
                    self.ctm = m.multiply(&self.ctm);
                }
            }
            "BT" => {
                self.tm = TextMatrix::IDENTITY;
                self.tlm = TextMatrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = args.first() {
                    self.font = name.clone();
                }
                if let Some(size) = args.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = args.first().and_then(number) {
                    self.leading = leading;
                }
            }
            "Tc" => {
                if let Some(spacing) = args.first().and_then(number) {
                    self.char_spacing = spacing;
                }
            }
            "Tw" => {
                if let Some(spacing) = args.first().and_then(number) {
                    self.word_spacing = spacing;
                }
            }
            "Tz" => {
                if let Some(scale) = args.first().and_then(number) {
                    self.h_scale = scale / 100.0;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (
                    args.first().and_then(number),
                    args.get(1).and_then(number),
                ) {
                    if op.operator == "TD" {
                        self.leading = -ty;
                    }
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = TextMatrix::from_operands(args) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),
            "Tj" => {
                if let Some(text) = args.first().and_then(|o| self.decode_string(o)) {
                    self.show(vec![Piece::Text(text)]);
                }
            }
            "'" => {
                self.move_line(0.0, -self.leading);
                if let Some(text) = args.first().and_then(|o| self.decode_string(o)) {
                    self.show(vec![Piece::Text(text)]);
                }
            }
            "\"" => {
                if let Some(spacing) = args.first().and_then(number) {
                    self.word_spacing = spacing;
                }
                if let Some(spacing) = args.get(1).and_then(number) {
                    self.char_spacing = spacing;
                }
                self.move_line(0.0, -self.leading);
                if let Some(text) = args.get(2).and_then(|o| self.decode_string(o)) {
                    self.show(vec![Piece::Text(text)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = args.first() {
                    let pieces = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(..) => self.decode_string(item).map(Piece::Text),
                            other => number(other).map(Piece::Adjust),
                        })
                        .collect();
                    self.show(pieces);
                }
            }
            _ => {}
        }
    }

    fn decode_string(&self, obj: &Object) -> Option<String> {
        match obj {
            Object::String(bytes, _) => Some((self.decode)(&self.font, bytes)),
            _ => None,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = TextMatrix::translation(tx, ty).multiply(&self.tlm);
        self.tm = self.tlm;
    }

    fn show(&mut self, pieces: Vec<Piece>) {
        let trm = self.tm.multiply(&self.ctm);
        let glyph = self.font_size * AVG_GLYPH_WIDTH * self.h_scale;

        let mut advance = 0.0;
        let mut start = 0.0;
        let mut word = String::new();

        for piece in pieces {
            match piece {
                Piece::Adjust(n) => {
                    if n <= -WORD_GAP {
                        self.emit(&trm, &mut word, start, advance);
                    }
                    advance -= n / 1000.0 * self.font_size * self.h_scale;
                }
                Piece::Text(text) => {
                    for ch in text.chars() {
                        if ch.is_whitespace() {
                            self.emit(&trm, &mut word, start, advance);
                            advance += glyph + self.char_spacing + self.word_spacing;
                        } else {
                            if word.is_empty() {
                                start = advance;
                            }
                            word.push(ch);
                            advance += glyph + self.char_spacing;
                        }
                    }
                }
            }
        }
        self.emit(&trm, &mut word, start, advance);

        self.tm = TextMatrix::translation(advance, 0.0).multiply(&self.tm);
    }

    fn emit(&mut self, trm: &TextMatrix, word: &mut String, start: f32, end: f32) {
        if word.is_empty() {
            return;
        }
        let (xa, baseline) = trm.apply(start, 0.0);
        let (xb, _) = trm.apply(end, 0.0);
        let height = self.font_size * trm.y_scale();
        let bottom = self.page_top - baseline;

        self.tokens.push(Token::new(
            xa.min(xb),
            bottom - height,
            xa.max(xb),
            bottom,
            std::mem::take(word),
        ));
    }
}

/// Decode string bytes without font information: UTF-16BE when a byte
/// order mark is present, Latin-1 otherwise.
pub fn decode_bytes(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn collect(ops: Vec<Operation>) -> Vec<Token> {
        TokenCollector::new(792.0, |_: &[u8], bytes: &[u8]| decode_bytes(bytes)).run(&ops)
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_words_are_split_and_positioned() {
        let tokens = collect(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Td", vec![50.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("A100 Widget")]),
            op("ET", vec![]),
        ]);

        assert_eq!(texts(&tokens), vec!["A100", "Widget"]);
        assert_eq!(tokens[0], Token::new(50.0, 82.0, 70.0, 92.0, "A100"));
        assert_eq!(tokens[1].x0, 75.0);
    }

    #[test]
    fn test_next_line_operators() {
        let tokens = collect(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Td", vec![50.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("first")]),
            op("TD", vec![0.into(), (-14).into()]),
            op("Tj", vec![Object::string_literal("second")]),
            op("'", vec![Object::string_literal("third")]),
            op("ET", vec![]),
        ]);

        assert_eq!(texts(&tokens), vec!["first", "second", "third"]);
        assert_eq!(tokens[1].x0, 50.0);
        assert_eq!(tokens[1].y0, 96.0);
        assert_eq!(tokens[2].y0, 110.0);
    }

    #[test]
    fn test_tj_array_kerning_and_gaps() {
        let tokens = collect(vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 20.into(), 500.into()]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("W"),
                    120.into(),
                    Object::string_literal("idget"),
                    (-600).into(),
                    Object::string_literal("5"),
                ])],
            ),
            op("ET", vec![]),
        ]);

        assert_eq!(texts(&tokens), vec!["Widget", "5"]);
        assert!(tokens[1].x0 > tokens[0].x1);
    }

    #[test]
    fn test_graphics_state_transform() {
        let tokens = collect(vec![
            op("q", vec![]),
            op("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 0.into()]),
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Td", vec![10.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("moved")]),
            op("ET", vec![]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Td", vec![10.into(), 700.into()]),
            op("Tj", vec![Object::string_literal("home")]),
            op("ET", vec![]),
        ]);

        assert_eq!(tokens[0].x0, 110.0);
        assert_eq!(tokens[1].x0, 10.0);
    }

    #[test]
    fn test_decode_bytes() {
        assert_eq!(decode_bytes(b"caf\xe9"), "café");
        assert_eq!(decode_bytes(&[0xFE, 0xFF, 0x00, 0x41, 0x01, 0x41]), "AŁ");
    }
}
