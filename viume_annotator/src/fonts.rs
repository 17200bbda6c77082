use ab_glyph::{FontArc, InvalidFont};

static EMBEDDED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// DejaVu Sans, shipped with the crate so labels render without system fonts.
pub fn embedded_font() -> Result<FontArc, InvalidFont> {
    FontArc::try_from_slice(EMBEDDED_FONT)
}
