/// A 24-bit RGB color, stored as `0xRRGGBB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct HexColor(pub u32);

impl HexColor {
    pub const AQUA: Self = Self(0x00FFFF);
    pub const BLACK: Self = Self(0x000000);
    pub const BLUE: Self = Self(0x0000FF);
    pub const CHOCOLATE: Self = Self(0xD2691E);
    pub const CORAL: Self = Self(0xFF7F50);
    pub const CYAN: Self = Self(0x00FFFF);
    pub const GOLDENROD: Self = Self(0xDAA520);
    pub const GRAY: Self = Self(0x808080);
    pub const GRAY5: Self = Self(0x7F7F7F);
    pub const GREEN: Self = Self(0x00FF00);
    pub const LIGHT_GREEN: Self = Self(0x90EE90);
    pub const ORANGE: Self = Self(0xFFA500);
    pub const PALE_GREEN: Self = Self(0x98FB98);
    pub const PINK: Self = Self(0xFFC0CB);
    pub const PINK3: Self = Self(0xCD919E);
    pub const RED: Self = Self(0xFF0000);
    pub const SLATE_GRAY2: Self = Self(0xB9D3EE);
    pub const VIOLET: Self = Self(0xEE82EE);
    pub const WHITE: Self = Self(0xFFFFFF);
    pub const YELLOW: Self = Self(0xFFFF00);

    /// Creates a color from red, green, and blue components in the `[0, 1]` range.
    pub fn from_rgb(red: f32, green: f32, blue: f32) -> Self {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
        Self(channel(red) << 16 | channel(green) << 8 | channel(blue))
    }

    /// Returns the red, green, and blue components in the `[0, 1]` range.
    pub fn to_rgb(self) -> [f32; 3] {
        let channel = |shift: u32| ((self.0 >> shift) & 0xFF) as f32 / 255.0;
        [channel(16), channel(8), channel(0)]
    }
}

/// The colors used to draw the constraint graph colors, with the overflow color last.
pub const GRAPH_COLORS: [HexColor; 13] = [
    HexColor::RED,
    HexColor::ORANGE,
    HexColor::YELLOW,
    HexColor::GREEN,
    HexColor::CYAN,
    HexColor::BLUE,
    HexColor::VIOLET,
    HexColor::PINK,
    HexColor::CHOCOLATE,
    HexColor::GOLDENROD,
    HexColor::CORAL,
    HexColor::AQUA,
    HexColor::BLACK,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_conversion() {
        assert_eq!(HexColor::from_rgb(1.0, 0.0, 0.0), HexColor::RED);
        assert_eq!(HexColor::from_rgb(0.5, 0.5, 0.5), HexColor(0x808080));
        assert_eq!(HexColor::WHITE.to_rgb(), [1.0, 1.0, 1.0]);
    }
}
