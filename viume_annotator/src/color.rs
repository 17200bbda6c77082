use image::Rgb;
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0} is not a supported color name")]
pub struct UnknownColor(pub String);

/// Symbolic color names used to draw boxes and labels.
///
/// RGB values follow the common HTML/Pillow color table, so `green` is
/// `#008000` and `purple` is `#800080`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawColor {
    Red,
    Yellow,
    Purple,
    Green,
    Blue,
    Pink,
    White,
    Black,
    Orange,
    Cyan,
    Magenta,
    Gray,
}

impl DrawColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawColor::Red => "red",
            DrawColor::Yellow => "yellow",
            DrawColor::Purple => "purple",
            DrawColor::Green => "green",
            DrawColor::Blue => "blue",
            DrawColor::Pink => "pink",
            DrawColor::White => "white",
            DrawColor::Black => "black",
            DrawColor::Orange => "orange",
            DrawColor::Cyan => "cyan",
            DrawColor::Magenta => "magenta",
            DrawColor::Gray => "gray",
        }
    }

    pub fn to_rgb(self) -> Rgb<u8> {
        let channels = match self {
            DrawColor::Red => [255, 0, 0],
            DrawColor::Yellow => [255, 255, 0],
            DrawColor::Purple => [128, 0, 128],
            DrawColor::Green => [0, 128, 0],
            DrawColor::Blue => [0, 0, 255],
            DrawColor::Pink => [255, 192, 203],
            DrawColor::White => [255, 255, 255],
            DrawColor::Black => [0, 0, 0],
            DrawColor::Orange => [255, 165, 0],
            DrawColor::Cyan => [0, 255, 255],
            DrawColor::Magenta => [255, 0, 255],
            DrawColor::Gray => [128, 128, 128],
        };
        Rgb(channels)
    }

    /// `#rrggbb` form, used by the html views.
    pub fn to_hex(self) -> String {
        let Rgb([r, g, b]) = self.to_rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl fmt::Display for DrawColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "yellow" => Ok(Self::Yellow),
            "purple" => Ok(Self::Purple),
            "green" => Ok(Self::Green),
            "blue" => Ok(Self::Blue),
            "pink" => Ok(Self::Pink),
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            "orange" => Ok(Self::Orange),
            "cyan" => Ok(Self::Cyan),
            "magenta" => Ok(Self::Magenta),
            "gray" | "grey" => Ok(Self::Gray),
            other => Err(UnknownColor(other.to_string())),
        }
    }
}
