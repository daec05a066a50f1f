//! Image I/O

use crate::error::*;
use crate::film::Image;
use crate::geometry::*;
use crate::pbrt::*;
use crate::spectrum::*;
use exr::prelude::{read_first_rgba_layer_from_file, write_rgb_file, RgbaChannels};
use image::{ImageFormat, Rgb, RgbImage};
use regex::Regex;
use std::sync::OnceLock;

/// File formats selected by the file extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// Floating point OpenEXR; keeps negative derivative values.
    Exr,

    /// Tone mapped 8-bit formats.
    Bytes(ImageFormat),
}

impl FileFormat {
    /// Returns the format of a file path.
    ///
    /// * `path` - File path.
    pub fn from_path(path: &str) -> Result<Self> {
        match file_extension(path).map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("exr") => Ok(Self::Exr),
            Some("png") => Ok(Self::Bytes(ImageFormat::Png)),
            Some("tga") => Ok(Self::Bytes(ImageFormat::Tga)),
            Some(ext) => Err(Error::Image(format!("Unsupported image format '.{ext}' for {path}"))),
            None => Err(Error::Image(format!("No file extension in {path}"))),
        }
    }
}

/// Returns the last extension of a path without its period.
fn file_extension(path: &str) -> Option<&str> {
    static EXTENSION: OnceLock<Regex> = OnceLock::new();
    let re = EXTENSION.get_or_init(|| match Regex::new(r"\.([^./\\]+)$") {
        Ok(re) => re,
        Err(err) => panic!("Invalid file extension pattern: {err}"),
    });
    re.captures(path).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Writes an image; the format follows the file extension.
///
/// * `path`  - Output file path.
/// * `image` - The image.
pub fn write_image(path: &str, image: &Image) -> Result<()> {
    let width = image.size.x.max(0) as usize;
    let height = image.size.y.max(0) as usize;
    info!("Writing image {path} ({width} x {height})");

    match FileFormat::from_path(path)? {
        FileFormat::Exr => write_rgb_file(path, width, height, |x, y| {
            let p = image.get(x as Int, y as Int);
            (p[0], p[1], p[2])
        })
        .map_err(|err| Error::Image(format!("Error saving {path}: {err}"))),
        FileFormat::Bytes(format) => {
            let bytes = RgbImage::from_fn(width as u32, height as u32, |x, y| {
                let p = image.get(x as Int, y as Int);
                Rgb([to_byte(p[0]), to_byte(p[1]), to_byte(p[2])])
            });
            bytes
                .save_with_format(path, format)
                .map_err(|err| Error::Image(format!("Error saving {path}: {err}")))
        }
    }
}

/// Reads the first RGB(A) layer of an OpenEXR file. Alpha is ignored.
///
/// * `path` - Input file path.
pub fn read_exr(path: &str) -> Result<Image> {
    if FileFormat::from_path(path)? != FileFormat::Exr {
        return Err(Error::Image(format!("Only OpenEXR images can be read, got {path}")));
    }
    let exr = read_first_rgba_layer_from_file(
        path,
        |resolution, _: &RgbaChannels| Image::new(Point2i::new(resolution.width() as Int, resolution.height() as Int)),
        |image: &mut Image, position, (r, g, b, _a): (f32, f32, f32, f32)| {
            let offset = position.y() * image.size.x as usize + position.x();
            image.pixels[offset] = SpectrumF::new(r, g, b);
        },
    )
    .map_err(|err| Error::Image(format!("Error reading {path}: {err}")))?;

    let image = exr.layer_data.channel_data.pixels;
    info!("Read image {path} ({} x {})", image.size.x, image.size.y);
    Ok(image)
}

/// Tone maps a linear value to an sRGB byte. Negative values, which occur
/// in derivative images, map to zero.
///
/// * `v` - Linear value.
#[inline]
fn to_byte(v: Float) -> u8 {
    clamp(255.0 * gamma_correct(v.max(0.0)) + 0.5, 0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_last_extension() {
        assert_eq!(FileFormat::from_path("out/grad.fwd.exr").unwrap(), FileFormat::Exr);
        assert_eq!(FileFormat::from_path("a.PNG").unwrap(), FileFormat::Bytes(ImageFormat::Png));
        assert!(FileFormat::from_path("noext").is_err());
        assert!(FileFormat::from_path("x.bmpz").is_err());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let image = Image::new(Point2i::new(1, 1));
        assert!(matches!(write_image("x.bmpz", &image), Err(Error::Image(_))));
        assert!(matches!(read_exr("x.png"), Err(Error::Image(_))));
    }

    #[test]
    fn bytes_clamp_negative_values() {
        assert_eq!(to_byte(-1.0), 0);
        assert_eq!(to_byte(2.0), 255);
    }

    #[test]
    fn exr_keeps_signed_values() {
        let path = std::env::temp_dir().join(format!("prb-image-io-{}.exr", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let pixels = vec![
            SpectrumF::new(1.0, -2.0, 0.5),
            SpectrumF::new(0.0, 0.25, -0.125),
            SpectrumF::new(3.0, 0.0, 1.0),
            SpectrumF::new(-1.0, 1.0, 2.0),
            SpectrumF::new(0.5, 0.5, 0.5),
            SpectrumF::new(8.0, -8.0, 0.0),
        ];
        let image = Image::from_pixels(Point2i::new(3, 2), pixels);
        write_image(&path, &image).unwrap();
        let read = read_exr(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(read, image);
    }
}
