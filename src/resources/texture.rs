use anyhow::Context as _;
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

/// Decoded RGBA8 pixels, ready to be uploaded as a texture.
#[derive(Clone, PartialEq)]
pub struct ImageData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl ImageData {
    /// A single pixel image of the given colour.
    pub fn solid(name: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            width: 1,
            height: 1,
            rgba: rgba.to_vec(),
        }
    }

    /// Decodes image file contents (PNG, JPEG, ...).
    ///
    /// `format` is an optional file extension hint such as "png". Without it the
    /// format is guessed from the bytes.
    pub fn decode(bytes: &[u8], name: &str, format: Option<&str>) -> anyhow::Result<Self> {
        let img = match format.and_then(ImageFormat::from_extension) {
            None => image::load_from_memory(bytes),
            Some(fmt) => load_from_memory_with_format(bytes, fmt),
        }
        .with_context(|| format!("failed to decode image {name}"))?;
        let (width, height) = img.dimensions();
        Ok(Self {
            name: name.to_string(),
            width,
            height,
            rgba: img.to_rgba8().into_raw(),
        })
    }
}

/// The file extension of a url, lowercased.
pub fn extension(url: &str) -> Option<String> {
    let file = url.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn decodes_png_with_and_without_hint() {
        let bytes = png_bytes();
        let hinted = ImageData::decode(&bytes, "a.png", Some("png")).expect("decode");
        let guessed = ImageData::decode(&bytes, "a.png", None).expect("decode");
        assert_eq!((hinted.width, hinted.height), (2, 3));
        assert_eq!(hinted.rgba.len(), 2 * 3 * 4);
        assert_eq!(hinted, guessed);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(ImageData::decode(b"not an image", "broken.png", None).is_err());
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension("cubemap/PX.PNG").as_deref(), Some("png"));
        assert_eq!(extension("dir.v2/readme"), None);
    }
}
