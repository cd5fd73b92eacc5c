use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::loader::{LoadAdapter, LoadContext, Resource};
use crate::manifest::AssetRequest;

/// Errors that can occur when decoding images.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The bytes don't start with any known image signature.
    #[error("Unrecognised image format")]
    UnknownFormat,

    /// An I/O error occurred while guessing the format.
    #[cfg(feature = "image")]
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image decoding.
    #[cfg(feature = "image")]
    #[error("Image decoding error: {0}")]
    Decode(#[from] image::ImageError),
}

/// Container format of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Pnm,
    Tiff,
    Tga,
    Dds,
    Bmp,
    Ico,
    Hdr,
    OpenExr,
    Farbfeld,
    Avif,
    Qoi,
    Svg,
}

impl ImageFormat {
    /// Recognises the format from the leading bytes.
    ///
    /// SVG is recognised by its markup. Raster formats are left to the
    /// `image` crate when the `image` feature is enabled, otherwise only a
    /// handful of common signatures are known.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if is_svg(bytes) {
            return Some(Self::Svg);
        }

        sniff_raster(bytes)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::WebP => "webp",
            ImageFormat::Pnm => "pnm",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Tga => "tga",
            ImageFormat::Dds => "dds",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Ico => "ico",
            ImageFormat::Hdr => "hdr",
            ImageFormat::OpenExr => "exr",
            ImageFormat::Farbfeld => "ff",
            ImageFormat::Avif => "avif",
            ImageFormat::Qoi => "qoi",
            ImageFormat::Svg => "svg",
        }
    }
}

#[cfg(feature = "image")]
impl TryFrom<image::ImageFormat> for ImageFormat {
    type Error = ImageError;

    fn try_from(format: image::ImageFormat) -> Result<Self, Self::Error> {
        use image::ImageFormat as F;

        Ok(match format {
            F::Png => Self::Png,
            F::Jpeg => Self::Jpeg,
            F::Gif => Self::Gif,
            F::WebP => Self::WebP,
            F::Pnm => Self::Pnm,
            F::Tiff => Self::Tiff,
            F::Tga => Self::Tga,
            F::Dds => Self::Dds,
            F::Bmp => Self::Bmp,
            F::Ico => Self::Ico,
            F::Hdr => Self::Hdr,
            F::OpenExr => Self::OpenExr,
            F::Farbfeld => Self::Farbfeld,
            F::Avif => Self::Avif,
            F::Qoi => Self::Qoi,
            _ => return Err(ImageError::UnknownFormat),
        })
    }
}

#[cfg(feature = "image")]
fn sniff_raster(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| ImageFormat::try_from(format).ok())
}

#[cfg(not(feature = "image"))]
fn sniff_raster(bytes: &[u8]) -> Option<ImageFormat> {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageFormat::Png),
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageFormat::Gif),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageFormat::WebP),
        [b'B', b'M', ..] => Some(ImageFormat::Bmp),
        [0x00, 0x00, 0x01, 0x00, ..] => Some(ImageFormat::Ico),
        [_, _, _, _, b'f', b't', b'y', b'p', b'a', b'v', b'i', b'f' | b's', ..] => {
            Some(ImageFormat::Avif)
        }
        _ => None,
    }
}

fn is_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start_matches('\u{feff}').trim_start();

    (head.starts_with("<svg") || head.starts_with("<?xml")) && head.contains("<svg")
}

/// A decoded image.
#[derive(Debug, Clone)]
pub struct Image {
    pub format: ImageFormat,
    /// Pixel width, known once the image has been decoded.
    pub width: Option<u32>,
    /// Pixel height, known once the image has been decoded.
    pub height: Option<u32>,
    pub bytes: Arc<[u8]>,
}

impl Image {
    /// Decodes `bytes`, failing if they are not an image.
    ///
    /// Raster images are fully decoded with the `image` crate when the
    /// `image` feature is enabled; otherwise only the signature is checked.
    /// Vector images are never rasterized.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, ImageError> {
        let format = ImageFormat::sniff(&bytes).ok_or(ImageError::UnknownFormat)?;
        let (width, height) = dimensions(format, &bytes)?;

        Ok(Self {
            format,
            width,
            height,
            bytes: bytes.into(),
        })
    }
}

#[cfg(feature = "image")]
fn dimensions(format: ImageFormat, bytes: &[u8]) -> Result<(Option<u32>, Option<u32>), ImageError> {
    if format == ImageFormat::Svg {
        return Ok((None, None));
    }

    let decoded = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;

    Ok((Some(decoded.width()), Some(decoded.height())))
}

#[cfg(not(feature = "image"))]
fn dimensions(_: ImageFormat, _: &[u8]) -> Result<(Option<u32>, Option<u32>), ImageError> {
    Ok((None, None))
}

/// Loads `image` assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAdapter;

impl LoadAdapter for ImageAdapter {
    fn load(
        &self,
        request: &AssetRequest,
        ctx: &LoadContext,
    ) -> BoxFuture<'static, anyhow::Result<Resource>> {
        Box::pin(load_image(ctx.clone(), request.source.clone()))
    }
}

async fn load_image(ctx: LoadContext, source: String) -> anyhow::Result<Resource> {
    let bytes = ctx.fetch(&source).await?;
    let image = Image::decode(bytes)?;

    Ok(Resource::Image(Arc::new(image)))
}
