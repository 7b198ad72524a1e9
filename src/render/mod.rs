//! Render driver: decode the SVG data URI and draw it onto a canvas.
//!
//! The canvas is a `tiny-skia` pixmap (premultiplied RGBA). Decoding goes
//! through an [`ImageDecoder`]; the bundled [`ResvgDecoder`] handles SVG with
//! `resvg` and raster formats with `image`. `resvg` does not render
//! `foreignObject` content, so hosts that need the HTML itself drawn plug in
//! their own decoder (for instance one backed by a real browser).

use crate::resource::data_url;
use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt};
use resvg::tiny_skia::{
    self, BlendMode, ColorU8, FilterQuality, Pixmap, PixmapPaint, PremultipliedColorU8, Transform,
};
use resvg::usvg;

/// A decoded image, straight (non-premultiplied) RGBA8, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(Error::DecodeError(format!(
                "bitmap of {}x{} needs {} bytes, got {}",
                width,
                height,
                width as usize * height as usize * 4,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    fn from_pixmap(pixmap: &Pixmap) -> Self {
        let mut data = Vec::with_capacity(pixmap.data().len());
        for pixel in pixmap.pixels() {
            let c = pixel.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            data,
        }
    }

    fn to_pixmap(&self) -> Result<Pixmap> {
        let mut pixmap = Pixmap::new(self.width, self.height).ok_or_else(|| {
            Error::RenderError(format!("cannot allocate {}x{} image", self.width, self.height))
        })?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(self.data.chunks_exact(4)) {
            *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
        }
        Ok(pixmap)
    }
}

/// Turns an image URI into pixels.
pub trait ImageDecoder: Send + Sync {
    fn decode<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, Result<Bitmap>>;
}

/// Decodes `data:` URIs with `resvg` (SVG) and `image` (PNG, JPEG).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResvgDecoder;

impl ResvgDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_now(&self, uri: &str) -> Result<Bitmap> {
        let decoded = data_url::decode(uri)?;
        if decoded.mime == "image/svg+xml" {
            let tree = usvg::Tree::from_data(&decoded.bytes, &usvg::Options::default())
                .map_err(|e| Error::DecodeError(format!("invalid SVG image: {}", e)))?;
            let size = tree.size().to_int_size();
            let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or_else(|| {
                Error::DecodeError(format!(
                    "cannot allocate {}x{} image",
                    size.width(),
                    size.height()
                ))
            })?;
            resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());
            return Ok(Bitmap::from_pixmap(&pixmap));
        }

        let image = image::load_from_memory(&decoded.bytes)
            .map_err(|e| Error::DecodeError(format!("cannot decode {}: {}", decoded.mime, e)))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Bitmap::new(width, height, image.into_raw())
    }
}

impl ImageDecoder for ResvgDecoder {
    fn decode<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, Result<Bitmap>> {
        async move { self.decode_now(uri) }.boxed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Encoded image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    /// Rebuild a blob from a base64 data URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let decoded = data_url::decode(url)?;
        Ok(Self {
            mime: decoded.mime,
            bytes: decoded.bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Something that can be exported as an encoded image.
pub trait Surface {
    fn to_data_url(&self, format: ImageFormat, quality: f32) -> Result<String>;

    /// Direct blob encoding, when the surface has one.
    fn native_blob(&self, _format: ImageFormat, _quality: f32) -> Option<Result<Blob>> {
        None
    }

    /// Native blob if available, otherwise decoded from the data URL.
    fn to_blob(&self, format: ImageFormat, quality: f32) -> Result<Blob> {
        if let Some(blob) = self.native_blob(format, quality) {
            return blob;
        }
        log::debug!("no native blob encoder; decoding the data URL");
        Blob::from_data_url(&self.to_data_url(format, quality)?)
    }
}

/// Offscreen drawing surface.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            Error::RenderError(format!("cannot create a {}x{} canvas", width, height))
        })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Fill the whole canvas with a CSS color.
    pub fn fill(&mut self, color: &str) -> Result<()> {
        self.pixmap.fill(parse_color(color)?);
        Ok(())
    }

    /// Draw `bitmap` at the origin, scaled by `scale`, without smoothing.
    pub fn draw_bitmap(&mut self, bitmap: &Bitmap, scale: f32) -> Result<()> {
        let source = bitmap.to_pixmap()?;
        let paint = PixmapPaint {
            opacity: 1.0,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Nearest,
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &paint,
            Transform::from_scale(scale, scale),
            None,
        );
        Ok(())
    }

    /// Straight RGBA of a region; pixels outside the canvas read as
    /// transparent black.
    pub fn get_image_data(&self, x: i32, y: i32, width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        let pixels = self.pixmap.pixels();
        let (canvas_w, canvas_h) = (self.width() as i32, self.height() as i32);

        for dy in 0..height {
            for dx in 0..width {
                let src_x = x + dx as i32;
                let src_y = y + dy as i32;
                if src_x < 0 || src_x >= canvas_w || src_y < 0 || src_y >= canvas_h {
                    continue;
                }
                let pixel: PremultipliedColorU8 = pixels[(src_y * canvas_w + src_x) as usize];
                let c = pixel.demultiply();
                let dst = (dy as usize * width as usize + dx as usize) * 4;
                data[dst..dst + 4].copy_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
            }
        }
        data
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| Error::RenderError(format!("PNG encode error: {}", e)))
    }

    /// JPEG has no alpha channel: transparent areas come out black, as
    /// with a browser canvas.
    pub fn to_jpeg(&self, quality: f32) -> Result<Vec<u8>> {
        let mut rgb = Vec::with_capacity(self.width() as usize * self.height() as usize * 3);
        for pixel in self.pixmap.pixels() {
            rgb.extend_from_slice(&[pixel.red(), pixel.green(), pixel.blue()]);
        }
        let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality)
            .encode(&rgb, self.width(), self.height(), image::ExtendedColorType::Rgb8)
            .map_err(|e| Error::RenderError(format!("JPEG encode error: {}", e)))?;
        Ok(out)
    }

    fn encode(&self, format: ImageFormat, quality: f32) -> Result<Vec<u8>> {
        match format {
            ImageFormat::Png => self.to_png(),
            ImageFormat::Jpeg => self.to_jpeg(quality),
        }
    }
}

impl Surface for Canvas {
    fn to_data_url(&self, format: ImageFormat, quality: f32) -> Result<String> {
        let bytes = self.encode(format, quality)?;
        Ok(data_url::data_as_url(&data_url::encode_base64(&bytes), format.mime()))
    }

    fn native_blob(&self, format: ImageFormat, quality: f32) -> Option<Result<Blob>> {
        Some(self.encode(format, quality).map(|bytes| Blob {
            mime: format.mime().to_string(),
            bytes,
        }))
    }
}

fn parse_color(s: &str) -> Result<tiny_skia::Color> {
    let parsed = csscolorparser::parse(s)
        .map_err(|e| Error::RenderError(format!("invalid color {}: {}", s, e)))?;
    let [r, g, b, a] = parsed.to_array();
    tiny_skia::Color::from_rgba(r, g, b, a)
        .ok_or_else(|| Error::RenderError(format!("color out of range: {}", s)))
}
