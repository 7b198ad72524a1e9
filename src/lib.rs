//! RFox Capture
//!
//! Turns a DOM subtree into an image without a server round-trip. The
//! subtree is cloned with every element's resolved style inlined, pseudo
//! elements and form values reproduced, web fonts and images embedded as
//! `data:` URIs, and the result is wrapped in an SVG `foreignObject`. That
//! SVG can be used as-is or rasterized into PNG, JPEG, a `Blob` or raw RGBA.
//!
//! # Features
//!
//! - **http** (default): fetch remote resources with `reqwest`
//! - **raster** (default): draw the SVG onto a `tiny-skia` canvas and encode it
//! - **Host agnostic**: any DOM implementing [`dom::SourceDocument`] can be
//!   captured; [`dom::DocumentSnapshot`] is a JSON-loadable one
//!
//! # Example
//!
//! ```no_run
//! use rfcapture::dom::{DocumentSnapshot, NodeSnapshot, SourceDocument};
//! use rfcapture::Options;
//!
//! # async fn run() -> rfcapture::Result<()> {
//! let doc = DocumentSnapshot::new(
//!     NodeSnapshot::element("div")
//!         .css("background-color", "rgb(255, 0, 0)")
//!         .size(100, 50),
//! );
//! let options = Options {
//!     bgcolor: Some("white".to_string()),
//!     ..Default::default()
//! };
//!
//! let capturer = rfcapture::new_capturer()?;
//! let svg = capturer.to_svg(&doc, doc.root(), &options).await?;
//! assert!(svg.starts_with("data:image/svg+xml"));
//! # Ok(())
//! # }
//! ```

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

pub mod clone;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod images;
pub mod inliner;
pub mod resource;
pub mod style;
pub mod svg;
pub mod util;
pub mod xhtml;

// Rasterization (canvas, PNG/JPEG encoding, pixel read-back)
#[cfg(feature = "raster")]
pub mod render;

pub use clone::{CloneData, CloneTree, ElementData, FilterFn, Namespace, NodeId};
pub use dom::{NodeInfo, SourceDocument, SourceNode};
pub use error::{Error, Result};
pub use resource::{FetchPolicy, ResourceCache, ResourceFetcher};

#[cfg(feature = "raster")]
pub use render::{Bitmap, Blob, Canvas, ImageDecoder, ImageFormat, ResvgDecoder, Surface};

use clone::CloneEngine;
use resource::{data_url, DEFAULT_HTTP_TIMEOUT_MS};
use style::DefaultStyleTable;

/// Caller predicate excluding nodes (and their subtrees) from the capture.
#[derive(Clone)]
pub struct NodeFilter(Arc<FilterFn>);

impl NodeFilter {
    pub fn new<F>(filter: F) -> Self
    where
        F: Fn(&dyn NodeInfo) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(filter))
    }

    pub fn accepts(&self, node: &dyn NodeInfo) -> bool {
        (self.0)(node)
    }

    fn as_fn(&self) -> &FilterFn {
        &*self.0
    }
}

impl fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeFilter(..)")
    }
}

/// Callback receiving the fully prepared clone right before serialization.
#[derive(Clone)]
pub struct CloneHook(Arc<dyn Fn(&mut CloneTree) + Send + Sync>);

impl CloneHook {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&mut CloneTree) + Send + Sync + 'static,
    {
        Self(Arc::new(hook))
    }

    pub fn call(&self, tree: &mut CloneTree) {
        (self.0)(tree)
    }
}

impl fmt::Debug for CloneHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CloneHook(..)")
    }
}

/// Options for a single capture
///
/// Defaults match a plain capture of the node at its own size: no
/// background, full JPEG quality, no scaling, failures on unreachable
/// resources.
///
/// # Examples
///
/// ```
/// let opts = rfcapture::Options::default();
/// assert_eq!(opts.http_timeout_ms, 30000);
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Output width in px; defaults to the node's box width
    pub width: Option<u32>,
    /// Output height in px; defaults to the node's box height
    pub height: Option<u32>,
    /// CSS properties set on the clone root after cloning
    #[serde(deserialize_with = "ordered_style")]
    pub style: Vec<(String, String)>,
    /// Background color filled before drawing
    pub bgcolor: Option<String>,
    /// JPEG quality, 0 to 1
    pub quality: f32,
    /// Canvas scale factor
    pub scale: f32,
    /// Data URI used for resources that cannot be fetched
    pub image_placeholder: Option<String>,
    /// Append a timestamp query parameter to every fetched URL
    pub cache_bust: bool,
    /// Send credentials with resource requests
    pub use_credentials: bool,
    /// Per-resource fetch timeout in milliseconds
    pub http_timeout_ms: u64,
    /// Nodes for which this returns `false` are left out (never the root)
    #[serde(skip)]
    pub filter: Option<NodeFilter>,
    /// Invoked with the prepared clone before it is serialized
    #[serde(skip)]
    pub onclone: Option<CloneHook>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            style: Vec::new(),
            bgcolor: None,
            quality: 1.0,
            scale: 1.0,
            image_placeholder: None,
            cache_bust: false,
            use_credentials: false,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            filter: None,
            onclone: None,
        }
    }
}

impl Options {
    /// Reject values no capture can honour.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(Error::ConfigError(format!(
                "quality must be between 0 and 1, got {}",
                self.quality
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::ConfigError(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if self.width == Some(0) || self.height == Some(0) {
            return Err(Error::ConfigError("width and height must be non-zero".into()));
        }
        if let Some(placeholder) = &self.image_placeholder {
            if !data_url::is_data_url(placeholder) || data_url::payload(placeholder).is_none() {
                return Err(Error::ConfigError(format!(
                    "image placeholder must be a data URI, got {}",
                    placeholder
                )));
            }
        }
        Ok(())
    }

    /// Fetch behaviour of one conversion. The cache-bust token is taken
    /// once, so every URL of the conversion carries the same one.
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            placeholder: self
                .image_placeholder
                .as_deref()
                .and_then(data_url::payload)
                .map(str::to_string),
            cache_bust: self
                .cache_bust
                .then(|| util::timestamp_millis().to_string()),
            timeout: std::time::Duration::from_millis(self.http_timeout_ms),
            with_credentials: self.use_credentials,
        }
    }

    fn apply_to(&self, tree: &mut CloneTree) {
        let Some(style) = tree.style_mut(tree.root()) else {
            return;
        };
        if let Some(bgcolor) = &self.bgcolor {
            style.set_property("background-color", bgcolor, false);
        }
        if let Some(width) = self.width {
            style.set_property("width", &format!("{}px", width), false);
        }
        if let Some(height) = self.height {
            style.set_property("height", &format!("{}px", height), false);
        }
        for (name, value) in &self.style {
            style.set_property(name, value, false);
        }
    }
}

/// `style` as a JSON object, keeping the order of its keys.
fn ordered_style<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StyleVisitor;

    impl<'de> Visitor<'de> for StyleVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of CSS property names to values")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut style = Vec::new();
            while let Some((name, value)) = map.next_entry::<String, String>()? {
                style.push((name, value));
            }
            Ok(style)
        }
    }

    deserializer.deserialize_map(StyleVisitor)
}

/// Runs captures. Holds the resource fetch backend and, with `raster`,
/// the image decoder.
#[derive(Clone)]
pub struct Capturer {
    fetcher: Arc<dyn ResourceFetcher>,
    #[cfg(feature = "raster")]
    decoder: Arc<dyn ImageDecoder>,
    defaults: &'static DefaultStyleTable,
}

impl fmt::Debug for Capturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capturer")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl Capturer {
    /// A capturer over the default backends.
    pub fn new() -> Result<Self> {
        #[cfg(feature = "http")]
        let fetcher: Arc<dyn ResourceFetcher> = Arc::new(resource::HttpFetcher::new()?);
        #[cfg(not(feature = "http"))]
        let fetcher: Arc<dyn ResourceFetcher> = Arc::new(resource::OfflineFetcher);
        Ok(Self::with_fetcher(fetcher))
    }

    pub fn with_fetcher(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            #[cfg(feature = "raster")]
            decoder: Arc::new(ResvgDecoder::new()),
            defaults: DefaultStyleTable::global(),
        }
    }

    #[cfg(feature = "raster")]
    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Capture `node` as a `data:image/svg+xml` URI.
    pub async fn to_svg<'a, D>(&self, document: &'a D, node: D::Node<'a>, options: &Options) -> Result<String>
    where
        D: SourceDocument + ?Sized,
    {
        options.validate()?;
        let (box_width, box_height) = node.box_size();
        let width = options.width.unwrap_or(box_width);
        let height = options.height.unwrap_or(box_height);

        let cache = ResourceCache::new(Arc::clone(&self.fetcher), options.fetch_policy());
        let result = self.prepare_clone(document, node, options, &cache).await;
        // The cache lives for one conversion; the default styles outlive it
        // until the idle timer fires.
        cache.clear();
        self.defaults.schedule_eviction();

        let mut tree = result?;
        svg::make_svg_data_uri(&mut tree, width, height)
    }

    async fn prepare_clone<'a, D>(
        &self,
        document: &'a D,
        node: D::Node<'a>,
        options: &Options,
        cache: &ResourceCache,
    ) -> Result<CloneTree>
    where
        D: SourceDocument + ?Sized,
    {
        let mut tree = {
            let filter = options.filter.as_ref().map(NodeFilter::as_fn);
            CloneEngine::new(document, self.defaults, filter).clone_tree(node)?
        };

        let font_css = fonts::resolve_all(document, cache).await?;
        if !font_css.is_empty() {
            let root = tree.root();
            if tree.element(root).is_some() {
                let style = tree.append_child(root, CloneData::Element(ElementData::new("style", Namespace::Html)));
                tree.append_child(style, CloneData::Text(font_css));
            }
        }

        images::inline_all(&mut tree, cache).await?;
        options.apply_to(&mut tree);
        if let Some(hook) = &options.onclone {
            hook.call(&mut tree);
        }
        Ok(tree)
    }

    /// Capture `node` and draw it on a canvas of `width*scale` x
    /// `height*scale`, pre-filled with `bgcolor`.
    #[cfg(feature = "raster")]
    pub async fn to_canvas<'a, D>(&self, document: &'a D, node: D::Node<'a>, options: &Options) -> Result<Canvas>
    where
        D: SourceDocument + ?Sized,
    {
        let (box_width, box_height) = node.box_size();
        let width = options.width.unwrap_or(box_width);
        let height = options.height.unwrap_or(box_height);

        let svg = self.to_svg(document, node, options).await?;
        let bitmap = self.decoder.decode(&svg).await?;

        let scaled = |v: u32| (v as f64 * options.scale as f64) as u32;
        let mut canvas = Canvas::new(scaled(width), scaled(height))?;
        if let Some(bgcolor) = &options.bgcolor {
            canvas.fill(bgcolor)?;
        }
        canvas.draw_bitmap(&bitmap, options.scale)?;
        Ok(canvas)
    }

    /// PNG data URI.
    #[cfg(feature = "raster")]
    pub async fn to_png<'a, D>(&self, document: &'a D, node: D::Node<'a>, options: &Options) -> Result<String>
    where
        D: SourceDocument + ?Sized,
    {
        let canvas = self.to_canvas(document, node, options).await?;
        canvas.to_data_url(ImageFormat::Png, 1.0)
    }

    /// JPEG data URI at `options.quality`.
    #[cfg(feature = "raster")]
    pub async fn to_jpeg<'a, D>(&self, document: &'a D, node: D::Node<'a>, options: &Options) -> Result<String>
    where
        D: SourceDocument + ?Sized,
    {
        let canvas = self.to_canvas(document, node, options).await?;
        canvas.to_data_url(ImageFormat::Jpeg, options.quality)
    }

    /// PNG blob.
    #[cfg(feature = "raster")]
    pub async fn to_blob<'a, D>(&self, document: &'a D, node: D::Node<'a>, options: &Options) -> Result<Blob>
    where
        D: SourceDocument + ?Sized,
    {
        let canvas = self.to_canvas(document, node, options).await?;
        canvas.to_blob(ImageFormat::Png, 1.0)
    }

    /// Straight RGBA of the node's box, `4 * width * height` bytes.
    #[cfg(feature = "raster")]
    pub async fn to_pixel_data<'a, D>(&self, document: &'a D, node: D::Node<'a>, options: &Options) -> Result<Vec<u8>>
    where
        D: SourceDocument + ?Sized,
    {
        let (width, height) = node.box_size();
        let canvas = self.to_canvas(document, node, options).await?;
        Ok(canvas.get_image_data(0, 0, width, height))
    }
}

/// Create a capturer with the default backends
///
/// Uses `reqwest` for resources when the `http` feature is enabled and
/// refuses every fetch otherwise.
pub fn new_capturer() -> Result<Capturer> {
    Capturer::new()
}
