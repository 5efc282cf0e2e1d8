use crate::{pdf_utils, ExtractError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

/// Color space nesting (ICCBased alternates, Indexed bases) deeper than this
/// is rejected.
const MAX_COLOR_SPACE_DEPTH: usize = 4;

/// Filters whose output is not a plain sample array or a JPEG file.
const UNSUPPORTED_FILTERS: &[&str] = &["JPXDecode", "JBIG2Decode", "CCITTFaxDecode"];

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

// ── ImageDecoder ─────────────────────────────────────────────────────────────
//
// Internal type. PdfAnalyzer hands it image XObject streams and inline image
// streams whose dictionaries have already been expanded to full key names.

pub(crate) struct ImageDecoder<'a> {
    document: &'a Document,
}

impl<'a> ImageDecoder<'a> {
    pub(crate) fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Decode an image XObject stream, attaching its `/SMask` as alpha when
    /// the mask has the same dimensions.
    pub(crate) fn decode(&self, stream: &Stream) -> Result<DynamicImage> {
        let image = self.decode_base(stream)?;
        Ok(self.apply_soft_mask(&stream.dict, image))
    }

    fn decode_base(&self, stream: &Stream) -> Result<DynamicImage> {
        let dict = &stream.dict;
        let width = self.dimension(dict, b"Width")?;
        let height = self.dimension(dict, b"Height")?;

        let filters = pdf_utils::filter_names(self.document, dict);
        if let Some(filter) = filters
            .iter()
            .find(|f| UNSUPPORTED_FILTERS.contains(&f.as_str()))
        {
            return Err(ExtractError::UnsupportedImage(format!("{filter} encoded image")));
        }

        // A JPEG may sit behind transport filters such as ASCII85 or Flate.
        match filters.iter().position(|f| f == "DCTDecode") {
            Some(last) if last + 1 == filters.len() => {
                let jpeg = pdf_utils::apply_filters(self.document, dict, &stream.content, &filters[..last])?;
                Ok(image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?)
            }
            Some(_) => Err(ExtractError::UnsupportedImage(
                "DCTDecode followed by other filters".into(),
            )),
            None => self.decode_samples(stream, &filters, width, height),
        }
    }

    /// Decode an image stored as a raw (possibly compressed) sample array.
    fn decode_samples(&self, stream: &Stream, filters: &[String], width: u32, height: u32) -> Result<DynamicImage> {
        let dict = &stream.dict;
        let data = pdf_utils::apply_filters(self.document, dict, &stream.content, filters)?;

        // Stencil masks are always one bit per sample, no color space.
        let (space, bpc) = if pdf_utils::bool_entry(dict, b"ImageMask") {
            (ColorSpace::Gray, 1)
        } else {
            let bpc = pdf_utils::integer_entry(self.document, dict, b"BitsPerComponent").unwrap_or(8);
            let bpc = match bpc {
                1 | 2 | 4 | 8 | 16 => bpc as u32,
                other => {
                    return Err(ExtractError::InvalidImage(format!(
                        "unsupported BitsPerComponent {other}"
                    )))
                }
            };
            let value = dict
                .get(b"ColorSpace")
                .map_err(|_| ExtractError::InvalidImage("missing /ColorSpace".into()))?;
            (self.color_space(value, 0)?, bpc)
        };

        let mut samples = unpack_samples(
            &data,
            width as usize,
            height as usize,
            space.components(),
            bpc,
        )?;

        match space {
            ColorSpace::Indexed { base, hival, palette } => {
                let pixels = expand_palette(&samples, base.components(), hival, &palette);
                pixels_to_image(&base, width, height, pixels)
            }
            space => {
                if self.decode_is_inverted(dict) {
                    let max = max_sample(bpc);
                    samples.iter_mut().for_each(|s| *s = max - *s);
                }
                let pixels = samples.into_iter().map(|s| scale_to_u8(s, bpc)).collect();
                pixels_to_image(&space, width, height, pixels)
            }
        }
    }

    fn dimension(&self, dict: &Dictionary, key: &[u8]) -> Result<u32> {
        let name = String::from_utf8_lossy(key);
        let value = pdf_utils::integer_entry(self.document, dict, key)
            .ok_or_else(|| ExtractError::InvalidImage(format!("missing /{name}")))?;
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| ExtractError::InvalidImage(format!("/{name} {value} out of range")))
    }

    /// `true` when every `/Decode` pair maps the sample range backwards,
    /// e.g. `[1 0]`.
    fn decode_is_inverted(&self, dict: &Dictionary) -> bool {
        let Some(ranges) = dict
            .get(b"Decode")
            .ok()
            .and_then(|v| pdf_utils::resolve(self.document, v).ok())
            .and_then(|v| v.as_array().ok())
        else {
            return false;
        };
        !ranges.is_empty()
            && ranges.chunks(2).all(|pair| match pair {
                [low, high] => matches!((low.as_float(), high.as_float()), (Ok(l), Ok(h)) if l > h),
                _ => false,
            })
    }

    fn color_space(&self, value: &Object, depth: usize) -> Result<ColorSpace> {
        if depth > MAX_COLOR_SPACE_DEPTH {
            return Err(ExtractError::InvalidImage("color space nested too deeply".into()));
        }

        match pdf_utils::resolve(self.document, value)? {
            Object::Name(name) => device_space(name).ok_or_else(|| unsupported_space(name)),
            Object::Array(items) => {
                let family = items
                    .first()
                    .and_then(|f| pdf_utils::resolve(self.document, f).ok())
                    .and_then(|f| f.as_name().ok())
                    .ok_or_else(|| ExtractError::InvalidImage("color space array has no family".into()))?;

                match family {
                    b"ICCBased" => self.icc_space(items, depth),
                    b"Indexed" | b"I" => self.indexed_space(items, depth),
                    name => device_space(name).ok_or_else(|| unsupported_space(name)),
                }
            }
            other => Err(ExtractError::InvalidImage(format!(
                "color space is a {}",
                other.enum_variant()
            ))),
        }
    }

    /// `[/ICCBased stream]`: the profile's `/N` picks the device space; the
    /// profile's `/Alternate` is consulted when `/N` is absent or unusual.
    fn icc_space(&self, items: &[Object], depth: usize) -> Result<ColorSpace> {
        let profile = items
            .get(1)
            .map(|p| pdf_utils::resolve(self.document, p))
            .transpose()?
            .and_then(|p| p.as_stream().ok())
            .ok_or_else(|| ExtractError::InvalidImage("ICCBased without a profile stream".into()))?;

        match pdf_utils::integer_entry(self.document, &profile.dict, b"N") {
            Some(1) => Ok(ColorSpace::Gray),
            Some(3) => Ok(ColorSpace::Rgb),
            Some(4) => Ok(ColorSpace::Cmyk),
            n => match profile.dict.get(b"Alternate") {
                Ok(alternate) => self.color_space(alternate, depth + 1),
                Err(_) => Err(ExtractError::UnsupportedImage(format!(
                    "ICCBased profile with {n:?} components"
                ))),
            },
        }
    }

    /// `[/Indexed base hival lookup]` where lookup is a string or a stream.
    fn indexed_space(&self, items: &[Object], depth: usize) -> Result<ColorSpace> {
        let [_, base, hival, lookup] = items else {
            return Err(ExtractError::InvalidImage(format!(
                "Indexed color space with {} entries",
                items.len()
            )));
        };

        let base = self.color_space(base, depth + 1)?;
        if matches!(base, ColorSpace::Indexed { .. }) {
            return Err(ExtractError::InvalidImage("Indexed over Indexed".into()));
        }

        let hival = pdf_utils::resolve(self.document, hival)?
            .as_i64()
            .ok()
            .and_then(|h| usize::try_from(h).ok())
            .filter(|h| *h <= 255)
            .ok_or_else(|| ExtractError::InvalidImage("Indexed hival out of range".into()))?;

        let palette = match pdf_utils::resolve(self.document, lookup)? {
            Object::String(bytes, _) => bytes.clone(),
            Object::Stream(stream) => pdf_utils::stream_data(self.document, stream)?,
            other => {
                return Err(ExtractError::InvalidImage(format!(
                    "Indexed lookup is a {}",
                    other.enum_variant()
                )))
            }
        };

        Ok(ColorSpace::Indexed {
            base: Box::new(base),
            hival,
            palette,
        })
    }

    /// Returns `image` unchanged whenever the soft mask is missing, cannot be
    /// decoded, or does not line up with the image.
    fn apply_soft_mask(&self, dict: &Dictionary, image: DynamicImage) -> DynamicImage {
        let Some(mask) = dict
            .get(b"SMask")
            .ok()
            .and_then(|v| pdf_utils::resolve(self.document, v).ok())
            .and_then(|v| v.as_stream().ok())
        else {
            return image;
        };

        let alpha = match self.decode_base(mask) {
            Ok(alpha) => alpha.to_luma8(),
            Err(e) => {
                debug!(error = %e, "ignoring undecodable soft mask");
                return image;
            }
        };
        if alpha.dimensions() != (image.width(), image.height()) {
            debug!(
                mask = ?alpha.dimensions(),
                image = ?(image.width(), image.height()),
                "ignoring soft mask of different size"
            );
            return image;
        }

        let mut rgba = image.to_rgba8();
        for (pixel, a) in rgba.pixels_mut().zip(alpha.pixels()) {
            pixel[3] = a[0];
        }
        DynamicImage::ImageRgba8(rgba)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn device_space(name: &[u8]) -> Option<ColorSpace> {
    match name {
        b"DeviceGray" | b"CalGray" | b"G" => Some(ColorSpace::Gray),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(ColorSpace::Rgb),
        b"DeviceCMYK" | b"CMYK" => Some(ColorSpace::Cmyk),
        _ => None,
    }
}

fn unsupported_space(name: &[u8]) -> ExtractError {
    ExtractError::UnsupportedImage(format!("{} color space", String::from_utf8_lossy(name)))
}

fn max_sample(bpc: u32) -> u16 {
    ((1u32 << bpc) - 1) as u16
}

/// Scale a `bpc`-bit sample to the 0..=255 range.
fn scale_to_u8(sample: u16, bpc: u32) -> u8 {
    match bpc {
        16 => (sample >> 8) as u8,
        8 => sample as u8,
        _ => (u32::from(sample) * 255 / u32::from(max_sample(bpc))) as u8,
    }
}

/// Split a sample array into one value per component. Every row starts on a
/// byte boundary.
fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bpc: u32,
) -> Result<Vec<u16>> {
    let overflow = || ExtractError::InvalidImage("image dimensions overflow".into());
    let per_row = width.checked_mul(components).ok_or_else(overflow)?;
    let stride = per_row
        .checked_mul(bpc as usize)
        .ok_or_else(overflow)?
        .div_ceil(8);
    let needed = stride.checked_mul(height).ok_or_else(overflow)?;
    if data.len() < needed {
        return Err(ExtractError::InvalidImage(format!(
            "expected {needed} bytes of samples, found {}",
            data.len()
        )));
    }

    let mut samples = Vec::with_capacity(per_row * height);
    for row in data.chunks(stride).take(height) {
        match bpc {
            8 => samples.extend(row[..per_row].iter().map(|&b| u16::from(b))),
            16 => samples.extend(
                row.chunks_exact(2)
                    .take(per_row)
                    .map(|p| u16::from_be_bytes([p[0], p[1]])),
            ),
            _ => {
                let bits = bpc as usize;
                let mask = max_sample(bpc);
                for i in 0..per_row {
                    let bit = i * bits;
                    let shift = 8 - bits - bit % 8;
                    samples.push(u16::from(row[bit / 8] >> shift) & mask);
                }
            }
        }
    }
    Ok(samples)
}

/// Replace each palette index with its entry in `palette`. Indices above
/// `hival`, or entries missing from a short palette, read as zero.
fn expand_palette(indices: &[u16], components: usize, hival: usize, palette: &[u8]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(indices.len() * components);
    for &index in indices {
        let start = usize::from(index).min(hival) * components;
        match palette.get(start..start + components) {
            Some(entry) => pixels.extend_from_slice(entry),
            None => pixels.extend(std::iter::repeat(0).take(components)),
        }
    }
    pixels
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(cmyk.len() / 4 * 3);
    for px in cmyk.chunks_exact(4) {
        let k = 255 - u32::from(px[3]);
        for &c in &px[..3] {
            rgb.push(((255 - u32::from(c)) * k / 255) as u8);
        }
    }
    rgb
}

fn pixels_to_image(space: &ColorSpace, width: u32, height: u32, pixels: Vec<u8>) -> Result<DynamicImage> {
    let image = match space {
        ColorSpace::Gray => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        ColorSpace::Rgb => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        ColorSpace::Cmyk => {
            RgbImage::from_raw(width, height, cmyk_to_rgb(&pixels)).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Indexed { .. } => None,
    };
    image.ok_or_else(|| ExtractError::InvalidImage("sample buffer does not match image size".into()))
}
