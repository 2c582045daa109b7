//! Image asset loading and PDF stream preparation
//!
//! An [`ImageAsset`] is decoded once per batch and shared by reference across
//! every document and page. Loading does all the expensive work up front:
//! format sniffing, dimension and DPI extraction, and re-encoding the pixel
//! data into the form a PDF image XObject wants (`DCTDecode` passthrough for
//! JPEG, zlib-compressed samples for PNG).

use crate::error::PdfStampError;
use image::DynamicImage;
use lopdf::{Dictionary, Object, Stream};
use std::io::Write;

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Default resolution assumed when the file carries no density metadata.
pub const DEFAULT_DPI: f64 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Sniff the image format from magic bytes.
pub fn detect_format(data: &[u8]) -> Result<ImageFormat, PdfStampError> {
    if data.len() >= 3 && data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
        return Ok(ImageFormat::Jpeg);
    }
    if data.len() >= 8 && data[0..8] == PNG_MAGIC {
        return Ok(ImageFormat::Png);
    }
    Err(PdfStampError::ImageDecode(
        "Unrecognized image format (expected PNG or JPEG)".to_string(),
    ))
}

/// A decoded image ready for embedding, shared read-only across a batch.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    /// Intrinsic pixel dimensions.
    pub width: u32,
    pub height: u32,
    /// Declared resolution; defaults to 72x72 when the file has none.
    pub dpi_x: f64,
    pub dpi_y: f64,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
}

impl ImageAsset {
    /// Decode image bytes into an embeddable asset.
    pub fn load(data: &[u8]) -> Result<Self, PdfStampError> {
        match detect_format(data)? {
            ImageFormat::Jpeg => Self::from_jpeg(data),
            ImageFormat::Png => Self::from_png(data),
        }
    }

    /// Pixel aspect ratio, width over height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// JPEG data embeds directly under a `DCTDecode` filter; only the headers
    /// are parsed, the compressed stream is passed through untouched.
    fn from_jpeg(data: &[u8]) -> Result<Self, PdfStampError> {
        let info = parse_jpeg_headers(data)?;
        let color_space = if info.components == 1 {
            "DeviceGray"
        } else {
            "DeviceRGB"
        };
        Ok(Self {
            width: info.width,
            height: info.height,
            dpi_x: info.dpi_x,
            dpi_y: info.dpi_y,
            color_space,
            filter: "DCTDecode",
            data: data.to_vec(),
        })
    }

    /// PNG is decoded to raw samples and recompressed with zlib for a
    /// `FlateDecode` stream. Alpha is blended against white, since a plain
    /// image XObject has no transparency channel.
    fn from_png(data: &[u8]) -> Result<Self, PdfStampError> {
        let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| PdfStampError::ImageDecode(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        let (dpi_x, dpi_y) = parse_png_density(data);

        let (raw, color_space) = flatten_samples(&decoded);

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(&raw)
            .and_then(|_| encoder.finish())
            .map(|compressed| Self {
                width,
                height,
                dpi_x,
                dpi_y,
                color_space,
                filter: "FlateDecode",
                data: compressed,
            })
            .map_err(|e| PdfStampError::ImageDecode(format!("Compression failed: {}", e)))
    }

    /// Build the lopdf image XObject stream for embedding into a document.
    pub fn to_stream(&self) -> Stream {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", self.width as i64);
        dict.set("Height", self.height as i64);
        dict.set(
            "ColorSpace",
            Object::Name(self.color_space.as_bytes().to_vec()),
        );
        dict.set("BitsPerComponent", 8_i64);
        dict.set("Filter", Object::Name(self.filter.as_bytes().to_vec()));
        Stream::new(dict, self.data.clone())
    }
}

/// Reduce any decoded color layout to 8-bit Gray or RGB samples, blending
/// alpha against a white background.
fn flatten_samples(decoded: &DynamicImage) -> (Vec<u8>, &'static str) {
    match decoded.color() {
        image::ColorType::L8 | image::ColorType::L16 => {
            (decoded.to_luma8().into_raw(), "DeviceGray")
        }
        image::ColorType::La8 | image::ColorType::La16 => {
            let la = decoded.to_luma_alpha8();
            let mut out = Vec::with_capacity(la.len() / 2);
            for px in la.pixels() {
                out.push(blend_white(px[0], px[1]));
            }
            (out, "DeviceGray")
        }
        image::ColorType::Rgba8 | image::ColorType::Rgba16 => {
            let rgba = decoded.to_rgba8();
            let mut out = Vec::with_capacity(rgba.len() / 4 * 3);
            for px in rgba.pixels() {
                out.push(blend_white(px[0], px[3]));
                out.push(blend_white(px[1], px[3]));
                out.push(blend_white(px[2], px[3]));
            }
            (out, "DeviceRGB")
        }
        _ => (decoded.to_rgb8().into_raw(), "DeviceRGB"),
    }
}

fn blend_white(value: u8, alpha: u8) -> u8 {
    let a = alpha as f32 / 255.0;
    (value as f32 * a + 255.0 * (1.0 - a)) as u8
}

#[cfg(test)]
impl ImageAsset {
    /// Bare-dimensions fixture for geometry tests; carries no sample data.
    pub(crate) fn test_fixture(width: u32, height: u32, dpi_x: f64, dpi_y: f64) -> Self {
        Self {
            width,
            height,
            dpi_x,
            dpi_y,
            color_space: "DeviceRGB",
            filter: "FlateDecode",
            data: Vec::new(),
        }
    }
}

struct JpegInfo {
    width: u32,
    height: u32,
    components: u8,
    dpi_x: f64,
    dpi_y: f64,
}

/// Walk JPEG segments for the SOF frame header (dimensions, component count)
/// and the JFIF APP0 density fields.
///
/// SOF segment layout after the 2-byte marker and 2-byte length: precision
/// (1), height (2), width (2), component count (1).
fn parse_jpeg_headers(data: &[u8]) -> Result<JpegInfo, PdfStampError> {
    let mut frame: Option<(u32, u32, u8)> = None;
    let mut density = (DEFAULT_DPI, DEFAULT_DPI);

    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if length < 2 {
            break;
        }
        let segment = &data[i + 2..(i + 2 + length).min(data.len())];

        match marker {
            // SOF0-SOF15, excluding DHT / JPG / DAC which share the range
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                if segment.len() >= 8 {
                    let height = u16::from_be_bytes([segment[3], segment[4]]) as u32;
                    let width = u16::from_be_bytes([segment[5], segment[6]]) as u32;
                    frame = Some((width, height, segment[7]));
                }
                break;
            }
            // JFIF APP0: identifier(5) version(2) units(1) xdensity(2) ydensity(2)
            0xE0 => {
                if segment.len() >= 14 && &segment[2..7] == b"JFIF\0" {
                    let units = segment[9];
                    let x = u16::from_be_bytes([segment[10], segment[11]]) as f64;
                    let y = u16::from_be_bytes([segment[12], segment[13]]) as f64;
                    if x > 0.0 && y > 0.0 {
                        density = match units {
                            1 => (x, y),
                            2 => (x * 2.54, y * 2.54),
                            _ => density,
                        };
                    }
                }
            }
            _ => {}
        }
        i += 2 + length;
    }

    let (width, height, components) = frame.ok_or_else(|| {
        PdfStampError::ImageDecode("Could not locate JPEG frame header".to_string())
    })?;
    Ok(JpegInfo {
        width,
        height,
        components,
        dpi_x: density.0,
        dpi_y: density.1,
    })
}

/// Scan PNG chunks for a `pHYs` chunk with a per-meter unit. Returns the
/// default 72x72 when absent, unitless, or malformed.
fn parse_png_density(data: &[u8]) -> (f64, f64) {
    const METERS_PER_INCH: f64 = 0.0254;

    let mut i = 8;
    while i + 8 <= data.len() {
        let length =
            u32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]) as usize;
        let chunk_type = &data[i + 4..i + 8];
        if chunk_type == b"IDAT" || chunk_type == b"IEND" {
            break;
        }
        if chunk_type == b"pHYs" && length >= 9 && i + 8 + 9 <= data.len() {
            let body = &data[i + 8..i + 17];
            let ppm_x = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as f64;
            let ppm_y = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as f64;
            if body[8] == 1 && ppm_x > 0.0 && ppm_y > 0.0 {
                return (ppm_x * METERS_PER_INCH, ppm_y * METERS_PER_INCH);
            }
            break;
        }
        i += 12 + length;
    }
    (DEFAULT_DPI, DEFAULT_DPI)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn encode_png(img: image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_detect_jpeg_magic() {
        let header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(detect_format(&header).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_detect_png_magic() {
        assert_eq!(detect_format(&PNG_MAGIC).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_detect_rejects_garbage() {
        assert!(detect_format(&[0u8; 16]).is_err());
        assert!(detect_format(b"no").is_err());
    }

    #[test]
    fn test_load_png_dimensions_and_default_dpi() {
        let bytes = encode_png(image::RgbaImage::new(12, 7));
        let asset = ImageAsset::load(&bytes).unwrap();
        assert_eq!(asset.width, 12);
        assert_eq!(asset.height, 7);
        assert_eq!(asset.dpi_x, DEFAULT_DPI);
        assert_eq!(asset.dpi_y, DEFAULT_DPI);
        assert_eq!(asset.filter, "FlateDecode");
    }

    #[test]
    fn test_png_phys_chunk_parsed_as_dpi() {
        // Splice a pHYs chunk (5906 px/m ~ 150 DPI) after IHDR.
        let bytes = encode_png(image::RgbaImage::new(4, 4));
        let ihdr_end = 8 + 12 + 13; // signature + IHDR header/crc + IHDR body
        let mut spliced = bytes[..ihdr_end].to_vec();
        spliced.extend_from_slice(&9u32.to_be_bytes());
        spliced.extend_from_slice(b"pHYs");
        spliced.extend_from_slice(&5906u32.to_be_bytes());
        spliced.extend_from_slice(&5906u32.to_be_bytes());
        spliced.push(1);
        spliced.extend_from_slice(&[0, 0, 0, 0]); // crc, not validated here
        spliced.extend_from_slice(&bytes[ihdr_end..]);

        let (dpi_x, dpi_y) = parse_png_density(&spliced);
        assert!((dpi_x - 150.0).abs() < 0.1, "dpi_x = {}", dpi_x);
        assert!((dpi_y - 150.0).abs() < 0.1);
    }

    #[test]
    fn test_jpeg_headers_dimensions_and_density() {
        // Minimal synthetic stream: SOI, JFIF APP0 at 300x300 dpi, SOF0 64x32.
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(b"JFIF\0");
        data.extend_from_slice(&[0x01, 0x02, 0x01]); // version, units=dpi
        data.extend_from_slice(&300u16.to_be_bytes());
        data.extend_from_slice(&300u16.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x00]); // thumbnail
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
        data.extend_from_slice(&32u16.to_be_bytes()); // height
        data.extend_from_slice(&64u16.to_be_bytes()); // width
        data.push(3); // components
        data.extend_from_slice(&[0x01, 0x22, 0x00]);

        let info = parse_jpeg_headers(&data).unwrap();
        assert_eq!(info.width, 64);
        assert_eq!(info.height, 32);
        assert_eq!(info.components, 3);
        assert_eq!(info.dpi_x, 300.0);
        assert_eq!(info.dpi_y, 300.0);
    }

    #[test]
    fn test_rgba_flattens_to_rgb_blended_with_white() {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([0, 0, 0, 0])); // fully transparent black
        let (raw, cs) = flatten_samples(&DynamicImage::ImageRgba8(img));
        assert_eq!(cs, "DeviceRGB");
        assert_eq!(raw, vec![255, 255, 255]);
    }

    #[test]
    fn test_to_stream_dict_shape() {
        let bytes = encode_png(image::RgbaImage::new(3, 3));
        let asset = ImageAsset::load(&bytes).unwrap();
        let stream = asset.to_stream();
        assert_eq!(
            stream.dict.get(b"Subtype").unwrap().as_name_str().unwrap(),
            "Image"
        );
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 3);
        assert_eq!(
            stream.dict.get(b"Filter").unwrap().as_name_str().unwrap(),
            "FlateDecode"
        );
    }
}
