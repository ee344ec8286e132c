use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Downscales to fit `max_width` x `max_height` keeping the aspect ratio.
/// Smaller frames are left alone.
pub fn fit_within(frame: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if frame.width() <= max_width && frame.height() <= max_height {
        return frame;
    }
    frame.resize(max_width, max_height, FilterType::Triangle)
}

/// Encodes a frame as the JPEG `data:` URL the recognition endpoint expects.
pub fn encode_data_url(
    frame: DynamicImage,
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> Result<String> {
    let rgb = fit_within(frame, max_width, max_height).to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&rgb)
        .context("jpeg encoding failed")?;

    Ok(format!("{JPEG_DATA_URL_PREFIX}{}", STANDARD.encode(&jpeg)))
}

/// Splits a `data:` URL on its comma and decodes the payload.
pub fn data_url_to_bytes(data_url: &str) -> Result<Vec<u8>> {
    let (_, payload) = data_url
        .split_once(',')
        .ok_or_else(|| anyhow!("not a data url"))?;
    STANDARD
        .decode(payload)
        .context("data url payload is not base64")
}

/// Wraps a bare base64 PNG (as the server sends QR codes) in a `data:` URL.
pub fn png_data_url(base64_png: &str) -> String {
    format!("{PNG_DATA_URL_PREFIX}{base64_png}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    #[test]
    fn large_frames_are_downscaled_preserving_aspect() {
        let frame = DynamicImage::ImageRgb8(RgbImage::new(1280, 720));
        let fitted = fit_within(frame, 640, 480);
        assert_eq!((fitted.width(), fitted.height()), (640, 360));

        let small = DynamicImage::ImageRgb8(RgbImage::new(320, 240));
        let fitted = fit_within(small, 640, 480);
        assert_eq!((fitted.width(), fitted.height()), (320, 240));
    }

    #[test]
    fn data_url_carries_a_decodable_jpeg() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 600, Rgb([30, 90, 150])));
        let url = encode_data_url(frame, 640, 480, 80).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let bytes = data_url_to_bytes(&url).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }

    #[test]
    fn rejects_malformed_data_urls() {
        assert!(data_url_to_bytes("no comma here").is_err());
        assert!(data_url_to_bytes("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn wraps_qr_payload() {
        assert_eq!(png_data_url("iVBOR"), "data:image/png;base64,iVBOR");
    }
}
