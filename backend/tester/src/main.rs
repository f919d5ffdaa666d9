use std::{fs, io::Cursor, path::PathBuf};

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::Parser;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;

/// Writes an `/update-dp` request body for manual testing with curl.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    phone: String,

    /// Image to upload, a generated 1200x800 gradient when omitted
    #[arg(long)]
    image: Option<PathBuf>,

    #[arg(long, default_value = "../test.json")]
    out: PathBuf,
}

fn gradient() -> Result<Vec<u8>> {
    let img = RgbImage::from_fn(1200, 800, |x, y| {
        Rgb([(x * 255 / 1200) as u8, (y * 255 / 800) as u8, 160])
    });

    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Jpeg)?;

    Ok(bytes.into_inner())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (bytes, mime) = match &args.image {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let format = image::guess_format(&bytes).context("not a recognised image")?;
            (bytes, format.to_mime_type())
        }
        None => (gradient()?, "image/jpeg"),
    };

    println!("Image size in bytes: {}", bytes.len());

    let payload = json!({
        "phone": args.phone,
        "imageData": format!("data:{mime};base64,{}", STANDARD.encode(&bytes)),
    });

    fs::write(&args.out, payload.to_string())
        .with_context(|| format!("writing {}", args.out.display()))?;

    println!("Wrote {}", args.out.display());

    Ok(())
}
